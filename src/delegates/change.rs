//! Change filter: re-dispatches matching change records.

use super::{ChangeHandler, Delegator};
use crate::error::{Result, StoreError};
use crate::observable::{Observable, Observer};
use crate::types::{ChangeKind, ChangeRecord, Value};
use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

/// Reduced view of a change record handed to filter handlers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: ChangeKind,

    /// Value at the changed key when the filter ran. `None` once deleted.
    pub value: Option<Value>,

    pub old_value: Option<Value>,
}

/// Forwards records whose key (or full dotted path) has a handler.
#[derive(Clone, Debug, Default)]
pub struct ChangeFilter {
    filters: HashMap<String, ChangeHandler>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for records named `key`.
    pub fn on(mut self, key: impl Into<String>, handler: ChangeHandler) -> Self {
        self.filters.insert(key.into(), handler);
        self
    }

    /// Build a filter from `key -> method name` pairs, looking every method
    /// up on `delegator`.
    pub fn resolve<I, K, M, D>(filters: I, delegator: &D) -> Result<Self>
    where
        I: IntoIterator<Item = (K, M)>,
        K: Into<String>,
        M: AsRef<str>,
        D: Delegator + ?Sized,
    {
        let mut resolved = HashMap::new();
        for (key, method) in filters {
            let key = key.into();
            let method = method.as_ref();
            let handler = delegator
                .change_handler(method)
                .ok_or_else(|| StoreError::UnknownHandler {
                    key: key.clone(),
                    method: method.to_string(),
                })?;
            resolved.insert(key, handler);
        }
        Ok(Self { filters: resolved })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Dispatch `record` if its key is filtered. Returns whether a handler ran.
    pub fn filter(&self, store: &Observable, record: &ChangeRecord) -> bool {
        let handler = match self.filters.get(&record.name) {
            Some(handler) => handler,
            None if record.object.is_root() => return false,
            None => match self.filters.get(&record.path()) {
                Some(handler) => handler,
                None => return false,
            },
        };

        let change = Change {
            kind: record.kind,
            value: store.value_at(&record.object, &record.name),
            old_value: record.old_value.clone(),
        };
        trace!(name = %record.name, kind = %record.kind, "filter dispatch");
        handler.call(&change);
        true
    }

    /// Register this filter as an observer of `store`.
    pub fn attach(self, store: &Observable) -> Observer {
        store.observe(Observer::new(move |store, record| {
            self.filter(store, record);
        }))
    }
}
