//! Data filter: pulls keys or paths out of a document.

use super::{DataHandler, Delegator};
use crate::error::{Result, StoreError};
use crate::path;
use crate::types::Value;
use tracing::trace;

/// Calls a handler for every filtered key or dotted path present in a value.
#[derive(Clone, Debug, Default)]
pub struct DataFilter {
    /// In registration order.
    filters: Vec<(String, DataHandler)>,
}

impl DataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, key: impl Into<String>, handler: DataHandler) -> Self {
        self.filters.push((key.into(), handler));
        self
    }

    /// Build a filter from `key -> method name` pairs resolved on `delegator`.
    pub fn resolve<I, K, M, D>(filters: I, delegator: &D) -> Result<Self>
    where
        I: IntoIterator<Item = (K, M)>,
        K: Into<String>,
        M: AsRef<str>,
        D: Delegator + ?Sized,
    {
        let mut resolved = Vec::new();
        for (key, method) in filters {
            let key = key.into();
            let method = method.as_ref();
            match delegator.data_handler(method) {
                Some(handler) => resolved.push((key, handler)),
                None => {
                    return Err(StoreError::UnknownHandler {
                        key,
                        method: method.to_string(),
                    })
                }
            }
        }
        Ok(Self { filters: resolved })
    }

    /// Invoke handlers for the keys found in `value`. Returns how many ran.
    pub fn filter(&self, value: &Value) -> usize {
        let Value::Object(map) = value else {
            return 0;
        };
        let mut ran = 0;
        for (key, handler) in &self.filters {
            if let Some(found) = path::get_path(key, map) {
                trace!(%key, "data filter dispatch");
                handler.call(found);
                ran += 1;
            }
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_keys_and_paths() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = seen.clone();
        let b = seen.clone();
        let filter = DataFilter::new()
            .on("title", DataHandler::new(move |v| a.lock().push(v.clone())))
            .on("meta.count", DataHandler::new(move |v| b.lock().push(v.clone())))
            .on("absent", DataHandler::new(|_| panic!("absent key dispatched")));

        let ran = filter.filter(&json!({"title": "t", "meta": {"count": 0}}));
        assert_eq!(ran, 2);
        assert_eq!(*seen.lock(), vec![json!("t"), json!(0)]);

        assert_eq!(filter.filter(&json!("not an object")), 0);
    }

    #[test]
    fn test_null_values_are_present() {
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let filter = DataFilter::new().on("x", DataHandler::new(move |_| *c.lock() += 1));
        filter.filter(&json!({"x": null}));
        assert_eq!(*count.lock(), 1);
    }

    struct NoHandlers;

    impl Delegator for NoHandlers {
        fn change_handler(&self, _method: &str) -> Option<crate::delegates::ChangeHandler> {
            None
        }
    }

    #[test]
    fn test_resolve_unknown_method() {
        assert!(matches!(
            DataFilter::resolve([("x", "onX")], &NoHandlers),
            Err(StoreError::UnknownHandler { .. })
        ));
    }
}
