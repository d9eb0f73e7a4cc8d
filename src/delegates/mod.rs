//! Filters that forward store changes (or values found in a document) to
//! typed handlers.
//!
//! Handlers are resolved once, when a filter is built, either directly with
//! `on(key, handler)` or by name through a [`Delegator`].

mod change;
mod data;

pub use change::{Change, ChangeFilter};
pub use data::DataFilter;

use crate::types::Value;
use std::fmt;
use std::sync::Arc;

/// Handler invoked with a filtered [`Change`].
#[derive(Clone)]
pub struct ChangeHandler(Arc<dyn Fn(&Change) + Send + Sync>);

impl ChangeHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    pub fn call(&self, change: &Change) {
        (self.0)(change)
    }
}

impl fmt::Debug for ChangeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangeHandler")
    }
}

/// Handler invoked with a value found by a [`DataFilter`].
#[derive(Clone)]
pub struct DataHandler(Arc<dyn Fn(&Value) + Send + Sync>);

impl DataHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    pub fn call(&self, value: &Value) {
        (self.0)(value)
    }
}

impl fmt::Debug for DataHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataHandler")
    }
}

/// An object that owns named handlers.
///
/// Filters built with `resolve` look each method name up here exactly once.
pub trait Delegator {
    fn change_handler(&self, method: &str) -> Option<ChangeHandler>;

    fn data_handler(&self, _method: &str) -> Option<DataHandler> {
        None
    }
}
