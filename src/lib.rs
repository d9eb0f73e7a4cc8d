//! # sudo-core
//!
//! An observable key/path store with change records, filters that route
//! those records to typed handlers, and a small template compiler.
//!
//! ## Core Concepts
//!
//! - **Observable**: key and dot-path storage that queues a change record for
//!   every mutation and delivers records to observers in FIFO order
//! - **Hold**: a write with `hold = true` queues its record without
//!   delivering it until the next flush
//! - **Change filters**: forward records for selected keys to handlers
//! - **Templates**: `{{ code }}`, `{{= value }}` and `{{- escaped }}`
//!   compiled once and rendered against JSON data
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use sudo_core::{ChangeFilter, ChangeHandler, Observable, Template};
//!
//! let store = Observable::new();
//! let view = Template::compile("{{ for t in todos }}{{- t }};{{ end }}").unwrap();
//!
//! ChangeFilter::new()
//!     .on("todos", ChangeHandler::new(|change| {
//!         assert!(change.value.is_some());
//!     }))
//!     .attach(&store);
//!
//! store.set("todos", json!(["milk", "eggs"]), false);
//! let html = view.render(&serde_json::Value::Object(store.data())).unwrap();
//! assert_eq!(html, "milk;eggs;");
//! ```

pub mod delegates;
pub mod error;
pub mod observable;
pub mod path;
pub mod template;
pub mod types;

// Re-exports
pub use delegates::{Change, ChangeFilter, ChangeHandler, DataFilter, DataHandler, Delegator};
pub use error::{RenderError, Result, StoreError, TemplateError};
pub use observable::{ChangeFeed, Observable, ObservableConfig, Observer, ObserverId, UnsetPolicy};
pub use template::{escape_html, template, Template, TemplateCache, TemplateSettings};
pub use types::*;
