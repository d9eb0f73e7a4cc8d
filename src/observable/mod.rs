//! Observable key/path storage with change records.
//!
//! Every mutation of an [`Observable`] produces a [`ChangeRecord`] that is
//! queued and handed to each registered [`Observer`], in registration
//! order, when the queue is flushed:
//! - `set` / `set_path` / `sets` record `new` or `updated` changes
//! - `unset` / `unset_path` / `unsets` record `deleted` changes for keys that existed
//! - `hold = true` queues the record without delivering it
//!
//! # Example
//!
//! ```ignore
//! let store = Observable::new();
//!
//! store.observe(Observer::new(|store, record| {
//!     println!("{} {} -> {:?}", record.kind, record.path(), store.get_path(&record.path()));
//! }));
//!
//! store.set("title", "Buy milk", false);
//! store.set_path("filter.completed", true, false)?;
//!
//! // Batch: one delivery for both records
//! store.sets([("a", 1), ("b", 2)], false)?;
//! ```

mod observer;
mod store;

pub use observer::{ChangeFeed, Observer, ObserverId};
pub use store::{Observable, ObservableConfig, UnsetPolicy};
