//! Observer handles and channel-backed change feeds.

use super::store::Observable;
use crate::types::ChangeRecord;
use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, TryRecvError, TrySendError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Counter for generating observer IDs.
static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an observer. Clones of an [`Observer`] share it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

impl ObserverId {
    fn next() -> Self {
        ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Callback = dyn Fn(&Observable, &ChangeRecord) + Send + Sync;

/// A change-record callback.
///
/// Observers are compared by identity: registering a clone of an observer
/// that is already registered does nothing, and unregistering any clone
/// removes it.
#[derive(Clone)]
pub struct Observer {
    id: ObserverId,
    callback: Arc<Callback>,
}

impl Observer {
    /// Wrap a callback. The callback receives the store that delivered the
    /// record, so it may read or mutate it.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Observable, &ChangeRecord) + Send + Sync + 'static,
    {
        Self::with_id(ObserverId::next(), callback)
    }

    fn with_id<F>(id: ObserverId, callback: F) -> Self
    where
        F: Fn(&Observable, &ChangeRecord) + Send + Sync + 'static,
    {
        Self {
            id,
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub(crate) fn call(&self, store: &Observable, record: &ChangeRecord) {
        (self.callback)(store, record)
    }
}

impl PartialEq for Observer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Observer {}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").field("id", &self.id.0).finish()
    }
}

/// Change records delivered through a bounded channel.
///
/// A feed that falls `buffer` records behind, or whose receiver is gone,
/// is detached from its store.
pub struct ChangeFeed {
    observer: Observer,
    receiver: Receiver<ChangeRecord>,
}

impl ChangeFeed {
    pub(crate) fn attach(store: &Observable, buffer: usize) -> Self {
        let (sender, receiver) = bounded(buffer.max(1));
        let id = ObserverId::next();

        let observer = Observer::with_id(id, move |store, record| {
            match sender.try_send(record.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(observer = id.0, "change feed buffer full, detaching");
                    store.unobserve_id(id);
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(observer = id.0, "change feed receiver dropped, detaching");
                    store.unobserve_id(id);
                }
            }
        });
        store.observe(observer.clone());

        Self { observer, receiver }
    }

    /// The observer that feeds this channel.
    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Receive the next record (blocking).
    pub fn recv(&self) -> Result<ChangeRecord, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a record (non-blocking).
    pub fn try_recv(&self) -> Result<ChangeRecord, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ChangeRecord, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<ChangeRecord> {
        self.receiver.try_iter().collect()
    }

    /// Stop receiving records from `store`.
    pub fn detach(self, store: &Observable) {
        store.unobserve(&self.observer);
    }
}
