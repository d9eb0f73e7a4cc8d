//! The observable key-value store.

use super::observer::{ChangeFeed, Observer, ObserverId};
use crate::error::Result;
use crate::path::{self, PathWrite};
use crate::types::{is_truthy, ChangeKind, ChangeRecord, Map, ObjectPath, Value};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// When a delete produces a change record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsetPolicy {
    /// Emit whenever the key existed, whatever its value.
    #[default]
    Presence,
    /// Emit only when the previous value was truthy. Deleting a key holding
    /// `0`, `false`, `""` or `null` is silent.
    Truthy,
}

/// Observable configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ObservableConfig {
    /// Which deletes produce change records.
    pub unset_policy: UnsetPolicy,

    /// Channel capacity for [`Observable::subscribe`].
    /// Default: 1000
    pub feed_buffer: usize,
}

impl Default for ObservableConfig {
    fn default() -> Self {
        Self {
            unset_policy: UnsetPolicy::default(),
            feed_buffer: 1000,
        }
    }
}

/// A key-value store that records every mutation as a [`ChangeRecord`] and
/// delivers records to its observers.
///
/// Every mutating method takes a `hold` flag. With `hold == false` the
/// queue is flushed before the method returns; with `hold == true` the
/// record is queued until the next [`deliver_change_records`] call.
///
/// No lock is held while an observer runs, so observers may call back into
/// the store. Records they cause are delivered by the drain already in
/// progress.
///
/// [`deliver_change_records`]: Observable::deliver_change_records
#[derive(Debug)]
pub struct Observable {
    config: ObservableConfig,
    data: RwLock<Map>,
    callbacks: RwLock<Vec<Observer>>,
    change_records: Mutex<VecDeque<ChangeRecord>>,
}

impl Observable {
    pub fn new() -> Self {
        Self::with_config(ObservableConfig::default())
    }

    pub fn with_config(config: ObservableConfig) -> Self {
        Self {
            config,
            data: RwLock::new(Map::new()),
            callbacks: RwLock::new(Vec::new()),
            change_records: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a store with initial contents. No records are produced.
    pub fn with_data(data: Map) -> Self {
        let store = Self::new();
        *store.data.write() = data;
        store
    }

    pub fn config(&self) -> &ObservableConfig {
        &self.config
    }

    // --- Reads ---

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Value at dotted `path`. Missing intermediates yield `None`.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        path::get_path(path, &self.data.read()).cloned()
    }

    /// Collect several keys or paths. Absent entries are left out.
    pub fn gets<I, S>(&self, keys: I) -> Map
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let data = self.data.read();
        keys.into_iter()
            .filter_map(|key| {
                let key = key.as_ref();
                let value = if key.contains('.') {
                    path::get_path(key, &data)
                } else {
                    data.get(key)
                };
                value.map(|v| (key.to_string(), v.clone()))
            })
            .collect()
    }

    /// Snapshot of the whole store.
    pub fn data(&self) -> Map {
        self.data.read().clone()
    }

    /// The mapping a change record's `object` refers to, as it is now.
    pub fn resolve(&self, object: &ObjectPath) -> Option<Value> {
        let data = self.data.read();
        if object.is_root() {
            return Some(Value::Object(data.clone()));
        }
        path::get_in(&data, object.segments()).cloned()
    }

    /// Current value of `name` inside the mapping at `object`.
    pub fn value_at(&self, object: &ObjectPath, name: &str) -> Option<Value> {
        let data = self.data.read();
        if object.is_root() {
            return data.get(name).cloned();
        }
        path::get_in(&data, object.segments())
            .and_then(|parent| path::child(parent, name))
            .cloned()
    }

    // --- Writes ---

    /// Write `value` under `key`. The key is taken literally, dots included.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>, hold: bool) -> &Self {
        let key = key.into();
        let old_value = self.data.write().insert(key.clone(), value.into());

        self.enqueue(ChangeRecord {
            kind: Self::write_kind(&old_value),
            name: key,
            object: ObjectPath::root(),
            old_value,
        });
        self.flush(hold)
    }

    /// Write `value` at dotted `path`, creating intermediate mappings.
    ///
    /// The record names the last segment and refers to its parent mapping.
    pub fn set_path(&self, path: &str, value: impl Into<Value>, hold: bool) -> Result<&Self> {
        let PathWrite {
            parent,
            name,
            old_value,
        } = path::set_path(path, value.into(), &mut self.data.write())?;

        self.enqueue(ChangeRecord {
            kind: Self::write_kind(&old_value),
            name,
            object: parent,
            old_value,
        });
        Ok(self.flush(hold))
    }

    /// Apply every entry, then deliver once. Keys containing a `.` are
    /// written as paths.
    ///
    /// If an entry fails, the entries before it stay applied and their
    /// records are still flushed (unless `hold`).
    pub fn sets<I, K, V>(&self, entries: I, hold: bool) -> Result<&Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let outcome = entries.into_iter().try_for_each(|(key, value)| {
            let key = key.into();
            if key.contains('.') {
                self.set_path(&key, value, true).map(|_| ())
            } else {
                self.set(key, value, true);
                Ok(())
            }
        });
        self.flush(hold);
        outcome.map(|()| self)
    }

    /// Remove `key`.
    pub fn unset(&self, key: &str, hold: bool) -> &Self {
        let old_value = self.data.write().remove(key);
        self.record_delete(ObjectPath::root(), key.to_string(), old_value, hold)
    }

    /// Remove the key at dotted `path`. Intermediates must exist.
    pub fn unset_path(&self, path: &str, hold: bool) -> Result<&Self> {
        let PathWrite {
            parent,
            name,
            old_value,
        } = path::unset_path(path, &mut self.data.write())?;

        Ok(self.record_delete(parent, name, old_value, hold))
    }

    /// Remove several keys or paths, then deliver once.
    pub fn unsets<I, S>(&self, keys: I, hold: bool) -> Result<&Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outcome = keys.into_iter().try_for_each(|key| {
            let key = key.as_ref();
            if key.contains('.') {
                self.unset_path(key, true).map(|_| ())
            } else {
                self.unset(key, true);
                Ok(())
            }
        });
        self.flush(hold);
        outcome.map(|()| self)
    }

    fn write_kind(old_value: &Option<Value>) -> ChangeKind {
        if old_value.is_some() {
            ChangeKind::Updated
        } else {
            ChangeKind::New
        }
    }

    fn record_delete(
        &self,
        object: ObjectPath,
        name: String,
        old_value: Option<Value>,
        hold: bool,
    ) -> &Self {
        let emit = match self.config.unset_policy {
            UnsetPolicy::Presence => old_value.is_some(),
            UnsetPolicy::Truthy => old_value.as_ref().map_or(false, is_truthy),
        };
        if !emit {
            let key = object.child(&name);
            trace!(%key, "delete produced no change");
            return self;
        }

        self.enqueue(ChangeRecord {
            kind: ChangeKind::Deleted,
            name,
            object,
            old_value,
        });
        self.flush(hold)
    }

    // --- Observers ---

    /// Register an observer. Registering the same observer twice is a no-op.
    pub fn observe(&self, observer: Observer) -> Observer {
        let mut callbacks = self.callbacks.write();
        if !callbacks.contains(&observer) {
            debug!(observer = observer.id().0, "observer registered");
            callbacks.push(observer.clone());
        }
        observer
    }

    /// Register several observers, in order.
    pub fn observes<I>(&self, observers: I) -> Vec<Observer>
    where
        I: IntoIterator<Item = Observer>,
    {
        observers.into_iter().map(|o| self.observe(o)).collect()
    }

    /// Remove an observer. Unknown observers are ignored.
    pub fn unobserve(&self, observer: &Observer) -> &Self {
        self.unobserve_id(observer.id());
        self
    }

    /// Remove several observers.
    pub fn unobserves<'a, I>(&self, observers: I) -> &Self
    where
        I: IntoIterator<Item = &'a Observer>,
    {
        for observer in observers {
            self.unobserve_id(observer.id());
        }
        self
    }

    pub(crate) fn unobserve_id(&self, id: ObserverId) {
        let mut callbacks = self.callbacks.write();
        if let Some(i) = callbacks.iter().position(|o| o.id() == id) {
            callbacks.remove(i);
            debug!(observer = id.0, "observer removed");
        }
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Deliver records through a bounded channel of the configured size.
    pub fn subscribe(&self) -> ChangeFeed {
        ChangeFeed::attach(self, self.config.feed_buffer)
    }

    /// Deliver records through a bounded channel of `buffer` records.
    pub fn subscribe_with_buffer(&self, buffer: usize) -> ChangeFeed {
        ChangeFeed::attach(self, buffer)
    }

    // --- Delivery ---

    /// Number of queued, undelivered records.
    pub fn pending_records(&self) -> usize {
        self.change_records.lock().len()
    }

    /// Drain the queue FIFO, handing each record to every observer in
    /// registration order. Records queued by observers during the drain are
    /// delivered before this returns.
    pub fn deliver_change_records(&self) -> &Self {
        let mut delivered = 0usize;
        loop {
            let next = self.change_records.lock().pop_front();
            let Some(record) = next else { break };

            let callbacks = self.callbacks.read().clone();
            for observer in &callbacks {
                observer.call(self, &record);
            }
            delivered += 1;
        }

        if delivered > 0 {
            debug!(delivered, "delivered change records");
        }
        self
    }

    fn enqueue(&self, record: ChangeRecord) {
        trace!(kind = %record.kind, name = %record.name, object = %record.object, "change record queued");
        self.change_records.lock().push_back(record);
    }

    fn flush(&self, hold: bool) -> &Self {
        if hold {
            self
        } else {
            self.deliver_change_records()
        }
    }
}

impl Default for Observable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;
    use std::sync::Arc;

    /// Observer that stores every record it sees.
    fn recorder() -> (Observer, Arc<Mutex<Vec<ChangeRecord>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = Observer::new(move |_, record| sink.lock().push(record.clone()));
        (observer, seen)
    }

    #[test]
    fn test_set_new_then_updated() {
        let store = Observable::new();
        let (observer, seen) = recorder();
        store.observe(observer);

        store.set("title", "a", false).set("title", "b", false);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, ChangeKind::New);
        assert_eq!(seen[0].old_value, None);
        assert_eq!(seen[1].kind, ChangeKind::Updated);
        assert_eq!(seen[1].old_value, Some(json!("a")));
        assert!(seen[1].object.is_root());
        assert_eq!(store.get("title"), Some(json!("b")));
    }

    #[test]
    fn test_set_keeps_dotted_keys_literal() {
        let store = Observable::new();
        store.set("a.b", 1, false);

        assert_eq!(store.get("a.b"), Some(json!(1)));
        assert_eq!(store.get_path("a.b"), None);
    }

    #[test]
    fn test_hold_queues_without_delivering() {
        let store = Observable::new();
        let (observer, seen) = recorder();
        store.observe(observer);

        store.set("a", 1, true);
        store.set("b", 2, true);
        assert_eq!(seen.lock().len(), 0);
        assert_eq!(store.pending_records(), 2);

        store.deliver_change_records();
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(store.pending_records(), 0);
    }

    #[test]
    fn test_set_path_record_names_parent() {
        let store = Observable::new();
        let (observer, seen) = recorder();
        store.observe(observer);

        store.set_path("todo.meta.title", "x", false).unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0].name, "title");
        assert_eq!(seen[0].object, ObjectPath::new(["todo", "meta"]));
        assert_eq!(seen[0].kind, ChangeKind::New);
        assert_eq!(
            store.resolve(&seen[0].object),
            Some(json!({"title": "x"}))
        );
    }

    #[test]
    fn test_set_path_through_scalar_fails_without_record() {
        let store = Observable::new();
        store.set("a", 5, false);
        let (observer, seen) = recorder();
        store.observe(observer);

        let result = store.set_path("a.b", 1, false);
        assert!(matches!(result, Err(StoreError::NotAMapping { .. })));
        assert!(seen.lock().is_empty());
        assert_eq!(store.get("a"), Some(json!(5)));
    }

    #[test]
    fn test_sets_delivers_once_in_order() {
        let store = Observable::new();
        let (observer, seen) = recorder();
        store.observe(observer);

        store
            .sets(vec![("a", json!(1)), ("b.c", json!(2))], false)
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].name, "a");
        assert_eq!(seen[1].name, "c");
        assert_eq!(seen[1].object, ObjectPath::new(["b"]));
        assert_eq!(store.pending_records(), 0);
    }

    #[test]
    fn test_sets_held() {
        let store = Observable::new();
        store.sets([("a", 1), ("b", 2)], true).unwrap();
        assert_eq!(store.pending_records(), 2);
    }

    #[test]
    fn test_unset_missing_key_is_silent() {
        let store = Observable::new();
        let (observer, seen) = recorder();
        store.observe(observer);

        store.unset("missing-key", false);
        assert!(seen.lock().is_empty());
        assert_eq!(store.pending_records(), 0);
    }

    #[test]
    fn test_unset_carries_old_value() {
        let store = Observable::new();
        store.set("a", "x", false);
        let (observer, seen) = recorder();
        store.observe(observer);

        store.unset("a", false);

        let seen = seen.lock();
        assert_eq!(seen[0].kind, ChangeKind::Deleted);
        assert_eq!(seen[0].old_value, Some(json!("x")));
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_unset_policy() {
        let presence = Observable::new();
        let truthy = Observable::with_config(ObservableConfig {
            unset_policy: UnsetPolicy::Truthy,
            ..Default::default()
        });

        for store in [&presence, &truthy] {
            store.sets([("zero", json!(0)), ("one", json!(1))], false).unwrap();
        }

        let (p_observer, p_seen) = recorder();
        let (t_observer, t_seen) = recorder();
        presence.observe(p_observer);
        truthy.observe(t_observer);

        for store in [&presence, &truthy] {
            store.unsets(["zero", "one"], false).unwrap();
            assert_eq!(store.get("zero"), None);
        }

        assert_eq!(p_seen.lock().len(), 2);
        assert_eq!(t_seen.lock().len(), 1);
        assert_eq!(t_seen.lock()[0].name, "one");
    }

    #[test]
    fn test_unset_path() {
        let store = Observable::new();
        store.set_path("a.b", true, false).unwrap();
        let (observer, seen) = recorder();
        store.observe(observer);

        store.unset_path("a.b", false).unwrap();
        assert_eq!(seen.lock()[0].object, ObjectPath::new(["a"]));
        assert_eq!(store.get("a"), Some(json!({})));

        assert!(matches!(
            store.unset_path("nope.b", false),
            Err(StoreError::MissingSegment { .. })
        ));
    }

    #[test]
    fn test_observe_is_idempotent() {
        let store = Observable::new();
        let (observer, seen) = recorder();

        store.observe(observer.clone());
        store.observe(observer.clone());
        assert_eq!(store.observer_count(), 1);

        store.set("a", 1, false);
        assert_eq!(seen.lock().len(), 1);

        store.unobserve(&observer).unobserve(&observer);
        assert_eq!(store.observer_count(), 0);
    }

    #[test]
    fn test_observers_run_in_registration_order() {
        let store = Observable::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let observers: Vec<Observer> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                Observer::new(move |_, _| order.lock().push(i))
            })
            .collect();

        let returned = store.observes(observers.clone());
        assert_eq!(returned, observers);

        store.set("a", 1, false);
        assert_eq!(*order.lock(), vec![0, 1, 2]);

        store.unobserves(&observers[..2]);
        assert_eq!(store.observer_count(), 1);
    }

    #[test]
    fn test_reentrant_set_is_delivered_in_same_drain() {
        let store = Observable::new();
        let (observer, seen) = recorder();
        store.observe(observer);
        store.observe(Observer::new(|store, record| {
            if record.name == "first" {
                store.set("second", 2, false);
            }
        }));

        store.set("first", 1, true);
        store.deliver_change_records();

        let names: Vec<String> = seen.lock().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(store.pending_records(), 0);
    }

    #[test]
    fn test_gets_and_value_at() {
        let store = Observable::with_data(
            json!({"a": 1, "b": {"c": 2}})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let picked = store.gets(["a", "b.c", "zzz"]);
        assert_eq!(Value::Object(picked), json!({"a": 1, "b.c": 2}));
        assert_eq!(
            store.value_at(&ObjectPath::new(["b"]), "c"),
            Some(json!(2))
        );
        assert_eq!(store.value_at(&ObjectPath::root(), "a"), Some(json!(1)));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ObservableConfig =
            serde_json::from_value(json!({"unset_policy": "truthy"})).unwrap();
        assert_eq!(config.unset_policy, UnsetPolicy::Truthy);
        assert_eq!(config.feed_buffer, 1000);
    }
}
