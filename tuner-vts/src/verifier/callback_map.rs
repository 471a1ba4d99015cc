use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use tuner_vts_protocol::FilterKey;

use super::{FilterCallback, FilterEvent};

/// Filter callbacks of one test case, keyed by [`FilterKey`].
///
/// Registration and event delivery may come from any thread. Iteration goes
/// through [`FilterCallbackMap::snapshot`], which releases the lock before the
/// caller touches any callback.
#[derive(Default)]
pub struct FilterCallbackMap {
    callbacks: Mutex<BTreeMap<FilterKey, Arc<dyn FilterCallback>>>,
}

impl FilterCallbackMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `key`, replacing any previous one.
    pub fn register(
        &self,
        key: FilterKey,
        callback: Arc<dyn FilterCallback>,
    ) -> Option<Arc<dyn FilterCallback>> {
        debug!("Registering filter callback {}", key);
        self.callbacks.lock().insert(key, callback)
    }

    /// Register `callback` under its own filter.
    pub fn register_filter(&self, callback: Arc<dyn FilterCallback>) -> FilterKey {
        let key = FilterKey::Filter(callback.filter());
        self.register(key, callback);
        key
    }

    pub fn deregister(&self, key: &FilterKey) -> Option<Arc<dyn FilterCallback>> {
        self.callbacks.lock().remove(key)
    }

    /// Callbacks in ascending key order, detached from the map.
    pub fn snapshot(&self) -> Vec<(FilterKey, Arc<dyn FilterCallback>)> {
        self.callbacks
            .lock()
            .iter()
            .map(|(key, callback)| (*key, Arc::clone(callback)))
            .collect()
    }

    /// Forward `event` to the callback under `key`.
    ///
    /// Events for unknown keys are dropped; `false` is returned.
    pub fn deliver(&self, key: &FilterKey, event: FilterEvent) -> bool {
        let callback = self.callbacks.lock().get(key).cloned();
        match callback {
            Some(callback) => callback.on_filter_event(event),
            None => {
                trace!("Dropping event for unregistered filter {}", key);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }

    pub fn clear(&self) {
        self.callbacks.lock().clear();
    }
}

impl fmt::Debug for FilterCallbackMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<FilterKey> = self.callbacks.lock().keys().copied().collect();
        f.debug_struct("FilterCallbackMap").field("keys", &keys).finish()
    }
}
