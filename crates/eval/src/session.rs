use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use trash_core::Value;

/// The persistent root variable store. Cloning a session shares the store;
/// overlapping evaluations see each other's writes with no ordering
/// guarantee beyond per-access locking.
#[derive(Debug, Clone, Default)]
pub struct Session {
    store: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        // A poisoned lock only means another evaluation panicked; the
        // store itself is still usable.
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.lock().insert(name.to_string(), value);
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Clone of the whole store, used to seed call frame snapshots.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.lock().clone()
    }

    /// Drop every binding.
    pub fn reset(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_store() {
        let a = Session::new();
        let b = a.clone();
        a.set("x", Value::Number(1.0));
        assert_eq!(b.get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn reset_clears_everything() {
        let s = Session::new();
        s.set("x", Value::Number(1.0));
        s.set("y", Value::Null);
        s.reset();
        assert!(s.names().is_empty());
    }
}
