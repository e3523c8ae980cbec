//! In-memory session store used by tests to stand in for the session file.

use super::store::{SessionStore, StoreError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Default)]
struct MemoryInner {
    values: BTreeMap<String, String>,
    fail_writes: bool,
    fail_removes: bool,
}

/// In-process store. Clones share the same map, so a clone handed to a second
/// studio instance observes what the first one wrote.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }

    pub fn fail_removes(&self, fail: bool) {
        self.inner.borrow_mut().fail_removes = fail;
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.borrow().values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(StoreError::Unavailable(format!("write of '{}' rejected", key)));
        }
        inner.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_removes {
            return Err(StoreError::Unavailable(format!("removal of '{}' rejected", key)));
        }
        inner.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clones_share_state() {
        let mut first = MemoryStore::new();
        let second = first.clone();
        first.set("a", "1").unwrap();
        assert_eq!(second.get("a").unwrap(), Some("1".to_string()));

        first.fail_writes(true);
        assert!(first.set("b", "2").is_err());
        assert_eq!(second.len(), 1);
    }
}
