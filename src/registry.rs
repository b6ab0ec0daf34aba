//! Insertion-ordered table of outstanding timer handles

use crate::call_site::CallSite;

/// An outstanding handle and where it was scheduled, if known
pub type Entry<K> = (K, Option<CallSite>);

/// Outstanding handles of one timer kind, in scheduling order
///
/// Lookups are linear: a test rarely has more than a handful of live timers,
/// and handles only need equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry<K> {
    entries: Vec<Entry<K>>,
}

impl<K> Default for Registry<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: PartialEq> Registry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handle`; returns `false` if it was already outstanding
    ///
    /// A handle that is already present keeps its position and takes the
    /// new call site.
    pub fn insert(&mut self, handle: K, site: Option<CallSite>) -> bool {
        match self.position(&handle) {
            Some(index) => {
                self.entries[index].1 = site;
                false
            }
            None => {
                self.entries.push((handle, site));
                true
            }
        }
    }

    /// Forget `handle`; returns the removed entry, `None` if it was unknown
    pub fn remove(&mut self, handle: &K) -> Option<Entry<K>> {
        let index = self.position(handle)?;
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, handle: &K) -> bool {
        self.position(handle).is_some()
    }

    pub fn get(&self, handle: &K) -> Option<&Option<CallSite>> {
        self.position(handle).map(|index| &self.entries[index].1)
    }

    fn position(&self, handle: &K) -> Option<usize> {
        self.entries.iter().position(|(known, _)| known == handle)
    }
}

impl<K> Registry<K> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<K>> {
        self.entries.iter()
    }

    pub fn handles(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(handle, _)| handle)
    }
}

impl<K: Clone> Registry<K> {
    /// Copy of the entries in scheduling order
    pub fn snapshot(&self) -> Vec<Entry<K>> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(line: u32) -> Option<CallSite> {
        Some(CallSite::new("tests/app.rs", line, 1))
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry: Registry<u32> = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_preserves_insertion_order() {
        let mut registry = Registry::new();
        registry.insert(1003, site(3));
        registry.insert(1001, site(1));
        registry.insert(1002, None);

        let handles: Vec<u32> = registry.handles().copied().collect();
        assert_eq!(handles, vec![1003, 1001, 1002]);
    }

    #[test]
    fn test_registry_remove_keeps_order_of_rest() {
        let mut registry = Registry::new();
        for handle in [1000, 1001, 1002] {
            registry.insert(handle, None);
        }

        assert_eq!(registry.remove(&1001), Some((1001, None)));
        let handles: Vec<u32> = registry.handles().copied().collect();
        assert_eq!(handles, vec![1000, 1002]);
    }

    #[test]
    fn test_registry_remove_unknown_is_noop() {
        let mut registry = Registry::new();
        registry.insert(1000, site(7));

        assert_eq!(registry.remove(&9999), None);
        assert_eq!(registry.snapshot(), vec![(1000, site(7))]);
    }

    #[test]
    fn test_registry_reinsert_keeps_position_and_updates_site() {
        let mut registry = Registry::new();
        assert!(registry.insert("a", site(1)));
        assert!(registry.insert("b", site(2)));
        assert!(!registry.insert("a", site(9)));

        assert_eq!(registry.snapshot(), vec![("a", site(9)), ("b", site(2))]);
        assert_eq!(registry.get(&"a"), Some(&site(9)));
    }

    #[test]
    fn test_registry_clear() {
        let mut registry = Registry::new();
        registry.insert(1, None);
        registry.insert(2, None);
        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains(&1));
    }
}
