//! Ordered multi-map of extension elements keyed by qualified name.

use std::sync::Arc;

use crate::extension::{ExtensionElement, SharedExtension};
use crate::qname::QName;

/// The extension elements of one stanza.
///
/// Keys keep the order in which they were first inserted and every key maps to
/// a non-empty sequence kept in insertion order. Stanzas carry a handful of
/// extensions, so lookups are linear scans over a `Vec` of entries.
///
/// Cloning is shallow: the containers are new, the elements are the same
/// `Arc`s.
#[derive(Debug, Clone, Default)]
pub struct ExtensionElementStore {
    entries: Vec<(QName, Vec<SharedExtension>)>,
}

impl ExtensionElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `element` under its own qualified name. No deduplication.
    pub fn put(&mut self, element: SharedExtension) {
        let key = element.qname();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(element),
            None => self.entries.push((key, vec![element])),
        }
    }

    /// First element stored under `qname`.
    pub fn get_first(&self, qname: &QName) -> Option<&SharedExtension> {
        self.values_for(qname).and_then(|values| values.first())
    }

    /// All elements stored under `qname`, in insertion order.
    pub fn get_all(&self, qname: &QName) -> Vec<SharedExtension> {
        self.values_for(qname)
            .map(|values| values.to_vec())
            .unwrap_or_default()
    }

    /// All elements in `namespace`, whatever their local name.
    pub fn get_all_by_namespace(&self, namespace: &str) -> Vec<SharedExtension> {
        self.iter()
            .filter(|e| e.namespace() == namespace)
            .cloned()
            .collect()
    }

    /// First element in `namespace`, whatever its local name.
    pub fn get_first_by_namespace(&self, namespace: &str) -> Option<&SharedExtension> {
        self.iter().find(|e| e.namespace() == namespace)
    }

    /// All elements whose concrete type is `T`.
    pub fn get_all_of<T: ExtensionElement>(&self) -> Vec<&T> {
        self.iter().filter_map(|e| e.downcast_ref::<T>()).collect()
    }

    /// First element whose concrete type is `T`.
    pub fn get_first_of<T: ExtensionElement>(&self) -> Option<&T> {
        self.iter().find_map(|e| e.downcast_ref::<T>())
    }

    pub fn contains_key(&self, qname: &QName) -> bool {
        self.values_for(qname).is_some()
    }

    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.iter().any(|e| e.namespace() == namespace)
    }

    /// Remove every element stored under `qname` and return them.
    ///
    /// Removal is by identity, not by value: all duplicates go, so no stale
    /// element of the same kind survives an override.
    pub fn remove(&mut self, qname: &QName) -> Vec<SharedExtension> {
        match self.entries.iter().position(|(k, _)| k == qname) {
            Some(index) => self.entries.remove(index).1,
            None => Vec::new(),
        }
    }

    /// Remove one specific element (pointer identity) and return whether it
    /// was present.
    pub fn remove_element(&mut self, element: &SharedExtension) -> bool {
        let key = element.qname();
        let Some(index) = self.entries.iter().position(|(k, _)| *k == key) else {
            return false;
        };
        let values = &mut self.entries[index].1;
        let Some(pos) = values.iter().position(|e| Arc::ptr_eq(e, element)) else {
            return false;
        };
        values.remove(pos);
        if values.is_empty() {
            self.entries.remove(index);
        }
        true
    }

    /// Remove the elements matching `predicate` under `qname`; returns how many.
    pub fn remove_matching<F>(&mut self, qname: &QName, mut predicate: F) -> usize
    where
        F: FnMut(&SharedExtension) -> bool,
    {
        let Some(index) = self.entries.iter().position(|(k, _)| k == qname) else {
            return 0;
        };
        let values = &mut self.entries[index].1;
        let before = values.len();
        values.retain(|e| !predicate(e));
        let removed = before - values.len();
        if values.is_empty() {
            self.entries.remove(index);
        }
        removed
    }

    /// Keep only the elements for which `keep` returns true, across all keys.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&SharedExtension) -> bool,
    {
        for (_, values) in self.entries.iter_mut() {
            values.retain(|e| keep(e));
        }
        self.entries.retain(|(_, values)| !values.is_empty());
    }

    /// Every element: keys in first-insertion order, values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedExtension> {
        self.entries.iter().flat_map(|(_, values)| values.iter())
    }

    /// Snapshot of every element.
    pub fn values(&self) -> Vec<SharedExtension> {
        self.iter().cloned().collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &QName> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Number of elements (not keys).
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, values)| values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn values_for(&self, qname: &QName) -> Option<&Vec<SharedExtension>> {
        self.entries
            .iter()
            .find(|(k, _)| k == qname)
            .map(|(_, values)| values)
    }
}
