//! Ordered keyed container shared by the annotation and list collections.
//!
//! A [NormalizedState] pairs an id → entity map with an independent id ordering. Only the
//! owning cache mutates it; everyone else receives read-only snapshots.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CacheError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedState<T> {
    by_id: BTreeMap<String, T>,
    all_ids: Vec<String>,
}

impl<T> Default for NormalizedState<T> {
    fn default() -> Self {
        NormalizedState {
            by_id: BTreeMap::new(),
            all_ids: Vec::new(),
        }
    }
}

impl<T> NormalizedState<T> {
    /// Build a state from `seed`, keeping the seed's order. When two seed entities share an id the
    /// later one wins and keeps the position of the first.
    pub fn from_seed<I, F>(seed: I, get_id: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> String,
    {
        let mut state = NormalizedState::default();
        for item in seed {
            let id = get_id(&item);
            if state.by_id.insert(id.clone(), item).is_none() {
                state.all_ids.push(id);
            }
        }
        state
    }

    pub fn by_id(&self) -> &BTreeMap<String, T> {
        &self.by_id
    }

    pub fn all_ids(&self) -> &[String] {
        &self.all_ids
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.all_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_ids.is_empty()
    }

    /// Entities in `all_ids` order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.all_ids.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Verifies that `all_ids` lists exactly the keys of `by_id`, once each.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for id in self.all_ids.iter() {
            if !seen.insert(id.as_str()) {
                return Err(CacheError::Inconsistent(format!("duplicate id '{id}' in allIds")));
            }
            if !self.by_id.contains_key(id) {
                return Err(CacheError::Inconsistent(format!("dangling id '{id}' in allIds")));
            }
        }
        if seen.len() != self.by_id.len() {
            return Err(CacheError::Inconsistent(format!(
                "allIds has {} ids but byId has {} entries",
                seen.len(),
                self.by_id.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn prepend(&mut self, id: String, item: T) {
        if self.by_id.insert(id.clone(), item).is_none() {
            self.all_ids.insert(0, id);
        }
    }

    /// Replace an existing entry in place. Returns the previous value, or hands `item` back when
    /// `id` is unknown.
    pub(crate) fn replace(&mut self, id: &str, item: T) -> std::result::Result<T, T> {
        match self.by_id.get_mut(id) {
            Some(slot) => Ok(std::mem::replace(slot, item)),
            None => Err(item),
        }
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.by_id.get_mut(id)
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.by_id.values_mut()
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<T> {
        let removed = self.by_id.remove(id)?;
        self.all_ids.retain(|other| other != id);
        Some(removed)
    }

    /// Reorder `all_ids`. `order` must be a permutation of the current ids.
    pub(crate) fn set_order(&mut self, order: Vec<String>) {
        debug_assert_eq!(order.len(), self.by_id.len());
        self.all_ids = order;
    }
}

impl<T: Clone> NormalizedState<T> {
    /// Materialize the entities in `all_ids` order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: &'static str,
        value: u32,
    }

    fn item(id: &'static str, value: u32) -> Item {
        Item { id, value }
    }

    #[test]
    fn seed_order_is_preserved() {
        let state =
            NormalizedState::from_seed(vec![item("b", 1), item("a", 2), item("c", 3)], |i: &Item| {
                i.id.to_string()
            });
        assert_eq!(state.all_ids(), &["b", "a", "c"]);
        assert_eq!(state.get("a").map(|i| i.value), Some(2));
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn duplicate_seed_ids_collapse() {
        let state = NormalizedState::from_seed(vec![item("a", 1), item("b", 2), item("a", 3)], |i: &Item| {
            i.id.to_string()
        });
        assert_eq!(state.all_ids(), &["a", "b"]);
        assert_eq!(state.get("a").map(|i| i.value), Some(3));
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn prepend_remove_and_replace() {
        let mut state = NormalizedState::default();
        state.prepend("0".to_string(), item("0", 0));
        state.prepend("1".to_string(), item("1", 1));
        assert_eq!(state.all_ids(), &["1", "0"]);

        assert_eq!(state.replace("0", item("0", 10)), Ok(item("0", 0)));
        assert_eq!(state.replace("9", item("9", 9)), Err(item("9", 9)));
        assert_eq!(state.remove("1"), Some(item("1", 1)));
        assert_eq!(state.remove("1"), None);
        assert_eq!(state.to_vec(), vec![item("0", 10)]);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn invariant_violations_are_reported() {
        let mut state = NormalizedState::from_seed(vec![item("a", 1)], |i: &Item| i.id.to_string());
        state.all_ids.push("ghost".to_string());
        assert!(matches!(
            state.check_invariants(),
            Err(CacheError::Inconsistent(_))
        ));

        let mut state = NormalizedState::from_seed(vec![item("a", 1)], |i: &Item| i.id.to_string());
        state.all_ids.push("a".to_string());
        assert!(state.check_invariants().is_err());

        let mut state = NormalizedState::from_seed(vec![item("a", 1)], |i: &Item| i.id.to_string());
        state.all_ids.clear();
        assert!(state.check_invariants().is_err());
    }
}
