//! Bounded, ordered rule store
//!
//! IDs are the 1-based positions of rules in the store. Removing a rule
//! shifts every later rule down one place and re-stamps its ID, so the live
//! ID space is always exactly `1..=len`.
//!
//! The store never talks to iptables; see
//! [`RuleManager`](crate::core::manager::RuleManager) for that.

use crate::core::error::{Error, Result};
use crate::core::rule::{DEFAULT_MAX_RULES, Rule};

#[derive(Debug, Clone)]
pub struct RuleStore {
    rules: Vec<Rule>,
    capacity: usize,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_RULES)
    }
}

impl RuleStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rules: Vec::new(),
            capacity,
        }
    }

    /// Appends a rule and returns its new ID.
    ///
    /// # Errors
    ///
    /// Returns `Error::Capacity` if the store is full.
    pub fn add(&mut self, mut rule: Rule) -> Result<u32> {
        if self.rules.len() >= self.capacity {
            return Err(Error::Capacity {
                limit: self.capacity,
            });
        }

        let id = u32::try_from(self.rules.len() + 1)
            .map_err(|_| Error::Internal("rule id overflow".to_string()))?;
        rule.id = id;
        self.rules.push(rule);
        Ok(id)
    }

    /// Removes the rule with `id` and renumbers the rules after it.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `id` is outside `1..=len`.
    pub fn remove(&mut self, id: u32) -> Result<Rule> {
        let index = self.index_of(id).ok_or(Error::NotFound(id))?;
        let removed = self.rules.remove(index);

        let mut next = id;
        for rule in &mut self.rules[index..] {
            rule.id = next;
            next += 1;
        }

        Ok(removed)
    }

    pub fn get(&self, id: u32) -> Option<&Rule> {
        self.index_of(id).map(|i| &self.rules[i])
    }

    /// Rules in store order, which is also ID order.
    pub fn list(&self) -> &[Rule] {
        &self.rules
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        (index < self.rules.len()).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::create_test_rule;

    fn store_with(n: usize) -> RuleStore {
        let mut store = RuleStore::default();
        for i in 0..n {
            store.add(create_test_rule(&format!("rule {}", i + 1))).unwrap();
        }
        store
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut store = RuleStore::default();
        assert_eq!(store.add(create_test_rule("a")).unwrap(), 1);
        assert_eq!(store.add(create_test_rule("b")).unwrap(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(2).unwrap().comment.as_deref(), Some("b"));
    }

    #[test]
    fn test_add_rejects_when_full() {
        let mut store = RuleStore::with_capacity(2);
        store.add(create_test_rule("a")).unwrap();
        store.add(create_test_rule("b")).unwrap();
        let err = store.add(create_test_rule("c")).unwrap_err();
        assert!(matches!(err, Error::Capacity { limit: 2 }));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_renumbers_later_rules() {
        let mut store = store_with(4);
        let removed = store.remove(2).unwrap();
        assert_eq!(removed.comment.as_deref(), Some("rule 2"));

        let ids: Vec<u32> = store.list().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let comments: Vec<_> = store
            .list()
            .iter()
            .map(|r| r.comment.clone().unwrap())
            .collect();
        assert_eq!(comments, vec!["rule 1", "rule 3", "rule 4"]);
    }

    #[test]
    fn test_remove_last_and_only() {
        let mut store = store_with(1);
        store.remove(1).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_unknown_id() {
        let mut store = store_with(2);
        assert!(matches!(store.remove(0), Err(Error::NotFound(0))));
        assert!(matches!(store.remove(3), Err(Error::NotFound(3))));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_out_of_range() {
        let store = store_with(1);
        assert!(store.get(0).is_none());
        assert!(store.get(2).is_none());
        assert!(store.get(1).is_some());
    }

    #[test]
    fn test_clear_restarts_ids() {
        let mut store = store_with(3);
        store.clear();
        assert!(store.list().is_empty());
        assert_eq!(store.add(create_test_rule("fresh")).unwrap(), 1);
    }
}
