//! Rule orchestration
//!
//! [`RuleManager`] ties the parser, validators, store and filter engine
//! together. The store is the source of truth: once a mutation passes
//! validation it is committed even if iptables then refuses the matching
//! change. Engine failures come back as [`ExternalSync::Failed`] for the
//! caller to report, never as an error of the operation itself.

use crate::core::engine::FilterEngine;
use crate::core::error::{Error, Result};
use crate::core::parser::parse;
use crate::core::render::{Operation, render};
use crate::core::rule::Rule;
use crate::core::store::RuleStore;
use crate::validators::validate_rule;
use tracing::{info, warn};

/// How the live packet filter was updated for a committed change
#[derive(Debug)]
pub enum ExternalSync {
    /// The engine accepted the change
    Applied,
    /// The engine was not contacted (no authority, or the rule was inactive)
    Skipped,
    /// The engine refused; the store change stands regardless
    Failed(Error),
}

impl ExternalSync {
    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(e) => {
                warn!("Firewall engine not updated: {e}");
                Self::Failed(e)
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug)]
pub struct Added {
    pub id: u32,
    pub external: ExternalSync,
}

#[derive(Debug)]
pub struct Removed {
    pub rule: Rule,
    pub external: ExternalSync,
}

/// Owns the rule store and the engine that mirrors it.
pub struct RuleManager<E: FilterEngine> {
    store: RuleStore,
    engine: E,
    authority: bool,
}

impl<E: FilterEngine> RuleManager<E> {
    /// `authority` says whether this process may change the live filter.
    /// Without it every operation only touches the store.
    pub fn new(store: RuleStore, engine: E, authority: bool) -> Self {
        Self {
            store,
            engine,
            authority,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn has_authority(&self) -> bool {
        self.authority
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Parses, validates and stores a rule, then applies it to the engine.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` or `Error::Capacity`; the store is left
    /// untouched in both cases.
    pub async fn add_rule(&mut self, text: &str) -> Result<Added> {
        let rule = validate_rule(&parse(text))?;
        let id = self.store.add(rule)?;
        info!("Rule {id} added");

        let external = match self.store.get(id) {
            Some(rule) if self.authority => {
                ExternalSync::from_result(self.engine.apply(&render(rule, Operation::Apply)).await)
            }
            _ => ExternalSync::Skipped,
        };

        Ok(Added { id, external })
    }

    /// Removes a rule from the engine (if active) and then from the store.
    ///
    /// Store removal proceeds even when the engine refuses.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no rule has this ID.
    pub async fn remove_rule(&mut self, id: u32) -> Result<Removed> {
        let rule = self.store.get(id).ok_or(Error::NotFound(id))?;

        let external = if self.authority && rule.active {
            ExternalSync::from_result(self.engine.remove(&render(rule, Operation::Remove)).await)
        } else {
            ExternalSync::Skipped
        };

        let rule = self.store.remove(id)?;
        info!("Rule {id} removed");
        Ok(Removed { rule, external })
    }

    pub fn list_rules(&self) -> &[Rule] {
        self.store.list()
    }

    pub fn get_rule(&self, id: u32) -> Option<&Rule> {
        self.store.get(id)
    }

    /// Resets the engine to default-accept and forgets every rule.
    ///
    /// The store is cleared regardless of the engine outcome; the next rule
    /// added gets ID 1.
    pub async fn flush(&mut self) -> ExternalSync {
        let external = if self.authority {
            ExternalSync::from_result(self.engine.reset().await)
        } else {
            ExternalSync::Skipped
        };

        self.store.clear();
        info!("Rule store flushed");
        external
    }

    /// Replaces the store contents with `rules`, renumbering them in order.
    ///
    /// Does not touch the engine. Rules beyond the store's capacity are
    /// dropped with a warning; returns how many were kept.
    pub fn replace_rules(&mut self, rules: Vec<Rule>) -> usize {
        self.store.clear();
        let total = rules.len();

        for rule in rules {
            if let Err(e) = self.store.add(rule) {
                warn!("{e}; ignoring the remaining {} rules", total - self.store.len());
                break;
            }
        }

        self.store.len()
    }
}
