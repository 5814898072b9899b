//! Shared test utilities for core module tests
//!
//! Provides common test helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::core::engine::FilterEngine;
use crate::core::error::{Error, Result};
use crate::core::render::FilterCommand;
use crate::core::rule::{Action, Protocol, PortSpec, Rule};
use std::cell::{Cell, RefCell};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex for tests that read or change environment variables.
///
/// `PFW_ELEVATION_METHOD` changes how every iptables process is spawned, so
/// tests that spawn processes hold this too.
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// Locks [`ENV_VAR_MUTEX`], ignoring poisoning from a failed test.
pub fn env_guard() -> MutexGuard<'static, ()> {
    ENV_VAR_MUTEX.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates an unnumbered TCP/22 accept rule whose comment is `comment`.
///
/// The comment makes rules easy to tell apart after renumbering.
pub fn create_test_rule(comment: &str) -> Rule {
    let mut rule = Rule::new(Action::Accept);
    rule.protocol = Some(Protocol::Tcp);
    rule.port = Some(PortSpec::Single(22));
    rule.comment = Some(comment.to_string());
    rule
}

/// What a [`RecordingEngine`] was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Apply(String),
    Remove(String),
    Reset,
}

/// In-memory [`FilterEngine`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub calls: RefCell<Vec<EngineCall>>,
    fail: Cell<bool>,
}

impl RecordingEngine {
    /// An engine whose every call fails with exit code 1.
    pub fn failing() -> Self {
        let engine = Self::default();
        engine.fail.set(true);
        engine
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: EngineCall) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.fail.get() {
            Err(Error::ExternalEngine {
                message: "iptables: Bad rule (does a matching rule exist in that chain?)."
                    .to_string(),
                stderr: None,
                exit_code: Some(1),
            })
        } else {
            Ok(())
        }
    }
}

impl FilterEngine for RecordingEngine {
    async fn apply(&self, command: &FilterCommand) -> Result<()> {
        self.record(EngineCall::Apply(command.to_string()))
    }

    async fn remove(&self, command: &FilterCommand) -> Result<()> {
        self.record(EngineCall::Remove(command.to_string()))
    }

    async fn reset(&self) -> Result<()> {
        self.record(EngineCall::Reset)
    }
}
