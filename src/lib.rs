//! pfw - Personal Firewall
//!
//! A small manager for the iptables INPUT chain. Rules are written in a
//! `key=value` grammar, validated, numbered, mirrored into iptables and kept
//! in a plain-text rules file.
//!
//! # Architecture
//!
//! - [`core`] - Rule model, grammar, store, iptables rendering and execution
//! - [`validators`] - Field validation and the typed rule builder
//! - [`elevation`] - Running iptables with root rights
//! - [`audit`] - JSON-lines audit log of every change
//! - [`config`] - Configuration file
//! - [`utils`] - Directory and formatting helpers
//!
//! # Safety Features
//!
//! - Rules are validated before they are stored, applied or saved
//! - iptables is run with an argument vector, never through a shell
//! - Atomic rules-file writes with owner-only permissions

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod elevation;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::manager::{ExternalSync, RuleManager};
pub use core::rule::{Action, Address, PortSpec, Protocol, RawRule, Rule};
pub use core::store::RuleStore;
