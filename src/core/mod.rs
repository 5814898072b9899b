//! Core rule management functionality
//!
//! This module contains the core types and logic for managing iptables INPUT rules.
//! It provides:
//!
//! - [`rule`]: Data structures for rules and their fields
//! - [`parser`]: The `key=value` rule grammar
//! - [`store`]: The bounded, ordered rule collection
//! - [`render`]: Rule to iptables argument vector translation
//! - [`engine`]: The live packet filter behind a trait
//! - [`manager`]: Orchestration of store and engine
//! - [`persist`]: The rules file format
//! - [`error`]: Error types for all of the above

pub mod engine;
pub mod error;
pub mod manager;
pub mod parser;
pub mod persist;
pub mod render;
pub mod rule;
pub mod store;

#[cfg(test)]
pub mod test_helpers;
