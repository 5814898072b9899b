//! iptables command rendering
//!
//! Translates a validated [`Rule`] into the argument list for one `iptables`
//! invocation against the INPUT chain. Clauses are emitted in a fixed order:
//! source, destination, protocol, port, interface, comment, action.
//!
//! The port clause is only emitted for TCP and UDP rules. iptables rejects
//! `--dport` without a port-aware protocol, so a port on an ICMP/ALL rule or a
//! rule without protocol is kept in the store but never rendered.

use crate::core::rule::{CHAIN, Rule};
use std::fmt;

/// Whether a command adds the rule to the chain or deletes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Apply,
    Remove,
}

impl Operation {
    const fn flag(self) -> &'static str {
        match self {
            Operation::Apply => "-A",
            Operation::Remove => "-D",
        }
    }
}

/// Arguments for one iptables call.
///
/// Passed to the process as an argument vector, never through a shell.
/// `Display` renders the familiar command-line text with the comment quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCommand {
    args: Vec<String>,
}

impl FilterCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn push(&mut self, flag: &str, value: impl fmt::Display) {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
    }
}

impl fmt::Display for FilterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut quote_next = false;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if quote_next {
                write!(f, "\"{}\"", arg.replace('"', "\\\""))?;
            } else {
                f.write_str(arg)?;
            }
            quote_next = arg == "--comment";
        }
        Ok(())
    }
}

/// Builds the iptables command that applies or removes `rule`.
///
/// ```
/// use pfw::core::parser::parse;
/// use pfw::core::render::{render, Operation};
/// use pfw::validators::validate_rule;
///
/// let mut rule = validate_rule(&parse("action=ACCEPT,protocol=TCP,port=22")).unwrap();
/// rule.id = 1;
/// assert_eq!(
///     render(&rule, Operation::Apply).to_string(),
///     "-A INPUT -p TCP --dport 22 -m comment --comment \"Rule-ID-1\" -j ACCEPT"
/// );
/// ```
pub fn render(rule: &Rule, op: Operation) -> FilterCommand {
    let mut cmd = FilterCommand::new([op.flag(), CHAIN]);

    if let Some(source) = &rule.source {
        cmd.push("-s", source);
    }
    if let Some(destination) = &rule.destination {
        cmd.push("-d", destination);
    }
    if let Some(protocol) = rule.protocol {
        cmd.push("-p", protocol);
        if protocol.supports_ports()
            && let Some(port) = &rule.port
        {
            cmd.push("--dport", port);
        }
    }
    if let Some(interface) = &rule.interface {
        cmd.push("-i", interface);
    }
    cmd.push("-m", "comment");
    cmd.push("--comment", rule.tag());
    cmd.push("-j", rule.action);

    cmd
}

/// Commands that return the INPUT chain to its default: flush every rule,
/// then set the policy to ACCEPT.
pub fn reset_commands() -> [FilterCommand; 2] {
    [
        FilterCommand::new(["-F", CHAIN]),
        FilterCommand::new(["-P", CHAIN, "ACCEPT"]),
    ]
}

/// Command that lists the live INPUT chain with counters and line numbers.
pub fn status_command() -> FilterCommand {
    FilterCommand::new(["-L", CHAIN, "-n", "-v", "--line-numbers"])
}
