//! Firewall rule data structures
//!
//! A rule travels through two shapes:
//!
//! - [`RawRule`]: the parser's output. Every field is the text the user wrote,
//!   nothing is checked yet.
//! - [`Rule`]: a validated rule with typed fields. Only this shape is stored,
//!   persisted, or rendered into iptables commands.
//!
//! # Example
//!
//! ```
//! use pfw::core::parser::parse;
//! use pfw::core::rule::{Action, Protocol};
//! use pfw::validators::validate_rule;
//!
//! let raw = parse("action=ACCEPT,protocol=TCP,port=22");
//! let rule = validate_rule(&raw).unwrap();
//! assert_eq!(rule.action, Action::Accept);
//! assert_eq!(rule.protocol, Some(Protocol::Tcp));
//! assert!(rule.active);
//! ```

use ipnetwork::Ipv4Network;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;

/// Maximum number of rules the store accepts unless configured otherwise
pub const DEFAULT_MAX_RULES: usize = 1000;

/// The only chain pfw manages
pub const CHAIN: &str = "INPUT";

/// Rule action
///
/// Controls what happens when a packet matches this rule.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Action {
    /// Let the packet through
    #[strum(serialize = "ACCEPT")]
    #[serde(rename = "ACCEPT")]
    Accept,
    /// Drop the packet silently (no response sent)
    #[strum(serialize = "DROP")]
    #[serde(rename = "DROP")]
    Drop,
    /// Drop the packet and send an ICMP error back
    #[strum(serialize = "REJECT")]
    #[serde(rename = "REJECT")]
    Reject,
}

/// Network protocol matched by a rule
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Protocol {
    #[strum(serialize = "TCP")]
    #[serde(rename = "TCP")]
    Tcp,
    #[strum(serialize = "UDP")]
    #[serde(rename = "UDP")]
    Udp,
    #[strum(serialize = "ICMP")]
    #[serde(rename = "ICMP")]
    Icmp,
    #[strum(serialize = "ALL")]
    #[serde(rename = "ALL")]
    All,
}

impl Protocol {
    /// Only TCP and UDP carry a destination port match.
    pub const fn supports_ports(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

/// Source or destination address: a single host or a CIDR network
///
/// The network form keeps host bits as written, so `10.0.0.5/24` displays
/// as `10.0.0.5/24`, not `10.0.0.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    Host(Ipv4Addr),
    Network(Ipv4Network),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Host(ip) => write!(f, "{ip}"),
            Address::Network(net) => write!(f, "{}/{}", net.ip(), net.prefix()),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Destination port match: one port or an inclusive `start:end` range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    Single(u16),
    Range { start: u16, end: u16 },
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Single(port) => write!(f, "{port}"),
            PortSpec::Range { start, end } => write!(f, "{start}:{end}"),
        }
    }
}

impl Serialize for PortSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Unvalidated rule as produced by the grammar parser.
///
/// Empty strings mean "not given".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRule {
    pub action: String,
    pub source: String,
    pub destination: String,
    pub port: String,
    pub protocol: String,
    pub interface: String,
    pub comment: String,
    pub active: bool,
}

impl Default for RawRule {
    fn default() -> Self {
        Self {
            action: String::new(),
            source: String::new(),
            destination: String::new(),
            port: String::new(),
            protocol: String::new(),
            interface: String::new(),
            comment: String::new(),
            active: true,
        }
    }
}

/// A validated firewall rule.
///
/// `id` is 0 until the rule is inserted into a
/// [`RuleStore`](crate::core::store::RuleStore); from then on it equals the
/// rule's 1-based position in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub id: u32,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub active: bool,
}

impl Rule {
    /// Creates an active, unnumbered rule with only an action set.
    pub fn new(action: Action) -> Self {
        Self {
            id: 0,
            action,
            source: None,
            destination: None,
            port: None,
            protocol: None,
            interface: None,
            comment: None,
            active: true,
        }
    }

    /// Comment used to tag the rule inside iptables.
    ///
    /// Falls back to `Rule-ID-<id>` so every rendered command can be traced
    /// back to a rule.
    pub fn tag(&self) -> String {
        self.comment
            .clone()
            .unwrap_or_else(|| format!("Rule-ID-{}", self.id))
    }
}
