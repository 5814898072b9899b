//! Input validation for rule fields
//!
//! Every field validator comes in two shapes:
//!
//! - a `validate_*` function returning the typed value or a user-facing
//!   message, and
//! - an `is_valid_*` predicate for callers that only need a yes/no answer.
//!
//! Numeric fields are parsed strictly: only plain ASCII digits are accepted,
//! so `"80abc"`, `"+80"` and `" 80"` are all rejected.
//!
//! [`validate_rule`] is the gate between the parser and the rule store.

use crate::core::error::{Error, Result};
use crate::core::rule::{Action, Address, PortSpec, Protocol, RawRule, Rule};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Longest comment iptables' comment match accepts
pub const MAX_COMMENT_LENGTH: usize = 256;

/// Parses an unsigned decimal made only of ASCII digits.
fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Validates a dotted-quad IPv4 address.
///
/// # Errors
///
/// Returns `Err` if the text is not a well-formed IPv4 address.
pub fn validate_ipv4(s: &str) -> std::result::Result<Ipv4Addr, String> {
    Ipv4Addr::from_str(s).map_err(|_| format!("'{s}' is not a valid IPv4 address"))
}

pub fn is_valid_ipv4(s: &str) -> bool {
    validate_ipv4(s).is_ok()
}

/// Validates CIDR notation (`address/prefix`, prefix 0-32).
///
/// # Errors
///
/// Returns `Err` if:
/// - There is not exactly one `/`
/// - The address part is not a valid IPv4 address
/// - The prefix is not an integer in `[0, 32]`
pub fn validate_cidr(s: &str) -> std::result::Result<Ipv4Network, String> {
    let mut parts = s.split('/');
    let (Some(ip), Some(mask), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("'{s}' is not in address/prefix form"));
    };

    let ip = validate_ipv4(ip)?;
    let prefix: u8 = parse_digits(mask)
        .filter(|p| *p <= 32)
        .ok_or_else(|| format!("Prefix length '{mask}' must be between 0 and 32"))?;

    Ipv4Network::new(ip, prefix).map_err(|e| e.to_string())
}

pub fn is_valid_cidr(s: &str) -> bool {
    validate_cidr(s).is_ok()
}

/// Validates a source/destination field: a host address or a CIDR range.
///
/// # Errors
///
/// Returns `Err` if the text is neither form.
pub fn validate_address(s: &str) -> std::result::Result<Address, String> {
    if s.contains('/') {
        validate_cidr(s).map(Address::Network)
    } else {
        validate_ipv4(s).map(Address::Host)
    }
}

/// Validates a single port number.
///
/// # Errors
///
/// Returns `Err` if port is 0 (reserved).
pub fn validate_port_number(port: u16) -> std::result::Result<u16, String> {
    if port == 0 {
        Err("Port must be between 1 and 65535".to_string())
    } else {
        Ok(port)
    }
}

/// Validates a port range.
///
/// # Errors
///
/// Returns `Err` if:
/// - Either port is 0
/// - Start port is greater than end port
pub fn validate_port_range(start: u16, end: u16) -> std::result::Result<(u16, u16), String> {
    validate_port_number(start)?;
    validate_port_number(end)?;

    if start > end {
        Err("Start port must be less than or equal to end port".to_string())
    } else {
        Ok((start, end))
    }
}

/// Validates a port field: `N` or `start:end`.
///
/// # Errors
///
/// Returns `Err` if a number is missing, non-numeric, outside 1-65535, or the
/// range is reversed.
pub fn validate_port(s: &str) -> std::result::Result<PortSpec, String> {
    let number = |text: &str| {
        parse_digits::<u16>(text).ok_or_else(|| "Port must be between 1 and 65535".to_string())
    };

    if let Some((start, end)) = s.split_once(':') {
        let (start, end) = validate_port_range(number(start)?, number(end)?)?;
        Ok(PortSpec::Range { start, end })
    } else {
        validate_port_number(number(s)?).map(PortSpec::Single)
    }
}

pub fn is_valid_port(s: &str) -> bool {
    validate_port(s).is_ok()
}

/// Validates an action (`ACCEPT`, `DROP` or `REJECT`, exact case).
///
/// # Errors
///
/// Returns `Err` for any other text.
pub fn validate_action(s: &str) -> std::result::Result<Action, String> {
    Action::from_str(s).map_err(|_| format!("Invalid action: {s} (use ACCEPT, DROP or REJECT)"))
}

pub fn is_valid_action(s: &str) -> bool {
    validate_action(s).is_ok()
}

/// Validates a protocol (`TCP`, `UDP`, `ICMP` or `ALL`, exact case).
///
/// # Errors
///
/// Returns `Err` for any other text.
pub fn validate_protocol(s: &str) -> std::result::Result<Protocol, String> {
    Protocol::from_str(s)
        .map_err(|_| format!("Invalid protocol: {s} (use TCP, UDP, ICMP or ALL)"))
}

pub fn is_valid_protocol(s: &str) -> bool {
    validate_protocol(s).is_ok()
}

/// Rejects text that cannot be stored on one line of the rules file.
///
/// A value holding both quote characters has no quoting the grammar parser
/// can read back.
fn check_storable(s: &str) -> std::result::Result<(), String> {
    if s.contains(['\n', '\r']) {
        return Err("Value cannot contain line breaks".to_string());
    }
    if s.contains('"') && s.contains('\'') {
        return Err("Value cannot contain both \" and ' quotes".to_string());
    }
    Ok(())
}

/// Validates a rule comment.
///
/// # Errors
///
/// Returns `Err` if the comment is too long, contains `\n` or `\r`, or
/// contains both `"` and `'`.
pub fn validate_comment(s: &str) -> std::result::Result<String, String> {
    if s.chars().count() > MAX_COMMENT_LENGTH {
        return Err(format!(
            "Comment too long (max {MAX_COMMENT_LENGTH} characters)"
        ));
    }
    check_storable(s)?;
    Ok(s.to_string())
}

/// Validates an interface name.
///
/// Names are not checked against the system; only text the rules file
/// cannot hold is refused.
///
/// # Errors
///
/// Returns `Err` if the name contains `\n` or `\r`, or both `"` and `'`.
pub fn validate_interface(s: &str) -> std::result::Result<String, String> {
    check_storable(s)?;
    Ok(s.to_string())
}

pub fn is_valid_interface(s: &str) -> bool {
    validate_interface(s).is_ok()
}

fn optional<T>(
    field: &str,
    value: &str,
    check: impl FnOnce(&str) -> std::result::Result<T, String>,
) -> Result<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    check(value)
        .map(Some)
        .map_err(|message| Error::validation(field, message))
}

/// Validates every field of a parsed rule and builds the typed [`Rule`].
///
/// The action is mandatory; every other empty field means "match anything".
/// The returned rule is unnumbered (`id == 0`).
///
/// # Errors
///
/// Returns `Error::Validation` naming the first field that fails.
pub fn validate_rule(raw: &RawRule) -> Result<Rule> {
    if raw.action.is_empty() {
        return Err(Error::validation("action", "Action is required"));
    }
    let action = validate_action(&raw.action).map_err(|m| Error::validation("action", m))?;

    Ok(Rule {
        id: 0,
        action,
        source: optional("source", &raw.source, validate_address)?,
        destination: optional("destination", &raw.destination, validate_address)?,
        port: optional("port", &raw.port, validate_port)?,
        protocol: optional("protocol", &raw.protocol, validate_protocol)?,
        interface: optional("interface", &raw.interface, validate_interface)?,
        comment: optional("comment", &raw.comment, validate_comment)?,
        active: raw.active,
    })
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_single_port_matches_range(port in 0u32..=70000) {
            let valid = (1..=65535).contains(&port);
            prop_assert_eq!(is_valid_port(&port.to_string()), valid);
        }

        #[test]
        fn test_port_range_consistency(start in 1u16..=65535, end in 1u16..=65535) {
            let result = validate_port(&format!("{start}:{end}"));
            if start <= end {
                prop_assert_eq!(result.unwrap(), PortSpec::Range { start, end });
            } else {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn test_cidr_prefix_bound(a: u8, b: u8, c: u8, d: u8, prefix in 0u32..=64) {
            let text = format!("{a}.{b}.{c}.{d}/{prefix}");
            prop_assert_eq!(is_valid_cidr(&text), prefix <= 32);
        }

        #[test]
        fn test_port_rejects_trailing_garbage(port in 1u16..=65535, junk in "[a-z]{1,4}") {
            let text = format!("{port}{junk}");
            prop_assert!(!is_valid_port(&text));
        }

        #[test]
        fn test_address_display_round_trips(a: u8, b: u8, c: u8, d: u8, prefix in 0u8..=32) {
            let text = format!("{a}.{b}.{c}.{d}/{prefix}");
            let addr = validate_address(&text).unwrap();
            prop_assert_eq!(addr.to_string(), text);
        }
    }
}
