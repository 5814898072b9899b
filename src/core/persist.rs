//! Rules file codec
//!
//! The rules file is plain text, one rule per line:
//!
//! ```text
//! # Personal Firewall Rules Configuration
//! # Auto-generated - Do not edit manually
//! # Total rules: 2
//!
//! 1. action=ACCEPT, port=22, protocol=TCP, comment="ssh"
//! 2. action=DROP, source=10.0.0.0/8
//! ```
//!
//! Lines starting with `#` and blank lines are ignored. Each rule line is
//! read back through the grammar parser, so the leading `N. ` is optional
//! and the IDs in the file are not trusted; rules are renumbered by
//! position on load. `active` is not stored and every loaded rule is active.

use crate::core::error::Result;
use crate::core::parser::parse;
use crate::core::rule::Rule;
use crate::validators::validate_rule;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Wraps a value in quotes the parser will strip again. Double quotes are
/// preferred; single quotes are used when the value holds a `"`.
///
/// Values holding both quote characters are refused by the validators.
fn quoted(value: &str) -> String {
    let q = if value.contains('"') && !value.contains('\'') {
        '\''
    } else {
        '"'
    };
    format!("{q}{value}{q}")
}

/// Whether a bare value would read back differently: it would be split at a
/// comma, open a quote, or lose surrounding whitespace.
fn needs_quotes(value: &str) -> bool {
    value.contains([',', '"', '\'']) || value.trim() != value
}

/// Serializes rules into the rules-file text.
pub fn encode(rules: &[Rule]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Personal Firewall Rules Configuration");
    let _ = writeln!(out, "# Auto-generated - Do not edit manually");
    let _ = writeln!(out, "# Total rules: {}", rules.len());
    let _ = writeln!(out);

    for (index, rule) in rules.iter().enumerate() {
        let _ = write!(out, "{}. action={}", index + 1, rule.action);
        if let Some(source) = &rule.source {
            let _ = write!(out, ", source={source}");
        }
        if let Some(destination) = &rule.destination {
            let _ = write!(out, ", dest={destination}");
        }
        if let Some(port) = &rule.port {
            let _ = write!(out, ", port={port}");
        }
        if let Some(protocol) = rule.protocol {
            let _ = write!(out, ", protocol={protocol}");
        }
        if let Some(interface) = &rule.interface {
            if needs_quotes(interface) {
                let _ = write!(out, ", interface={}", quoted(interface));
            } else {
                let _ = write!(out, ", interface={interface}");
            }
        }
        if let Some(comment) = &rule.comment {
            let _ = write!(out, ", comment={}", quoted(comment));
        }
        let _ = writeln!(out);
    }

    out
}

/// Strips the `N. ` prefix written by [`encode`], if present.
fn strip_id_prefix(line: &str) -> &str {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0
        && let Some(rest) = line[digits..].strip_prefix(". ")
    {
        return rest;
    }
    line
}

/// Parses rules-file text. Lines that do not validate are skipped.
///
/// Returned rules are unnumbered; the store assigns IDs on insertion.
pub fn decode(text: &str) -> Vec<Rule> {
    let mut rules = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        match validate_rule(&parse(strip_id_prefix(line))) {
            Ok(mut rule) => {
                rule.id = 0;
                rules.push(rule);
            }
            Err(e) => warn!("Skipping rules file line {}: {e}", line_no + 1),
        }
    }

    rules
}

/// Reads rules from `path`. A missing file yields no rules.
///
/// # Errors
///
/// Returns `Err` if the file exists but cannot be read.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No existing rules file at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let rules = decode(&text);
    info!("Loaded {} rules from {}", rules.len(), path.display());
    Ok(rules)
}

/// Writes rules to `path` using an atomic write pattern.
/// 1. Writes to a temporary file in the same directory.
/// 2. Sets restrictive permissions (0o600).
/// 3. Atomically renames to the target path.
///
/// # Errors
///
/// Returns `Err` if the directory is not writable or the rename fails.
pub fn save_rules(path: &Path, rules: &[Rule]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(encode(rules).as_bytes())?;
    file.as_file().sync_all()?;

    file.persist(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "Disk full: cannot save rules. Free up space and try again.",
            )
        } else {
            e.error
        }
    })?;

    info!("Saved {} rules to {}", rules.len(), path.display());
    Ok(())
}

/// Default location for a timestamped backup in `dir`.
pub fn backup_path(dir: &Path) -> PathBuf {
    dir.join(format!("backup_{}.conf", chrono::Utc::now().timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rule::{Action, Address, PortSpec, Protocol};
    use crate::core::test_helpers::create_test_rule;

    fn numbered(mut rules: Vec<Rule>) -> Vec<Rule> {
        for (i, rule) in rules.iter_mut().enumerate() {
            rule.id = u32::try_from(i + 1).unwrap();
        }
        rules
    }

    fn sample_rules() -> Vec<Rule> {
        let mut web = Rule::new(Action::Accept);
        web.protocol = Some(Protocol::Tcp);
        web.port = Some(PortSpec::Range {
            start: 8000,
            end: 8080,
        });
        web.comment = Some("web, staging".to_string());

        let mut block = Rule::new(Action::Drop);
        block.source = Some(Address::Host("203.0.113.9".parse().unwrap()));
        block.destination = Some(Address::Network("10.0.0.5/24".parse().unwrap()));
        block.interface = Some("eth0".to_string());

        let mut ping = Rule::new(Action::Reject);
        ping.protocol = Some(Protocol::Icmp);
        ping.port = Some(PortSpec::Single(80));

        numbered(vec![web, block, ping])
    }

    #[test]
    fn test_encode_format() {
        let text = encode(&sample_rules());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Personal Firewall Rules Configuration");
        assert_eq!(lines[2], "# Total rules: 3");
        assert_eq!(lines[3], "");
        assert_eq!(
            lines[4],
            "1. action=ACCEPT, port=8000:8080, protocol=TCP, comment=\"web, staging\""
        );
        assert_eq!(
            lines[5],
            "2. action=DROP, source=203.0.113.9, dest=10.0.0.5/24, interface=eth0"
        );
        assert_eq!(lines[6], "3. action=REJECT, port=80, protocol=ICMP");
    }

    #[test]
    fn test_round_trip_preserves_rules() {
        let rules = sample_rules();
        let decoded = numbered(decode(&encode(&rules)));
        assert_eq!(decoded, rules);
    }

    #[test]
    fn test_round_trip_resets_active() {
        let mut rules = sample_rules();
        rules[1].active = false;
        let decoded = decode(&encode(&rules));
        assert!(decoded.iter().all(|r| r.active));
    }

    #[test]
    fn test_round_trip_interface_with_comma() {
        let mut rule = create_test_rule("x");
        rule.interface = Some("odd,name".to_string());
        let rules = numbered(vec![rule]);
        assert_eq!(numbered(decode(&encode(&rules))), rules);
    }

    #[test]
    fn test_round_trip_comment_with_double_quote() {
        let rules = numbered(vec![create_test_rule("say \"hi\", then leave")]);
        let text = encode(&rules);
        assert!(text.contains("comment='say \"hi\", then leave'"));
        assert_eq!(numbered(decode(&text)), rules);
    }

    #[test]
    fn test_round_trip_interface_needing_quotes() {
        for name in ["'eth0", "\"eth0", " eth0 ", "eth0 ", "br,0", "a='b", "a= \"b"] {
            let mut rule = create_test_rule("ssh");
            rule.interface = Some(name.to_string());
            let rules = numbered(vec![rule]);
            assert_eq!(numbered(decode(&encode(&rules))), rules, "{name:?}");
        }
    }

    #[test]
    fn test_interface_from_rule_text_round_trips() {
        let rule = validate_rule(&parse("action=ACCEPT,i=\"'eth0\",comment=ssh")).unwrap();
        assert_eq!(rule.interface.as_deref(), Some("'eth0"));
        let rules = vec![rule];
        assert_eq!(decode(&encode(&rules)), rules);
    }

    #[test]
    fn test_needs_quotes() {
        assert!(!needs_quotes("eth0"));
        assert!(!needs_quotes("any name"));
        assert!(needs_quotes("a,b"));
        assert!(needs_quotes("'a"));
        assert!(needs_quotes("a='b"));
        assert!(needs_quotes(" a"));
        assert!(needs_quotes("a\t"));
    }

    #[test]
    fn test_decode_skips_comments_blank_and_invalid() {
        let text = "\
# header
\r
1. action=ACCEPT, port=22, protocol=TCP

2. action=BOGUS

action=DROP, source=10.0.0.0/8
7. action=REJECT
";
        let rules = decode(text);
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].action, Action::Accept);
        assert_eq!(rules[1].action, Action::Drop);
        assert_eq!(rules[2].action, Action::Reject);
        assert!(rules.iter().all(|r| r.id == 0));
    }

    #[test]
    fn test_strip_id_prefix() {
        assert_eq!(strip_id_prefix("12. action=DROP"), "action=DROP");
        assert_eq!(strip_id_prefix("action=DROP"), "action=DROP");
        assert_eq!(strip_id_prefix("12.action=DROP"), "12.action=DROP");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rules = load_rules(&dir.path().join("absent.txt")).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.txt");
        let rules = sample_rules();

        save_rules(&path, &rules).unwrap();
        assert_eq!(numbered(load_rules(&path).unwrap()), rules);

        // Overwrite with fewer rules
        save_rules(&path, &rules[..1]).unwrap();
        assert_eq!(load_rules(&path).unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_sets_private_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.txt");
        save_rules(&path, &sample_rules()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_backup_path_is_timestamped() {
        let path = backup_path(Path::new("/etc/personal-firewall"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("backup_"));
        assert!(name.ends_with(".conf"));
    }
}
