use thiserror::Error;

/// Core error types for pfw
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A rule field failed its validator; nothing was stored
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// The rule store is full
    #[error("Maximum rule limit reached ({limit} rules)")]
    Capacity { limit: usize },

    /// No live rule carries this ID
    #[error("Rule {0} not found")]
    NotFound(u32),

    /// iptables exited non-zero or could not be run
    #[error("iptables error: {message}")]
    ExternalEngine {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Privilege escalation failed
    #[error("Elevation error: {0}")]
    Elevation(#[from] crate::elevation::ElevationError),

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for failures of the external filter, which are reported
    /// as warnings rather than aborting the requested operation.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::ExternalEngine { .. } | Self::Elevation(_))
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Known iptables error messages and their translations
pub struct IptablesErrorPattern;

impl IptablesErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        if lower.contains("permission denied")
            || lower.contains("operation not permitted")
            || lower.contains("you must be root")
        {
            return ErrorTranslation::new("Insufficient permissions to modify firewall rules")
                .with_suggestion("Run pfw as root, e.g. with sudo")
                .with_suggestion("Or set PFW_ELEVATION_METHOD=sudo|run0|pkexec")
                .with_suggestion("Check if CAP_NET_ADMIN capability is available");
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            return ErrorTranslation::new("iptables is not installed or not found in PATH")
                .with_suggestion("Install iptables: sudo apt install iptables  (Debian/Ubuntu)")
                .with_suggestion("Or: sudo dnf install iptables  (Fedora/RHEL)")
                .with_suggestion("Or set \"iptables_command\" in the configuration file");
        }

        // Deleting a rule that the kernel does not hold
        if lower.contains("bad rule") || lower.contains("does a matching rule exist") {
            return ErrorTranslation::new("No matching rule found in the INPUT chain")
                .with_suggestion("The rule may have been flushed or changed outside pfw")
                .with_suggestion("Inspect the live chain with: pfw status");
        }

        if lower.contains("couldn't load match") || lower.contains("couldn't load target") {
            return ErrorTranslation::new("A required iptables extension is missing")
                .with_suggestion("Load the comment match module: sudo modprobe xt_comment")
                .with_suggestion("Check kernel modules: lsmod | grep x_tables");
        }

        if lower.contains("no chain/target/match by that name") {
            return ErrorTranslation::new("iptables chain, target, or match not found")
                .with_suggestion("Ensure the filter table and INPUT chain exist")
                .with_suggestion("Verify the action is ACCEPT, DROP or REJECT");
        }

        if lower.contains("xtables lock") || lower.contains("resource busy") {
            return ErrorTranslation::new("Firewall resource is busy")
                .with_suggestion("Another process may be modifying iptables")
                .with_suggestion("Wait a moment and try again");
        }

        if lower.contains("invalid port") || lower.contains("port range") {
            return ErrorTranslation::new("Invalid port or port range")
                .with_suggestion("Port numbers must be between 1 and 65535")
                .with_suggestion("For port ranges, use start:end with start <= end");
        }

        if lower.contains("host/network") && lower.contains("not found") {
            return ErrorTranslation::new("Invalid IP address or network")
                .with_suggestion("Use proper IPv4 format: 192.168.1.1 or 192.168.1.0/24");
        }

        ErrorTranslation::new(format!("Firewall error: {msg}"))
            .with_suggestion("Check the detailed error message for more information")
            .with_suggestion("Verify iptables is working: sudo iptables -L INPUT -n")
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iptables_missing_command() {
        let translation = IptablesErrorPattern::match_error("command not found: iptables");
        assert!(translation.user_message.contains("not installed"));
        assert!(translation.suggestions.len() >= 3);
    }

    #[test]
    fn test_permission_denied() {
        let translation = IptablesErrorPattern::match_error(
            "iptables v1.8.9 (nf_tables): Could not fetch rule set generation id: Permission denied (you must be root)",
        );
        assert!(translation.user_message.contains("permissions"));
        assert!(translation.suggestions.iter().any(|s| s.contains("sudo")));
    }

    #[test]
    fn test_missing_rule_on_delete() {
        let translation = IptablesErrorPattern::match_error(
            "iptables: Bad rule (does a matching rule exist in that chain?).",
        );
        assert!(translation.user_message.contains("No matching rule"));
    }

    #[test]
    fn test_comment_module_missing() {
        let translation = IptablesErrorPattern::match_error("Couldn't load match `comment'");
        assert!(translation.suggestions.iter().any(|s| s.contains("xt_comment")));
    }

    #[test]
    fn test_generic_fallback() {
        let translation = IptablesErrorPattern::match_error("something odd");
        assert!(translation.user_message.contains("something odd"));
    }

    #[test]
    fn test_external_classification() {
        let err = Error::ExternalEngine {
            message: "exit 1".into(),
            stderr: None,
            exit_code: Some(1),
        };
        assert!(err.is_external());
        assert!(!Error::NotFound(3).is_external());
        assert!(!Error::Capacity { limit: 10 }.is_external());
    }

    #[test]
    fn test_validation_message() {
        let err = Error::validation("port", "Port must be between 1 and 65535");
        assert_eq!(
            err.to_string(),
            "Validation error in port: Port must be between 1 and 65535"
        );
    }
}
