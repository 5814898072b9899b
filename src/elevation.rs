//! Privilege elevation for iptables calls
//!
//! Changing the INPUT chain needs root. pfw does not elevate on its own
//! initiative; it either already runs as root, or the user opts into a
//! wrapper via the environment.
//!
//! # Environment Variables
//!
//! - `PFW_ELEVATION_METHOD`: wrap iptables in `sudo`, `run0` or `pkexec`.
//!   Useful for scripts with sudoers NOPASSWD rules.
//!   Example: `PFW_ELEVATION_METHOD=sudo pfw add "action=DROP,source=1.2.3.4"`
//!
//! # Security
//!
//! - Arguments are passed as an argument vector, never through a shell
//! - Wrapper binaries are checked for availability before use

use tokio::process::Command;

const ELEVATION_ENV: &str = "PFW_ELEVATION_METHOD";

/// Error type for privilege elevation operations
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// Requested elevation method is not available (binary not found)
    #[error("Elevation method '{0}' is not available (binary not found)")]
    MethodNotAvailable(String),

    /// Invalid value for `PFW_ELEVATION_METHOD`
    #[error("Invalid PFW_ELEVATION_METHOD '{0}'. Valid options: sudo, run0, pkexec")]
    InvalidMethod(String),
}

/// Checks if a binary exists in PATH
fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

pub fn is_root() -> bool {
    nix::unistd::getuid().is_root()
}

fn requested_method() -> Option<String> {
    std::env::var(ELEVATION_ENV)
        .ok()
        .map(|m| m.to_lowercase())
        .filter(|m| !m.is_empty())
}

/// Returns `true` if iptables calls can be expected to have root rights:
/// either we are root or an elevation wrapper was requested.
pub fn has_authority() -> bool {
    is_root() || requested_method().is_some()
}

/// Builds the command that runs `program` with `args`, elevated if needed.
///
/// # Errors
///
/// Returns `Err` if `PFW_ELEVATION_METHOD` names an unknown method or a
/// wrapper that is not installed.
pub fn create_elevated_command(program: &str, args: &[String]) -> Result<Command, ElevationError> {
    if is_root() {
        let mut cmd = Command::new(program);
        cmd.args(args);
        return Ok(cmd);
    }

    let Some(method) = requested_method() else {
        // No authority: run directly and let iptables report the failure
        let mut cmd = Command::new(program);
        cmd.args(args);
        return Ok(cmd);
    };

    match method.as_str() {
        "sudo" | "run0" | "pkexec" => {
            if !binary_exists(&method) {
                return Err(ElevationError::MethodNotAvailable(method));
            }
            let mut cmd = Command::new(&method);
            cmd.arg(program).args(args);
            Ok(cmd)
        }
        _ => Err(ElevationError::InvalidMethod(method)),
    }
}
