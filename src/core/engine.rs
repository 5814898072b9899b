//! External filter engine
//!
//! [`FilterEngine`] is the seam between rule bookkeeping and the kernel's
//! packet filter. [`Iptables`] runs the real `iptables` binary; tests swap in
//! a recording double.
//!
//! Every call is a single process invocation that is awaited to completion
//! without a timeout. Exit status 0 is success, anything else (including
//! death by signal) is [`Error::ExternalEngine`].

use crate::core::error::{Error, Result};
use crate::core::render::{FilterCommand, reset_commands, status_command};
use tracing::{error, info};

/// Capability to change the live packet filter.
#[allow(async_fn_in_trait)]
pub trait FilterEngine {
    /// Inserts the rule described by `command` into the chain.
    async fn apply(&self, command: &FilterCommand) -> Result<()>;

    /// Deletes the rule described by `command` from the chain.
    async fn remove(&self, command: &FilterCommand) -> Result<()>;

    /// Empties the chain and restores its default-accept policy.
    async fn reset(&self) -> Result<()>;
}

/// [`FilterEngine`] backed by the `iptables` command.
#[derive(Debug, Clone)]
pub struct Iptables {
    program: String,
}

impl Default for Iptables {
    fn default() -> Self {
        Self::new("iptables")
    }
}

impl Iptables {
    /// Uses `program` instead of `iptables` (e.g. `iptables-legacy`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn output(&self, command: &FilterCommand) -> Result<std::process::Output> {
        info!("Executing: {} {}", self.program, command);

        let output = crate::elevation::create_elevated_command(&self.program, command.args())?
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                error!("Failed to spawn {}: {e}", self.program);
                Error::ExternalEngine {
                    message: format!("failed to run {}: {e}", self.program),
                    stderr: None,
                    exit_code: None,
                }
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = match output.status.code() {
                Some(code) if stderr.is_empty() => {
                    format!("{} exited with status {code}", self.program)
                }
                Some(_) => stderr.clone(),
                None => format!("{} was terminated by a signal", self.program),
            };
            error!("iptables call failed: {message}");
            Err(Error::ExternalEngine {
                message,
                stderr: (!stderr.is_empty()).then_some(stderr),
                exit_code: output.status.code(),
            })
        }
    }

    /// Runs one command and discards its output.
    ///
    /// # Errors
    ///
    /// Returns `Error::ExternalEngine` if the process cannot be started or
    /// exits unsuccessfully.
    pub async fn execute(&self, command: &FilterCommand) -> Result<()> {
        self.output(command).await.map(|_| ())
    }

    /// Lists the live INPUT chain.
    ///
    /// # Errors
    ///
    /// Returns `Error::ExternalEngine` if iptables is unavailable or refuses.
    pub async fn status(&self) -> Result<String> {
        let output = self.output(&status_command()).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl FilterEngine for Iptables {
    async fn apply(&self, command: &FilterCommand) -> Result<()> {
        self.execute(command).await
    }

    async fn remove(&self, command: &FilterCommand) -> Result<()> {
        self.execute(command).await
    }

    /// Runs both reset steps even if the flush fails; the first failure wins.
    async fn reset(&self) -> Result<()> {
        let [flush, policy] = reset_commands();
        let flushed = self.execute(&flush).await;
        let policy_set = self.execute(&policy).await;
        flushed.and(policy_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::render::{Operation, render};
    use crate::core::test_helpers::{create_test_rule, env_guard};

    #[tokio::test]
    async fn test_success_exit_code() {
        let _guard = env_guard();
        let engine = Iptables::new("true");
        let cmd = render(&create_test_rule("ok"), Operation::Apply);
        assert!(engine.apply(&cmd).await.is_ok());
        assert!(engine.reset().await.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_code() {
        let _guard = env_guard();
        let engine = Iptables::new("false");
        let cmd = render(&create_test_rule("fails"), Operation::Remove);
        match engine.remove(&cmd).await {
            Err(Error::ExternalEngine { exit_code, .. }) => assert_eq!(exit_code, Some(1)),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let _guard = env_guard();
        let engine = Iptables::new("pfw_nonexistent_binary_xyz");
        let result = engine.execute(&FilterCommand::new(["-L"])).await;
        assert!(matches!(
            result,
            Err(Error::ExternalEngine {
                exit_code: None,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_reset_reports_failure() {
        let _guard = env_guard();
        let engine = Iptables::new("false");
        assert!(engine.reset().await.unwrap_err().is_external());
    }

    #[tokio::test]
    async fn test_status_failure() {
        let _guard = env_guard();
        let engine = Iptables::new("false");
        assert!(engine.status().await.is_err());
    }
}
