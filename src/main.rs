//! pfw - Personal Firewall
//!
//! Command-line manager for iptables INPUT rules.
//!
//! # Usage
//!
//! ```bash
//! pfw add "action=ACCEPT,protocol=TCP,port=22,comment=ssh"
//! pfw add "action=DROP,source=203.0.113.0/24"
//! pfw list                 # Stored rules as a table
//! pfw list --json          # ... or as JSON
//! pfw remove 2             # Later rules move up one ID
//! pfw status               # Live INPUT chain
//! pfw flush                # Empty INPUT, policy ACCEPT, forget all rules
//! pfw backup               # Timestamped copy of the rules file
//! pfw restore /etc/personal-firewall/backup_1700000000.conf
//! ```
//!
//! # Exit status
//!
//! Non-zero when the request itself is rejected (invalid rule, unknown ID,
//! full store, unreadable file). When iptables refuses a change that pfw has
//! already recorded, a warning is printed and the exit status is zero.

use clap::{Parser, Subcommand};
use pfw::audit::{AuditLog, EventType};
use pfw::config;
use pfw::core::engine::Iptables;
use pfw::core::error::IptablesErrorPattern;
use pfw::core::persist;
use pfw::utils::truncate_string;
use pfw::{Error, ExternalSync, Result, RuleManager, RuleStore, elevation, utils};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pfw", version)]
#[command(about = "Personal Firewall - a small iptables INPUT rule manager", long_about = None)]
struct Cli {
    /// Configuration file [default: $PFW_CONFIG or /etc/personal-firewall/config.json]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Rules file, overriding the configured one
    #[arg(long, global = true, value_name = "PATH")]
    rules_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a rule, e.g. "action=ACCEPT,protocol=TCP,port=22"
    Add {
        /// Comma-separated key=value pairs
        rule: String,
    },
    /// Remove a rule by ID
    Remove { id: u32 },
    /// List stored rules
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show stored rule count and the live INPUT chain
    Status,
    /// Remove every rule and reset the INPUT chain to ACCEPT
    Flush,
    /// Write stored rules to the rules file
    Save,
    /// Re-read the rules file
    Load,
    /// Copy stored rules to a backup file
    Backup {
        /// Target file [default: <backup_dir>/backup_<unix time>.conf]
        file: Option<PathBuf>,
    },
    /// Replace stored rules with those in a backup file
    Restore { file: PathBuf },
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(handle_cli(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Everything one invocation works on: the loaded rules, where they live,
/// and where changes are audited.
struct Session {
    manager: RuleManager<Iptables>,
    rules_file: PathBuf,
    backup_dir: PathBuf,
    audit: Option<AuditLog>,
}

impl Session {
    async fn open(config_file: Option<&Path>, rules_file: Option<PathBuf>) -> Result<Self> {
        let config = config::load_config(&config::config_path(config_file)).await;
        let rules_file = rules_file.unwrap_or(config.rules_file);
        utils::ensure_parent_dir(&rules_file)?;

        let mut manager = RuleManager::new(
            RuleStore::with_capacity(config.max_rules),
            Iptables::new(config.iptables_command),
            elevation::has_authority(),
        );
        manager.replace_rules(persist::load_rules(&rules_file)?);

        Ok(Self {
            manager,
            rules_file,
            backup_dir: config.backup_dir,
            audit: config
                .audit_enabled
                .then(|| AuditLog::new(config.audit_log)),
        })
    }

    fn save(&self) -> Result<()> {
        persist::save_rules(&self.rules_file, self.manager.list_rules())
    }

    async fn audit<T>(&self, event: EventType, details: serde_json::Value, outcome: &Result<T>) {
        if let Some(audit) = &self.audit {
            let error = outcome.as_ref().err().map(ToString::to_string);
            audit.record(event, outcome.is_ok(), details, error).await;
        }
    }

    /// Tells the user how the live firewall fared after a recorded change.
    fn report(&self, external: &ExternalSync) {
        match external {
            ExternalSync::Applied => {}
            ExternalSync::Skipped if !self.manager.has_authority() => {
                println!(
                    "Note: not running as root, the live firewall was not changed \
                     (set PFW_ELEVATION_METHOD=sudo|run0|pkexec to elevate)"
                );
            }
            ExternalSync::Skipped => {}
            ExternalSync::Failed(e) => {
                eprintln!("Warning: the change was recorded but the live firewall was not updated");
                print_hints(e);
            }
        }
    }
}

fn print_hints(e: &Error) {
    let text = match e {
        Error::ExternalEngine {
            stderr: Some(stderr),
            ..
        } => stderr.clone(),
        Error::ExternalEngine { message, .. } => message.clone(),
        other => other.to_string(),
    };
    let translation = IptablesErrorPattern::match_error(&text);
    eprintln!("  {}", translation.user_message);
    for suggestion in &translation.suggestions {
        eprintln!("  - {suggestion}");
    }
}

fn sync_label(external: &ExternalSync) -> &'static str {
    match external {
        ExternalSync::Applied => "applied",
        ExternalSync::Skipped => "skipped",
        ExternalSync::Failed(_) => "failed",
    }
}

fn print_table(manager: &RuleManager<Iptables>) {
    let rules = manager.list_rules();
    if rules.is_empty() {
        println!("No rules configured");
        return;
    }

    let dash = || "-".to_string();
    println!(
        "{:<4} {:<7} {:<8} {:<18} {:<18} {:<11} {:<10} COMMENT",
        "ID", "ACTION", "PROTOCOL", "SOURCE", "DESTINATION", "PORT", "INTERFACE"
    );
    for rule in rules {
        println!(
            "{:<4} {:<7} {:<8} {:<18} {:<18} {:<11} {:<10} {}",
            rule.id,
            rule.action,
            rule.protocol.map_or_else(dash, |p| p.to_string()),
            rule.source.map_or_else(dash, |a| a.to_string()),
            rule.destination.map_or_else(dash, |a| a.to_string()),
            rule.port.map_or_else(dash, |p| p.to_string()),
            rule.interface
                .as_deref()
                .map_or_else(dash, |i| truncate_string(i, 10)),
            rule.comment
                .as_deref()
                .map_or_else(String::new, |c| truncate_string(c, 40)),
        );
    }
    println!("\n{} of {} rules", rules.len(), manager.store().capacity());
}

async fn handle_cli(cli: Cli) -> Result<()> {
    let mut session = Session::open(cli.config.as_deref(), cli.rules_file).await?;

    match cli.command {
        Commands::Add { rule } => {
            let added = session.manager.add_rule(&rule).await;
            let outcome = match added {
                Ok(added) => session.save().map(|()| added),
                Err(e) => Err(e),
            };
            let details = match &outcome {
                Ok(added) => json!({
                    "id": added.id,
                    "rule": rule,
                    "firewall": sync_label(&added.external),
                }),
                Err(_) => json!({ "rule": rule }),
            };
            session.audit(EventType::AddRule, details, &outcome).await;

            let added = outcome?;
            println!("Rule {} added", added.id);
            session.report(&added.external);
        }
        Commands::Remove { id } => {
            let removed = session.manager.remove_rule(id).await;
            let outcome = match removed {
                Ok(removed) => session.save().map(|()| removed),
                Err(e) => Err(e),
            };
            let details = match &outcome {
                Ok(removed) => json!({
                    "id": id,
                    "rule": removed.rule,
                    "firewall": sync_label(&removed.external),
                }),
                Err(_) => json!({ "id": id }),
            };
            session.audit(EventType::RemoveRule, details, &outcome).await;

            let removed = outcome?;
            println!("Rule {id} removed");
            session.report(&removed.external);
        }
        Commands::List { json } => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(session.manager.list_rules())?
                );
            } else {
                print_table(&session.manager);
            }
        }
        Commands::Status => {
            println!(
                "Stored rules: {} of {} ({})",
                session.manager.list_rules().len(),
                session.manager.store().capacity(),
                session.rules_file.display()
            );
            println!(
                "Firewall access: {}",
                if session.manager.has_authority() {
                    "yes"
                } else {
                    "no (not root)"
                }
            );
            println!();

            match session.manager.engine().status().await {
                Ok(listing) => print!("{listing}"),
                Err(e) => {
                    eprintln!("Could not read the live INPUT chain");
                    print_hints(&e);
                    return Err(e);
                }
            }
        }
        Commands::Flush => {
            let count = session.manager.list_rules().len();
            let external = session.manager.flush().await;
            let outcome = session.save();
            session
                .audit(
                    EventType::Flush,
                    json!({ "removed": count, "firewall": sync_label(&external) }),
                    &outcome,
                )
                .await;

            outcome?;
            println!("Flushed {count} rules");
            session.report(&external);
        }
        Commands::Save => {
            let outcome = session.save();
            let count = session.manager.list_rules().len();
            session
                .audit(
                    EventType::SaveRules,
                    json!({ "count": count, "path": session.rules_file }),
                    &outcome,
                )
                .await;

            outcome?;
            println!("Saved {count} rules to {}", session.rules_file.display());
        }
        Commands::Load => {
            let outcome = persist::load_rules(&session.rules_file)
                .map(|rules| session.manager.replace_rules(rules));
            session
                .audit(
                    EventType::LoadRules,
                    json!({ "path": session.rules_file }),
                    &outcome,
                )
                .await;

            let count = outcome?;
            println!("Loaded {count} rules from {}", session.rules_file.display());
        }
        Commands::Backup { file } => {
            let path = file.unwrap_or_else(|| persist::backup_path(&session.backup_dir));
            let outcome = utils::ensure_parent_dir(&path)
                .map_err(Error::from)
                .and_then(|()| persist::save_rules(&path, session.manager.list_rules()));
            session
                .audit(
                    EventType::Backup,
                    json!({ "path": path, "count": session.manager.list_rules().len() }),
                    &outcome,
                )
                .await;

            outcome?;
            println!("Backup written to {}", path.display());
        }
        Commands::Restore { file } => {
            let outcome = restore(&mut session, &file);
            session
                .audit(EventType::Restore, json!({ "path": file }), &outcome)
                .await;

            let count = outcome?;
            println!("Restored {count} rules from {}", file.display());
            println!("Note: the live firewall was not changed");
        }
    }

    Ok(())
}

/// Loads a backup into the store and makes it the current rules file.
fn restore(session: &mut Session, file: &Path) -> Result<usize> {
    if !file.is_file() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("backup file {} not found", file.display()),
        )));
    }

    let count = session.manager.replace_rules(persist::load_rules(file)?);
    session.save()?;
    Ok(count)
}
