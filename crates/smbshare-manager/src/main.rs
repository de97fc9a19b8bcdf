//! smbshare: administer Samba shares from the command line.
//!
//! The binary is a thin front end over
//! [`smbshare_manager::application::manage_shares::ShareManager`].  Every
//! subcommand maps to one manager operation; everything the manager does not
//! know about (argument parsing, output formatting, exit codes) lives here.
//!
//! # Usage
//!
//! ```text
//! smbshare [--config FILE] [--conf FILE] [--json] <COMMAND>
//!
//! Commands:
//!   list                         List managed shares
//!   show <NAME>                  Show one share
//!   add <NAME> <PATH>            Add a share [--read-only] [--comment C] [--user U]...
//!   update <OLD>                 Change a share [--name N] [--path P] [--writable BOOL]
//!                                [--comment C] [--user U]... [--clear-users]
//!   delete <NAME>                Remove a share
//!   users <NAME>                 Print the users allowed on a share
//!   set-users <NAME> [USER]...   Replace the users allowed on a share
//!   status                       Show the state of the service units
//!   restart                      Restart the service units
//!   backups                      List configuration backups, oldest first
//!   config                       Print the effective settings
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Description                               |
//! |-------------------|-------------------------------------------|
//! | `SMBSHARE_CONFIG` | Settings file (same as `--config`)        |
//! | `SMBSHARE_CONF`   | Share configuration file (`--conf`)       |
//! | `RUST_LOG`        | Log filter, overrides `[logging] level`   |
//!
//! # Exit codes
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | Failure; the share configuration was not changed         |
//! | 2    | Saved, but the service must be restarted manually        |

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use smbshare_core::{Share, ShareSpec};
use tracing_subscriber::EnvFilter;

use smbshare_manager::application::manage_shares::{MutationReceipt, ShareManager, ShareOpError};
use smbshare_manager::infrastructure::service::systemd::SystemdReconciler;
use smbshare_manager::infrastructure::storage::config::{
    load_config, resolve_config_path, ManagerConfig,
};
use smbshare_manager::infrastructure::storage::persister::{path_exists, ConfFileStore};

/// Exit status when the file was saved but the service did not restart.
const EXIT_NEEDS_RESTART: u8 = 2;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Administer managed Samba shares.
#[derive(Debug, Parser)]
#[command(
    name = "smbshare",
    about = "Add, change and remove Samba shares without disturbing the rest of smb.conf",
    version
)]
struct Cli {
    /// Settings file for smbshare itself.
    #[arg(long, global = true, env = "SMBSHARE_CONFIG")]
    config: Option<PathBuf>,

    /// Share configuration file to manage (overrides `[storage] conf_path`).
    #[arg(long, global = true, env = "SMBSHARE_CONF")]
    conf: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List managed shares.
    List,
    /// Show one share.
    Show { name: String },
    /// Add a share.
    Add {
        name: String,
        path: String,
        /// Export the share read-only.
        #[arg(long)]
        read_only: bool,
        #[arg(long, default_value = "")]
        comment: String,
        /// Allowed user; repeat for several.  No users means unrestricted.
        #[arg(long = "user")]
        users: Vec<String>,
    },
    /// Change an existing share.  Unspecified fields keep their value.
    Update {
        old_name: String,
        /// New share name.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        writable: Option<bool>,
        #[arg(long)]
        comment: Option<String>,
        /// Replacement user list; repeat for several.
        #[arg(long = "user")]
        users: Vec<String>,
        /// Remove every user restriction.
        #[arg(long, conflicts_with = "users")]
        clear_users: bool,
    },
    /// Remove a share.
    Delete { name: String },
    /// Print the users allowed on a share.
    Users { name: String },
    /// Replace the users allowed on a share.
    SetUsers { name: String, users: Vec<String> },
    /// Show the state of the service units.
    Status,
    /// Restart the service units.
    Restart,
    /// List configuration backups, oldest first.
    Backups,
    /// Print the effective settings.
    Config,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let settings = match load_config(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins when set; otherwise the configured level applies.  Logs
    // go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli, settings, config_path).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn build_manager(settings: &ManagerConfig, conf: Option<PathBuf>) -> anyhow::Result<ShareManager> {
    let mut storage = settings.storage.clone();
    if let Some(conf) = conf {
        storage.conf_path = conf;
    }
    let store = ConfFileStore::from_config(&storage).context("invalid [storage] settings")?;
    let reconciler = SystemdReconciler::from_config(&settings.service);
    Ok(
        ShareManager::new(Arc::new(store), Arc::new(reconciler), Arc::new(path_exists))
            .with_restart_timeout(settings.service.restart_timeout()),
    )
}

async fn run(cli: Cli, settings: ManagerConfig, config_path: PathBuf) -> anyhow::Result<ExitCode> {
    let json = cli.json;

    if let Command::Config = cli.command {
        if json {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        } else {
            println!("# {}", config_path.display());
            print!("{}", toml::to_string_pretty(&settings)?);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let manager = build_manager(&settings, cli.conf)?;

    match cli.command {
        Command::List => print_shares(&manager.list_shares()?, json)?,
        Command::Show { name } => match manager.get_share(&name)? {
            Some(share) => print_shares(std::slice::from_ref(&share), json)?,
            None => bail!("share {name:?} not found"),
        },
        Command::Add {
            name,
            path,
            read_only,
            comment,
            users,
        } => {
            let spec = ShareSpec::new(name, path)
                .with_writable(!read_only)
                .with_comment(comment)
                .with_users(users);
            return report_mutation(manager.add_share(spec).await, json);
        }
        Command::Update {
            old_name,
            name,
            path,
            writable,
            comment,
            users,
            clear_users,
        } => {
            let mut spec = match manager.get_share(&old_name)? {
                Some(share) => share.to_spec(),
                // The manager reports NotFound before looking at any field.
                None => ShareSpec::new(old_name.clone(), String::new()),
            };
            if let Some(name) = name {
                spec.name = name;
            }
            if let Some(path) = path {
                spec.path = path;
            }
            if let Some(writable) = writable {
                spec.writable = writable;
            }
            if let Some(comment) = comment {
                spec.comment = comment;
            }
            if clear_users {
                spec.valid_users.clear();
            } else if !users.is_empty() {
                spec.valid_users = users;
            }
            return report_mutation(manager.update_share(&old_name, spec).await, json);
        }
        Command::Delete { name } => {
            return report_mutation(manager.delete_share(&name).await, json);
        }
        Command::Users { name } => {
            let users = manager.get_share_users(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                for user in users {
                    println!("{user}");
                }
            }
        }
        Command::SetUsers { name, users } => {
            return report_mutation(manager.set_share_users(&name, users).await, json);
        }
        Command::Status => {
            let status = manager.service_status().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                for (unit, state) in &status {
                    println!("{unit}: {state}");
                }
            }
        }
        Command::Restart => {
            if !manager.restart_service().await {
                bail!("service restart failed");
            }
            if json {
                println!("{}", json!({ "status": "ok" }));
            }
        }
        Command::Backups => {
            let backups = manager.list_backups()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&backups)?);
            } else {
                for backup in backups {
                    println!("{}", backup.display());
                }
            }
        }
        Command::Config => unreachable!("handled before the manager is built"),
    }
    Ok(ExitCode::SUCCESS)
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_shares(shares: &[Share], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(shares)?);
        return Ok(());
    }
    for share in shares {
        let access = if share.writable { "rw" } else { "ro" };
        let users = if share.valid_users.is_empty() {
            "-".to_string()
        } else {
            share.valid_users.join(",")
        };
        println!("{}\t{}\t{access}\t{users}\t{}", share.name, share.path, share.comment);
    }
    Ok(())
}

/// Prints the outcome of a mutation and picks the exit code.
fn report_mutation(
    result: Result<MutationReceipt, ShareOpError>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    match result {
        Ok(receipt) => {
            if json {
                println!(
                    "{}",
                    json!({ "status": "ok", "backup": receipt.backup_path })
                );
            } else {
                println!("saved (backup: {})", receipt.backup_path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(ShareOpError::AppliedButNotReconciled {
            backup_path,
            reason,
        }) => {
            if json {
                println!(
                    "{}",
                    json!({
                        "status": "needs_restart",
                        "backup": backup_path,
                        "reason": reason.to_string(),
                    })
                );
            } else {
                println!("saved (backup: {})", backup_path.display());
                eprintln!("warning: the file-sharing service needs a manual restart: {reason}");
            }
            Ok(ExitCode::from(EXIT_NEEDS_RESTART))
        }
        Err(e) => {
            if json {
                println!(
                    "{}",
                    json!({ "status": "error", "kind": e.kind(), "message": e.to_string() })
                );
            }
            Err(e.into())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
