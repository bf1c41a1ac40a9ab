//! vaultctl - admin CLI for the document vault
//!
//! Every command prints JSON on stdout; logs go to stderr (or the configured
//! log directory).

use clap::{Parser, Subcommand};
use doc_vault::monitoring::init_logging;
use doc_vault::{DocumentVault, PurgeConfirmation, VaultConfig};
use miette::{miette, IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "vaultctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (TOML or JSON); `DOC_VAULT__*` env vars override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Storage root override
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file in both tiers
    Store {
        /// File to upload
        path: PathBuf,
        #[arg(long)]
        owner: String,
        /// Document type tag
        #[arg(long = "type", default_value = "document")]
        type_tag: String,
        /// Override the recorded file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Read verified bytes, local tier first
    Read {
        id: String,
        /// Write here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Re-hash one document against its baseline digest
    Validate { id: String },
    /// Run a health scan
    Scan {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Recover one or more documents
    Recover {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Compare the catalog with both tiers
    Reconcile,
    /// Show audit history
    Audit {
        #[arg(long, default_value = "50")]
        limit: usize,
        /// Full history for one document
        #[arg(long)]
        document: Option<String>,
        /// Counts instead of records
        #[arg(long)]
        summary: bool,
    },
    /// List alerts
    Alerts {
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long)]
        unresolved: bool,
        /// Mark an alert resolved
        #[arg(long)]
        resolve: Option<String>,
    },
    /// Remove a catalog entry (requires catalog.allow_purge)
    Purge {
        id: String,
        /// Must repeat the id
        #[arg(long)]
        confirm: String,
        #[arg(long)]
        actor: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = VaultConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.storage.root = root;
    }
    let _log_guard = init_logging(&config.logging);

    info!("vaultctl v{}", env!("CARGO_PKG_VERSION"));
    let vault = DocumentVault::open(config).await?;

    match cli.command {
        Commands::Store {
            path,
            owner,
            type_tag,
            name,
        } => {
            let file_name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| miette!("{} has no file name", path.display()))?,
            };
            let bytes = tokio::fs::read(&path).await.into_diagnostic()?;
            let document = vault.store(&owner, &file_name, &type_tag, bytes).await?;
            print_json(&document)
        }
        Commands::Read { id, out } => {
            let bytes = vault.read_bytes(&id).await?;
            match out {
                Some(out) => {
                    tokio::fs::write(&out, &bytes).await.into_diagnostic()?;
                    print_json(&serde_json::json!({
                        "document_id": id,
                        "written_to": out,
                        "size_bytes": bytes.len(),
                    }))
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&bytes).into_diagnostic()
                }
            }
        }
        Commands::Validate { id } => print_json(&vault.validate(&id).await?),
        Commands::Scan { owner } => print_json(&vault.get_health_report(owner.as_deref()).await?),
        Commands::Recover { ids } => {
            if let [id] = ids.as_slice() {
                print_json(&vault.recover(id).await)
            } else {
                print_json(&vault.recover_many(&ids).await)
            }
        }
        Commands::Reconcile => print_json(&vault.reconcile().await?),
        Commands::Audit {
            limit,
            document,
            summary,
        } => {
            if summary {
                print_json(&vault.audit_summary().await?)
            } else if let Some(id) = document {
                print_json(&vault.get_audit_events_for(&id).await?)
            } else {
                print_json(&vault.get_recent_audit_events(limit).await?)
            }
        }
        Commands::Alerts {
            limit,
            unresolved,
            resolve,
        } => {
            if let Some(alert_id) = resolve {
                let resolved = vault.resolve_alert(&alert_id).await?;
                print_json(&serde_json::json!({ "alert_id": alert_id, "resolved": resolved }))
            } else if unresolved {
                print_json(&vault.unresolved_alerts().await?)
            } else {
                print_json(&vault.recent_alerts(limit).await?)
            }
        }
        Commands::Purge {
            id,
            confirm,
            actor,
            reason,
        } => {
            let confirmation = PurgeConfirmation {
                document_id: confirm,
                actor,
                reason,
            };
            vault.purge_document(&id, &confirmation).await?;
            print_json(&serde_json::json!({ "document_id": id, "purged": true }))
        }
    }
}
