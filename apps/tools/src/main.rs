use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_config_from, normalize_database_url, DEFAULT_CONFIG_FILE},
    maintenance::Maintenance,
};
use serde_json::json;
use shared::domain::UserId;
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Overrides the configured database.
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    uid: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Move flat `users/{uid}/categories` into a new list.
    MigrateCategories {
        #[arg(long)]
        list_name: Option<String>,
    },
    AuditOrder {
        #[arg(long)]
        repair: bool,
    },
    Orphans {
        #[arg(long)]
        purge: bool,
    },
    /// Print every document of the user as JSON lines.
    Dump,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config_from(&cli.config, |key| std::env::var(key).ok())?;
    if let Some(url) = &cli.database_url {
        config.database_url = normalize_database_url(url);
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(std::io::stderr)
        .init();

    let storage = Storage::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open '{}'", config.database_url))?;
    let maintenance = Maintenance::new(storage, UserId::new(cli.uid.trim()))?;
    info!(uid = %maintenance.uid(), database_url = %config.database_url, "tools ready");

    match cli.command {
        Command::MigrateCategories { list_name } => {
            let list_name = list_name.unwrap_or(config.default_list_name);
            let report = maintenance.migrate_flat_categories(&list_name).await?;
            println!(
                "{}",
                json!({
                    "listId": report.list_id.as_ref().map(|id| id.as_str()),
                    "categories": report.categories,
                    "tasks": report.tasks,
                })
            );
        }
        Command::AuditOrder { repair } => {
            for scope in maintenance.audit_order().await? {
                println!(
                    "{}",
                    json!({
                        "collection": scope.collection.as_str(),
                        "siblings": scope.ids.len(),
                        "duplicates": scope.audit.duplicates,
                        "missing": scope.audit.missing,
                    })
                );
            }
            if repair {
                let repaired = maintenance.repair_order().await?;
                println!("repaired {} scope(s)", repaired.len());
            }
        }
        Command::Orphans { purge } => {
            for orphan in maintenance.find_orphans().await? {
                println!(
                    "{}",
                    json!({
                        "collection": orphan.collection.as_str(),
                        "missingParent": orphan.missing_parent.to_string(),
                        "documents": orphan.documents,
                    })
                );
            }
            if purge {
                let removed = maintenance.purge_orphans().await?;
                println!("purged {removed} document(s)");
            }
        }
        Command::Dump => {
            for doc in maintenance.dump().await? {
                println!(
                    "{}",
                    json!({
                        "path": doc.path.to_string(),
                        "createTime": doc.create_time.to_rfc3339(),
                        "updateTime": doc.update_time.to_rfc3339(),
                        "fields": doc.fields,
                    })
                );
            }
        }
    }

    Ok(())
}
