use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lead_scribe::adapters::services::llm::ProviderKind;
use lead_scribe::app::{open_storage, AppState};
use lead_scribe::domain::insights::AggregateInput;
use lead_scribe::domain::models::{BatchMode, Meeting};
use lead_scribe::ports::storage::StoragePort;
use lead_scribe::services::InsightsCache;
use lead_scribe::utils::keychain::{KeychainManager, KeychainPort};
use lead_scribe::PipelineConfig;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lead-scribe")]
#[command(about = "Structured fact extraction from sales-meeting transcripts")]
#[command(version)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "LEAD_SCRIBE_DB")]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store one transcript as a new meeting
    Ingest {
        #[arg(long)]
        client: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        seller: Option<String>,
        /// Meeting date as written in the source (e.g., 2024-03-18)
        #[arg(long)]
        date: Option<String>,
        /// The deal closed
        #[arg(long)]
        closed: bool,
        /// Plain-text transcript file
        #[arg(long)]
        file: PathBuf,
    },
    /// Run extraction for one meeting
    Extract { meeting_id: i64 },
    /// Run extraction for every selected meeting
    Batch {
        /// pending, pending-and-failed or only-failed
        #[arg(long, default_value = "pending")]
        mode: String,
        /// Meetings per wave (overrides LEAD_SCRIBE_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Generate insights for an aggregate snapshot (JSON file)
    Insights {
        #[arg(long)]
        input: PathBuf,
        /// Use only the rule-based generator
        #[arg(long)]
        no_llm: bool,
    },
    /// Manage provider API keys in the OS keychain
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Save a provider's API key
    Set { provider: String, api_key: String },
    /// Show whether a key is stored (masked)
    Status { provider: String },
    /// Delete a provider's API key
    Delete { provider: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Show only the last 4 characters of a key
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 4 {
        format!("...{}", chars[chars.len() - 4..].iter().collect::<String>())
    } else {
        "...".to_string()
    }
}

fn key_command(action: KeyAction) -> Result<()> {
    let keychain = KeychainManager::new();
    match action {
        KeyAction::Set { provider, api_key } => {
            let kind: ProviderKind = provider.parse()?;
            keychain.save_api_key(kind.as_str(), api_key.trim())?;
            println!("Saved API key for {}", kind);
        }
        KeyAction::Status { provider } => {
            let kind: ProviderKind = provider.parse()?;
            match keychain.get_api_key(kind.as_str()) {
                Ok(key) => println!("{}: {}", kind, mask(&key)),
                Err(_) => println!("{}: no key stored", kind),
            }
        }
        KeyAction::Delete { provider } => {
            let kind: ProviderKind = provider.parse()?;
            keychain.delete_api_key(kind.as_str())?;
            println!("Deleted API key for {}", kind);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = PipelineConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Command::Ingest {
            client,
            email,
            seller,
            date,
            closed,
            file,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read transcript {}", file.display()))?;
            if text.trim().is_empty() {
                anyhow::bail!("Transcript {} is empty", file.display());
            }

            let mut meeting = Meeting::new(client, text)
                .with_seller(seller)
                .with_closed(closed);
            meeting.client_email = email;
            meeting.meeting_date = date;

            let storage = open_storage(&config)?;
            let id = storage.create_meeting(&meeting).await?;
            println!("{}", id);
        }
        Command::Extract { meeting_id } => {
            let state = AppState::initialize(config, &KeychainManager::new())?;
            let outcome = state.extraction.run_extraction(meeting_id).await?;
            print_json(&outcome)?;
        }
        Command::Batch { mode, concurrency } => {
            let mode: BatchMode = mode.parse()?;
            if let Some(n) = concurrency {
                config.concurrency = n.max(1);
            }
            let state = AppState::initialize(config, &KeychainManager::new())?;
            let result = state.batch.run_batch(mode).await?;
            print_json(&result)?;
        }
        Command::Insights { input, no_llm } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let aggregates: AggregateInput = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid aggregate JSON in {}", input.display()))?;

            let result = if no_llm {
                InsightsCache::new(None)
                    .get_insights(&aggregates, false)
                    .await
            } else {
                let state = AppState::initialize(config, &KeychainManager::new())?;
                state.insights.get_insights(&aggregates, true).await
            };
            print_json(&result)?;
        }
        Command::Key { action } => key_command(action)?,
    }

    Ok(())
}
