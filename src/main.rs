use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;

use docamy_lib::commands::{self, AppContext};
use docamy_lib::config::Settings;

#[derive(Parser)]
#[command(name = "docamy")]
#[command(about = "DocAmy local state store and Tavus consultation client")]
#[command(
    after_help = "Environment:\n  DOCAMY_DATA_DIR          Data directory\n  DOCAMY_STORAGE_BACKEND   file | redb\n  TAVUS_API_BASE           Remote API base URL\n  TAVUS_API_KEY            Remote API key (overrides the stored key)\n  RUST_LOG                 Log filter"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Storage summary
    Info,
    /// Full stored state (API key masked)
    Show,
    /// Write a snapshot file
    Export {
        /// Output path (default: tavus-app-data-<date>.json in the current directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace the stored state with a snapshot file
    Import { path: PathBuf },
    /// Remove all stored data
    Clear {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// List stored conversations
    Conversations,
    /// List retained messages of a conversation
    Messages { conversation_id: String },
    /// Delete a conversation and its messages locally
    Delete { conversation_id: String },
    /// Apply a JSON preferences patch, e.g. '{"theme":"dark"}'
    Preferences { patch: String },
    /// Apply a JSON Tavus settings patch, e.g. '{"apiKey":"..."}'
    Tavus { patch: String },
    /// Check the remote API key
    Ping,
    /// List remote replicas
    Replicas,
    /// List remote personas
    Personas,
    /// Run a consultation: start, send each message, end
    Consult {
        #[arg(long, default_value = "Consultation")]
        name: String,
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Delete a conversation remotely and locally
    Discard { conversation_id: String },
    /// Parse and log a saved webhook payload
    Webhook { path: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    // Webhook payloads never touch the store
    if let Commands::Webhook { path } = &cli.command {
        return print_json(&commands::handle_webhook(path)?);
    }

    let settings = Settings::from_env().map_err(|e| e.to_string())?;
    let ctx = AppContext::open(settings)?;
    let store = &ctx.store;

    match cli.command {
        Commands::Info => print_json(&commands::storage_info(store)),
        Commands::Show => print_json(&commands::show_state(store)),
        Commands::Export { output } => {
            let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
            let path = commands::export_state(store, output, &cwd)?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Import { path } => {
            if commands::import_state(store, &path)? {
                print_json(&commands::storage_info(store))
            } else {
                Err(format!("{} is not a valid snapshot", path.display()))
            }
        }
        Commands::Clear { yes } => {
            if !yes {
                return Err("Refusing to clear all data without --yes".to_string());
            }
            commands::clear_state(store)?;
            print_json(&commands::storage_info(store))
        }
        Commands::Conversations => print_json(&commands::list_conversations(store)),
        Commands::Messages { conversation_id } => {
            print_json(&commands::list_messages(store, &conversation_id))
        }
        Commands::Delete { conversation_id } => {
            commands::delete_conversation(store, &conversation_id)
        }
        Commands::Preferences { patch } => {
            print_json(&commands::update_preferences(store, &patch)?)
        }
        Commands::Tavus { patch } => {
            commands::update_tavus_settings(store, &patch)?;
            print_json(&commands::storage_info(store))
        }
        Commands::Ping => {
            let client = commands::create_client(&ctx.settings, store)?;
            if commands::test_connection(&client).await {
                println!("ok");
                Ok(())
            } else {
                Err(format!("Cannot reach {}", client.base_url()))
            }
        }
        Commands::Replicas => {
            let client = commands::create_client(&ctx.settings, store)?;
            print_json(&commands::list_replicas(&client).await?)
        }
        Commands::Personas => {
            let client = commands::create_client(&ctx.settings, store)?;
            print_json(&commands::list_personas(&client).await?)
        }
        Commands::Consult { name, messages } => {
            let client = commands::create_client(&ctx.settings, store)?;
            let transcript = commands::run_consultation(&client, store, &name, &messages).await?;
            print_json(&transcript)
        }
        Commands::Discard { conversation_id } => {
            let client = commands::create_client(&ctx.settings, store)?;
            commands::discard_conversation(&client, store, &conversation_id).await
        }
        // Handled before the store is opened
        Commands::Webhook { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    docamy_lib::init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
