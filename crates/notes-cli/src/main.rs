//! notes-cli: Headless note cache synchronizer for a gateway.
//!
//! Loads the durable note cache, pulls one page from the gateway's note
//! listing, merges and persists the result, and prints it. Can also author
//! a note locally, which lands at the head of the cache without a fetch.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use notes_cli::gateway::GatewayFeed;
use notes_cli::storage::FileStorage;
use notes_core::{Note, NotePanel};

#[derive(Parser, Debug)]
#[command(name = "notes-cli")]
#[command(about = "Note cache synchronizer for gateway-anchored notes")]
struct Args {
    /// Directory holding the durable note cache
    #[arg(short, long)]
    data_dir: PathBuf,

    /// Base URL of the gateway
    #[arg(short, long, default_value = "http://localhost:3000")]
    gateway: String,

    /// List everything visible at the gateway instead of app-created notes
    #[arg(long)]
    all: bool,

    /// Author a note with the given text before syncing
    #[arg(long)]
    create: Option<String>,

    /// Skip the remote fetch and render the cache as-is
    #[arg(long)]
    offline: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

/// Mint a complete Note the way the input form would: fresh cid, current
/// time, gateway-derived locator.
fn author_note(gateway: &str, text: String) -> Note {
    let cid = uuid::Uuid::new_v4().to_string();
    let url = format!("{}/files/{}", gateway.trim_end_matches('/'), cid);
    Note {
        cid,
        text,
        url,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Minimal rendering collaborator: print the visible collection.
fn render(notes: &[Note]) {
    if notes.is_empty() {
        println!("No notes.");
        return;
    }
    for note in notes {
        println!("{}  {}  {}", note.created_at, note.cid, note.url);
        if !note.text.is_empty() {
            println!("    {}", note.text);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug
    // with --verbose)
    let default_filter = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Data dir: {:?}", args.data_dir);
    info!("Gateway: {}", args.gateway);

    let storage = FileStorage::new(args.data_dir.clone());
    let feed = GatewayFeed::new(args.gateway.clone());
    let mut panel = NotePanel::new(storage, feed);

    if let Some(text) = args.create {
        let note = author_note(&args.gateway, text);
        info!("Created note {}", note.cid);
        panel.on_created(note);
    }

    // The cache renders (and the fetch may start) only after the first
    // stable pass over local state.
    panel.hydrate();
    if args.all {
        panel.set_app_only(false);
    }

    if !args.offline {
        if panel.refresh().await {
            debug!("Merged remote page into the cache");
        } else {
            info!("No remote data this cycle, rendering cached notes");
        }
    }

    render(panel.visible_notes());
    Ok(())
}
