//! Aviary command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use aviary::{AppConfig, Aviary, BirdStore, BirdUpdate, ConsoleNotifier, NewBird};
use aviary_store::LoadOutcome;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "aviary")]
#[command(about = "Track bird sightings")]
struct Args {
	/// Config file (defaults to the platform config dir)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Load and print every bird
	List,
	/// Reload from disk and refresh the export
	Reload,
	/// Record a new bird
	Add {
		name: String,
		species: String,
		#[arg(long)]
		notes: Option<String>,
		/// RFC 3339 timestamp of the sighting
		#[arg(long, value_name = "WHEN")]
		sighted: Option<DateTime<Utc>>,
	},
	/// Change fields of an existing bird
	Update {
		id: Uuid,
		#[arg(long)]
		name: Option<String>,
		#[arg(long)]
		species: Option<String>,
		#[arg(long)]
		notes: Option<String>,
		#[arg(long, value_name = "WHEN")]
		sighted: Option<DateTime<Utc>>,
	},
	/// Remove a bird
	Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let default_level = if args.verbose { "debug" } else { "info" };
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
		.init();

	let config = AppConfig::resolve(args.config.as_deref())?;
	let aviary = Aviary::open(&config, Arc::new(ConsoleNotifier)).context("cannot start owner thread")?;

	let cancel = CancellationToken::new();
	tokio::spawn({
		let cancel = cancel.clone();
		async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::info!("aviary.interrupted");
				cancel.cancel();
			}
		}
	});

	let result = run(args.command, aviary.store(), &cancel).await;
	aviary.shutdown().await;
	result
}

async fn run(command: Command, store: &BirdStore, cancel: &CancellationToken) -> anyhow::Result<()> {
	match command {
		Command::List => {
			ensure_loaded(store.reload(cancel).await)?;
			for bird in store.collection().snapshot().iter() {
				println!("{}  {bird}", bird.id);
			}
		}
		Command::Reload => {
			ensure_loaded(store.reload(cancel).await)?;
		}
		Command::Add {
			name,
			species,
			notes,
			sighted,
		} => {
			let request = NewBird {
				notes,
				sighted_at: sighted,
				..NewBird::new(name, species)
			};
			let bird = store.add(request, cancel).await?;
			println!("{}  {bird}", bird.id);
		}
		Command::Update {
			id,
			name,
			species,
			notes,
			sighted,
		} => {
			let request = BirdUpdate {
				name,
				species,
				notes,
				sighted_at: sighted,
				..BirdUpdate::new(id)
			};
			let bird = store.update(request, cancel).await?;
			println!("{}  {bird}", bird.id);
		}
		Command::Delete { id } => {
			store.delete(id, cancel).await?;
		}
	}
	Ok(())
}

fn ensure_loaded(outcome: LoadOutcome) -> anyhow::Result<()> {
	match outcome {
		LoadOutcome::Loaded { .. } => Ok(()),
		LoadOutcome::Failed { error, .. } => bail!("cannot load birds: {error}"),
		LoadOutcome::Cancelled => bail!("interrupted"),
	}
}
