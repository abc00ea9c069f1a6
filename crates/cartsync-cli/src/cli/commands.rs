//! # CLI Layer
//!
//! One client of the cartsync library. This is the only place that knows about stdout,
//! stderr and exit codes.
//!
//! 1. **Argument parsing**: clap, see `setup.rs`.
//! 2. **Logging**: `tracing` events from the library go to stderr, filtered by `-v` or
//!    `RUST_LOG`.
//! 3. **Context**: [`initialize`] builds the engine and drains syncs left pending by a
//!    previous run before any command executes.
//! 4. **Dispatch + rendering**: each command calls one [`ListApi`] method and prints the
//!    rendered result.

use super::render;
use super::setup::{AddArgs, Cli, Commands, LocationCommands};
use anyhow::{Context, Result};
use cartsync::api::ListApi;
use cartsync::codec;
use cartsync::init::initialize;
use cartsync::model::{Feature, PickedRemote, Record, SyncMode};
use clap::Parser;
use std::fs;
use std::path::Path;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = initialize(cli.data.clone()).context("could not start cartsync")?;
    let feature = match cli.feature.as_deref() {
        Some(name) => Feature::parse(name)?,
        None => ctx.config.default_feature()?,
    };
    let list = ctx.engine.list(feature);
    tracing::debug!(feature = %list.feature(), data_dir = %ctx.data_dir.display(), "dispatching");

    print!("{}", dispatch(cli.command, &list)?);
    Ok(())
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn dispatch(command: Commands, list: &ListApi) -> Result<String> {
    match command {
        Commands::List { refresh, json } => {
            let (records, note) = if refresh {
                let refreshed = list.refresh()?;
                let note = render::render_refresh_note(&refreshed);
                (refreshed.records, note)
            } else {
                (list.read_all(false)?, None)
            };
            if let Some(note) = note {
                eprint!("{note}");
            }
            if json {
                Ok(format!("{}\n", serde_json::to_string_pretty(&records)?))
            } else {
                Ok(render::render_list(&records))
            }
        }
        Commands::Add(args) => add(list, args),
        Commands::Remove { ids } => {
            let outcome = list.remove_by_ids(&ids)?;
            Ok(render::render_write("Removed", outcome))
        }
        Commands::Info => {
            let info = list.file_info()?;
            let remote = list.remote()?;
            let mode = if list.is_mirrored()? {
                SyncMode::Mirrored
            } else {
                SyncMode::Local
            };
            Ok(render::render_info(
                &info,
                remote.as_ref(),
                mode,
                list.is_pending(),
            ))
        }
        Commands::Total => Ok(render::render_total(list.total_price()?)),
        Commands::Attach { uri, name } => {
            let picked = prepare_remote(&uri, name)?;
            list.attach_remote(&picked)
                .with_context(|| format!("could not attach {uri}"))?;
            Ok(format!(
                "Attached {} to {}.\n",
                list.feature(),
                picked.display_name
            ))
        }
        Commands::Detach => {
            list.detach_remote()?;
            Ok(format!("Detached {}.\n", list.feature()))
        }
        Commands::Sync => Ok(render::render_drain(&list.sync_now())),
        Commands::Location { action } => match action {
            LocationCommands::Set { dir } => {
                list.set_location(&dir)?;
                Ok(format!("{} now lives in {dir}.\n", list.feature()))
            }
            LocationCommands::Clear => {
                list.clear_location()?;
                Ok(format!("{} is back in the default location.\n", list.feature()))
            }
        },
    }
}

fn add(list: &ListApi, args: AddArgs) -> Result<String> {
    let mut record = Record::new(args.name);
    if let Some(qty) = args.qty {
        record = record.quantity(qty);
    }
    if let Some(store) = args.store {
        record = record.store(store);
    }
    if let Some(price) = args.price {
        record = record.price(price);
    }
    if let Some(by) = args.by {
        record = record.added_by(by);
    }
    let action = format!("Added {} ({})", record.name, record.id);
    let outcome = list.append(record)?;
    Ok(render::render_write(&action, outcome))
}

/// The CLI stands in for a document picker: it accepts a path or `file://` URI and creates
/// an empty list there if nothing exists yet.
fn prepare_remote(uri: &str, name: Option<String>) -> Result<PickedRemote> {
    let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
    if !path.exists() {
        fs::write(path, codec::header_line())
            .with_context(|| format!("could not create remote file {}", path.display()))?;
    }
    let display_name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| uri.to_string())
    });
    Ok(PickedRemote::new(uri, display_name))
}
