use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cart", bin_name = "cart", version)]
#[command(about = "Shared lists in plain CSV files, mirrored to a remote file", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// List to operate on (defaults to the configured default feature)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub feature: Option<String>,

    /// Data directory (defaults to $CARTSYNC_DATA or the OS data directory)
    #[arg(long, global = true, help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help_heading = "Options")]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the items in the list
    #[command(alias = "ls")]
    List {
        /// Pull from the remote first, if one is attached
        #[arg(long)]
        refresh: bool,

        /// Print items as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add an item
    Add(AddArgs),

    /// Remove items by id
    #[command(alias = "rm")]
    Remove {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Show where the list lives and how it syncs
    Info,

    /// Sum of all parseable prices
    Total,

    /// Mirror the list to a remote file, replacing the local copy with it
    Attach {
        /// Path or file:// URI of the remote file. Created if missing.
        uri: String,

        /// Display name for the remote
        #[arg(long)]
        name: Option<String>,
    },

    /// Stop mirroring. The local file is kept.
    Detach,

    /// Retry pushing every list whose remote is behind
    Sync,

    /// Choose the directory holding the list file
    Location {
        #[command(subcommand)]
        action: LocationCommands,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Item name
    pub name: String,

    #[arg(short, long)]
    pub qty: Option<String>,

    #[arg(short, long)]
    pub store: Option<String>,

    #[arg(short, long)]
    pub price: Option<String>,

    /// Who added it
    #[arg(short, long)]
    pub by: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum LocationCommands {
    /// Keep the list file in this directory from now on
    Set { dir: String },
    /// Go back to the default data directory
    Clear,
}
