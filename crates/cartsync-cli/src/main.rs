//! # Cart CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, this file only invokes
//! `cli::run()` and handles process termination.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/cartsync-cli/src/cli/)                   │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Context wiring + dispatch (commands.rs)                  │
//! │  - Plain-text rendering (render.rs)                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (crates/cartsync/src/api.rs)                     │
//! │  - One ListApi per feature                                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Testing Approach
//!
//! - Argument parsing and rendering: unit tests next to the code.
//! - End to end: `tests/cli_e2e.rs` runs the binary against a temporary data directory.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
