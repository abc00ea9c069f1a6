//! # Cartsync Architecture
//!
//! Cartsync keeps small lists (a shopping list, a chores list, ...) as plain CSV files and
//! optionally mirrors each one to a remote file. It is a library first; the `cart` binary is
//! one client of it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Engine: wires components once per process                │
//! │  - ListApi: per-feature facade used by every UI             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Sync Layer (mirror.rs, pending.rs, triggers.rs)            │
//! │  - Whole-file pull/push against a remote handle             │
//! │  - Durable set of features whose remote is behind           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/, location.rs, codec.rs, settings.rs) │
//! │  - RecordStore: decoded records + TTL cache                 │
//! │  - LocationResolver: which file backs a feature             │
//! │  - StorageBackend: FsBackend (production), MemBackend       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: Local First
//!
//! A write succeeds when the local file is written. Mirroring happens afterwards and its
//! failures never reach the caller as errors: the feature is marked pending and retried
//! when connectivity returns, when the app comes to the foreground, or at the next start.
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! Nothing in this crate writes to stdout/stderr or exits the process. Diagnostics go
//! through `tracing`; the binary decides where they end up.
//!
//! ## Module Overview
//!
//! - [`api`]: Engine and per-feature facade
//! - [`codec`]: CSV row and file encoding
//! - [`config`]: `cartsync.toml` settings
//! - [`error`]: Error types
//! - [`init`]: Data directory resolution and startup
//! - [`location`]: Feature → file resolution, including provider-backed directories
//! - [`mirror`]: Remote pull/push, attach and detach
//! - [`model`]: Core data types (`Record`, `Feature`, `SyncMode`)
//! - [`pending`]: Pending-sync queue
//! - [`remote`]: Remote file capability and picker
//! - [`settings`]: Durable key-value settings
//! - [`store`]: Storage backends and the record store
//! - [`triggers`]: Wake-up event sources

pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod init;
pub mod location;
pub mod mirror;
pub mod model;
pub mod pending;
pub mod remote;
pub mod settings;
pub mod store;
pub mod triggers;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
