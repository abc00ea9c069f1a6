//! # Startup
//!
//! [`initialize`] turns a data directory into a running [`Engine`]:
//!
//! 1. Resolve the data directory (see [`data_dir`]).
//! 2. Load [`CartConfig`] from `cartsync.toml` there, falling back to defaults.
//! 3. Open the durable settings (`settings.json`) and the local documents directory.
//! 4. Assemble the engine over the filesystem backend and filesystem remote.
//! 5. Start the pending-sync queue: register the retry triggers and drain once for markers
//!    left by a previous session.
//!
//! ## Data Directory
//!
//! Resolved in priority order:
//! 1. An explicit override (the CLI's `--data`).
//! 2. `CARTSYNC_DATA`, primarily for tests.
//! 3. The OS-appropriate data directory (via the `directories` crate).

use crate::api::Engine;
use crate::config::CartConfig;
use crate::error::{CartError, Result};
use crate::pending::DrainReport;
use crate::remote::FsRemote;
use crate::settings::JsonKvStore;
use crate::store::backend::Handle;
use crate::store::fs_backend::FsBackend;
use crate::triggers::Notifier;
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const DATA_ENV: &str = "CARTSYNC_DATA";
pub const CONFIG_FILE: &str = "cartsync.toml";
pub const SETTINGS_FILE: &str = "settings.json";
pub const DOCUMENTS_DIR: &str = "documents";

pub struct CartContext {
    pub engine: Engine,
    pub config: CartConfig,
    pub data_dir: PathBuf,
    /// Fire when the network comes back.
    pub connectivity: Arc<Notifier>,
    /// Fire when the application returns to the foreground.
    pub foreground: Arc<Notifier>,
    pub startup_drain: Option<DrainReport>,
}

pub fn data_dir(data_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = data_override {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(DATA_ENV) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("com", "cartsync", "cartsync")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| CartError::Config("Could not determine data directory".to_string()))
}

pub fn load_config(data_dir: &Path) -> CartConfig {
    Clapfig::builder()
        .app_name("cartsync")
        .file_name(CONFIG_FILE)
        .search_paths(vec![SearchPath::Path(data_dir.to_path_buf())])
        .search_mode(SearchMode::Merge)
        .load()
        .unwrap_or_default()
}

pub fn initialize(data_override: Option<PathBuf>) -> Result<CartContext> {
    let data_dir = data_dir(data_override)?;
    let documents = data_dir.join(DOCUMENTS_DIR);
    fs::create_dir_all(&documents)?;

    let config = load_config(&data_dir);
    debug!(data_dir = %data_dir.display(), ttl_secs = config.cache_ttl_secs, "loaded config");

    let kv = Arc::new(JsonKvStore::open(data_dir.join(SETTINGS_FILE))?);
    let engine = Engine::new(
        Arc::new(FsBackend::new()),
        Arc::new(FsRemote::new()),
        kv,
        Handle::from_path(&documents),
        config.cache_ttl(),
    )?;

    let connectivity = Arc::new(Notifier::new());
    let foreground = Arc::new(Notifier::new());
    let startup_drain = engine.start(connectivity.as_ref(), foreground.as_ref());
    if let Some(report) = &startup_drain {
        if !report.skipped {
            info!(
                synced = report.synced.len(),
                failed = report.failed.len(),
                "retried pending syncs from previous session"
            );
        }
    }

    Ok(CartContext {
        engine,
        config,
        data_dir,
        connectivity,
        foreground,
        startup_drain,
    })
}
