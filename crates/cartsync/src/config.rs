//! # Configuration
//!
//! Managed by [`clapfig`]: layered loading from `cartsync.toml` and environment variables.
//!
//! ## Storage Hierarchy
//!
//! 1. **Environment variables**: `CARTSYNC__CACHE_TTL_SECS`, `CARTSYNC__DEFAULT_FEATURE`.
//! 2. **Data-dir config**: `<data dir>/cartsync.toml`.
//! 3. **Compiled defaults**: via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `cache_ttl_secs` | `30` | How long decoded records are served from memory |
//! | `default_feature` | `shopping_list` | List used when no `--feature` is given |
//!
//! Per-feature state (locations, remotes, pending syncs) is not configuration; it lives in
//! the durable settings store, see [`crate::settings`].

use crate::error::Result;
use crate::model::Feature;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration stored in `cartsync.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CartConfig {
    /// Seconds a feature's records are served from cache before the file is re-read.
    #[config(default = 30)]
    pub cache_ttl_secs: u64,

    /// Feature to operate on when none is named.
    #[config(default = "shopping_list")]
    pub default_feature: String,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30,
            default_feature: Feature::SHOPPING_LIST.to_string(),
        }
    }
}

impl CartConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The configured default feature; blank falls back to the shopping list.
    pub fn default_feature(&self) -> Result<Feature> {
        if self.default_feature.trim().is_empty() {
            Ok(Feature::shopping_list())
        } else {
            Feature::parse(&self.default_feature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CartConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.default_feature().unwrap(), Feature::shopping_list());
    }

    #[test]
    fn test_blank_default_feature_falls_back() {
        let config = CartConfig {
            default_feature: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.default_feature().unwrap(), Feature::shopping_list());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CartConfig = toml::from_str("cache_ttl_secs = 5").unwrap();
        assert_eq!(config.cache_ttl_secs, 5);
        assert_eq!(config.default_feature, "shopping_list");
    }

    #[test]
    fn test_custom_feature() {
        let config: CartConfig = toml::from_str("default_feature = \"chores\"").unwrap();
        assert_eq!(config.default_feature().unwrap(), Feature::new("chores"));
    }

    #[test]
    fn test_path_like_default_feature_is_rejected() {
        let config: CartConfig = toml::from_str("default_feature = \"../outside\"").unwrap();
        assert!(config.default_feature().is_err());
    }
}
