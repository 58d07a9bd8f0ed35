//! Configuration management for the fitting bridge
//!
//! This module provides runtime configuration loading from JSON files:
//! which engine library to load, how diagnostics are buffered, and where
//! the debug HTTP surface binds. Missing or malformed files fall back to
//! defaults so the bridge always starts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::VersionInfo;

/// Environment variable overriding [`EngineConfig::library_path`]
pub const LIBRARY_PATH_ENV: &str = "NAL2_LIBRARY_PATH";
/// Environment variable overriding [`HttpConfig::bind_addr`]
pub const HTTP_ADDR_ENV: &str = "NAL2_HTTP_ADDR";

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Fitting engine location and fallbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shared library to load the engine from
    pub library_path: String,
    /// Version reported when the engine has no version query
    pub fallback_version: VersionInfo,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library_path: "libnal2.so".to_string(),
            fallback_version: VersionInfo::default(),
        }
    }
}

/// Diagnostic sink buffering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Tag attached to facade log events
    pub tag: String,
    /// Number of events retained for snapshots
    pub history_capacity: usize,
    /// Live subscriber channel capacity
    pub broadcast_capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            tag: "Nal2Facade".to_string(),
            history_capacity: 256,
            broadcast_capacity: 128,
        }
    }
}

/// Debug HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Apply `NAL2_LIBRARY_PATH` / `NAL2_HTTP_ADDR` overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(LIBRARY_PATH_ENV).ok(),
            std::env::var(HTTP_ADDR_ENV).ok(),
        )
    }

    fn with_overrides(mut self, library_path: Option<String>, bind_addr: Option<String>) -> Self {
        if let Some(path) = library_path.filter(|path| !path.is_empty()) {
            log::info!("[Config] Engine library overridden: {}", path);
            self.engine.library_path = path;
        }
        if let Some(addr) = bind_addr.filter(|addr| !addr.is_empty()) {
            log::info!("[Config] HTTP bind address overridden: {}", addr);
            self.http.bind_addr = addr;
        }
        self
    }

    /// Load configuration on Android
    ///
    /// The engine library ships inside the APK and is resolved by name, so
    /// defaults are sufficient here.
    #[cfg(target_os = "android")]
    pub fn load_android() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load configuration for non-Android platforms
    #[cfg(not(target_os = "android"))]
    pub fn load() -> Self {
        Self::load_from_file("assets/nal2_config.json").with_env_overrides()
    }

    /// Load the configuration appropriate for the current platform
    pub fn load_platform() -> Self {
        #[cfg(target_os = "android")]
        {
            Self::load_android()
        }

        #[cfg(not(target_os = "android"))]
        {
            Self::load()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.engine.library_path, "libnal2.so");
        assert_eq!(config.engine.fallback_version, VersionInfo::new(2, 0));
        assert_eq!(config.diagnostics.tag, "Nal2Facade");
        assert_eq!(config.diagnostics.history_capacity, 256);
        assert_eq!(config.http.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: BridgeConfig =
            serde_json::from_str(r#"{ "engine": { "library_path": "/opt/nal2/libnal2.so" } }"#)
                .unwrap();

        assert_eq!(parsed.engine.library_path, "/opt/nal2/libnal2.so");
        assert_eq!(parsed.engine.fallback_version, VersionInfo::default());
        assert_eq!(parsed.diagnostics, DiagnosticsConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = BridgeConfig::load_from_file("does/not/exist.json");
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_overrides_ignore_empty_values() {
        let config = BridgeConfig::default()
            .with_overrides(Some("/tmp/libnal2.so".to_string()), Some(String::new()));
        assert_eq!(config.engine.library_path, "/tmp/libnal2.so");
        assert_eq!(config.http.bind_addr, "0.0.0.0:8080");
    }
}
