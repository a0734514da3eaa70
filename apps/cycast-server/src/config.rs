//! Server configuration.
//!
//! Loads the sectioned YAML file (`server`, `buffer`, `playlist`,
//! `broadcaster`, `metadata`, `advanced`), applies environment variable
//! overrides, validates it, and converts it into the core library's
//! runtime-ready [`cycast_core::Config`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ServerSection {
    host: String,
    source_port: u16,
    listen_port: u16,
    source_password: String,
    mount_point: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            source_port: 8000,
            listen_port: 8001,
            source_password: "hackme".to_string(),
            mount_point: "/stream".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BufferSection {
    size_mb: usize,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self { size_mb: 20 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PlaylistSection {
    directory: String,
    shuffle: bool,
    extensions: Vec<String>,
}

impl Default for PlaylistSection {
    fn default() -> Self {
        Self {
            directory: "./music".to_string(),
            shuffle: true,
            extensions: vec![".mp3".to_string(), ".ogg".to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BroadcasterSection {
    chunk_size: usize,
}

impl Default for BroadcasterSection {
    fn default() -> Self {
        Self { chunk_size: 16384 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MetadataSection {
    station_name: String,
    station_description: String,
    station_genre: String,
    station_url: String,
    enable_icy: bool,
    icy_metaint: usize,
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            station_name: "Cycast Radio".to_string(),
            station_description: "High-performance internet radio".to_string(),
            station_genre: "Various".to_string(),
            station_url: "http://localhost:8001".to_string(),
            enable_icy: true,
            icy_metaint: 16000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AdvancedSection {
    max_listeners: usize,
    source_timeout: u64,
    enable_stats: bool,
}

impl Default for AdvancedSection {
    fn default() -> Self {
        Self {
            max_listeners: 0,
            source_timeout: 10,
            enable_stats: true,
        }
    }
}

/// YAML-shaped server configuration, sectioned to mirror the original
/// reference implementation's config layout.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    server: ServerSection,
    buffer: BufferSection,
    playlist: PlaylistSection,
    broadcaster: BroadcasterSection,
    metadata: MetadataSection,
    advanced: AdvancedSection,
}

impl ServerConfig {
    /// Loads configuration from a YAML file, or the built-in defaults if no
    /// path is given, then applies environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.warn_on_insecure_defaults();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CYCAST_BIND_HOST") {
            self.server.host = val;
        }
        if let Ok(Ok(val)) = std::env::var("CYCAST_SOURCE_PORT").map(|v| v.parse()) {
            self.server.source_port = val;
        }
        if let Ok(Ok(val)) = std::env::var("CYCAST_LISTEN_PORT").map(|v| v.parse()) {
            self.server.listen_port = val;
        }
        if let Ok(val) = std::env::var("CYCAST_SOURCE_PASSWORD") {
            self.server.source_password = val;
        }
        if let Ok(val) = std::env::var("CYCAST_PLAYLIST_DIR") {
            self.playlist.directory = val;
        }
        // CYCAST_LOG_LEVEL is consumed directly by clap's `env` attribute in main.rs.
    }

    fn warn_on_insecure_defaults(&self) {
        if self.server.source_password == "hackme" {
            log::warn!("using default source password 'hackme' - change this in production");
        }
    }

    /// Validates port ranges, distinctness, and buffer bounds before any
    /// socket is opened. Mirrors the reference implementation's checks.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.source_password.is_empty() {
            return Err("server.source_password is required".to_string());
        }
        if self.server.source_port == 0 {
            return Err(format!(
                "invalid server.source_port: {}",
                self.server.source_port
            ));
        }
        if self.server.listen_port == 0 {
            return Err(format!(
                "invalid server.listen_port: {}",
                self.server.listen_port
            ));
        }
        if self.server.source_port == self.server.listen_port {
            return Err("server.source_port and server.listen_port must be different".to_string());
        }
        if !(1..=1000).contains(&self.buffer.size_mb) {
            return Err(format!(
                "buffer.size_mb should be between 1 and 1000, got {}",
                self.buffer.size_mb
            ));
        }
        if !Path::new(&self.playlist.directory).exists() {
            log::warn!(
                "playlist directory {} does not exist",
                self.playlist.directory
            );
        }
        Ok(())
    }

    /// Converts to the core library's validated runtime `Config`.
    pub fn to_core_config(&self) -> cycast_core::Config {
        cycast_core::Config {
            bind_host: self.server.host.clone(),
            source_port: self.server.source_port,
            listen_port: self.server.listen_port,
            source_password: self.server.source_password.clone(),
            mount_point: self.server.mount_point.clone(),
            buffer_size_bytes: self.buffer.size_mb * 1024 * 1024,
            playlist_directory: self.playlist.directory.clone(),
            playlist_shuffle: self.playlist.shuffle,
            playlist_extensions: self.playlist.extensions.clone(),
            chunk_size: self.broadcaster.chunk_size,
            station_name: self.metadata.station_name.clone(),
            station_description: self.metadata.station_description.clone(),
            station_genre: self.metadata.station_genre.clone(),
            station_url: self.metadata.station_url.clone(),
            enable_icy: self.metadata.enable_icy,
            icy_metaint: self.metadata.icy_metaint,
            max_listeners: self.advanced.max_listeners,
            source_timeout_secs: self.advanced.source_timeout,
            enable_stats: self.advanced.enable_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_implementation() {
        let config = ServerConfig::default();
        assert_eq!(config.server.source_port, 8000);
        assert_eq!(config.server.listen_port, 8001);
        assert_eq!(config.server.mount_point, "/stream");
        assert_eq!(config.buffer.size_mb, 20);
        assert_eq!(config.broadcaster.chunk_size, 16384);
        assert_eq!(config.metadata.icy_metaint, 16000);
    }

    #[test]
    fn validate_rejects_empty_password() {
        let mut config = ServerConfig::default();
        config.server.source_password = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_matching_ports() {
        let mut config = ServerConfig::default();
        config.server.listen_port = config.server.source_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_buffer() {
        let mut config = ServerConfig::default();
        config.buffer.size_mb = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn to_core_config_converts_buffer_mb_to_bytes() {
        let config = ServerConfig::default();
        let core = config.to_core_config();
        assert_eq!(core.buffer_size_bytes, 20 * 1024 * 1024);
    }
}
