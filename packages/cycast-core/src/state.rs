//! Core application configuration.
//!
//! [`Config`] is the validated, runtime-ready configuration the dataplane is
//! built from. The binary crate's `ServerConfig` loads the YAML file and
//! environment overrides, then converts into this type.

use serde::{Deserialize, Serialize};

/// Validated configuration for the Cycast dataplane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to bind both the source and listener ports to.
    pub bind_host: String,
    /// Port the source ingester listens on.
    pub source_port: u16,
    /// Port the listener HTTP server (and status/API) listens on.
    pub listen_port: u16,
    /// Password required in the source's `Authorization: Basic` header.
    pub source_password: String,
    /// URL path the stream and status routes are served under.
    pub mount_point: String,

    /// RingBuffer capacity in bytes.
    pub buffer_size_bytes: usize,

    /// Directory scanned for playlist fallback files.
    pub playlist_directory: String,
    /// Whether to shuffle the playlist file order at load.
    pub playlist_shuffle: bool,
    /// File extensions (including the leading dot) eligible for playback.
    pub playlist_extensions: Vec<String>,

    /// Broadcaster fan-out chunk size in bytes.
    pub chunk_size: usize,

    /// Station name advertised via `icy-name` and the status page.
    pub station_name: String,
    /// Station description shown on the status page.
    pub station_description: String,
    /// Station genre advertised via `icy-genre` and the status page.
    pub station_genre: String,
    /// Station URL advertised via `icy-url`.
    pub station_url: String,
    /// Whether ICY in-band metadata is offered to listeners that request it.
    pub enable_icy: bool,
    /// Bytes of audio between ICY metadata blocks.
    pub icy_metaint: usize,

    /// Maximum concurrent listeners (0 = unlimited).
    pub max_listeners: usize,
    /// Receive timeout for an established source connection, in seconds.
    pub source_timeout_secs: u64,
    /// Whether `/api/stats` is served (`403` if disabled).
    pub enable_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            source_port: 8000,
            listen_port: 8001,
            source_password: "hackme".to_string(),
            mount_point: "/stream".to_string(),
            buffer_size_bytes: 20 * 1024 * 1024,
            playlist_directory: "./music".to_string(),
            playlist_shuffle: true,
            playlist_extensions: vec![".mp3".to_string(), ".ogg".to_string()],
            chunk_size: 16384,
            station_name: "Cycast Radio".to_string(),
            station_description: String::new(),
            station_genre: String::new(),
            station_url: String::new(),
            enable_icy: true,
            icy_metaint: 16000,
            max_listeners: 0,
            source_timeout_secs: 10,
            enable_stats: true,
        }
    }
}

impl Config {
    /// Validates port ranges, distinctness, buffer bounds, and required fields.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error if any check fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_password.is_empty() {
            return Err("server.source_password must not be empty".to_string());
        }
        if self.source_port == 0 {
            return Err("server.source_port must be in 1-65535".to_string());
        }
        if self.listen_port == 0 {
            return Err("server.listen_port must be in 1-65535".to_string());
        }
        if self.source_port == self.listen_port {
            return Err("server.source_port and server.listen_port must differ".to_string());
        }

        let buffer_mb = self.buffer_size_bytes / (1024 * 1024);
        if !(1..=1000).contains(&buffer_mb) {
            return Err("buffer.size_mb must be in 1-1000".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_password() {
        let mut config = Config::default();
        config.source_password = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_matching_ports() {
        let mut config = Config::default();
        config.listen_port = config.source_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_buffer() {
        let mut config = Config::default();
        config.buffer_size_bytes = 2000 * 1024 * 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_undersized_buffer() {
        let mut config = Config::default();
        config.buffer_size_bytes = 0;
        assert!(config.validate().is_err());
    }
}
