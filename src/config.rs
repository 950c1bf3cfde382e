//! Configuration management for the session-keeper demo server.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::codec::{Base64Codec, BinaryCodec, JsonCodec};
use crate::provider::{FileProvider, MemoryProvider, Provider, DEFAULT_FILE_SUFFIX};
use crate::session::{
    Expiration, SameSite, SessionConfig, DEFAULT_BROWSER_SESSION_TTL, DEFAULT_COOKIE_NAME,
    DEFAULT_EXPIRATION, DEFAULT_GC_LIFETIME, DEFAULT_ID_LENGTH, DEFAULT_POOL_SIZE,
};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session cookie and id settings.
    pub session: SessionSection,
    /// Background GC settings.
    pub gc: GcSection,
    /// Storage backend.
    pub provider: ProviderSection,
    /// Server configuration.
    pub server: ServerSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Session configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub cookie_name: String,
    pub domain: String,
    /// Lifetime in seconds: 0 never expires, negative lasts until the
    /// browser closes.
    pub expiration_secs: i64,
    pub secure: bool,
    pub same_site: SameSite,
    pub id_in_http_header: bool,
    pub http_header_name: String,
    pub id_in_url_query: bool,
    pub url_query_name: String,
    pub id_length: usize,
    pub codec: CodecKind,
    pub pool_size: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            domain: String::new(),
            expiration_secs: DEFAULT_EXPIRATION.as_secs() as i64,
            secure: true,
            same_site: SameSite::default(),
            id_in_http_header: false,
            http_header_name: DEFAULT_COOKIE_NAME.to_string(),
            id_in_url_query: false,
            url_query_name: DEFAULT_COOKIE_NAME.to_string(),
            id_length: DEFAULT_ID_LENGTH,
            codec: CodecKind::default(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// GC configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcSection {
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Server-side lifetime of browser-session records, in seconds.
    pub browser_session_ttl_secs: u64,
}

impl Default for GcSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_GC_LIFETIME.as_secs(),
            browser_session_ttl_secs: DEFAULT_BROWSER_SESSION_TTL.as_secs(),
        }
    }
}

/// Storage backend section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub kind: ProviderKind,
    /// Root directory of the file backend.
    pub path: Option<PathBuf>,
    /// File name suffix of the file backend.
    pub suffix: String,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            path: None,
            suffix: DEFAULT_FILE_SUFFIX.to_string(),
        }
    }
}

/// Available storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Memory,
    File,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(other.to_string()),
        }
    }
}

/// Available payload codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Binary,
    Base64,
    Json,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Requests reach the server over TLS terminated in front of it.
    pub behind_tls: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            behind_tls: false,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("SESSION_KEEPER_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("SESSION_KEEPER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(kind) = std::env::var("SESSION_KEEPER_PROVIDER") {
            if let Ok(kind) = kind.parse() {
                self.provider.kind = kind;
            }
        }

        if let Ok(path) = std::env::var("SESSION_KEEPER_PATH") {
            if !path.is_empty() {
                self.provider.path = Some(PathBuf::from(path));
            }
        }

        if let Ok(name) = std::env::var("SESSION_KEEPER_COOKIE_NAME") {
            if !name.is_empty() {
                self.session.cookie_name = name;
            }
        }

        if let Ok(secs) = std::env::var("SESSION_KEEPER_EXPIRATION") {
            if let Ok(secs) = secs.parse() {
                self.session.expiration_secs = secs;
            }
        }

        if let Ok(level) = std::env::var("SESSION_KEEPER_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(kind) = args.provider {
            self.provider.kind = kind;
        }
        if let Some(ref path) = args.path {
            self.provider.path = Some(path.clone());
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to the runtime [`SessionConfig`].
    pub fn to_session_config(&self) -> SessionConfig {
        let s = &self.session;
        let config = SessionConfig {
            cookie_name: s.cookie_name.clone(),
            domain: s.domain.clone(),
            expiration: Expiration::from_secs(s.expiration_secs),
            gc_lifetime: Duration::from_secs(self.gc.interval_secs),
            secure: s.secure,
            same_site: s.same_site,
            id_in_http_header: s.id_in_http_header,
            http_header_name: s.http_header_name.clone(),
            id_in_url_query: s.id_in_url_query,
            url_query_name: s.url_query_name.clone(),
            id_length: s.id_length,
            browser_session_ttl: Duration::from_secs(self.gc.browser_session_ttl_secs),
            pool_size: s.pool_size,
            ..SessionConfig::default()
        };

        let config = match s.codec {
            CodecKind::Binary => config.with_codec(BinaryCodec),
            CodecKind::Base64 => config.with_codec(Base64Codec),
            CodecKind::Json => config.with_codec(JsonCodec),
        };
        config.normalized()
    }

    /// Create the configured storage backend.
    pub fn build_provider(&self) -> Result<Arc<dyn Provider>, ConfigError> {
        match self.provider.kind {
            ProviderKind::Memory => Ok(Arc::new(MemoryProvider::new())),
            ProviderKind::File => {
                let path = self
                    .provider
                    .path
                    .as_ref()
                    .ok_or(ConfigError::MissingProviderPath)?;
                let provider = FileProvider::new(path)
                    .map_err(ConfigError::Io)?
                    .with_suffix(self.provider.suffix.clone());
                Ok(Arc::new(provider))
            }
        }
    }

    /// Socket address to listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;
        Ok(SocketAddr::new(host, self.server.port))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file or preparing storage.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// The file backend was selected without a directory.
    MissingProviderPath,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::MissingProviderPath => write!(f, "file provider requires a path"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.cookie_name, "sessionid");
        assert_eq!(config.session.expiration_secs, 7200);
        assert_eq!(config.gc.interval_secs, 60);
        assert_eq!(config.provider.kind, ProviderKind::Memory);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "session": {
                "cookie_name": "sid",
                "expiration_secs": -1,
                "same_site": "strict",
                "codec": "json"
            },
            "gc": { "interval_secs": 5 },
            "provider": { "kind": "file", "path": "/tmp/sessions" },
            "server": { "host": "0.0.0.0", "port": 8080 }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.same_site, SameSite::Strict);
        assert_eq!(config.session.codec, CodecKind::Json);
        assert_eq!(config.provider.kind, ProviderKind::File);
        assert_eq!(config.provider.path, Some(PathBuf::from("/tmp/sessions")));

        let session = config.to_session_config();
        assert_eq!(session.cookie_name, "sid");
        assert_eq!(session.expiration, Expiration::Browser);
        assert_eq!(session.gc_lifetime, Duration::from_secs(5));
        assert_eq!(session.codec.name(), "json");
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "server": { "port": 9000 } }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.session.cookie_name, "sessionid");
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            host: Some("192.168.1.1".parse().unwrap()),
            port: Some(5000),
            provider: Some(ProviderKind::File),
            path: Some(PathBuf::from("/var/sessions")),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.provider.kind, ProviderKind::File);
        assert_eq!(config.provider.path, Some(PathBuf::from("/var/sessions")));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_unset_args_keep_config() {
        let mut config = Config::default();
        config.server.port = 4321;
        config.apply_args(&Args::default());
        assert_eq!(config.server.port, 4321);
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_host() {
        let mut config = Config::default();
        config.server.host = "not-an-ip".to_string();

        let result = config.socket_addr();
        assert!(matches!(result, Err(ConfigError::InvalidHost(_))));
    }

    #[test]
    fn test_build_memory_provider() {
        let provider = Config::default().build_provider().unwrap();
        assert_eq!(provider.name(), "memory");
    }

    #[test]
    fn test_build_file_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.provider.kind = ProviderKind::File;
        assert!(matches!(
            config.build_provider(),
            Err(ConfigError::MissingProviderPath)
        ));

        config.provider.path = Some(dir.path().join("store"));
        let provider = config.build_provider().unwrap();
        assert_eq!(provider.name(), "file");
        assert!(dir.path().join("store").is_dir());
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("memory".parse::<ProviderKind>(), Ok(ProviderKind::Memory));
        assert_eq!("FILE".parse::<ProviderKind>(), Ok(ProviderKind::File));
        assert!("redis".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"cookie_name\""));
        assert!(json.contains("\"memory\""));
        assert!(json.contains("\"port\""));
    }
}
