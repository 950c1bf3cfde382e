//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use session_keeper::cli::{parse_args_from, Args};
use session_keeper::config::{CodecKind, Config, ProviderKind};
use session_keeper::{Expiration, SameSite};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("session-keeper")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.host.is_none());
    assert!(result.port.is_none());
    assert!(result.config.is_none());
    assert!(result.provider.is_none());
    assert!(result.path.is_none());
    assert!(!result.help);
    assert!(!result.version);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
        "--provider",
        "file",
        "--path",
        "/var/lib/sessions",
        "-l",
        "debug",
    ]))
    .unwrap();

    assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
    assert_eq!(result.port, Some(8080));
    assert_eq!(result.provider, Some(ProviderKind::File));
    assert_eq!(result.path, Some(PathBuf::from("/var/lib/sessions")));
    assert_eq!(result.log_level, Some("debug".to_string()));
}

#[test]
fn test_cli_config_file() {
    let result = parse_args_from(args(&["-c", "/etc/session-keeper.json"])).unwrap();

    assert_eq!(
        result.config.unwrap().to_str().unwrap(),
        "/etc/session-keeper.json"
    );
}

#[test]
fn test_cli_invalid_values() {
    assert!(parse_args_from(args(&["-p", "not-a-number"])).is_err());
    assert!(parse_args_from(args(&["-H", "not-an-ip"])).is_err());
    assert!(parse_args_from(args(&["--provider", "mysql"])).is_err());
    assert!(parse_args_from(args(&["--path"])).is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
        "session": {
            "cookie_name": "app_session",
            "domain": "example.com",
            "expiration_secs": 0,
            "secure": false,
            "same_site": "lax",
            "id_in_http_header": true,
            "http_header_name": "X-Session-Id",
            "id_length": 48,
            "codec": "base64"
        },
        "gc": {
            "interval_secs": 30,
            "browser_session_ttl_secs": 600
        },
        "provider": {
            "kind": "file",
            "path": "/tmp/sessions",
            "suffix": ".sess"
        },
        "server": {
            "host": "192.168.1.100",
            "port": 9000,
            "behind_tls": true
        },
        "logging": {
            "level": "debug"
        }
    }"#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server.host, "192.168.1.100");
    assert_eq!(config.server.port, 9000);
    assert!(config.server.behind_tls);
    assert_eq!(config.provider.kind, ProviderKind::File);
    assert_eq!(config.provider.suffix, ".sess");
    assert_eq!(config.session.codec, CodecKind::Base64);
    assert_eq!(config.logging.level, "debug");

    let session = config.to_session_config();
    assert_eq!(session.cookie_name, "app_session");
    assert_eq!(session.domain, "example.com");
    assert_eq!(session.expiration, Expiration::Never);
    assert!(!session.secure);
    assert_eq!(session.same_site, SameSite::Lax);
    assert!(session.id_in_http_header);
    assert_eq!(session.http_header_name, "X-Session-Id");
    assert!(!session.id_in_url_query);
    assert_eq!(session.id_length, 48);
    assert_eq!(session.codec.name(), "base64");
    assert_eq!(session.gc_lifetime, Duration::from_secs(30));
    assert_eq!(session.browser_session_ttl, Duration::from_secs(600));
}

#[test]
fn test_config_priority_cli_over_file() {
    let file = config_file(
        r#"{
        "server": {
            "host": "10.0.0.1",
            "port": 5000
        },
        "provider": { "kind": "file", "path": "/from/file" }
    }"#,
    );

    let args = Args {
        host: Some("192.168.1.1".parse().unwrap()),
        port: Some(8080),
        provider: Some(ProviderKind::File),
        path: Some(PathBuf::from("/from/cli")),
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.server.host, "192.168.1.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.provider.path, Some(PathBuf::from("/from/cli")));
}

#[test]
fn test_config_file_kept_when_cli_silent() {
    let file = config_file(r#"{ "server": { "port": 5000 } }"#);

    let args = Args {
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    assert_eq!(config.server.port, 5000);
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some(PathBuf::from("/definitely/not/here.json")),
        ..Args::default()
    };
    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_builds_provider() {
    let dir = tempfile::tempdir().unwrap();
    let args = Args {
        provider: Some(ProviderKind::File),
        path: Some(dir.path().join("sessions")),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    let provider = config.build_provider().unwrap();
    assert_eq!(provider.name(), "file");
    assert!(provider.need_gc());
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.server.host, loaded.server.host);
    assert_eq!(original.server.port, loaded.server.port);
    assert_eq!(original.session.cookie_name, loaded.session.cookie_name);
    assert_eq!(original.provider.kind, loaded.provider.kind);
}

#[test]
fn test_config_partial_deserialization() {
    let json = r#"{"session": {"expiration_secs": -1}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.session.expiration_secs, -1);
    assert_eq!(config.session.cookie_name, "sessionid");
    assert_eq!(config.server.port, 3000);
    assert!(!config.server.behind_tls);
    assert_eq!(config.to_session_config().expiration, Expiration::Browser);
}
