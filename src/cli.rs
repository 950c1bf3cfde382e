//! Command-line interface for the session-keeper demo server.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::config::ProviderKind;

/// Command-line arguments.
///
/// Unset options fall back to the environment, the config file and then
/// the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Session backend.
    pub provider: Option<ProviderKind>,
    /// Storage directory for the file backend.
    pub path: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Long("provider") => {
                let value: String = parser.value()?.parse()?;
                result.provider = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("provider", value))?,
                );
            }
            Long("path") => {
                result.path = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"session-keeper {version}
Session store demo server with pluggable backends

USAGE:
    session-keeper [OPTIONS]

OPTIONS:
    -H, --host <ADDR>        Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>        Port to listen on [default: 3000]
    -c, --config <FILE>      Path to configuration file (JSON)
        --provider <KIND>    Session backend: memory, file [default: memory]
        --path <DIR>         Storage directory for the file backend
    -l, --log-level <LVL>    Log level (error, warn, info, debug, trace)
    -h, --help               Print help
    -V, --version            Print version

ENVIRONMENT VARIABLES:
    SESSION_KEEPER_HOST          Host address (overrides config)
    SESSION_KEEPER_PORT          Port number (overrides config)
    SESSION_KEEPER_PROVIDER      Session backend (overrides config)
    SESSION_KEEPER_PATH          File backend directory (overrides config)
    SESSION_KEEPER_COOKIE_NAME   Session cookie name (overrides config)
    SESSION_KEEPER_EXPIRATION    Session lifetime in seconds (overrides config)
    SESSION_KEEPER_LOG_LEVEL     Log level (overrides config)
    RUST_LOG                     Alternative log level setting

EXAMPLES:
    # In-memory sessions on localhost:3000
    session-keeper

    # File-backed sessions on all interfaces
    session-keeper -H 0.0.0.0 -p 8080 --provider file --path /var/lib/sessions

    # Start with config file
    session-keeper -c /etc/session-keeper/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("session-keeper {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
