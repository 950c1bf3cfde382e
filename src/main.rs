//! session-keeper binary entry point.

use std::process::ExitCode;

use session_keeper::cli::{parse_args, print_help, print_version};
use session_keeper::config::Config;
use session_keeper::logging;
use session_keeper::server::{serve, AppState};
use session_keeper::session::SessionManager;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _ = logging::init_with_filter(config.log_filter());
    info!("session-keeper v{}", env!("CARGO_PKG_VERSION"));

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let provider = match config.build_provider() {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create session provider: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(provider = provider.name(), "Session provider ready");

    let manager = SessionManager::with_provider(config.to_session_config(), provider);
    let state = AppState::new(manager).with_behind_tls(config.server.behind_tls);

    let result = serve(addr, state.clone()).await;
    state.manager.stop_gc();

    match result {
        Ok(()) => {
            info!("session-keeper stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}
