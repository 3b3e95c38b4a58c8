//! umcp: run a bundled MCP demo server over stdio
//!
//! Hosts one of the demo services from [`umcp::servers`] and speaks MCP on
//! stdin/stdout until the client disconnects.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use umcp::config::{self, Config};
use umcp::mcp::{BlockingTransport, McpServer, Service};
use umcp::servers::{AsyncCalculatorServer, CalculatorServer, MovieServer};

/// Bundled services.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ServerKind {
    /// Arithmetic tools and two prompts.
    Calculator,
    /// Arithmetic with suspending tools.
    AsyncCalculator,
    /// Movie listings and ticket booking.
    Movie,
}

/// Minimal Model Context Protocol server.
///
/// Exposes a demo service's tools and prompts to an AI host over stdio.
#[derive(Parser, Debug)]
#[command(name = "umcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service to host
    #[arg(value_enum)]
    server: ServerKind,

    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Use blocking I/O instead of the async runtime
    #[arg(long)]
    blocking: bool,

    /// Answer the requests in FILE (one per line) instead of reading stdin
    #[arg(long, value_name = "FILE")]
    request_file: Option<PathBuf>,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. Logs go to `log_file` if given,
/// stderr otherwise; stdout carries the protocol.
fn init_tracing(level: Level, log_file: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

/// Builds the server and serves until input ends.
fn serve<S: Service>(service: S, args: &Args, cfg: &Config) -> Result<(), Box<dyn Error>> {
    let mut server = McpServer::new(service)?;
    if let Some(name) = &cfg.server.name {
        server = server.with_name(name.clone());
    }
    if let Some(instructions) = &cfg.server.instructions {
        server = server.with_instructions(instructions.clone());
    }

    info!(
        server = %server.info().name,
        tools = server.tools().len(),
        prompts = server.prompts().len(),
        blocking = args.blocking,
        "MCP server ready, waiting for client connection..."
    );

    if let Some(path) = &args.request_file {
        let reader = BufReader::new(File::open(path)?);
        let mut transport = BlockingTransport::new(reader, io::stdout());
        server.serve_blocking(&mut transport)?;
        return Ok(());
    }

    if args.blocking {
        server.run_blocking()?;
    } else {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(server.run())?;
    }
    Ok(())
}

/// Entry point for the umcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    if let Err(e) = init_tracing(log_level, cfg.logging.file.as_deref()) {
        eprintln!("Cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "umcp {}  Copyright (C) 2026  The umcp Developers",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        server = ?args.server,
        "Starting umcp"
    );

    let result = match args.server {
        ServerKind::Calculator => serve(CalculatorServer, &args, &cfg),
        ServerKind::AsyncCalculator => serve(AsyncCalculatorServer, &args, &cfg),
        ServerKind::Movie => serve(MovieServer::new(), &args, &cfg),
    };

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn parse_server_and_flags() {
        let args = Args::parse_from(["umcp", "async-calculator", "-vv", "--blocking"]);
        assert_eq!(args.server, ServerKind::AsyncCalculator);
        assert_eq!(args.verbose, 2);
        assert!(args.blocking);
        assert!(args.request_file.is_none());
    }

    #[test]
    fn log_level_resolution() {
        assert_eq!(get_log_level(0, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(0, false, "DEBUG"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "bogus"), Level::WARN);
        assert_eq!(get_log_level(1, false, "error"), Level::INFO);
        assert_eq!(get_log_level(5, false, "warn"), Level::TRACE);
    }
}
