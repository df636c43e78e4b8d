//! boltkv - A Single-Threaded In-Memory Key-Value Database
//!
//! Entry point: parses the command line, installs logging, binds the
//! listener and hands control to the event loop.

use anyhow::Context;
use boltkv::{CliAction, Server, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

fn print_help() {
    println!(
        r#"
boltkv - A Single-Threaded In-Memory Key-Value Database

USAGE:
    boltkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>          Port to listen on (default: 9736)
        --databases <N>        Number of databases (default: 10)
        --log-level <LEVEL>    trace, debug, info, warn or error (default: info)
                               RUST_LOG overrides this when set
    -v, --version              Print version information
        --help                 Print this help message

EXAMPLES:
    boltkv                          # Start on 127.0.0.1:9736
    boltkv --port 6380              # Start on port 6380
    boltkv --host 0.0.0.0           # Listen on all interfaces

CONNECTING:
    Use redis-cli or any Redis client to connect:
    $ redis-cli -p 9736
    127.0.0.1:9736> PING
    PONG
    127.0.0.1:9736> ZADD board 1.5 ada
    (integer) 1
"#
    );
}

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
boltkv v{} - Single-Threaded In-Memory Key-Value Database
──────────────────────────────────────────────────────────────
Listening on {}
Databases: {}  |  Expiry sweep: {} keys every {} ms
"#,
        boltkv::VERSION,
        config.bind_address(),
        config.databases,
        config.expire_check_count,
        config.expire_check_interval_ms,
    );
}

fn main() -> anyhow::Result<()> {
    let config = match ServerConfig::from_args() {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            print_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("boltkv version {}", boltkv::VERSION);
            return Ok(());
        }
        Err(err) => {
            eprintln!("Error: {err}");
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging; RUST_LOG directives take precedence over --log-level
    FmtSubscriber::builder()
        .with_env_filter(config.log_filter())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let server = Server::bind(config.clone())
        .with_context(|| format!("could not start server on {}", config.bind_address()))?;

    print_banner(&config);
    info!(pid = std::process::id(), "Server started");

    if let Err(err) = server.serve() {
        error!(error = %err, "Event loop terminated");
        return Err(err.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
