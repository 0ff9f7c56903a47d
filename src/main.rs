//! AtomicDocs - Command-line tool for collecting and registering web application routes.
//!
//! This binary reads a router dump exported by a host application (Express, Hono or Fiber),
//! normalizes the routes it describes, and registers them with the AtomicDocs documentation
//! service.
//!
//! # Usage
//!
//! ```bash
//! atomicdocs [OPTIONS] <COMMAND>
//! ```
//!
//! # Examples
//!
//! Print the routes of an Express app as JSON:
//! ```bash
//! atomicdocs collect ./express-routes.json -f json
//! ```
//!
//! Register a Hono app listening on port 8787 with a running service:
//! ```bash
//! atomicdocs register ./hono-routes.json --app-port 8787
//! ```
//!
//! Launch the service and keep it running, with verbose logging:
//! ```bash
//! atomicdocs serve ./routes.json -v
//! ```

use anyhow::Result;
use atomicdocs::cli;
use clap::Parser;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse once to read the verbose flag before the logger exists, validate afterwards
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("AtomicDocs starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args).await?;

    Ok(())
}
