use crate::config::Config;
use crate::detector::FrameworkDetector;
use crate::error::Error;
use crate::extractor::RouteSource;
use crate::serializer::read_dump;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// AtomicDocs - Collect routes from a web application and register them for documentation
#[derive(Parser, Debug)]
#[command(name = "atomicdocs")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (YAML or JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_path: Option<PathBuf>,

    /// Port of the documentation service (overrides config and environment)
    #[arg(long = "service-port", value_name = "PORT", global = true)]
    pub service_port: Option<u16>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the normalized routes of a router dump
    Collect {
        #[command(flatten)]
        dump: DumpArgs,

        /// Output format (yaml or json)
        #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
        output_format: OutputFormat,

        /// Output file path (if not specified, outputs to stdout)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output_path: Option<PathBuf>,
    },
    /// Register a router dump with an already running documentation service
    Register {
        #[command(flatten)]
        dump: DumpArgs,
    },
    /// Launch the documentation service, register a router dump, and run until interrupted
    Serve {
        #[command(flatten)]
        dump: DumpArgs,
    },
    /// Print the documentation service binary path for this platform
    Binary,
}

/// Router dump input shared by the route commands
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Router dump exported by the host application (JSON or YAML)
    #[arg(value_name = "DUMP")]
    pub dump_path: PathBuf,

    /// Specify the web framework of the dump (if not specified, auto-detect)
    #[arg(short = 'w', long = "framework", value_enum)]
    pub framework: Option<Framework>,

    /// Port the host application listens on
    #[arg(short = 'p', long = "app-port", default_value_t = 3000)]
    pub app_port: u16,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Supported web frameworks
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash)]
pub enum Framework {
    /// Express (4.x and 5.x)
    Express,
    /// Hono
    Hono,
    /// Fiber
    Fiber,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    let dump = match &args.command {
        Command::Collect { dump, .. } | Command::Register { dump } | Command::Serve { dump } => {
            Some(dump)
        }
        Command::Binary => None,
    };

    if let Some(dump) = dump {
        if !dump.dump_path.exists() {
            anyhow::bail!("Router dump does not exist: {}", dump.dump_path.display());
        }
        if !dump.dump_path.is_file() {
            anyhow::bail!("Router dump is not a file: {}", dump.dump_path.display());
        }

        info!("Router dump: {}", dump.dump_path.display());
        info!("App port: {}", dump.app_port);
        if let Some(ref framework) = dump.framework {
            info!("Framework: {:?}", framework);
        } else {
            info!("Framework: auto-detect");
        }
    }

    if let Some(ref config_path) = args.config_path {
        if !config_path.is_file() {
            anyhow::bail!("Config file does not exist: {}", config_path.display());
        }
    }

    Ok(args)
}

/// Builds the effective configuration: file, then environment, then flags.
pub fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = match &args.config_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env()?;
    if let Some(port) = args.service_port {
        config.service.port = port;
    }
    debug!("Effective config: {:?}", config);
    Ok(config)
}

/// Reads a router dump and builds the route source for it.
///
/// Fails with [`Error::FrameworkNotDetected`] when the dump matches no supported framework and
/// none was given on the command line.
pub fn load_source(dump: &DumpArgs) -> Result<Box<dyn RouteSource>> {
    let value = read_dump(&dump.dump_path)?;
    let source = FrameworkDetector::source_for(&value, dump.framework)
        .ok_or(Error::FrameworkNotDetected)
        .context("Please specify a framework using --framework (express, hono, fiber)")?;
    Ok(source)
}

/// Run the selected command
pub async fn run(args: CliArgs) -> Result<()> {
    use crate::middleware::AtomicDocs;
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
    use crate::service::{install_dir, resolve_binary};

    let mut config = load_config(&args)?;

    match args.command {
        Command::Collect {
            dump,
            output_format,
            output_path,
        } => {
            let source = load_source(&dump)?;
            let docs = AtomicDocs::new(config, dump.app_port)?;
            let batch = docs.batch(source.as_ref());

            if batch.routes.is_empty() {
                log::warn!("No routes found in the router dump");
            }

            info!("Serializing to {:?} format...", output_format);
            let content = match output_format {
                OutputFormat::Yaml => serialize_yaml(&batch)?,
                OutputFormat::Json => serialize_json(&batch)?,
            };

            if let Some(output_path) = &output_path {
                write_to_file(&content, output_path)?;
                info!("Wrote {} routes to {}", batch.routes.len(), output_path.display());
            } else {
                println!("{}", content);
            }

            info!("Summary:");
            info!("  - Framework: {:?}", source.framework());
            info!("  - Routes found: {}", batch.routes.len());
        }
        Command::Register { dump } => {
            config.service.spawn = false;
            let source = load_source(&dump)?;
            let docs = AtomicDocs::new(config, dump.app_port)?;

            docs.service()
                .ensure_started()
                .await
                .context("AtomicDocs service is not reachable")?;

            let batch = docs.batch(source.as_ref());
            docs.registration()
                .register_now(&batch)
                .await
                .context("Registration failed")?;

            info!("Registered {} routes", batch.routes.len());
            info!("Docs: http://localhost:{}/docs", dump.app_port);
        }
        Command::Serve { dump } => {
            let source = load_source(&dump)?;
            let docs = AtomicDocs::new(config, dump.app_port)?;

            docs.start();
            let registration = docs.register(source.as_ref());

            info!("Docs: http://localhost:{}/docs (Ctrl-C to stop)", dump.app_port);
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;

            info!("Shutting down AtomicDocs service...");
            registration.cancel();
            docs.shutdown().await;
        }
        Command::Binary => {
            let dir = install_dir(&config.service)?;
            let binary = resolve_binary(&dir)?;
            println!("{}", binary.display());
        }
    }

    Ok(())
}
