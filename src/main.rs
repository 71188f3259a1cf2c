use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use camkeeper::{Backend, BackendFactory, CamkeeperConfig, CamkeeperOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "camkeeper")]
#[command(about = "Camera pipeline supervisor with stream visibility watchdog and health endpoint")]
#[command(version)]
#[command(long_about = "Keeps a camera capture pipeline publishing to an RTSP relay. \
Selects a Pi, USB or null backend, restarts the capture processes when they crash, \
forces a restart when the relay stops seeing the stream, and reports health over HTTP \
for systemd and external monitors.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camkeeper.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - select the backend but don't start anything
    #[arg(long, help = "Report the backend that would be used and exit")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Append plain-text logs to a file")]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let log_guard = init_logging(&args)?;

    info!("Starting camkeeper v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match CamkeeperConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.dry_run {
        config.validate()?;
        let backend = BackendFactory::new().create(&config.camera)?;
        let info = backend.describe();
        info!("Dry run mode - backend selected but not started");
        println!(
            "✓ Dry run completed - would start {} backend '{}' publishing to {}",
            info.kind,
            info.name,
            info.rtsp_url.as_deref().unwrap_or("nothing")
        );
        return Ok(());
    }

    let mut orchestrator = CamkeeperOrchestrator::new(config).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start camkeeper: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("camkeeper exited with code: {}", exit_code);

    // Flush file logs before exiting; process::exit skips destructors
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("camkeeper={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match args.log_file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path '{}' has no file name", path.display()))?;
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            };

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# camkeeper configuration file");
    println!("# Every option with its default value. Environment variables such as");
    println!("# CAMKEEPER_CAMERA__KIND=usb override the file; CAMERA_TYPE and");
    println!("# CAMERA_DEVICE are honoured for existing deployments.");
    println!();
    println!("{}", CamkeeperConfig::default().to_toml()?);
    Ok(())
}
