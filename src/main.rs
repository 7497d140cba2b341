//! pideck - Raspberry Pi LCD dashboard and VLC remote
//!
//! Main entry point for the appliance.
//!
//! # Overview
//!
//! This binary wires the library together. It initializes:
//! - Configuration ([`ConfigManager`]: defaults, YAML file, `PIDECK__*` overrides)
//! - Logging infrastructure (daily rotated file + stderr for journald)
//! - Tokio async runtime (4 worker threads)
//! - Hardware (ILI9341 over SPI, GPIO buttons, evdev touchscreen)
//! - The VLC RC client, with the media directory loaded as the playlist
//! - The main loop ([`App`])
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Load and validate settings (exit code 1 on failure)
//! 3. Initialize logging → `<logging.dir>/pideck.<date>`
//! 4. Create tokio runtime with 4 worker threads
//! 5. Acquire the hardware (exit code 2 on failure)
//! 6. Listen for SIGINT / SIGTERM
//! 7. Load the playlist into VLC (non-fatal, VLC may come up later)
//! 8. Run the main loop until a signal arrives
//! 9. Shutdown tokio runtime with 5s timeout
//!
//! # Platform
//!
//! Raspberry Pi OS (aarch64 / armv7). Without the `hardware` feature the binary builds
//! anywhere but refuses to start.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use pideck::app::{prepare_vlc, shutdown_signal};
use pideck::config::DEFAULT_CONFIG_PATH;
use pideck::hardware::Hardware;
use pideck::services::{MetricsSampler, RcClient};
use pideck::{APP_NAME, App, ConfigManager, PiDeckError, Settings, VERSION};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "pideck", version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, env = "PIDECK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: Utf8PathBuf,

    /// Write the built-in defaults to the configuration path and exit
    #[arg(long)]
    write_default_config: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{}: {:#}", APP_NAME, e);

            let code = e.downcast_ref::<PiDeckError>().map_or(1, PiDeckError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config_manager = ConfigManager::new(&args.config);

    if args.write_default_config {
        config_manager
            .save_settings(&Settings::default())
            .map_err(PiDeckError::from)?;
        println!("Wrote default configuration to {}", config_manager.config_path());
        return Ok(());
    }

    // Logging is configured by the settings, so load errors only reach stderr
    let settings = config_manager
        .load_settings()
        .map_err(PiDeckError::from)
        .context("Cannot start without a valid configuration")?;

    // Setup logging; fall back to stderr only if the log directory is unusable
    let _log_guard = match pideck::logging::setup_logging(&settings.logging, APP_NAME) {
        Ok(guard) => Some(guard),
        Err(e) => {
            pideck::logging::setup_console_logging(settings.logging.debug)?;
            tracing::warn!("File logging disabled: {:#}", e);
            None
        }
    };

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Configuration: {}", config_manager.config_path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("pideck-worker")
        .build()
        .context("Failed to build the tokio runtime")?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 4);

    let settings = Arc::new(settings);
    let result = runtime.block_on(serve(Arc::clone(&settings)));

    // Shutdown the tokio runtime gracefully
    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Application shutdown complete");
    result
}

async fn serve(settings: Arc<Settings>) -> Result<()> {
    let app = App::new(Arc::clone(&settings));

    // GPIO callbacks hold a raw event sender from here on
    let hardware = Hardware::acquire(&settings, app.raw_events())
        .map_err(PiDeckError::from)
        .context("Cannot start without the LCD and buttons")?;

    // Listen before the slow VLC setup so an early SIGTERM still blanks the display
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let vlc = RcClient::new(settings.vlc.rc_host.clone(), settings.vlc.command_timeout());
    prepare_vlc(&vlc, &settings.vlc, shutdown_rx.clone()).await;

    let sampler = MetricsSampler::with_sysinfo(&settings.system);

    app.run(hardware, Arc::new(vlc), sampler, shutdown_rx).await?;
    Ok(())
}
