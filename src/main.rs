use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod frame;
mod link;
mod output;
mod pixel_format;
mod protocol;

use config::Config;
use controller::Controller;
use link::SerialLink;
use output::{LogSink, SerialStripSink, StripSink};

#[derive(Parser)]
#[command(name = "ambiance_link")]
#[command(about = "Ambiance Link - bias lighting device\n\nHandshakes with the Ambiance host over serial and drives an LED strip with the frames it streams.", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    config: PathBuf,

    /// Override the host link serial port from the config
    #[arg(long)]
    port: Option<String>,

    /// Enable debug output (statistics)
    #[arg(long)]
    debug: bool,

    /// Enable detailed debug (hex dumps every frame)
    #[arg(long)]
    ddebug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ddebug implies debug
    let debug = cli.debug || cli.ddebug;
    init_tracing(debug, cli.ddebug);

    let mut config = Config::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.link.port = port;
    }

    let mut link = SerialLink::open(&config.link)?;

    let mut sink: Box<dyn StripSink> = match &config.strip.output {
        Some(output) => Box::new(SerialStripSink::open(output.clone(), config.strip.led_count)?),
        None => {
            info!("No strip output configured, frames will only be logged");
            Box::new(LogSink::default())
        }
    };

    let mut controller = Controller::new(&config, debug);

    // Set up Ctrl-C handler with graceful shutdown
    let running = controller.get_running_flag();
    let result = ctrlc::set_handler(move || {
        running.store(false, std::sync::atomic::Ordering::Relaxed);
    });

    if let Err(e) = result {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    info!("Listening for host on {}", link.name());

    // Run control loop (blocks until shutdown)
    controller.run(&mut link, sink.as_mut());

    info!("Shutting down...");
    controller.shutdown(sink.as_mut());

    Ok(())
}

/// Logs go to stderr so they never mix with the data link
fn init_tracing(debug: bool, ddebug: bool) {
    let level = if ddebug {
        "trace"
    } else if debug {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
