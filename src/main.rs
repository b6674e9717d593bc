use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use plcbridge::{app, logging, settings};

#[derive(Parser, Debug)]
#[command(name = "plcbridge")]
#[command(about = "Adaptive polling bridge from automation controllers to a message bus")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = settings::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level regardless of the configuration
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = settings::AppConfig::load(&args.config)?;
    if args.debug {
        config.general.debug = true;
    }

    logging::init(&config.general)?;

    // Build a tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))
}
