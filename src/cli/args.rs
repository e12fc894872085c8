use clap::Parser;
use std::path::PathBuf;

/// Command line arguments for MultiCom
#[derive(Parser, Debug)]
#[command(
    name = "multicom",
    version = env!("CARGO_PKG_VERSION"),
    about = "Monitor several serial devices and interleave their lines on one console",
    long_about = "Reads device definitions from one or more configuration files, opens every \
                  device it can, and prints each received line prefixed with the device name \
                  until interrupted with Ctrl+C."
)]
pub struct Args {
    /// Configuration files, merged in order (default: multicom.yaml)
    #[arg(value_name = "CONF_FILE")]
    pub config: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
