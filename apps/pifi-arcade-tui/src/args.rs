use std::path::PathBuf;

use clap::Parser;
use pifi_netplay::ArcadeConfig;
use tracing::Level;

/// pifi arcade terminal client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub arcade: ArcadeConfig,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// File the log is written to
    #[arg(long, default_value = "pifi_arcade.log")]
    pub log_file: PathBuf,
}
