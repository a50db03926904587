//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// SiteLink edge gateway.
#[derive(Parser, Debug, Clone)]
#[command(name = "sitelink-bridge")]
#[command(about = "Bridge site equipment to the SiteLink management backend", long_about = None)]
pub struct BridgeArgs {
    /// Path to the configuration file (JSON5 format).
    #[arg(short, long, default_value = "sitelink.json5")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Load and validate the configuration, print a summary and exit.
    #[arg(long)]
    pub check: bool,
}
