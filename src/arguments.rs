/// Command-line arguments
///
/// Parsed once at startup and kept globally so any module can check a flag
/// without threading the struct through.
use clap::Parser;
use once_cell::sync::OnceCell;

use crate::config::CONFIG_FILE_PATH;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "nftmeta", version, about = "Cached NFT collection metadata service")]
pub struct Arguments {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = CONFIG_FILE_PATH)]
    pub config: String,

    /// Enable debug logs for a subsystem (repeatable): dispatcher, provider,
    /// scheduler, rarity, store, cache, webserver, config, system
    #[arg(long = "debug", value_name = "TAG")]
    pub debug: Vec<String>,

    /// Log everything, including verbose request traces
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the webserver port from the configuration
    #[arg(long)]
    pub port: Option<u16>,

    /// Run without the HTTP server
    #[arg(long)]
    pub no_webserver: bool,
}

static ARGUMENTS: OnceCell<Arguments> = OnceCell::new();

/// Parse the process arguments and store them; later calls return the first parse
pub fn init_arguments() -> &'static Arguments {
    ARGUMENTS.get_or_init(Arguments::parse)
}
