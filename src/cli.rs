use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "matrix-bridge-irc", version, about = "Relays chat between IRC channels and Matrix rooms")]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml", env = "CONFIG_PATH")]
    pub config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check_config: bool,
}
