use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the JSON list of traces (will over-write the config file)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Pretty print the JSON report
    #[arg(short, long)]
    pub pretty: bool,
}
