use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "gramwatch")]
#[command(about = "Monitor accounts for new media and download what the archive has not seen", long_about = None)]
pub struct Cli {
    /// Settings file path
    #[arg(long, default_value = "settings.json")]
    pub settings: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan all accounts and record new item ids without downloading
    Scan {
        /// Cap on items examined per account for this run
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Scan all accounts and download new items with metadata
    Download {
        /// Cap on items examined per account for this run
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Download everything behind a single URL
    Url { url: String },
    /// Print archive statistics per account
    Stats,
    /// Print the resolved configuration
    PrintConfig,
}
