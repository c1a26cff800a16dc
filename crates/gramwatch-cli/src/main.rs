mod commands;
mod logging;
mod menu;
mod ops;
mod progress;

use clap::Parser;
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use gramwatch_core::coordinator::ScanMode;
use gramwatch_core::SettingsStore;
use menu::Menu;
use progress::CliReporter;
use std::process;
use tracing::error;

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let settings = match SettingsStore::load(&args.settings) {
        Ok(store) => store,
        Err(err) => {
            error!("Error loading settings: {}", err);
            process::exit(1);
        }
    };

    match args.command {
        Some(Commands::Scan { limit }) => run_scan(&settings, ScanMode::ArchiveOnly, limit),
        Some(Commands::Download { limit }) => run_scan(&settings, ScanMode::Download, limit),
        Some(Commands::Url { url }) => {
            match ops::manual_download(settings.settings(), &url) {
                Ok(files) => {
                    println!("{} {} files", "Downloaded".green(), files.len());
                    for file in &files {
                        println!("  {}", file.display());
                    }
                }
                Err(err) => {
                    error!("Download failed: {}", err);
                    process::exit(1);
                }
            }
        }
        Some(Commands::Stats) => ops::print_archive_stats(settings.settings()),
        Some(Commands::PrintConfig) => {
            println!("Settings file: {}", settings.path().display());
            println!("{:#?}", settings.settings());
        }
        None => {
            let mut menu = Menu::new(settings);
            if let Err(err) = menu.run() {
                error!("Error: {}", err);
                process::exit(1);
            }
        }
    }
}

fn run_scan(settings: &SettingsStore, mode: ScanMode, limit: Option<u32>) {
    let reporter = CliReporter::new();
    match ops::run_scan(settings.settings(), mode, limit, &reporter) {
        Ok(Some(summary)) => ops::print_summary(&summary, mode),
        Ok(None) => {}
        Err(err) => {
            error!("Scan aborted: {}", err);
            process::exit(1);
        }
    }
}
