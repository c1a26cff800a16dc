use anyhow::{Context, Result};
use colored::*;
use gramwatch_core::coordinator::{ScanCoordinator, ScanMode, ScanOptions, ScanReporter};
use gramwatch_core::metadata;
use gramwatch_core::{
    AccountRegistry, ArchiveStore, CookieStore, GalleryDlFetcher, MediaFetcher, RunSummary,
    Settings,
};
use std::path::PathBuf;
use tracing::warn;

/// One scan pass over every registered account. Loads the registry and
/// archive fresh from the configured paths so settings edits made earlier in
/// the session take effect.
pub fn run_scan(
    settings: &Settings,
    mode: ScanMode,
    limit: Option<u32>,
    reporter: &dyn ScanReporter,
) -> Result<Option<RunSummary>> {
    let registry = AccountRegistry::load(settings.accounts_path())
        .context("loading account registry")?;
    if registry.is_empty() {
        println!(
            "{}",
            "No accounts registered yet. Add one from the accounts menu.".yellow()
        );
        return Ok(None);
    }

    let cookies = CookieStore::new(settings.cookies_path());
    if !cookies.is_present() {
        warn!(
            "No credentials at {}; the fetch tool may only see public content",
            cookies.path().display()
        );
    }

    let fetcher = GalleryDlFetcher::from_settings(settings);
    let mut archive = ArchiveStore::load(settings.archive_path());

    let mut options = ScanOptions::new(mode);
    options.scan_limit = limit;

    let coordinator = ScanCoordinator::new(settings, &fetcher, options);
    let summary = coordinator
        .run(registry.list(), &mut archive, reporter)
        .context("scan run")?;
    Ok(Some(summary))
}

pub fn print_summary(summary: &RunSummary, mode: ScanMode) {
    println!();
    println!(
        "{} {} accounts scanned, {} failed",
        "Summary:".bold(),
        summary.accounts_scanned.to_string().green(),
        summary.accounts_failed.to_string().red(),
    );
    match mode {
        ScanMode::ArchiveOnly => {
            println!(
                "  {} new items recorded, {} duplicates seen",
                summary.new_items.to_string().green(),
                summary.duplicates_hit.to_string().dimmed(),
            );
        }
        ScanMode::Download => {
            println!(
                "  {} new items ({} downloaded, {} failed), {} duplicates seen",
                summary.new_items.to_string().green(),
                summary.items_downloaded.to_string().green(),
                summary.items_failed.to_string().red(),
                summary.duplicates_hit.to_string().dimmed(),
            );
        }
    }
}

/// Manual download of a single URL. Files land in `{download_dir}/manual/`
/// first; anything whose metadata names the post owner is then moved to
/// `{download_dir}/{account}/` with its text sidecar.
pub fn manual_download(settings: &Settings, url: &str) -> Result<Vec<PathBuf>> {
    let staging = settings.download_root().join("manual");
    let fetcher = GalleryDlFetcher::from_settings(settings);
    let files = fetcher
        .download_url(url, &staging)
        .with_context(|| format!("downloading {}", url))?;
    let files = metadata::classify_downloads(&files, &settings.download_root())
        .context("sorting downloaded files")?;
    Ok(files)
}

/// Archive statistics per account, for the status display.
pub fn print_archive_stats(settings: &Settings) {
    let archive = ArchiveStore::load(settings.archive_path());
    if archive.is_empty() {
        println!("{}", "Archive is empty.".dimmed());
        return;
    }
    println!("{}", "Archive:".bold());
    let accounts: Vec<String> = archive.accounts().cloned().collect();
    for account in accounts {
        let counts = archive.counts_for(&account);
        println!(
            "  {} - {} posts, {} stories, {} reels",
            account, counts.posts, counts.stories, counts.reels
        );
    }
}
