use crate::accounts::Account;
use crate::archive::{ArchiveStore, MediaKind};
use crate::error::{Error, FetchError, Result};
use crate::fetcher::{DiscoveredItem, MediaFetcher};
use crate::metadata;
use crate::settings::{Settings, ThrottleRange};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// What to do with an item the archive has not seen yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Record the key only. Used to seed the archive from existing history.
    ArchiveOnly,
    /// Fetch the media, write the metadata sidecar, then record the key.
    Download,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub mode: ScanMode,
    /// Per-run cap on items examined per account, clamped to the configured
    /// `max_scan_size`.
    pub scan_limit: Option<u32>,
}

impl ScanOptions {
    pub fn new(mode: ScanMode) -> Self {
        ScanOptions {
            mode,
            scan_limit: None,
        }
    }
}

/// Aggregate outcome of one run over one or more accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub accounts_scanned: usize,
    pub accounts_failed: usize,
    pub new_items: usize,
    pub items_downloaded: usize,
    pub items_failed: usize,
    pub duplicates_hit: usize,
    pub early_stops: usize,
}

/// Observer for scan progress. The CLI renders these with progress bars;
/// tests and non-interactive runs use `SilentReporter`.
pub trait ScanReporter {
    fn on_account_start(&self, _account: &str, _index: usize, _total: usize) {}
    fn on_kind_start(&self, _account: &str, _kind: MediaKind, _limit: u32) {}
    fn on_item_new(&self, _item: &DiscoveredItem) {}
    fn on_item_duplicate(&self, _item: &DiscoveredItem, _streak: u32, _max: u32) {}
    fn on_early_stop(&self, _account: &str, _kind: MediaKind, _streak: u32) {}
    fn on_item_downloaded(&self, _item: &DiscoveredItem, _files: usize) {}
    fn on_item_failed(&self, _item: &DiscoveredItem, _error: &FetchError) {}
    fn on_account_failed(&self, _account: &str, _error: &FetchError) {}
    fn on_account_done(&self, _account: &str, _new_items: usize) {}
    fn on_throttle_start(&self, _label: &str, _total_secs: u64) {}
    fn on_throttle_tick(&self, _elapsed_secs: u64, _total_secs: u64) {}
    fn on_throttle_end(&self) {}
}

/// No-op reporter.
pub struct SilentReporter;

impl ScanReporter for SilentReporter {}

/// Drives one pass over registered accounts: scan via the fetch tool, filter
/// against the archive, download what is new, record the keys. Strictly
/// sequential; the archive is persisted once at the end of the run.
pub struct ScanCoordinator<'a> {
    settings: &'a Settings,
    fetcher: &'a dyn MediaFetcher,
    options: ScanOptions,
}

impl<'a> ScanCoordinator<'a> {
    pub fn new(
        settings: &'a Settings,
        fetcher: &'a dyn MediaFetcher,
        options: ScanOptions,
    ) -> Self {
        ScanCoordinator {
            settings,
            fetcher,
            options,
        }
    }

    fn scan_bound(&self) -> u32 {
        match self.options.scan_limit {
            Some(limit) => limit.min(self.settings.max_scan_size),
            None => self.settings.max_scan_size,
        }
    }

    /// Scan every account in order. Account-level fetch failures are
    /// reported and skipped; only an unlaunchable fetch tool aborts the run.
    /// The archive is persisted once, even on abort, so keys recorded before
    /// the failure are not lost.
    pub fn run(
        &self,
        accounts: &[Account],
        archive: &mut ArchiveStore,
        reporter: &dyn ScanReporter,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for (index, account) in accounts.iter().enumerate() {
            if index > 0 {
                self.throttle(
                    self.settings.request_throttle,
                    "next account",
                    reporter,
                );
            }
            reporter.on_account_start(&account.username, index + 1, accounts.len());

            match self.scan_account(&account.username, archive, reporter, &mut summary) {
                Ok(new_items) => {
                    summary.accounts_scanned += 1;
                    reporter.on_account_done(&account.username, new_items);
                }
                Err(err @ FetchError::Spawn { .. }) => {
                    // The tool itself is broken; nothing further can succeed.
                    if let Err(persist_err) = archive.persist() {
                        warn!("Archive persist after abort failed: {}", persist_err);
                    }
                    return Err(Error::Fetch(err));
                }
                Err(err) => {
                    summary.accounts_failed += 1;
                    warn!("Account '{}' skipped: {}", account.username, err);
                    reporter.on_account_failed(&account.username, &err);
                }
            }
        }

        archive.persist()?;
        info!(
            "Run complete: {} accounts scanned, {} failed, {} new items ({} downloaded, {} failed)",
            summary.accounts_scanned,
            summary.accounts_failed,
            summary.new_items,
            summary.items_downloaded,
            summary.items_failed,
        );
        Ok(summary)
    }

    /// Returns the number of new items recorded for this account.
    fn scan_account(
        &self,
        account: &str,
        archive: &mut ArchiveStore,
        reporter: &dyn ScanReporter,
        summary: &mut RunSummary,
    ) -> std::result::Result<usize, FetchError> {
        let bound = self.scan_bound();
        let mut new_items = 0usize;

        for kind in MediaKind::ALL {
            reporter.on_kind_start(account, kind, bound);
            let items = self.fetcher.scan(account, kind, bound)?;

            let mut streak = 0u32;
            let mut streak_post: Option<&str> = None;
            let mut first_fetch_done = false;

            // Newest-first: once `max_duplicate_streak` consecutive posts are
            // already archived, everything older is assumed archived too. The
            // streak counts posts, not files: the sidecar images of one
            // multi-image post advance it once.
            for item in &items {
                if archive.contains(account, kind, &item.id) {
                    summary.duplicates_hit += 1;
                    if streak_post != Some(item.post_id.as_str()) {
                        streak += 1;
                        streak_post = Some(&item.post_id);
                    }
                    reporter.on_item_duplicate(item, streak, self.settings.max_duplicate_streak);
                    if streak >= self.settings.max_duplicate_streak {
                        summary.early_stops += 1;
                        reporter.on_early_stop(account, kind, streak);
                        break;
                    }
                    continue;
                }

                streak = 0;
                streak_post = None;
                summary.new_items += 1;
                new_items += 1;
                reporter.on_item_new(item);

                match self.options.mode {
                    ScanMode::ArchiveOnly => {
                        archive.insert(account, kind, &item.id);
                    }
                    ScanMode::Download => {
                        if first_fetch_done {
                            self.throttle(
                                self.settings.download_throttle,
                                "next download",
                                reporter,
                            );
                        }
                        match self.download_item(account, item, reporter) {
                            Ok(()) => {
                                archive.insert(account, kind, &item.id);
                                summary.items_downloaded += 1;
                            }
                            Err(err @ FetchError::Spawn { .. }) => return Err(err),
                            Err(err) => {
                                // Skipped, not archived: retried on the next run.
                                summary.items_failed += 1;
                                warn!("Item '{}' skipped: {}", item.id, err);
                                reporter.on_item_failed(item, &err);
                            }
                        }
                        first_fetch_done = true;
                    }
                }
            }
        }

        Ok(new_items)
    }

    fn download_item(
        &self,
        account: &str,
        item: &DiscoveredItem,
        reporter: &dyn ScanReporter,
    ) -> std::result::Result<(), FetchError> {
        let dest = self.download_dir(account, item.kind);
        let files = self.fetcher.fetch_item(account, item, &dest)?;

        for file in &files {
            if !file.is_metadata {
                continue;
            }
            // Sidecar failure is not worth failing the item over; the media
            // itself is already on disk.
            if let Err(e) = metadata::write_sidecar(&file.path, account) {
                warn!(
                    "Metadata sidecar for {} failed: {}",
                    file.path.display(),
                    e
                );
            }
        }

        reporter.on_item_downloaded(item, files.len());
        Ok(())
    }

    /// Classified storage path: `{download_dir}/{account}/{kind}/`.
    pub fn download_dir(&self, account: &str, kind: MediaKind) -> PathBuf {
        self.settings
            .download_root()
            .join(account)
            .join(kind.plural())
    }

    /// Blocking pacing sleep, ticked per second so the reporter can draw a
    /// countdown. Pacing only: skipping it never affects dedup correctness.
    fn throttle(&self, range: ThrottleRange, label: &str, reporter: &dyn ScanReporter) {
        let Some(delay) = range.pick() else {
            return;
        };
        let total = delay.as_secs();
        reporter.on_throttle_start(label, total);
        for elapsed in 1..=total {
            thread::sleep(Duration::from_secs(1));
            reporter.on_throttle_tick(elapsed, total);
        }
        reporter.on_throttle_end();
    }
}
