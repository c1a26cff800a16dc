use colored::*;
use gramwatch_core::coordinator::ScanReporter;
use gramwatch_core::{DiscoveredItem, FetchError, MediaKind};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Interactive scan reporter: per-item lines plus an indicatif countdown bar
/// for throttle sleeps.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ScanReporter for CliReporter {
    fn on_account_start(&self, account: &str, index: usize, total: usize) {
        println!();
        println!(
            "{} {} {}",
            "▸".cyan(),
            account.bold(),
            format!("({}/{})", index, total).dimmed()
        );
    }

    fn on_kind_start(&self, _account: &str, kind: MediaKind, limit: u32) {
        println!(
            "  {} scanning {} (up to {} items)",
            "·".dimmed(),
            kind.plural(),
            limit
        );
    }

    fn on_item_new(&self, item: &DiscoveredItem) {
        println!("    {} {}", "new".green(), item.id);
    }

    fn on_item_duplicate(&self, item: &DiscoveredItem, streak: u32, max: u32) {
        println!(
            "    {} {} {}",
            "dup".yellow(),
            item.id,
            format!("({}/{})", streak, max).dimmed()
        );
    }

    fn on_early_stop(&self, _account: &str, kind: MediaKind, streak: u32) {
        println!(
            "    {} {} consecutive duplicates, stopping {} scan",
            "⏹".yellow(),
            streak,
            kind.plural()
        );
    }

    fn on_item_downloaded(&self, item: &DiscoveredItem, files: usize) {
        println!(
            "    {} {} ({} files)",
            "✓".green(),
            item.id,
            files
        );
    }

    fn on_item_failed(&self, item: &DiscoveredItem, error: &FetchError) {
        println!("    {} {}: {}", "✗".red(), item.id, error);
    }

    fn on_account_failed(&self, account: &str, error: &FetchError) {
        self.finish_bar();
        println!("  {} {}: {}", "✗".red(), account.bold(), error);
    }

    fn on_account_done(&self, account: &str, new_items: usize) {
        let note = if new_items == 0 {
            "nothing new".dimmed().to_string()
        } else {
            format!("{} new items", new_items).green().to_string()
        };
        println!("  {} {}: {}", "✓".green(), account, note);
    }

    fn on_throttle_start(&self, label: &str, total_secs: u64) {
        let pb = ProgressBar::new(total_secs);
        pb.set_style(
            ProgressStyle::with_template(
                "  {msg} [{bar:30.cyan/dim}] {pos}/{len}s",
            )
            .unwrap()
            .progress_chars("━╸─"),
        );
        pb.set_message(format!("waiting before {}", label));
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn on_throttle_tick(&self, elapsed_secs: u64, _total_secs: u64) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.set_position(elapsed_secs);
        }
    }

    fn on_throttle_end(&self) {
        self.finish_bar();
    }
}
