use gramwatch_core::coordinator::{ScanCoordinator, ScanMode, ScanOptions, SilentReporter};
use gramwatch_core::{
    Account, ArchiveStore, DiscoveredItem, Error, FetchError, FetchedFile, MediaFetcher, MediaKind,
    Settings,
};
use chrono::Utc;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

fn item(kind: MediaKind, media_index: u32, id: &str) -> DiscoveredItem {
    let stem = id.rsplit_once('.').map(|(s, _)| s).unwrap_or(id);
    DiscoveredItem {
        id: id.to_string(),
        post_id: stem.split('_').next().unwrap_or(stem).to_string(),
        kind,
        media_index,
    }
}

fn account(name: &str) -> Account {
    Account {
        username: name.to_string(),
        added_at: Utc::now(),
    }
}

/// Scripted stand-in for the external fetch tool.
#[derive(Default)]
struct MockFetcher {
    feeds: HashMap<(String, MediaKind), Vec<DiscoveredItem>>,
    fail_scan_accounts: HashSet<String>,
    fail_fetch_items: HashSet<String>,
    spawn_broken: bool,
    scan_calls: RefCell<Vec<(String, MediaKind, u32)>>,
    fetched: RefCell<Vec<String>>,
}

impl MockFetcher {
    fn with_feed(mut self, account: &str, kind: MediaKind, ids: &[&str]) -> Self {
        let items = ids
            .iter()
            .enumerate()
            .map(|(i, id)| item(kind, i as u32 + 1, id))
            .collect();
        self.feeds.insert((account.to_string(), kind), items);
        self
    }

    fn fetched_ids(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl MediaFetcher for MockFetcher {
    fn scan(
        &self,
        account: &str,
        kind: MediaKind,
        limit: u32,
    ) -> Result<Vec<DiscoveredItem>, FetchError> {
        if self.spawn_broken {
            return Err(FetchError::Spawn {
                program: "gallery-dl".to_string(),
                detail: "No such file or directory".to_string(),
            });
        }
        if self.fail_scan_accounts.contains(account) {
            return Err(FetchError::Account {
                account: account.to_string(),
                detail: "login required".to_string(),
            });
        }
        self.scan_calls
            .borrow_mut()
            .push((account.to_string(), kind, limit));
        let items = self
            .feeds
            .get(&(account.to_string(), kind))
            .cloned()
            .unwrap_or_default();
        Ok(items.into_iter().take(limit as usize).collect())
    }

    fn fetch_item(
        &self,
        account: &str,
        item: &DiscoveredItem,
        dest_dir: &Path,
    ) -> Result<Vec<FetchedFile>, FetchError> {
        if self.fail_fetch_items.contains(&item.id) {
            return Err(FetchError::Item {
                id: item.id.clone(),
                detail: "404".to_string(),
            });
        }
        self.fetched.borrow_mut().push(item.id.clone());

        // Behave like the real tool: media file plus metadata JSON on disk.
        fs::create_dir_all(dest_dir).unwrap();
        let media_path = dest_dir.join(&item.id);
        fs::write(&media_path, b"media").unwrap();
        let json_path = dest_dir.join(format!("{}.json", item.id));
        fs::write(
            &json_path,
            format!(r#"{{"username": "{}", "likes": 1}}"#, account),
        )
        .unwrap();

        Ok(vec![
            FetchedFile {
                path: media_path,
                is_metadata: false,
            },
            FetchedFile {
                path: json_path,
                is_metadata: true,
            },
        ])
    }

    fn download_url(&self, _url: &str, _dest_dir: &Path) -> Result<Vec<std::path::PathBuf>, FetchError> {
        Ok(Vec::new())
    }
}

fn test_settings(dir: &tempfile::TempDir, streak: u32) -> Settings {
    let mut settings = Settings::default();
    settings.data_dir = dir.path().to_string_lossy().into_owned();
    settings.max_duplicate_streak = streak;
    settings.request_throttle = "0".parse().unwrap();
    settings.download_throttle = "0".parse().unwrap();
    settings
}

#[test]
fn test_new_items_downloaded_until_duplicate_streak() {
    // Archive already knows P1; feed is newest-first [P3, P2, P1].
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 1);
    let mut archive = ArchiveStore::load(dir.path().join("archive.json"));
    archive.insert("alice", MediaKind::Post, "P1.jpg");

    let fetcher =
        MockFetcher::default().with_feed("alice", MediaKind::Post, &["P3.jpg", "P2.jpg", "P1.jpg"]);
    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );

    let summary = coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();

    assert_eq!(fetcher.fetched_ids(), vec!["P3.jpg", "P2.jpg"]);
    assert!(archive.contains("alice", MediaKind::Post, "P3.jpg"));
    assert!(archive.contains("alice", MediaKind::Post, "P2.jpg"));
    assert_eq!(summary.new_items, 2);
    assert_eq!(summary.items_downloaded, 2);
    assert_eq!(summary.duplicates_hit, 1);
    assert_eq!(summary.early_stops, 1);
}

#[test]
fn test_early_stop_skips_items_after_streak() {
    // P0 is new but sits behind the duplicate streak; it must not be fetched.
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 2);
    let mut archive = ArchiveStore::load(dir.path().join("archive.json"));
    archive.insert("alice", MediaKind::Post, "P2.jpg");
    archive.insert("alice", MediaKind::Post, "P1.jpg");

    let fetcher = MockFetcher::default().with_feed(
        "alice",
        MediaKind::Post,
        &["P3.jpg", "P2.jpg", "P1.jpg", "P0.jpg"],
    );
    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );

    coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();

    assert_eq!(fetcher.fetched_ids(), vec!["P3.jpg"]);
    assert!(!archive.contains("alice", MediaKind::Post, "P0.jpg"));
}

#[test]
fn test_duplicate_streak_resets_on_new_item() {
    // Duplicates interleaved with new items never reach the threshold.
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 2);
    let mut archive = ArchiveStore::load(dir.path().join("archive.json"));
    archive.insert("alice", MediaKind::Post, "P4.jpg");
    archive.insert("alice", MediaKind::Post, "P2.jpg");

    let fetcher = MockFetcher::default().with_feed(
        "alice",
        MediaKind::Post,
        &["P5.jpg", "P4.jpg", "P3.jpg", "P2.jpg", "P1.jpg"],
    );
    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );

    let summary = coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();

    assert_eq!(fetcher.fetched_ids(), vec!["P5.jpg", "P3.jpg", "P1.jpg"]);
    assert_eq!(summary.early_stops, 0);
}

#[test]
fn test_duplicate_streak_counts_posts_not_files() {
    // One archived three-image post must advance the streak once, not three
    // times; the new item behind it is still picked up.
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 3);
    let mut archive = ArchiveStore::load(dir.path().join("archive.json"));
    archive.insert("alice", MediaKind::Post, "ABC_1.jpg");
    archive.insert("alice", MediaKind::Post, "ABC_2.jpg");
    archive.insert("alice", MediaKind::Post, "ABC_3.jpg");

    let fetcher = MockFetcher::default().with_feed(
        "alice",
        MediaKind::Post,
        &["ABC_1.jpg", "ABC_2.jpg", "ABC_3.jpg", "NEW.jpg"],
    );
    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );

    let summary = coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();

    assert_eq!(fetcher.fetched_ids(), vec!["NEW.jpg"]);
    assert_eq!(summary.duplicates_hit, 3);
    assert_eq!(summary.early_stops, 0);

    // Three archived single-file posts in a row still stop the scan.
    let mut archive = ArchiveStore::load(dir.path().join("archive2.json"));
    archive.insert("alice", MediaKind::Post, "A.jpg");
    archive.insert("alice", MediaKind::Post, "B.jpg");
    archive.insert("alice", MediaKind::Post, "C.jpg");
    let fetcher = MockFetcher::default().with_feed(
        "alice",
        MediaKind::Post,
        &["A.jpg", "B.jpg", "C.jpg", "NEW.jpg"],
    );
    let summary = ScanCoordinator::new(&settings, &fetcher, ScanOptions::new(ScanMode::Download))
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();
    assert!(fetcher.fetched_ids().is_empty());
    assert_eq!(summary.early_stops, 1);
}

#[test]
fn test_archive_only_inserts_without_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 3);
    let mut archive = ArchiveStore::load(dir.path().join("archive.json"));

    let fetcher = MockFetcher::default()
        .with_feed("alice", MediaKind::Post, &["P2.jpg", "P1.jpg"])
        .with_feed("alice", MediaKind::Story, &["S1.mp4"]);
    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::ArchiveOnly),
    );

    let summary = coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();

    assert_eq!(summary.new_items, 3);
    assert_eq!(summary.items_downloaded, 0);
    assert!(fetcher.fetched_ids().is_empty());
    assert!(archive.contains("alice", MediaKind::Story, "S1.mp4"));
    // Nothing written under the download root
    assert!(!settings.download_root().exists());
}

#[test]
fn test_archive_only_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 3);
    let archive_path = dir.path().join("archive.json");

    let fetcher = MockFetcher::default()
        .with_feed("alice", MediaKind::Post, &["P2.jpg", "P1.jpg"])
        .with_feed("alice", MediaKind::Reel, &["R1.mp4"]);
    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::ArchiveOnly),
    );

    let mut archive = ArchiveStore::load(&archive_path);
    let first = coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();
    assert_eq!(first.new_items, 3);
    let after_first = fs::read_to_string(&archive_path).unwrap();

    let mut archive = ArchiveStore::load(&archive_path);
    let second = coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();
    assert_eq!(second.new_items, 0);
    assert_eq!(archive.len(), 3);
    assert_eq!(fs::read_to_string(&archive_path).unwrap(), after_first);
}

#[test]
fn test_account_failure_does_not_abort_run() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 3);
    let mut archive = ArchiveStore::load(dir.path().join("archive.json"));

    let mut fetcher =
        MockFetcher::default().with_feed("bob", MediaKind::Post, &["B1.jpg"]);
    fetcher.fail_scan_accounts.insert("alice".to_string());

    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );
    let summary = coordinator
        .run(
            &[account("alice"), account("bob")],
            &mut archive,
            &SilentReporter,
        )
        .unwrap();

    assert_eq!(summary.accounts_failed, 1);
    assert_eq!(summary.accounts_scanned, 1);
    assert!(archive.contains("bob", MediaKind::Post, "B1.jpg"));
}

#[test]
fn test_spawn_failure_aborts_run_but_persists_archive() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 3);
    let archive_path = dir.path().join("archive.json");
    let mut archive = ArchiveStore::load(&archive_path);
    archive.insert("seeded", MediaKind::Post, "X1.jpg");

    let mut fetcher = MockFetcher::default();
    fetcher.spawn_broken = true;

    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );
    let err = coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap_err();

    assert!(matches!(err, Error::Fetch(FetchError::Spawn { .. })));
    // Keys recorded before the abort survive on disk.
    let reloaded = ArchiveStore::load(&archive_path);
    assert!(reloaded.contains("seeded", MediaKind::Post, "X1.jpg"));
}

#[test]
fn test_failed_item_is_skipped_and_retried_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 3);
    let archive_path = dir.path().join("archive.json");

    let mut fetcher =
        MockFetcher::default().with_feed("alice", MediaKind::Post, &["P2.jpg", "P1.jpg"]);
    fetcher.fail_fetch_items.insert("P1.jpg".to_string());

    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );
    let mut archive = ArchiveStore::load(&archive_path);
    let summary = coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();

    assert_eq!(summary.items_failed, 1);
    assert!(archive.contains("alice", MediaKind::Post, "P2.jpg"));
    assert!(!archive.contains("alice", MediaKind::Post, "P1.jpg"));

    // Next run with the failure gone picks the item up again.
    let fetcher =
        MockFetcher::default().with_feed("alice", MediaKind::Post, &["P2.jpg", "P1.jpg"]);
    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );
    let mut archive = ArchiveStore::load(&archive_path);
    coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();
    assert_eq!(fetcher.fetched_ids(), vec!["P1.jpg"]);
}

#[test]
fn test_scan_bound_is_min_of_config_and_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(&dir, 3);
    settings.max_scan_size = 50;
    let mut archive = ArchiveStore::load(dir.path().join("archive.json"));

    let fetcher = MockFetcher::default();
    let mut options = ScanOptions::new(ScanMode::ArchiveOnly);
    options.scan_limit = Some(200);
    ScanCoordinator::new(&settings, &fetcher, options)
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();
    assert!(fetcher
        .scan_calls
        .borrow()
        .iter()
        .all(|(_, _, limit)| *limit == 50));

    let fetcher = MockFetcher::default();
    options.scan_limit = Some(10);
    ScanCoordinator::new(&settings, &fetcher, options)
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();
    assert!(fetcher
        .scan_calls
        .borrow()
        .iter()
        .all(|(_, _, limit)| *limit == 10));
}

#[test]
fn test_download_layout_and_metadata_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir, 3);
    let mut archive = ArchiveStore::load(dir.path().join("archive.json"));

    let fetcher = MockFetcher::default()
        .with_feed("alice", MediaKind::Post, &["P1.jpg"])
        .with_feed("alice", MediaKind::Reel, &["R1.mp4"]);
    let coordinator = ScanCoordinator::new(
        &settings,
        &fetcher,
        ScanOptions::new(ScanMode::Download),
    );
    coordinator
        .run(&[account("alice")], &mut archive, &SilentReporter)
        .unwrap();

    let posts_dir = settings.download_root().join("alice").join("posts");
    assert!(posts_dir.join("P1.jpg").is_file());
    assert!(posts_dir.join("P1.jpg.info.txt").is_file());
    let sidecar = fs::read_to_string(posts_dir.join("P1.jpg.info.txt")).unwrap();
    assert!(sidecar.contains("@alice"));

    assert!(settings
        .download_root()
        .join("alice")
        .join("reels")
        .join("R1.mp4")
        .is_file());
}
