use crate::archive::MediaKind;
use crate::error::FetchError;
use std::path::{Path, PathBuf};

/// One media item reported by a scan, newest-first. Ephemeral: consumed by
/// the coordinator and discarded after filtering against the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredItem {
    /// Archive key: full filename including extension.
    pub id: String,
    /// Groups multi-file posts; the filename prefix before the first '_'.
    pub post_id: String,
    pub kind: MediaKind,
    /// 1-based position in the account's feed, used to address the item
    /// when fetching it.
    pub media_index: u32,
}

/// A file produced by fetching one item: the media payload itself or the
/// tool's metadata JSON written next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub is_metadata: bool,
}

/// The external download tool, behind a trait so scans are testable without
/// network access or the tool installed.
pub trait MediaFetcher {
    /// List up to `limit` items of `kind` for `account`, newest-first,
    /// without downloading anything.
    fn scan(
        &self,
        account: &str,
        kind: MediaKind,
        limit: u32,
    ) -> Result<Vec<DiscoveredItem>, FetchError>;

    /// Download one discovered item (media plus metadata JSON) into
    /// `dest_dir`.
    fn fetch_item(
        &self,
        account: &str,
        item: &DiscoveredItem,
        dest_dir: &Path,
    ) -> Result<Vec<FetchedFile>, FetchError>;

    /// Download everything behind an arbitrary URL into `dest_dir`.
    /// Used by the manual-download menu entry.
    fn download_url(&self, url: &str, dest_dir: &Path) -> Result<Vec<PathBuf>, FetchError>;
}
