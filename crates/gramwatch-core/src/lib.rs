pub mod accounts;
pub mod archive;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod fetcher;
pub mod fsutil;
pub mod gallery_dl;
pub mod metadata;
pub mod settings;

pub use accounts::{Account, AccountRegistry};
pub use archive::{ArchiveCounts, ArchiveStore, MediaKind};
pub use coordinator::{
    RunSummary, ScanCoordinator, ScanMode, ScanOptions, ScanReporter, SilentReporter,
};
pub use credentials::CookieStore;
pub use error::{Error, FetchError, Result};
pub use fetcher::{DiscoveredItem, FetchedFile, MediaFetcher};
pub use gallery_dl::GalleryDlFetcher;
pub use settings::{Settings, SettingsStore, ThrottleRange};
