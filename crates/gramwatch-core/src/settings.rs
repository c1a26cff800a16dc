use crate::error::{Error, Result};
use crate::fsutil;
use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Inclusive seconds range for pacing sleeps, stored as "30-90" in the
/// settings file. "0" (or "0-0") disables the throttle entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl ThrottleRange {
    pub fn disabled() -> Self {
        ThrottleRange {
            min_secs: 0,
            max_secs: 0,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_secs == 0
    }

    /// Pick a delay uniformly from the range. None when disabled.
    pub fn pick(&self) -> Option<Duration> {
        if self.is_disabled() {
            return None;
        }
        let secs = rand::thread_rng().gen_range(self.min_secs..=self.max_secs);
        Some(Duration::from_secs(secs))
    }
}

impl FromStr for ThrottleRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (min, max) = match s.split_once('-') {
            Some((lo, hi)) => (
                lo.trim().parse::<u64>().map_err(|e| e.to_string())?,
                hi.trim().parse::<u64>().map_err(|e| e.to_string())?,
            ),
            None => {
                let v = s.parse::<u64>().map_err(|e| e.to_string())?;
                (v, v)
            }
        };
        if min > max {
            return Err(format!("range minimum {} exceeds maximum {}", min, max));
        }
        Ok(ThrottleRange {
            min_secs: min,
            max_secs: max,
        })
    }
}

impl fmt::Display for ThrottleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min_secs == self.max_secs {
            write!(f, "{}", self.min_secs)
        } else {
            write!(f, "{}-{}", self.min_secs, self.max_secs)
        }
    }
}

impl Serialize for ThrottleRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ThrottleRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Process-wide configuration, loaded once at startup and passed explicitly
/// to the components that need it. Every field has a default so older
/// settings files with missing keys still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base directory for all relative paths below. Empty = current dir.
    pub data_dir: String,
    pub download_dir: String,
    pub archive_file: String,
    pub accounts_file: String,
    pub cookies_file: String,
    /// Proxy URL handed to the fetch tool. Empty = direct connection.
    pub proxy_url: String,
    /// Consecutive already-archived items before a scan stops early.
    pub max_duplicate_streak: u32,
    /// Upper bound on items examined per account per scan.
    pub max_scan_size: u32,
    /// Pacing sleep between account scans.
    pub request_throttle: ThrottleRange,
    /// Pacing sleep between item downloads.
    pub download_throttle: ThrottleRange,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: String::new(),
            download_dir: "downloads".to_string(),
            archive_file: "archive.json".to_string(),
            accounts_file: "accounts.json".to_string(),
            cookies_file: "cookies.txt".to_string(),
            proxy_url: String::new(),
            max_duplicate_streak: 3,
            max_scan_size: 50,
            request_throttle: ThrottleRange {
                min_secs: 30,
                max_secs: 90,
            },
            download_throttle: ThrottleRange {
                min_secs: 20,
                max_secs: 60,
            },
        }
    }
}

impl Settings {
    fn resolve(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() || self.data_dir.is_empty() {
            path.to_path_buf()
        } else {
            Path::new(&self.data_dir).join(path)
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.resolve(&self.archive_file)
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.resolve(&self.accounts_file)
    }

    pub fn cookies_path(&self) -> PathBuf {
        self.resolve(&self.cookies_file)
    }

    pub fn download_root(&self) -> PathBuf {
        self.resolve(&self.download_dir)
    }

    pub fn proxy(&self) -> Option<&str> {
        if self.proxy_url.is_empty() {
            None
        } else {
            Some(self.proxy_url.as_str())
        }
    }
}

/// Keys accepted by `SettingsStore::set`, in menu display order.
pub const SETTING_KEYS: [&str; 10] = [
    "data_dir",
    "download_dir",
    "archive_file",
    "accounts_file",
    "cookies_file",
    "proxy_url",
    "max_duplicate_streak",
    "max_scan_size",
    "request_throttle",
    "download_throttle",
];

/// Settings plus the file they came from. Every mutation validates and
/// persists immediately; there is no deferred-save mode.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Settings::default(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| Error::Persistence {
                    path: path.display().to_string(),
                    detail: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                return Err(Error::Persistence {
                    path: path.display().to_string(),
                    detail: e.to_string(),
                })
            }
        };
        Ok(SettingsStore { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let s = &self.settings;
        let value = match key {
            "data_dir" => s.data_dir.clone(),
            "download_dir" => s.download_dir.clone(),
            "archive_file" => s.archive_file.clone(),
            "accounts_file" => s.accounts_file.clone(),
            "cookies_file" => s.cookies_file.clone(),
            "proxy_url" => s.proxy_url.clone(),
            "max_duplicate_streak" => s.max_duplicate_streak.to_string(),
            "max_scan_size" => s.max_scan_size.to_string(),
            "request_throttle" => s.request_throttle.to_string(),
            "download_throttle" => s.download_throttle.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Validate and apply one setting, then persist the whole document.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let invalid = |reason: &str| Error::InvalidSetting {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        match key {
            "data_dir" => self.settings.data_dir = value.to_string(),
            "download_dir" | "archive_file" | "accounts_file" | "cookies_file" => {
                if value.is_empty() {
                    return Err(invalid("path must not be empty"));
                }
                match key {
                    "download_dir" => self.settings.download_dir = value.to_string(),
                    "archive_file" => self.settings.archive_file = value.to_string(),
                    "accounts_file" => self.settings.accounts_file = value.to_string(),
                    _ => self.settings.cookies_file = value.to_string(),
                }
            }
            "proxy_url" => self.settings.proxy_url = value.to_string(),
            "max_duplicate_streak" => {
                let n: u32 = value.parse().map_err(|_| invalid("must be an integer"))?;
                if n < 1 {
                    return Err(invalid("must be at least 1"));
                }
                self.settings.max_duplicate_streak = n;
            }
            "max_scan_size" => {
                let n: u32 = value.parse().map_err(|_| invalid("must be an integer"))?;
                if n < 1 {
                    return Err(invalid("must be at least 1"));
                }
                self.settings.max_scan_size = n;
            }
            "request_throttle" => {
                self.settings.request_throttle =
                    value.parse().map_err(|e: String| invalid(&e))?;
            }
            "download_throttle" => {
                self.settings.download_throttle =
                    value.parse().map_err(|e: String| invalid(&e))?;
            }
            _ => return Err(invalid("unknown setting")),
        }

        self.persist()
    }

    pub fn persist(&self) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.settings).map_err(|e| Error::Persistence {
                path: self.path.display().to_string(),
                detail: e.to_string(),
            })?;
        fsutil::atomic_write(&self.path, json.as_bytes())?;
        debug!("Settings persisted to {}", self.path.display());
        Ok(())
    }
}
