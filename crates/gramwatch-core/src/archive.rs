use crate::error::{Error, Result};
use crate::fsutil;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Media categories tracked per account. Doubles as the subdirectory name
/// under the download directory and the key in the archive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Post,
    Story,
    Reel,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Post, MediaKind::Story, MediaKind::Reel];

    /// Plural form, used for directory names and archive file keys.
    pub fn plural(&self) -> &'static str {
        match self {
            MediaKind::Post => "posts",
            MediaKind::Story => "stories",
            MediaKind::Reel => "reels",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Post => "post",
            MediaKind::Story => "story",
            MediaKind::Reel => "reel",
        };
        write!(f, "{}", name)
    }
}

/// Seen item ids for one media kind. Keeps insertion order for the persisted
/// file plus a hash index for O(1) membership checks.
#[derive(Debug, Default, Clone)]
struct KindSet {
    order: Vec<String>,
    index: HashSet<String>,
}

impl KindSet {
    fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Returns true if the id was not present before.
    fn insert(&mut self, id: &str) -> bool {
        if self.index.insert(id.to_string()) {
            self.order.push(id.to_string());
            true
        } else {
            false
        }
    }

    fn from_ids(ids: Vec<String>) -> Self {
        let mut set = KindSet::default();
        for id in ids {
            set.insert(&id);
        }
        set
    }
}

#[derive(Debug, Default, Clone)]
struct AccountArchive {
    posts: KindSet,
    stories: KindSet,
    reels: KindSet,
}

impl AccountArchive {
    fn kind(&self, kind: MediaKind) -> &KindSet {
        match kind {
            MediaKind::Post => &self.posts,
            MediaKind::Story => &self.stories,
            MediaKind::Reel => &self.reels,
        }
    }

    fn kind_mut(&mut self, kind: MediaKind) -> &mut KindSet {
        match kind {
            MediaKind::Post => &mut self.posts,
            MediaKind::Story => &mut self.stories,
            MediaKind::Reel => &mut self.reels,
        }
    }
}

/// Wire format: `{ "<account>": { "posts": [..], "stories": [..], "reels": [..] } }`
#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountArchiveDoc {
    #[serde(default)]
    posts: Vec<String>,
    #[serde(default)]
    stories: Vec<String>,
    #[serde(default)]
    reels: Vec<String>,
}

/// Item counts per kind for one account, for status display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveCounts {
    pub posts: usize,
    pub stories: usize,
    pub reels: usize,
}

impl ArchiveCounts {
    pub fn total(&self) -> usize {
        self.posts + self.stories + self.reels
    }
}

/// Persistent set of already-processed (account, kind, item id) keys.
///
/// The archive only protects against re-downloading, so a missing or
/// malformed file is not fatal: the store starts empty and a fresh file is
/// written on the next persist.
#[derive(Debug)]
pub struct ArchiveStore {
    path: PathBuf,
    accounts: BTreeMap<String, AccountArchive>,
    dirty: bool,
}

impl ArchiveStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let accounts = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => match serde_json::from_str::<BTreeMap<String, AccountArchiveDoc>>(
                &content,
            ) {
                Ok(doc) => doc
                    .into_iter()
                    .map(|(account, entry)| {
                        (
                            account,
                            AccountArchive {
                                posts: KindSet::from_ids(entry.posts),
                                stories: KindSet::from_ids(entry.stories),
                                reels: KindSet::from_ids(entry.reels),
                            },
                        )
                    })
                    .collect(),
                Err(e) => {
                    warn!(
                        "Archive file {} is malformed ({}), starting with an empty archive",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(e) => {
                debug!(
                    "Archive file {} not readable ({}), starting with an empty archive",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        ArchiveStore {
            path,
            accounts,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, account: &str, kind: MediaKind, id: &str) -> bool {
        self.accounts
            .get(account)
            .map(|a| a.kind(kind).contains(id))
            .unwrap_or(false)
    }

    /// Record an item id as seen. Idempotent: re-inserting an existing key is
    /// a no-op. Returns true if the key was new.
    pub fn insert(&mut self, account: &str, kind: MediaKind, id: &str) -> bool {
        let entry = self.accounts.entry(account.to_string()).or_default();
        let inserted = entry.kind_mut(kind).insert(id);
        if inserted {
            self.dirty = true;
        }
        inserted
    }

    /// Write the full key set to disk (temp file + rename).
    pub fn persist(&mut self) -> Result<()> {
        let doc: BTreeMap<&String, AccountArchiveDoc> = self
            .accounts
            .iter()
            .map(|(account, entry)| {
                (
                    account,
                    AccountArchiveDoc {
                        posts: entry.posts.order.clone(),
                        stories: entry.stories.order.clone(),
                        reels: entry.reels.order.clone(),
                    },
                )
            })
            .collect();

        let json = serde_json::to_string_pretty(&doc).map_err(|e| Error::Persistence {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })?;
        fsutil::atomic_write(&self.path, json.as_bytes())?;
        self.dirty = false;
        debug!("Archive persisted to {}", self.path.display());
        Ok(())
    }

    /// True if there are inserts not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.accounts
            .values()
            .map(|a| a.posts.order.len() + a.stories.order.len() + a.reels.order.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts_for(&self, account: &str) -> ArchiveCounts {
        match self.accounts.get(account) {
            Some(a) => ArchiveCounts {
                posts: a.posts.order.len(),
                stories: a.stories.order.len(),
                reels: a.reels.order.len(),
            },
            None => ArchiveCounts::default(),
        }
    }

    pub fn accounts(&self) -> impl Iterator<Item = &String> {
        self.accounts.keys()
    }
}
