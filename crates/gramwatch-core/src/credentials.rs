use crate::error::{Error, Result};
use crate::fsutil;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Cookie blob handed verbatim to the fetch tool. Contents are opaque here:
/// the only check ever made is that something non-empty is present.
#[derive(Debug)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CookieStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_present(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Store pasted cookie text as-is.
    pub fn update_from_text(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::Other("cookie text must not be empty".to_string()));
        }
        fsutil::atomic_write(&self.path, text.as_bytes())?;
        info!("Credentials updated at {}", self.path.display());
        Ok(())
    }

    /// Copy an existing cookie file into place.
    pub fn update_from_file(&self, source: &Path) -> Result<()> {
        let content = fs::read(source)?;
        if content.is_empty() {
            return Err(Error::Other(format!(
                "cookie file {} is empty",
                source.display()
            )));
        }
        fsutil::atomic_write(&self.path, &content)?;
        info!(
            "Credentials copied from {} to {}",
            source.display(),
            self.path.display()
        );
        Ok(())
    }
}
