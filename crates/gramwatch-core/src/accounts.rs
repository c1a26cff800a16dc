use crate::error::{Error, Result};
use crate::fsutil;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A monitored account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub added_at: DateTime<Utc>,
}

/// Ordered list of monitored accounts, persisted as a JSON array.
///
/// Unlike the archive, a corrupt registry file is a startup error: silently
/// dropping the account list would make every scan a no-op.
#[derive(Debug)]
pub struct AccountRegistry {
    path: PathBuf,
    accounts: Vec<Account>,
}

/// Lowercase the username, strip a leading '@', and reject anything outside
/// the platform's username charset.
pub fn normalize_username(raw: &str) -> Result<String> {
    let name = raw.trim().trim_start_matches('@').to_lowercase();
    if name.is_empty() {
        return Err(Error::Other("username must not be empty".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(Error::Other(format!(
            "invalid username '{}': only letters, digits, '_' and '.' are allowed",
            name
        )));
    }
    Ok(name)
}

impl AccountRegistry {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let accounts = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| Error::Persistence {
                    path: path.display().to_string(),
                    detail: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(Error::Persistence {
                    path: path.display().to_string(),
                    detail: e.to_string(),
                })
            }
        };
        Ok(AccountRegistry { path, accounts })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a new account. Fails with `DuplicateAccount` if already present.
    pub fn add(&mut self, username: &str) -> Result<&Account> {
        let username = normalize_username(username)?;
        if self.accounts.iter().any(|a| a.username == username) {
            return Err(Error::DuplicateAccount(username));
        }
        self.accounts.push(Account {
            username,
            added_at: Utc::now(),
        });
        self.persist()?;
        Ok(self.accounts.last().unwrap())
    }

    /// Remove an account. Fails with `AccountNotFound` if absent.
    pub fn remove(&mut self, username: &str) -> Result<Account> {
        let username = normalize_username(username)?;
        let pos = self
            .accounts
            .iter()
            .position(|a| a.username == username)
            .ok_or(Error::AccountNotFound(username))?;
        let removed = self.accounts.remove(pos);
        self.persist()?;
        Ok(removed)
    }

    /// Accounts in insertion order.
    pub fn list(&self) -> &[Account] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.accounts.iter().any(|a| a.username == username)
    }

    fn persist(&self) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.accounts).map_err(|e| Error::Persistence {
                path: self.path.display().to_string(),
                detail: e.to_string(),
            })?;
        fsutil::atomic_write(&self.path, json.as_bytes())?;
        debug!("Account registry persisted to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_in(dir: &tempfile::TempDir) -> AccountRegistry {
        AccountRegistry::load(dir.path().join("accounts.json")).unwrap()
    }

    #[test]
    fn test_add_and_list_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_in(&dir);
        reg.add("charlie").unwrap();
        reg.add("alice").unwrap();
        reg.add("bob").unwrap();

        let names: Vec<&str> = reg.list().iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["charlie", "alice", "bob"]);
    }

    #[test]
    fn test_add_duplicate_fails_and_leaves_registry_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_in(&dir);
        reg.add("alice").unwrap();

        let err = reg.add("alice").unwrap_err();
        assert!(matches!(err, Error::DuplicateAccount(name) if name == "alice"));
        assert_eq!(reg.len(), 1);

        // '@Alice' normalizes to the same username
        let err = reg.add("@Alice").unwrap_err();
        assert!(matches!(err, Error::DuplicateAccount(_)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_remove_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_in(&dir);
        let err = reg.remove("ghost").unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(name) if name == "ghost"));
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let mut reg = AccountRegistry::load(&path).unwrap();
        reg.add("alice").unwrap();
        reg.add("bob").unwrap();
        reg.remove("alice").unwrap();

        let reloaded = AccountRegistry::load(&path).unwrap();
        assert_eq!(reloaded.list(), reg.list());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AccountRegistry::load(&path),
            Err(Error::Persistence { .. })
        ));
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("@Some_User.99").unwrap(), "some_user.99");
        assert!(normalize_username("").is_err());
        assert!(normalize_username("has space").is_err());
        assert!(normalize_username("emoji🙂").is_err());
    }
}
