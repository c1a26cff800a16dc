use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence error for {path}: {detail}")]
    Persistence { path: String, detail: String },

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Account '{0}' is already registered")]
    DuplicateAccount(String),

    #[error("Account '{0}' is not registered")]
    AccountNotFound(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Other(String),
}

/// Failures surfaced by the external fetch tool. The scan coordinator
/// recovers from account- and item-level failures locally; a spawn failure
/// means the tool itself is unusable and aborts the whole run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to launch fetch tool '{program}': {detail}")]
    Spawn { program: String, detail: String },

    #[error("Scan of account '{account}' failed: {detail}")]
    Account { account: String, detail: String },

    #[error("Fetch of item '{id}' failed: {detail}")]
    Item { id: String, detail: String },

    #[error("Download of '{url}' failed: {detail}")]
    Url { url: String, detail: String },
}

pub type Result<T> = std::result::Result<T, Error>;
