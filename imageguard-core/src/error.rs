use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Image fetch error: {0}")]
    Fetch(String),

    #[error("Label oracle error: {0}")]
    Oracle(String),

    #[error("Fingerprint store load error: {0}")]
    StoreLoad(String),

    #[error("Fingerprint store write error: {0}")]
    StoreWrite(String),

    #[error("Chat gateway error: {0}")]
    Gateway(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error classification, used as a structured logging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Fetch,
    Oracle,
    StoreLoad,
    StoreWrite,
    Gateway,
    Config,
}

impl GuardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Oracle(_) => ErrorKind::Oracle,
            Self::StoreLoad(_) => ErrorKind::StoreLoad,
            Self::StoreWrite(_) => ErrorKind::StoreWrite,
            Self::Gateway(_) => ErrorKind::Gateway,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this error belongs to a single candidate image rather than
    /// to the message or the store as a whole.
    pub fn is_candidate_scoped(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Decode | ErrorKind::Fetch | ErrorKind::Oracle
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Decode => "decode",
            Self::Fetch => "fetch",
            Self::Oracle => "oracle",
            Self::StoreLoad => "store_load",
            Self::StoreWrite => "store_write",
            Self::Gateway => "gateway",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
