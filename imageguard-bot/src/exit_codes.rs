//! Exit codes following sysexits.h conventions.
//!
//! `check` additionally reports a banned image with [`BANNED`] so scripts can
//! tell "banned" apart from "could not check".

use imageguard_core::{ErrorKind, GuardError};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// The checked image matches the ban list.
pub const BANNED: i32 = 3;

/// Data format error (file is not a decodable image).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (image host, label oracle, chat transport).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (fingerprint store unreadable or unwritable).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Configuration error.
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub const fn banned() -> Self {
        Self {
            code: BANNED,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Prefer the typed error kind anywhere in the chain
        let kind = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<GuardError>())
            .map(GuardError::kind);

        let code = match kind {
            Some(ErrorKind::Decode) => DATA_ERROR,
            Some(ErrorKind::Fetch | ErrorKind::Oracle | ErrorKind::Gateway) => NETWORK_ERROR,
            Some(ErrorKind::StoreLoad | ErrorKind::StoreWrite) => IO_ERROR,
            Some(ErrorKind::Config) => CONFIG_ERROR,
            None if message.contains("Failed to read file") => INPUT_ERROR,
            None if message.contains("Invalid") => CONFIG_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_typed_errors_classified() {
        let err: anyhow::Error = Err::<(), _>(GuardError::Decode("bad png".into()))
            .context("Failed to fingerprint image")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);

        let err = anyhow::Error::new(GuardError::StoreWrite("disk full".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, IO_ERROR);
    }

    #[test]
    fn test_untyped_errors_classified() {
        let err = anyhow::anyhow!("Failed to read file: missing.png");
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);

        let err = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }
}
