//! Ban command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use imageguard_core::moderation::curation::{IMAGE_ADDED, IMAGE_ALREADY_BANNED};
use imageguard_core::moderation::{add_if_new, AddOutcome};
use imageguard_core::FileFingerprintStore;

use super::fingerprint_file;
use crate::exit_codes::ExitCode;

/// Add the fingerprint of `file` to the ban list unless it is already there.
pub async fn execute(
    file: PathBuf,
    store_path: PathBuf,
    store_timeout: Duration,
) -> Result<ExitCode> {
    let fingerprint = fingerprint_file(&file)?;
    let store = FileFingerprintStore::new(&store_path);

    let outcome = add_if_new(&store, fingerprint, store_timeout)
        .await
        .with_context(|| format!("Failed to write ban list: {}", store_path.display()))?;

    match outcome {
        AddOutcome::Added(fp) => println!("{} {}", IMAGE_ADDED.green(), fp),
        AddOutcome::AlreadyBanned(fp) => println!("{} {}", IMAGE_ALREADY_BANNED.yellow(), fp),
    }
    Ok(ExitCode::success())
}
