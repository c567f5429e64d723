//! Check command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use imageguard_core::{FileFingerprintStore, FingerprintStore, SimilarityMatcher};
use tracing::info;

use super::fingerprint_file;
use crate::exit_codes::ExitCode;

/// Report whether `file` matches the ban list at `store_path`.
///
/// Exits with [`crate::exit_codes::BANNED`] on a match.
pub async fn execute(
    file: PathBuf,
    store_path: PathBuf,
    threshold: u32,
    quiet: bool,
) -> Result<ExitCode> {
    let fingerprint = fingerprint_file(&file)?;

    let store = FileFingerprintStore::new(&store_path);
    let snapshot = store
        .load_snapshot()
        .await
        .with_context(|| format!("Failed to load ban list: {}", store_path.display()))?;
    info!(entries = snapshot.len(), threshold, "Loaded ban list");

    let matcher = SimilarityMatcher::new(threshold);
    match matcher.find_match(&fingerprint, &snapshot) {
        Some(hit) => {
            if !quiet {
                println!(
                    "{} {} (matches {} at distance {})",
                    "BANNED".red().bold(),
                    fingerprint,
                    hit.fingerprint,
                    hit.distance
                );
            }
            Ok(ExitCode::banned())
        }
        None => {
            if !quiet {
                let closest = SimilarityMatcher::closest(&fingerprint, &snapshot)
                    .map(|m| m.distance.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} {} (closest distance {})",
                    "ALLOWED".green().bold(),
                    fingerprint,
                    closest
                );
            }
            Ok(ExitCode::success())
        }
    }
}
