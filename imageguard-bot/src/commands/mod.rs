//! Subcommand implementations.

pub mod ban;
pub mod check;
pub mod hash;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use imageguard_core::{Fingerprint, FingerprintCodec};
use tracing::{debug, info};

/// Read an image file and compute its fingerprint.
pub fn fingerprint_file(file: &Path) -> Result<Fingerprint> {
    let content =
        std::fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
    info!(path = %file.display(), bytes = content.len(), "Read file");

    let fingerprint = FingerprintCodec::new()
        .compute(&content)
        .with_context(|| format!("Failed to fingerprint {}", file.display()))?;
    debug!(fingerprint = %fingerprint, "Computed fingerprint");
    Ok(fingerprint)
}
