//! Hash command implementation.

use std::path::PathBuf;

use anyhow::Result;

use super::fingerprint_file;
use crate::exit_codes::ExitCode;

/// Print the fingerprint of `file` in its canonical hex form.
pub fn execute(file: PathBuf) -> Result<ExitCode> {
    let fingerprint = fingerprint_file(&file)?;
    println!("{fingerprint}");
    Ok(ExitCode::success())
}
