//! Non-network oracles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{LabelEntity, LabelOracle};
use crate::error::{GuardError, Result};

/// Oracle that is switched off. Every call fails, so with the default
/// fail-open policy the pipeline falls back to blacklist matching only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOracle;

#[async_trait]
impl LabelOracle for DisabledOracle {
    async fn detect(&self, _image_url: &str) -> Result<Vec<LabelEntity>> {
        Err(GuardError::Oracle("Label oracle is not configured".into()))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Oracle with canned answers keyed by URL.
///
/// WARNING: testing only. URLs without a script get an empty label list.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    responses: RwLock<HashMap<String, Option<Vec<LabelEntity>>>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `labels`.
    pub fn respond(&self, url: impl Into<String>, labels: Vec<LabelEntity>) {
        self.write().insert(url.into(), Some(labels));
    }

    /// Fail every call for `url`.
    pub fn fail(&self, url: impl Into<String>) {
        self.write().insert(url.into(), None);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Option<Vec<LabelEntity>>>> {
        self.responses.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LabelOracle for ScriptedOracle {
    async fn detect(&self, image_url: &str) -> Result<Vec<LabelEntity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.read().unwrap_or_else(|e| e.into_inner());
        match responses.get(image_url) {
            Some(Some(labels)) => Ok(labels.clone()),
            Some(None) => Err(GuardError::Oracle(format!(
                "Simulated oracle failure for {image_url}"
            ))),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
