//! Shared handles for the pipeline and the curation command.
//!
//! Every suspension point (image fetch, oracle call, store I/O, chat action)
//! goes through this type so that it carries a timeout, and so that tests can
//! swap any collaborator for a fake.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::chat::{ChatGateway, ChatMessage};
use crate::error::{GuardError, Result};
use crate::fetch::ImageFetcher;
use crate::fingerprint::{Fingerprint, FingerprintCodec};
use crate::oracle::{LabelEntity, LabelOracle};
use crate::policy::ModerationPolicy;
use crate::store::{FingerprintStore, Snapshot};

/// Per-call time limits for each kind of suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub fetch: Duration,
    pub oracle: Duration,
    pub store: Duration,
    pub gateway: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(10),
            oracle: Duration::from_secs(15),
            store: Duration::from_secs(5),
            gateway: Duration::from_secs(10),
        }
    }
}

/// Await `future` for at most `limit`; on expiry report `make_err`.
pub(crate) async fn bounded<T>(
    limit: Duration,
    operation: &str,
    make_err: fn(String) -> GuardError,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(make_err(format!(
            "{operation} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Explicit context constructed once and handed to every handler.
#[derive(Clone)]
pub struct GuardContext {
    pub store: Arc<dyn FingerprintStore>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub oracle: Arc<dyn LabelOracle>,
    pub gateway: Arc<dyn ChatGateway>,
    pub codec: FingerprintCodec,
    pub policy: Arc<ModerationPolicy>,
    pub timeouts: Timeouts,
    /// Messages from this author are never processed.
    pub bot_user_id: Option<String>,
}

impl GuardContext {
    pub fn new(
        store: Arc<dyn FingerprintStore>,
        fetcher: Arc<dyn ImageFetcher>,
        oracle: Arc<dyn LabelOracle>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            store,
            fetcher,
            oracle,
            gateway,
            codec: FingerprintCodec::new(),
            policy: Arc::new(ModerationPolicy::default()),
            timeouts: Timeouts::default(),
            bot_user_id: None,
        }
    }

    pub fn with_policy(mut self, policy: ModerationPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_bot_user_id(mut self, bot_user_id: impl Into<String>) -> Self {
        self.bot_user_id = Some(bot_user_id.into());
        self
    }

    pub async fn load_snapshot(&self) -> Result<Snapshot> {
        bounded(
            self.timeouts.store,
            "Store load",
            GuardError::StoreLoad,
            self.store.load_snapshot(),
        )
        .await
    }

    /// Load a snapshot, degrading an unreadable store to an empty one.
    pub async fn load_snapshot_or_empty(&self) -> Snapshot {
        match self.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "Fingerprint store unreadable, using empty snapshot");
                Snapshot::new()
            }
        }
    }

    pub async fn append(&self, fingerprint: Fingerprint) -> Result<()> {
        bounded(
            self.timeouts.store,
            "Store append",
            GuardError::StoreWrite,
            self.store.append(fingerprint),
        )
        .await
    }

    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        bounded(
            self.timeouts.fetch,
            "Image fetch",
            GuardError::Fetch,
            self.fetcher.fetch(url),
        )
        .await
    }

    /// Fetch `url` and compute its fingerprint. Decoding runs on the
    /// blocking pool.
    pub async fn fetch_fingerprint(&self, url: &str) -> Result<Fingerprint> {
        let bytes = self.fetch_image(url).await?;
        let codec = self.codec;
        tokio::task::spawn_blocking(move || codec.compute(&bytes))
            .await
            .map_err(|e| GuardError::Decode(format!("Fingerprint task failed: {e}")))?
    }

    pub async fn detect(&self, url: &str) -> Result<Vec<LabelEntity>> {
        bounded(
            self.timeouts.oracle,
            "Oracle call",
            GuardError::Oracle,
            self.oracle.detect(url),
        )
        .await
    }

    pub async fn delete_message(&self, message: &ChatMessage) -> Result<()> {
        bounded(
            self.timeouts.gateway,
            "Delete message",
            GuardError::Gateway,
            self.gateway.delete_message(&message.channel_id, &message.id),
        )
        .await
    }

    pub async fn send_text(&self, channel_id: &str, text: &str) -> Result<()> {
        bounded(
            self.timeouts.gateway,
            "Send text",
            GuardError::Gateway,
            self.gateway.send_text(channel_id, text),
        )
        .await
    }

    pub async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<ChatMessage> {
        bounded(
            self.timeouts.gateway,
            "Fetch message",
            GuardError::Gateway,
            self.gateway.fetch_message(channel_id, message_id),
        )
        .await
    }
}
