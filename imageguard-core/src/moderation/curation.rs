//! Moderator "ban this image" command.
//!
//! A moderator replies `!blockimage` to a message carrying an image. The
//! image's fingerprint is added to the store unless an identical one is
//! already there. Unlike the moderation pipeline, every outcome (including
//! internal failures) is reported back to the channel.

use std::time::Duration;

use tracing::{info, instrument, warn};

use super::candidates::curation_targets;
use super::chat::ChatMessage;
use super::context::{bounded, GuardContext};
use crate::error::{ErrorKind, GuardError, Result};
use crate::fingerprint::Fingerprint;
use crate::matcher::SimilarityMatcher;
use crate::store::{FingerprintStore, Snapshot};

/// The curation command, matched case-insensitively against the whole message.
pub const BLOCK_COMMAND: &str = "!blockimage";

pub const REPLY_HINT: &str = "Reply to an image with !blockimage";
pub const IMAGE_ADDED: &str = "Image added to the ban list.";
pub const IMAGE_ALREADY_BANNED: &str = "Image already banned!.";
pub const IMAGE_NOT_FOUND: &str = "Image not found.";
pub const REPLY_TARGET_UNAVAILABLE: &str = "Could not load the replied-to message.";
pub const IMAGE_UNREADABLE: &str = "Could not read that image.";
pub const BAN_WRITE_FAILED: &str = "Failed to add image to the ban list.";

/// Whether `content` is exactly the curation command.
pub fn is_block_command(content: &str) -> bool {
    content.eq_ignore_ascii_case(BLOCK_COMMAND)
}

/// Result of adding one fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added(Fingerprint),
    AlreadyBanned(Fingerprint),
}

/// Add `fingerprint` unless an identical one is already stored.
///
/// Membership is exact (threshold 0), not the pipeline's tolerant match. An
/// unreadable store is treated as empty; a failed append is an error.
pub async fn add_if_new(
    store: &dyn FingerprintStore,
    fingerprint: Fingerprint,
    store_timeout: Duration,
) -> Result<AddOutcome> {
    let snapshot = match bounded(
        store_timeout,
        "Store load",
        GuardError::StoreLoad,
        store.load_snapshot(),
    )
    .await
    {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "Fingerprint store unreadable, using empty snapshot");
            Snapshot::new()
        }
    };

    if SimilarityMatcher::exact().is_banned(&fingerprint, &snapshot) {
        return Ok(AddOutcome::AlreadyBanned(fingerprint));
    }

    bounded(
        store_timeout,
        "Store append",
        GuardError::StoreWrite,
        store.append(fingerprint),
    )
    .await?;
    Ok(AddOutcome::Added(fingerprint))
}

/// Outcome for one resolved target, or for the command as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurationOutcome {
    NotAReply,
    ReplyTargetUnavailable,
    NotFound,
    Added { url: String, fingerprint: Fingerprint },
    AlreadyBanned { url: String, fingerprint: Fingerprint },
    Failed { url: String, kind: ErrorKind },
}

impl CurationOutcome {
    /// Text posted back to the moderator.
    pub fn response(&self) -> &'static str {
        match self {
            Self::NotAReply => REPLY_HINT,
            Self::ReplyTargetUnavailable => REPLY_TARGET_UNAVAILABLE,
            Self::NotFound => IMAGE_NOT_FOUND,
            Self::Added { .. } => IMAGE_ADDED,
            Self::AlreadyBanned { .. } => IMAGE_ALREADY_BANNED,
            Self::Failed {
                kind: ErrorKind::StoreWrite,
                ..
            } => BAN_WRITE_FAILED,
            Self::Failed { .. } => IMAGE_UNREADABLE,
        }
    }
}

/// Handles `!blockimage` replies.
#[derive(Clone)]
pub struct CurationHandler {
    ctx: GuardContext,
}

impl CurationHandler {
    pub fn new(ctx: GuardContext) -> Self {
        Self { ctx }
    }

    /// Run the command and post one response per outcome.
    #[instrument(level = "info", skip_all, fields(message_id = %command.id, channel_id = %command.channel_id))]
    pub async fn handle(&self, command: &ChatMessage) -> Vec<CurationOutcome> {
        let outcomes = self.resolve(command).await;
        for outcome in &outcomes {
            if let Err(e) = self
                .ctx
                .send_text(&command.channel_id, outcome.response())
                .await
            {
                warn!(error = %e, "Failed to send curation response");
            }
        }
        outcomes
    }

    async fn resolve(&self, command: &ChatMessage) -> Vec<CurationOutcome> {
        let Some(original_id) = command.reply_to.as_deref() else {
            return vec![CurationOutcome::NotAReply];
        };

        let original = match self
            .ctx
            .fetch_message(&command.channel_id, original_id)
            .await
        {
            Ok(original) => original,
            Err(e) => {
                warn!(original_id, error = %e, "Could not resolve reply target");
                return vec![CurationOutcome::ReplyTargetUnavailable];
            }
        };

        let targets = curation_targets(&original, &self.ctx.policy.trusted_marker);
        if targets.is_empty() {
            return vec![CurationOutcome::NotFound];
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.ban_url(target.url).await);
        }
        outcomes
    }

    async fn ban_url(&self, url: String) -> CurationOutcome {
        let fingerprint = match self.ctx.fetch_fingerprint(&url).await {
            Ok(fp) => fp,
            Err(e) => {
                warn!(url = %url, error = %e, "Could not fingerprint curation target");
                return CurationOutcome::Failed { url, kind: e.kind() };
            }
        };

        match add_if_new(self.ctx.store.as_ref(), fingerprint, self.ctx.timeouts.store).await {
            Ok(AddOutcome::Added(fingerprint)) => {
                info!(url = %url, fingerprint = %fingerprint, "Image added to ban list");
                CurationOutcome::Added { url, fingerprint }
            }
            Ok(AddOutcome::AlreadyBanned(fingerprint)) => {
                info!(url = %url, fingerprint = %fingerprint, "Image already banned");
                CurationOutcome::AlreadyBanned { url, fingerprint }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to persist curated fingerprint");
                CurationOutcome::Failed { url, kind: e.kind() }
            }
        }
    }
}
