//! Per-message moderation pipeline.
//!
//! ```text
//! Idle -> ExtractCandidates -> PerFingerprintCheck -> { Blocked | OracleCheck }
//!                                                       OracleCheck -> { Blocked | Allowed }
//! ```
//!
//! One store snapshot is taken per message. The first blacklist hit wins and
//! stops processing; the oracle is consulted only when no candidate matched.
//! An oracle hit teaches the store the candidate's fingerprint.

use tracing::{debug, error, info, instrument, warn};

use super::candidates::{extract_candidates, CandidateImage};
use super::chat::ChatMessage;
use super::context::GuardContext;
use crate::error::{ErrorKind, GuardError};
use crate::fingerprint::Fingerprint;
use crate::matcher::SimilarityMatcher;
use crate::policy::FailureMode;

/// Notice sent to the channel after a banned image is removed.
pub const BANNED_NOTICE: &str = "Stop sending banned images";

/// Why a message was blocked.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockReason {
    /// A candidate matched a stored fingerprint.
    StoreMatch {
        url: String,
        fingerprint: Fingerprint,
        distance: u32,
    },
    /// The oracle flagged a candidate. `learned` is the fingerprint appended
    /// to the store, if one could be computed and written.
    OracleFlag {
        url: String,
        description: String,
        confidence: f32,
        learned: Option<Fingerprint>,
    },
    /// A candidate failed and the deployment runs fail-closed.
    FailClosed { url: String, kind: ErrorKind },
}

/// Terminal outcome for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationDecision {
    Allowed,
    Blocked(BlockReason),
}

impl ModerationDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}

/// Moderation pipeline over an injected [`GuardContext`].
#[derive(Clone)]
pub struct ModerationPipeline {
    ctx: GuardContext,
}

impl ModerationPipeline {
    pub fn new(ctx: GuardContext) -> Self {
        Self { ctx }
    }

    /// Run the pipeline for one message and carry out the decision.
    ///
    /// Never fails: internal errors are logged and resolved according to the
    /// failure mode, and nothing but the ban notice reaches the channel.
    #[instrument(level = "info", skip_all, fields(message_id = %message.id, channel_id = %message.channel_id))]
    pub async fn process(&self, message: &ChatMessage) -> ModerationDecision {
        let candidates = extract_candidates(message);
        if candidates.is_empty() {
            debug!("No candidate images");
            return ModerationDecision::Allowed;
        }
        debug!(candidates = candidates.len(), "Extracted candidate images");

        let snapshot = self.ctx.load_snapshot_or_empty().await;
        let matcher = SimilarityMatcher::new(self.ctx.policy.similarity_threshold);
        let mut fingerprints: Vec<Option<Fingerprint>> = vec![None; candidates.len()];

        for (candidate, slot) in candidates.iter().zip(fingerprints.iter_mut()) {
            let fingerprint = match self.ctx.fetch_fingerprint(&candidate.url).await {
                Ok(fp) => fp,
                Err(e) => {
                    if let Some(reason) = self.candidate_failed(candidate, e) {
                        return self.block(message, reason).await;
                    }
                    continue;
                }
            };
            *slot = Some(fingerprint);

            if let Some(hit) = matcher.find_match(&fingerprint, &snapshot) {
                return self
                    .block(
                        message,
                        BlockReason::StoreMatch {
                            url: candidate.url.clone(),
                            fingerprint: hit.fingerprint,
                            distance: hit.distance,
                        },
                    )
                    .await;
            }
        }

        for (candidate, known) in candidates.iter().zip(fingerprints) {
            let labels = match self.ctx.detect(&candidate.url).await {
                Ok(labels) => labels,
                Err(e) => {
                    if let Some(reason) = self.candidate_failed(candidate, e) {
                        return self.block(message, reason).await;
                    }
                    continue;
                }
            };

            let Some(flagged) = labels
                .iter()
                .find(|label| self.ctx.policy.flags(&label.description, label.confidence))
            else {
                continue;
            };

            info!(
                url = %candidate.url,
                description = %flagged.description,
                confidence = flagged.confidence,
                oracle = self.ctx.oracle.name(),
                "Oracle flagged candidate"
            );
            let learned = self.learn(candidate, known).await;
            return self
                .block(
                    message,
                    BlockReason::OracleFlag {
                        url: candidate.url.clone(),
                        description: flagged.description.clone(),
                        confidence: flagged.confidence,
                        learned,
                    },
                )
                .await;
        }

        debug!("Message allowed");
        ModerationDecision::Allowed
    }

    /// Resolve a per-candidate failure. `Some` means block the message.
    fn candidate_failed(&self, candidate: &CandidateImage, err: GuardError) -> Option<BlockReason> {
        match self.ctx.policy.failure_mode {
            FailureMode::Open => {
                warn!(url = %candidate.url, kind = %err.kind(), error = %err, "Candidate treated as non-matching");
                None
            }
            FailureMode::Closed => {
                warn!(url = %candidate.url, kind = %err.kind(), error = %err, "Candidate failed, blocking (fail-closed)");
                Some(BlockReason::FailClosed {
                    url: candidate.url.clone(),
                    kind: err.kind(),
                })
            }
        }
    }

    /// Append the flagged candidate's fingerprint, fetching it again if the
    /// first pass could not compute it. Teaching is best-effort.
    async fn learn(&self, candidate: &CandidateImage, known: Option<Fingerprint>) -> Option<Fingerprint> {
        let fingerprint = match known {
            Some(fp) => fp,
            None => match self.ctx.fetch_fingerprint(&candidate.url).await {
                Ok(fp) => fp,
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Could not fingerprint flagged image, not learning it");
                    return None;
                }
            },
        };

        match self.ctx.append(fingerprint).await {
            Ok(()) => {
                info!(fingerprint = %fingerprint, "Learned new banned fingerprint");
                Some(fingerprint)
            }
            Err(e) => {
                error!(fingerprint = %fingerprint, error = %e, "Failed to persist learned fingerprint");
                None
            }
        }
    }

    async fn block(&self, message: &ChatMessage, reason: BlockReason) -> ModerationDecision {
        info!(author_id = %message.author_id, reason = ?reason, "Blocking message");

        if let Err(e) = self.ctx.delete_message(message).await {
            error!(error = %e, "Failed to delete banned message");
        }
        if let Err(e) = self.ctx.send_text(&message.channel_id, BANNED_NOTICE).await {
            error!(error = %e, "Failed to send ban notice");
        }
        ModerationDecision::Blocked(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::fetch::MemoryImageFetcher;
    use crate::moderation::chat::{Attachment, RecordingGateway};
    use crate::oracle::{LabelEntity, ScriptedOracle};
    use crate::policy::ModerationPolicy;
    use crate::fingerprint::FingerprintCodec;
    use crate::store::{FingerprintStore, MemoryFingerprintStore};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    struct Harness {
        store: Arc<MemoryFingerprintStore>,
        fetcher: Arc<MemoryImageFetcher>,
        oracle: Arc<ScriptedOracle>,
        gateway: Arc<RecordingGateway>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryFingerprintStore::new()),
                fetcher: Arc::new(MemoryImageFetcher::new()),
                oracle: Arc::new(ScriptedOracle::new()),
                gateway: Arc::new(RecordingGateway::new()),
            }
        }

        fn pipeline(&self, policy: ModerationPolicy) -> ModerationPipeline {
            ModerationPipeline::new(
                GuardContext::new(
                    self.store.clone(),
                    self.fetcher.clone(),
                    self.oracle.clone(),
                    self.gateway.clone(),
                )
                .with_policy(policy),
            )
        }
    }

    fn png(seed: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(64, 64, |x, y| {
            let v = if ((x / 8) * seed + y / 8) % 3 == 0 { 255 } else { 0 };
            Rgb([v, v, v])
        });
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn attachment_message(url: &str) -> ChatMessage {
        ChatMessage::new("m1", "c1", "u1", "").with_attachment(Attachment::new(url, "image/png"))
    }

    #[tokio::test]
    async fn test_fail_closed_blocks_on_fetch_error() {
        let h = Harness::new();
        h.fetcher.fail("https://x/a.png");
        let pipeline = h.pipeline(ModerationPolicy {
            failure_mode: FailureMode::Closed,
            ..Default::default()
        });

        let decision = pipeline.process(&attachment_message("https://x/a.png")).await;
        assert!(matches!(
            decision,
            ModerationDecision::Blocked(BlockReason::FailClosed { kind: ErrorKind::Fetch, .. })
        ));
        assert_eq!(h.gateway.deleted(), vec!["m1".to_string()]);
        assert_eq!(h.oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_open_skips_broken_candidate_and_checks_next() {
        let h = Harness::new();
        h.fetcher.fail("https://x/broken.png");
        h.fetcher.insert("https://x/ok.png", png(3));
        let known = FingerprintCodec::new().compute(&png(3)).unwrap();
        h.store.append(known).await.unwrap();

        let message = ChatMessage::new("m1", "c1", "u1", "https://x/broken.png https://x/ok.png");
        let decision = h.pipeline(ModerationPolicy::default()).process(&message).await;

        assert!(matches!(
            decision,
            ModerationDecision::Blocked(BlockReason::StoreMatch { ref url, distance: 0, .. }) if url == "https://x/ok.png"
        ));
        assert_eq!(h.oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oracle_flag_relearns_when_first_fetch_failed() {
        let h = Harness::new();
        h.fetcher.fail("https://x/a.png");
        h.oracle.respond(
            "https://x/a.png",
            vec![LabelEntity::new("Nikocado Avocado", 0.95)],
        );
        let pipeline = h.pipeline(ModerationPolicy::default());

        let decision = pipeline.process(&attachment_message("https://x/a.png")).await;
        // Blocked on the oracle verdict even though the image could not be learned.
        assert!(matches!(
            decision,
            ModerationDecision::Blocked(BlockReason::OracleFlag { learned: None, .. })
        ));
        assert!(h.store.is_empty());
        assert_eq!(h.fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_low_confidence_is_allowed() {
        let h = Harness::new();
        h.fetcher.insert("https://x/a.png", png(5));
        h.oracle.respond(
            "https://x/a.png",
            vec![LabelEntity::new("nikocado avocado", 0.8)],
        );

        let decision = h
            .pipeline(ModerationPolicy::default())
            .process(&attachment_message("https://x/a.png"))
            .await;
        assert_eq!(decision, ModerationDecision::Allowed);
        assert!(h.gateway.actions().is_empty());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_store_write_failure_still_blocks() {
        let h = Harness::new();
        h.fetcher.insert("https://x/a.png", png(7));
        h.oracle.respond(
            "https://x/a.png",
            vec![LabelEntity::new("nikocado avocado mukbang", 0.99)],
        );
        h.store.set_fail_appends(true);

        let decision = h
            .pipeline(ModerationPolicy::default())
            .process(&attachment_message("https://x/a.png"))
            .await;
        assert!(matches!(
            decision,
            ModerationDecision::Blocked(BlockReason::OracleFlag { learned: None, .. })
        ));
        assert_eq!(h.gateway.sent_texts(), vec![BANNED_NOTICE.to_string()]);
    }
}
