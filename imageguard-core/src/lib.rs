//! ImageGuard Core - perceptual-hash image moderation for chat communities
//!
//! This crate blocks images that look like a known-banned picture, escalates
//! unknown images to an external label oracle, and lets moderators grow the
//! blacklist from chat.
//!
//! # Features
//!
//! - 64-bit DCT mean-hash fingerprints compared by Hamming distance
//! - Append-only fingerprint log, safe under concurrent writers
//! - Google Cloud Vision web detection as the label oracle
//! - Configurable fail-open / fail-closed handling of per-image errors
//! - Bounded concurrent event processing
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use imageguard_core::{
//!     ChatMessage, DisabledOracle, FileFingerprintStore, GuardContext, HttpImageFetcher,
//!     ModerationPipeline, RecordingGateway,
//! };
//!
//! # async fn example() -> imageguard_core::Result<()> {
//! let ctx = GuardContext::new(
//!     Arc::new(FileFingerprintStore::new("blockedImages.txt")),
//!     Arc::new(HttpImageFetcher::new()?),
//!     Arc::new(DisabledOracle),
//!     Arc::new(RecordingGateway::new()),
//! );
//!
//! let message = ChatMessage::new("1", "general", "alice", "https://example.com/cat.png");
//! let decision = ModerationPipeline::new(ctx).process(&message).await;
//! println!("blocked: {}", decision.is_blocked());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fetch;
pub mod fingerprint;
#[cfg(feature = "network")]
pub mod http;
pub mod matcher;
pub mod moderation;
pub mod oracle;
pub mod policy;
pub mod store;

// Re-export main types for convenience
pub use error::{ErrorKind, GuardError, Result};
pub use fetch::{ImageFetcher, MemoryImageFetcher};
pub use fingerprint::{Fingerprint, FingerprintCodec, FINGERPRINT_HEX_LEN};
pub use matcher::{is_banned, Match, SimilarityMatcher, DEFAULT_SIMILARITY_THRESHOLD};
pub use moderation::{
    Attachment, BlockReason, ChatEvent, ChatGateway, ChatMessage, CurationHandler,
    CurationOutcome, EventOutcome, EventRouter, GuardContext, ModerationDecision,
    ModerationPipeline, ModerationService, OutboundAction, RecordingGateway, ServiceConfig,
    ServiceStats, Timeouts,
};
pub use oracle::{DisabledOracle, LabelEntity, LabelOracle, ScriptedOracle};
pub use policy::{FailureMode, ModerationPolicy};
pub use store::{FileFingerprintStore, FingerprintStore, MemoryFingerprintStore, Snapshot};

// Network-dependent exports
#[cfg(feature = "network")]
pub use fetch::{HttpImageFetcher, HttpImageFetcherConfig, DEFAULT_MAX_IMAGE_BYTES};
#[cfg(feature = "network")]
pub use oracle::{VisionOracle, VisionOracleConfig};
