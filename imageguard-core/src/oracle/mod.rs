//! Label oracle: external image recognition.
//!
//! The oracle is asked what an image depicts and answers with an ordered list
//! of entity descriptions and confidence scores. Interpreting the answer is
//! the moderation pipeline's job; clients only wrap the wire contract.
//!
//! ## Implementations
//!
//! - [`VisionOracle`] - Google Cloud Vision web detection (requires API key)
//! - [`DisabledOracle`] - always fails; used when no credential is configured
//! - [`ScriptedOracle`] - canned responses per URL (testing)

mod scripted;
#[cfg(feature = "network")]
mod vision;

pub use scripted::{DisabledOracle, ScriptedOracle};
#[cfg(feature = "network")]
pub use vision::{VisionOracle, VisionOracleConfig, DEFAULT_VISION_API_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entity the oracle believes the image depicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntity {
    pub description: String,
    /// Confidence score, nominally in `[0, 1]`.
    pub confidence: f32,
}

impl LabelEntity {
    pub fn new(description: impl Into<String>, confidence: f32) -> Self {
        Self {
            description: description.into(),
            confidence,
        }
    }
}

/// Trait for label oracles.
///
/// Implementations must be thread-safe (`Send + Sync`). Network or service
/// failures, including malformed responses, are reported as
/// [`GuardError::Oracle`](crate::GuardError::Oracle).
#[async_trait]
pub trait LabelOracle: Send + Sync {
    /// Describe the image at `image_url`.
    async fn detect(&self, image_url: &str) -> Result<Vec<LabelEntity>>;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
}
