//! Moderation policy values injected at construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GuardError;
use crate::matcher::DEFAULT_SIMILARITY_THRESHOLD;

/// Default oracle score cutoff. Scores must be strictly greater.
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.8;

/// Default banned-subject phrase matched against oracle descriptions.
pub const DEFAULT_BANNED_PHRASE: &str = "nikocado avocado";

/// Default first-party attachment host marker trusted by the curation command.
pub const DEFAULT_TRUSTED_MARKER: &str = "cdn.discordapp.com/attachments/";

/// What to do with a candidate whose fetch, decode or oracle call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Treat the candidate as non-matching and keep going.
    #[default]
    Open,
    /// Block the message as if the candidate had matched.
    Closed,
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

impl FromStr for FailureMode {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(GuardError::Config(format!(
                "Unknown failure mode '{other}' (expected 'open' or 'closed')"
            ))),
        }
    }
}

/// Thresholds and trigger phrase for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationPolicy {
    /// Similarity tolerance in bits for the moderation pipeline.
    pub similarity_threshold: u32,
    /// Oracle confidence cutoff, exclusive.
    pub confidence_floor: f32,
    /// Case-insensitive substring that flags an oracle entity.
    pub banned_phrase: String,
    pub failure_mode: FailureMode,
    /// URL substring that marks first-party attachment hosting.
    pub trusted_marker: String,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            banned_phrase: DEFAULT_BANNED_PHRASE.to_string(),
            failure_mode: FailureMode::Open,
            trusted_marker: DEFAULT_TRUSTED_MARKER.to_string(),
        }
    }
}

impl ModerationPolicy {
    /// Reject values that would make the policy meaningless.
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.similarity_threshold > 64 {
            return Err(GuardError::Config(format!(
                "Similarity threshold {} exceeds fingerprint width (64)",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(GuardError::Config(format!(
                "Confidence floor {} outside [0, 1]",
                self.confidence_floor
            )));
        }
        if self.banned_phrase.trim().is_empty() {
            return Err(GuardError::Config("Banned phrase must not be empty".into()));
        }
        Ok(())
    }

    /// Whether an oracle entity flags the banned subject.
    pub fn flags(&self, description: &str, confidence: f32) -> bool {
        confidence > self.confidence_floor
            && description
                .to_lowercase()
                .contains(&self.banned_phrase.to_lowercase())
    }
}
