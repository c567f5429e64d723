//! Bot configuration
//!
//! Loaded from environment variables with sensible defaults. Unparseable
//! numeric values fall back to their default; an unknown failure mode or an
//! out-of-range policy value is rejected by [`Config::validate`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use imageguard_core::policy::{DEFAULT_BANNED_PHRASE, DEFAULT_TRUSTED_MARKER};
use imageguard_core::{
    FailureMode, ModerationPolicy, ServiceConfig, Timeouts, DEFAULT_MAX_IMAGE_BYTES,
};

/// Default location of the banned fingerprint log.
pub const DEFAULT_STORE_PATH: &str = "blockedImages.txt";

/// Number of recent messages kept to resolve `!blockimage` replies.
pub const DEFAULT_RECENT_MESSAGES: usize = 1000;

/// Bot configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Banned fingerprint log (default: blockedImages.txt)
    pub store_path: PathBuf,
    pub policy: ModerationPolicy,
    /// Messages from this author are ignored (default: unset)
    pub bot_user_id: Option<String>,
    pub service: ServiceConfig,
    pub timeouts: Timeouts,
    /// Largest image download accepted, in bytes (default: 25 MiB)
    pub max_image_bytes: usize,
    /// Size of the reply-target cache (default: 1000)
    pub recent_messages: usize,
    /// Cloud Vision API key; without one the label oracle is disabled
    pub vision_api_key: Option<String>,
    /// Cloud Vision endpoint override
    pub vision_api_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            policy: ModerationPolicy::default(),
            bot_user_id: None,
            service: ServiceConfig::default(),
            timeouts: Timeouts::default(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            recent_messages: DEFAULT_RECENT_MESSAGES,
            vision_api_key: None,
            vision_api_url: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            parse_var(&lookup, key)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let failure_mode = match lookup("IMAGEGUARD_FAILURE_MODE") {
            Some(mode) => mode
                .parse::<FailureMode>()
                .context("Invalid IMAGEGUARD_FAILURE_MODE")?,
            None => FailureMode::default(),
        };

        let policy = ModerationPolicy {
            similarity_threshold: parse_var(&lookup, "IMAGEGUARD_SIMILARITY_THRESHOLD")
                .unwrap_or(defaults.policy.similarity_threshold),
            confidence_floor: parse_var(&lookup, "IMAGEGUARD_CONFIDENCE_FLOOR")
                .unwrap_or(defaults.policy.confidence_floor),
            banned_phrase: lookup("IMAGEGUARD_BANNED_PHRASE")
                .unwrap_or_else(|| DEFAULT_BANNED_PHRASE.to_string()),
            failure_mode,
            trusted_marker: lookup("IMAGEGUARD_TRUSTED_MARKER")
                .unwrap_or_else(|| DEFAULT_TRUSTED_MARKER.to_string()),
        };

        let timeouts = Timeouts {
            fetch: secs("IMAGEGUARD_FETCH_TIMEOUT_SECS", defaults.timeouts.fetch),
            oracle: secs("IMAGEGUARD_ORACLE_TIMEOUT_SECS", defaults.timeouts.oracle),
            store: secs("IMAGEGUARD_STORE_TIMEOUT_SECS", defaults.timeouts.store),
            gateway: defaults.timeouts.gateway,
        };

        let config = Self {
            store_path: lookup("IMAGEGUARD_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            policy,
            bot_user_id: lookup("IMAGEGUARD_BOT_USER_ID").filter(|id| !id.is_empty()),
            service: ServiceConfig {
                workers: parse_var(&lookup, "IMAGEGUARD_WORKERS").unwrap_or(defaults.service.workers),
                queue_capacity: parse_var(&lookup, "IMAGEGUARD_QUEUE_CAPACITY")
                    .unwrap_or(defaults.service.queue_capacity),
            },
            timeouts,
            max_image_bytes: parse_var(&lookup, "IMAGEGUARD_MAX_IMAGE_BYTES")
                .unwrap_or(defaults.max_image_bytes),
            recent_messages: parse_var(&lookup, "IMAGEGUARD_RECENT_MESSAGES")
                .unwrap_or(defaults.recent_messages),
            vision_api_key: lookup("VISION_API_KEY").filter(|key| !key.is_empty()),
            vision_api_url: lookup("VISION_API_URL").filter(|url| !url.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate().context("Invalid moderation policy")?;
        if self.service.workers == 0 {
            anyhow::bail!("Invalid IMAGEGUARD_WORKERS: must be at least 1");
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
