//! Run command implementation: the moderation bot itself.
//!
//! Reads [`ChatEvent`]s as JSON lines from stdin and writes outbound actions
//! as JSON lines to stdout. Logs go to stderr.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use imageguard_core::http::HttpConfig;
use imageguard_core::{
    ChatEvent, ChatGateway, DisabledOracle, FailureMode, FileFingerprintStore, GuardContext,
    HttpImageFetcher, HttpImageFetcherConfig, LabelOracle, ModerationService, VisionOracle,
    VisionOracleConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config::Config;
use crate::exit_codes::ExitCode;
use crate::gateway::JsonLinesGateway;

/// Wire the production collaborators from `config`.
pub fn build_context(config: &Config, gateway: Arc<dyn ChatGateway>) -> Result<GuardContext> {
    let store = Arc::new(FileFingerprintStore::new(&config.store_path));

    let fetcher = HttpImageFetcher::with_config(HttpImageFetcherConfig {
        http: HttpConfig {
            timeout: config.timeouts.fetch,
            ..Default::default()
        },
        max_bytes: config.max_image_bytes,
    })
    .context("Failed to create image fetcher")?;

    let oracle: Arc<dyn LabelOracle> = match &config.vision_api_key {
        Some(key) => {
            let mut vision = VisionOracleConfig::new(key.clone());
            if let Some(url) = &config.vision_api_url {
                vision.api_url = url.clone();
            }
            vision.http.timeout = config.timeouts.oracle;
            Arc::new(VisionOracle::new(vision).context("Failed to create Vision client")?)
        }
        // Fail-closed with no oracle would delete every image not already banned.
        None if config.policy.failure_mode == FailureMode::Closed => {
            bail!("Invalid configuration: IMAGEGUARD_FAILURE_MODE=closed requires VISION_API_KEY");
        }
        None => {
            warn!("VISION_API_KEY not set, label oracle disabled");
            Arc::new(DisabledOracle)
        }
    };

    let mut ctx = GuardContext::new(store, Arc::new(fetcher), oracle, gateway)
        .with_policy(config.policy.clone())
        .with_timeouts(config.timeouts);
    if let Some(bot_user_id) = &config.bot_user_id {
        ctx = ctx.with_bot_user_id(bot_user_id.clone());
    }
    Ok(ctx)
}

/// Execute the run command until stdin closes or the process is interrupted.
pub async fn execute(config: Config) -> Result<ExitCode> {
    let gateway = Arc::new(JsonLinesGateway::new(
        tokio::io::stdout(),
        config.recent_messages,
    ));
    let ctx = build_context(&config, gateway.clone())?;

    info!(
        store = %config.store_path.display(),
        oracle = ctx.oracle.name(),
        failure_mode = %config.policy.failure_mode,
        threshold = config.policy.similarity_threshold,
        "Starting moderation bot"
    );

    let (tx, handle) = ModerationService::spawn(ctx, config.service);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read event stream")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let event: ChatEvent = match serde_json::from_str(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed event");
                        continue;
                    }
                };

                let ChatEvent::MessageCreated(message) = &event;
                gateway.remember(message);

                if tx.send(event).await.is_err() {
                    bail!("Moderation service stopped unexpectedly");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, draining in-flight events");
                break;
            }
        }
    }

    drop(tx);
    let stats = handle.await.context("Moderation service failed")?;
    info!(
        processed = stats.processed,
        blocked = stats.blocked,
        curated = stats.curated,
        "Moderation bot stopped"
    );
    Ok(ExitCode::success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageguard_core::RecordingGateway;

    #[test]
    fn test_closed_mode_without_oracle_is_rejected() {
        let mut config = Config::default();
        config.policy.failure_mode = FailureMode::Closed;

        let err = build_context(&config, Arc::new(RecordingGateway::new())).err().expect("expected build_context to fail");
        assert!(err.to_string().contains("requires VISION_API_KEY"));
        assert_eq!(ExitCode::from_anyhow(&err).code, crate::exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_open_mode_without_oracle_uses_disabled_oracle() {
        let config = Config::default();
        let ctx = build_context(&config, Arc::new(RecordingGateway::new())).unwrap();
        assert_eq!(ctx.oracle.name(), DisabledOracle.name());
    }
}
