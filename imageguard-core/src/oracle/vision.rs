//! Google Cloud Vision web-detection client.
//!
//! Sends the image by URL (`imageUri`) and maps `webEntities` onto
//! [`LabelEntity`] values in response order.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{LabelEntity, LabelOracle};
use crate::error::{GuardError, Result};
use crate::http::{classify_send_error, classify_status, HttpClient, HttpConfig};

/// Default Cloud Vision annotate endpoint.
pub const DEFAULT_VISION_API_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum number of retry attempts.
const MAX_RETRIES: u32 = 3;

/// Configuration for [`VisionOracle`].
#[derive(Clone)]
pub struct VisionOracleConfig {
    pub api_url: String,
    pub api_key: String,
    pub http: HttpConfig,
}

impl std::fmt::Debug for VisionOracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionOracleConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("http", &self.http)
            .finish()
    }
}

impl VisionOracleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_VISION_API_URL.to_string(),
            api_key: api_key.into(),
            http: HttpConfig {
                timeout: DEFAULT_TIMEOUT,
                max_retries: MAX_RETRIES,
                https_only: true,
                ..Default::default()
            },
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required: `VISION_API_KEY`
    /// Optional: `VISION_API_URL` (defaults to Google production)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("VISION_API_KEY").map_err(|_| {
            GuardError::Config("VISION_API_KEY environment variable not set".into())
        })?;

        let mut config = Self::new(api_key);
        if let Ok(api_url) = std::env::var("VISION_API_URL") {
            config.api_url = api_url;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image: ImageRef<'a>,
    features: [Feature; 1],
}

#[derive(Debug, Serialize)]
struct ImageRef<'a> {
    source: ImageSource<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSource<'a> {
    image_uri: &'a str,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    web_detection: Option<WebDetection>,
    #[serde(default)]
    error: Option<RpcStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebDetection {
    #[serde(default)]
    web_entities: Vec<WebEntity>,
}

#[derive(Debug, Deserialize)]
struct WebEntity {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Cloud Vision web-detection oracle.
pub struct VisionOracle {
    client: HttpClient,
    config: VisionOracleConfig,
}

impl VisionOracle {
    #[instrument(level = "debug", skip_all, fields(
        api_url = %config.api_url,
        timeout_ms = config.http.timeout.as_millis() as u64,
        max_retries = config.http.max_retries
    ))]
    pub fn new(config: VisionOracleConfig) -> Result<Self> {
        let client = HttpClient::new(config.http.clone(), GuardError::Oracle)?;
        info!("Cloud Vision oracle client created");
        Ok(Self { client, config })
    }

    fn parse_response(response: AnnotateResponse) -> Result<Vec<LabelEntity>> {
        let first = response.responses.into_iter().next().ok_or_else(|| {
            GuardError::Oracle("Cloud Vision returned no responses".into())
        })?;

        if let Some(status) = first.error {
            return Err(GuardError::Oracle(format!(
                "Cloud Vision error {}: {}",
                status.code, status.message
            )));
        }

        Ok(first
            .web_detection
            .map(|detection| {
                detection
                    .web_entities
                    .into_iter()
                    .map(|entity| {
                        LabelEntity::new(entity.description.unwrap_or_default(), entity.score)
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn detect_once(
        &self,
        image_url: &str,
    ) -> std::result::Result<Vec<LabelEntity>, backoff::Error<GuardError>> {
        let body = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageRef {
                    source: ImageSource { image_uri: image_url },
                },
                features: [Feature {
                    kind: "WEB_DETECTION",
                }],
            }],
        };

        let response = self
            .client
            .inner()
            .post(&self.config.api_url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_send_error(e, GuardError::Oracle))?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");
        if !status.is_success() {
            return Err(classify_status(status, GuardError::Oracle));
        }

        let parsed: AnnotateResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse JSON response");
            backoff::Error::permanent(GuardError::Oracle(format!(
                "Failed to parse Cloud Vision response: {e}"
            )))
        })?;

        Self::parse_response(parsed).map_err(backoff::Error::permanent)
    }
}

#[async_trait]
impl LabelOracle for VisionOracle {
    #[instrument(level = "info", skip(self), fields(oracle = "cloud_vision"))]
    async fn detect(&self, image_url: &str) -> Result<Vec<LabelEntity>> {
        let start = Instant::now();
        let result = self.client.retry(|| self.detect_once(image_url)).await;

        let total_latency_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(labels) => {
                for label in labels {
                    debug!(description = %label.description, confidence = label.confidence, "Web entity");
                }
                info!(total_latency_ms, entities = labels.len(), "Web detection completed");
            }
            Err(e) => {
                warn!(total_latency_ms, error = %e, "Web detection failed after all retries");
            }
        }
        result
    }

    fn name(&self) -> &'static str {
        "cloud_vision"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oracle_for(server: &MockServer) -> VisionOracle {
        VisionOracle::new(VisionOracleConfig {
            api_url: format!("{}/v1/images:annotate", server.uri()),
            api_key: "test-key".into(),
            http: HttpConfig {
                timeout: Duration::from_secs(2),
                max_retries: 1,
                initial_interval: Duration::from_millis(10),
                max_interval: Duration::from_millis(20),
                https_only: false,
            },
        })
        .unwrap()
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = VisionOracleConfig::new("super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_request_shape() {
        let body = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageRef {
                    source: ImageSource {
                        image_uri: "https://x/a.png",
                    },
                },
                features: [Feature {
                    kind: "WEB_DETECTION",
                }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "requests": [{
                    "image": {"source": {"imageUri": "https://x/a.png"}},
                    "features": [{"type": "WEB_DETECTION"}]
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_detect_maps_web_entities_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images:annotate"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "requests": [{"image": {"source": {"imageUri": "https://x/a.png"}}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responses": [{
                    "webDetection": {
                        "webEntities": [
                            {"entityId": "/m/1", "score": 0.91, "description": "Nikocado Avocado"},
                            {"entityId": "/m/2", "score": 0.42},
                            {"entityId": "/m/3", "score": 0.3, "description": "Mukbang"}
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let labels = oracle_for(&server).detect("https://x/a.png").await.unwrap();
        assert_eq!(
            labels,
            vec![
                LabelEntity::new("Nikocado Avocado", 0.91),
                LabelEntity::new("", 0.42),
                LabelEntity::new("Mukbang", 0.3),
            ]
        );
    }

    #[tokio::test]
    async fn test_detect_without_web_detection_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"responses": [{}]})))
            .mount(&server)
            .await;

        assert!(oracle_for(&server)
            .detect("https://x/a.png")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_per_image_error_is_oracle_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responses": [{"error": {"code": 3, "message": "Bad image data."}}]
            })))
            .mount(&server)
            .await;

        let err = oracle_for(&server).detect("https://x/a.png").await.unwrap_err();
        assert!(matches!(err, GuardError::Oracle(msg) if msg.contains("Bad image data")));
    }

    #[tokio::test]
    async fn test_http_error_is_oracle_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = oracle_for(&server).detect("https://x/a.png").await.unwrap_err();
        assert!(matches!(err, GuardError::Oracle(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_oracle_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = oracle_for(&server).detect("https://x/a.png").await.unwrap_err();
        assert!(matches!(err, GuardError::Oracle(_)));
    }

    // Run with: cargo test -p imageguard-core test_vision_real_api -- --ignored
    #[tokio::test]
    #[ignore = "requires VISION_API_KEY and network access"]
    async fn test_vision_real_api() {
        let oracle = VisionOracle::new(VisionOracleConfig::from_env().unwrap()).unwrap();
        let labels = oracle
            .detect("https://upload.wikimedia.org/wikipedia/commons/4/47/PNG_transparency_demonstration_1.png")
            .await
            .unwrap();
        println!("{labels:?}");
    }
}
