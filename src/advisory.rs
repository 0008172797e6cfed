use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Fixed placeholder returned on the predict path when no client is configured.
pub const ADVISORY_PLACEHOLDER: &str = "AI advisory is currently unavailable.";

const IMAGE_PROMPT: &str = "You are a water safety expert. Analyze this image for visual signs \
     of contamination (turbidity, color, particles, oil). Provide a cautious, preliminary \
     assessment in markdown including ### Visual Assessment, ### Potential Risks, and an \
     ### URGENT RECOMMENDATION.";

#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Provider returned status {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("Provider response contained no text")]
    EmptyResponse,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Client for the Gemini generateContent API, used for both text advisories
/// and image assessments. Stateless and shareable across requests; every
/// call is bounded by the client-level timeout.
#[derive(Clone)]
pub struct AdvisoryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AdvisoryClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, AdvisoryError> {
        Self::with_base_url(api_key, timeout, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        api_key: String,
        timeout: Duration,
        base_url: String,
    ) -> Result<Self, AdvisoryError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Advisory markdown for a classified sample.
    #[instrument(skip(self, sample), fields(prediction = %prediction))]
    pub async fn advise(
        &self,
        prediction: &str,
        confidence_pct: f64,
        sample: &Map<String, Value>,
    ) -> Result<String, AdvisoryError> {
        let prompt = advisory_prompt(prediction, confidence_pct, sample);
        self.generate(vec![Part::Text(prompt)]).await
    }

    /// Preliminary visual assessment of a water sample photo.
    #[instrument(skip(self, image), fields(mime_type = %mime_type, image_bytes = image.len()))]
    pub async fn assess_image(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, AdvisoryError> {
        let parts = vec![
            Part::Text(IMAGE_PROMPT.to_string()),
            Part::InlineData {
                mime_type: mime_type.to_string(),
                data: BASE64.encode(image),
            },
        ];
        self.generate(parts).await
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, AdvisoryError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, GEMINI_MODEL, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![Content { parts }],
        };

        debug!("Sending generateContent request");
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Provider returned {}: {}", status, message);
            return Err(AdvisoryError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AdvisoryError::EmptyResponse);
        }
        debug!("Received advisory text, {} bytes", text.len());
        Ok(text)
    }
}

fn advisory_prompt(prediction: &str, confidence_pct: f64, sample: &Map<String, Value>) -> String {
    let ph = feature_display(sample, "ph");
    let turbidity = feature_display(sample, "Turbidity");
    let solids = feature_display(sample, "Solids");
    format!(
        "Act as a public health expert in Haiti. Analyze this water sample data and provide \
         a clear, simple, and actionable advisory in markdown.\n\n\
         **Data:**\n\
         - AI Model Prediction: **{prediction}**\n\
         - AI Model Confidence: **{confidence_pct:.2}%**\n\
         - Key Sensor Values: pH: {ph}, Turbidity: {turbidity} NTU, Solids: {solids} mg/L\n\n\
         **Response Structure:**\n\
         ### Simple Summary:\n\
         ### Recommended Actions (How to Control & Prevent):\n\
         ### Permitted Uses (What purpose we can use the water):\n\
         ### Important Note:\n"
    )
}

fn feature_display(sample: &Map<String, Value>, key: &str) -> String {
    match sample.get(key).and_then(Value::as_f64) {
        Some(v) => format!("{}", v),
        None => "N/A".to_string(),
    }
}
