//! Chat-completion-backed part describer.

use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::analyzer::MeshMetrics;
use crate::config::AiConfig;

const SYSTEM_PROMPT: &str = "You are a technical writer for a 3D printing and \
CNC machining service. Given measured geometry of a customer part, write two \
short paragraphs separated by a blank line: first a factual technical summary \
of the part's size, volume and mesh quality, then a customer-facing sentence \
or two describing the part in plain language. Do not invent features that \
cannot be inferred from the measurements.";

/// Errors that can occur while generating a part description.
#[derive(Debug, Error)]
pub enum DescriberError {
    #[error("AI describer is disabled in configuration")]
    Disabled,

    #[error("No API key configured (set ai.api_key or OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("Description request failed: {0}")]
    Request(String),

    #[error("Failed to parse description response: {0}")]
    ResponseParse(String),
}

/// Generated description text for a completed analysis.
#[derive(Debug, Clone)]
pub struct PartDescription {
    /// Factual summary of the measured geometry.
    pub technical: String,
    /// Customer-facing blurb, when the model produced one.
    pub commercial: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct PartDescriber {
    client: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl PartDescriber {
    pub fn new(config: &AiConfig) -> Result<Self, DescriberError> {
        if !config.enabled {
            return Err(DescriberError::Disabled);
        }

        let api_key = if config.api_key.is_empty() {
            std::env::var("OPENAI_API_KEY").map_err(|_| DescriberError::MissingApiKey)?
        } else {
            config.api_key.clone()
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DescriberError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    pub fn describe(
        &self,
        filename: &str,
        metrics: &MeshMetrics,
    ) -> Result<PartDescription, DescriberError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": data_block(filename, metrics)},
            ],
            "temperature": 0.4,
        });

        debug!("Requesting description for '{}'", filename);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| DescriberError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            warn!("Description request returned {}: {}", status, detail);
            return Err(DescriberError::Request(format!(
                "server returned {}",
                status
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| DescriberError::ResponseParse(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| DescriberError::ResponseParse("empty choices".to_string()))?;

        parse_reply(content)
    }
}

fn data_block(filename: &str, metrics: &MeshMetrics) -> String {
    format!(
        "DATA:\n\
         Filename: {}\n\
         Dimensions (mm): {:.2} x {:.2} x {:.2}\n\
         Volume (mm^3): {:.2}\n\
         Triangle count: {}\n\
         Watertight: {}",
        filename,
        metrics.dim_x,
        metrics.dim_y,
        metrics.dim_z,
        metrics.volume_mm3,
        metrics.poly_count,
        metrics.watertight,
    )
}

/// Splits the reply into technical and commercial paragraphs. Some models
/// prepend a one-line restatement of the task; such a leading line is
/// dropped when labelled.
fn parse_reply(content: &str) -> Result<PartDescription, DescriberError> {
    let mut paragraphs: Vec<&str> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if let Some(first) = paragraphs.first() {
        let lower = first.to_ascii_lowercase();
        if lower.starts_with("reasoning:") || lower.starts_with("task:") {
            paragraphs.remove(0);
        }
    }

    let technical = paragraphs
        .first()
        .map(|p| p.to_string())
        .ok_or_else(|| DescriberError::ResponseParse("no description text".to_string()))?;
    let commercial = paragraphs.get(1).map(|p| p.to_string());

    Ok(PartDescription {
        technical,
        commercial,
    })
}
