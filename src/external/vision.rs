//! Vision model client
//!
//! Sends a photo and a fixed instruction to the Anthropic Messages API and
//! coerces the free-form reply into a typed result. A reply without a usable
//! JSON object is a [`VisionError::Unparsable`], never a count of zero.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::models::ObjectCount;

use super::food_facts::validate_barcode;
use super::image_prep::prepare_image;
use super::{BarcodeRecognizer, ObjectCounter, VisionError};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 256;

pub const COUNT_PROMPT: &str = "Count the items in this photo. Identify the single most prominent \
type of object (for example \"apple\", \"cookie\", \"can\") and count how many of them are visible. \
Respond with only a JSON object of the form {\"object_type\": \"<singular noun>\", \"count\": <integer>}. \
If nothing countable is visible, use a count of 0.";

pub const BARCODE_PROMPT: &str = "Read the product barcode (EAN/UPC) in this photo. Respond with only \
a JSON object of the form {\"barcode\": \"<digits>\"}, or {\"barcode\": null} if no barcode is \
legible. Do not guess digits you cannot read.";

// ============================================================================
// Response Parsing
// ============================================================================

/// Extract the JSON object from a model reply (handles markdown code blocks)
pub fn extract_json_from_response(response: &str) -> Option<String> {
    let response = response.trim();

    if response.starts_with("```") {
        if let Some(end) = response.rfind("```") {
            let start = response.find('\n').map(|i| i + 1).unwrap_or(3);
            if start < end {
                let inner = response[start..end].trim();
                if inner.starts_with('{') {
                    return Some(inner.to_string());
                }
            }
        }
    }

    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| response[start..=end].to_string())
}

fn unparsable(reason: impl Into<String>, response: &str) -> VisionError {
    VisionError::Unparsable {
        reason: reason.into(),
        response: response.to_string(),
    }
}

fn parse_object(response: &str) -> Result<serde_json::Map<String, Value>, VisionError> {
    let json = extract_json_from_response(response)
        .ok_or_else(|| unparsable("no JSON object in response", response))?;

    match serde_json::from_str::<Value>(&json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(unparsable("response JSON is not an object", response)),
        Err(e) => Err(unparsable(format!("invalid JSON: {}", e), response)),
    }
}

/// `{object_type: non-blank string, count: non-negative integer}`
pub fn parse_count_response(response: &str) -> Result<ObjectCount, VisionError> {
    let map = parse_object(response)?;

    let object_type = map
        .get("object_type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| unparsable("object_type missing, blank or not a string", response))?;

    let count = map
        .get("count")
        .and_then(Value::as_u64)
        .and_then(|c| u32::try_from(c).ok())
        .ok_or_else(|| unparsable("count missing or not a non-negative integer", response))?;

    Ok(ObjectCount {
        object_type: object_type.to_string(),
        count,
    })
}

/// `{barcode: "digits" | null}`; illegible or malformed digits read as no barcode
pub fn parse_barcode_response(response: &str) -> Result<Option<String>, VisionError> {
    let map = parse_object(response)?;

    match map.get("barcode") {
        None => Err(unparsable("barcode field missing", response)),
        Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => {
            let digits: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
            match validate_barcode(&digits) {
                Ok(barcode) => Ok(Some(barcode)),
                Err(e) => {
                    tracing::warn!("Ignoring barcode read from image: {}", e);
                    Ok(None)
                }
            }
        }
        Some(_) => Err(unparsable("barcode is not a string", response)),
    }
}

// ============================================================================
// Messages API
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Image { source: ImageSource },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Blocking Anthropic Messages API client
pub struct ClaudeVisionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ClaudeVisionClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self, VisionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Vision calls take longer than lookups; allow 3x the configured timeout
    pub fn from_config(config: &Config) -> Result<Self, VisionError> {
        let api_key = config.anthropic_api_key.as_deref().ok_or(VisionError::MissingApiKey)?;
        Self::new(&config.anthropic_url, api_key, &config.vision_model, config.http_timeout() * 3)
    }

    /// Send one image with an instruction, return the concatenated text reply
    pub fn ask(&self, image: &[u8], prompt: &str) -> Result<String, VisionError> {
        let prepared = prepare_image(image)?;

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: prepared.media_type,
                            data: BASE64.encode(&prepared.bytes),
                        },
                    },
                    ContentBlock::Text { text: prompt },
                ],
            }],
        };

        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!("Calling vision model {} ({}x{})", self.model, prepared.width, prepared.height);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(VisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| unparsable(format!("invalid Messages API body: {}", e), &body))?;

        Ok(parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl ObjectCounter for ClaudeVisionClient {
    fn count_objects(&self, image: &[u8]) -> Result<ObjectCount, VisionError> {
        let reply = self.ask(image, COUNT_PROMPT)?;
        let count = parse_count_response(&reply).map_err(|e| {
            tracing::warn!("Unparsable count reply: {}", e);
            e
        })?;
        tracing::info!("Vision model counted {} x {}", count.count, count.object_type);
        Ok(count)
    }

    fn counter_name(&self) -> &str {
        &self.model
    }
}

impl BarcodeRecognizer for ClaudeVisionClient {
    fn recognize_barcode(&self, image: &[u8]) -> Result<Option<String>, VisionError> {
        let reply = self.ask(image, BARCODE_PROMPT)?;
        parse_barcode_response(&reply)
    }
}
