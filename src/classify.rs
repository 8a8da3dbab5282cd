//! Gateway client for the external text-classification call.
//!
//! The gateway turns a free-text performance note into short categorical
//! tags. One attempt per request, bounded by the shared agent's timeouts;
//! every failure mode surfaces as a [`ClassifyError`] for the tag generator
//! to absorb.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::http_client;

pub const BASE_URL: &str = "https://insight.e-bridge.app";

const MAX_RESPONSE_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug, Serialize)]
pub struct ClassifyRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Credential invalid or expired")]
    Unauthorized,
    #[error("Rate limited; try again later")]
    RateLimited,
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("HTTP error: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Response contained no tags")]
    NoTags,
}

/// Anything that can turn a text fragment into tag labels.
///
/// The production implementation is [`GatewayClassifier`]; tests substitute
/// fakes to simulate outages and count calls.
pub trait Classifier {
    fn classify(&self, text: &str) -> Result<Vec<String>, ClassifyError>;
}

/// HTTPS client for the classification gateway.
#[derive(Clone, Debug)]
pub struct GatewayClassifier {
    credential: String,
    base_url: String,
}

impl GatewayClassifier {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different gateway; used by tests.
    pub fn with_base_url(credential: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            base_url: base_url.into(),
        }
    }
}

impl Classifier for GatewayClassifier {
    fn classify(&self, text: &str) -> Result<Vec<String>, ClassifyError> {
        let url = format!("{}/classify", self.base_url);
        let request = ClassifyRequest { text };
        let req = http_client::agent()
            .post(&url)
            .set("Accept", "application/json")
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.credential.trim()));

        let response = match req.send_json(&request) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body =
                    read_body_limited(response, MAX_RESPONSE_BYTES).unwrap_or_else(|err| err);
                return Err(map_status_error(code, body));
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(ClassifyError::Transport(err.to_string()));
            }
        };

        let body = read_body_limited(response, MAX_RESPONSE_BYTES)
            .map_err(ClassifyError::Malformed)?;
        parse_classify_response(&body)
    }
}

fn map_status_error(code: u16, body: String) -> ClassifyError {
    match code {
        401 => ClassifyError::Unauthorized,
        429 => ClassifyError::RateLimited,
        500..=599 => ClassifyError::ServerError(body),
        _ => ClassifyError::Transport(format!("HTTP {code}: {body}")),
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ClassifyResponseWire {
    tags: Option<Vec<String>>,
    text: Option<String>,
    error: Option<String>,
}

/// Parse a gateway response body into tag labels.
///
/// The primary shape is `{ "tags": [...] }`; a prose `text` answer is
/// salvaged by extracting its `#hashtag` tokens before giving up.
fn parse_classify_response(body: &str) -> Result<Vec<String>, ClassifyError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ClassifyError::Malformed("Empty response body".to_string()));
    }
    let parsed: ClassifyResponseWire = serde_json::from_str(trimmed)
        .map_err(|err| ClassifyError::Malformed(format!("{err}: {trimmed}")))?;

    if let Some(error) = parsed.error {
        return Err(ClassifyError::ServerError(error));
    }
    if let Some(tags) = parsed.tags {
        let tags = sanitize_tags(tags);
        if tags.is_empty() {
            return Err(ClassifyError::NoTags);
        }
        return Ok(tags);
    }
    if let Some(text) = parsed.text {
        let tags = extract_hashtags(&text);
        if tags.is_empty() {
            return Err(ClassifyError::NoTags);
        }
        return Ok(tags);
    }
    Err(ClassifyError::Malformed(
        "Missing tags/text in response".to_string(),
    ))
}

fn sanitize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        let tag = if tag.starts_with('#') {
            tag.to_string()
        } else {
            format!("#{tag}")
        };
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

/// Pull `#hashtag` tokens out of a prose answer, dropping stubs shorter
/// than two characters after the `#`.
pub(crate) fn extract_hashtags(text: &str) -> Vec<String> {
    static HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"#[\w\p{Hiragana}\p{Katakana}\p{Han}ー\-]+").expect("valid hashtag pattern")
    });
    let mut tags = Vec::new();
    for found in HASHTAG.find_iter(text) {
        let tag = found.as_str().to_string();
        if tag.chars().count() <= 2 {
            continue;
        }
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn read_body_limited(response: ureq::Response, max_bytes: usize) -> Result<String, String> {
    let bytes = http_client::read_response_bytes(response, max_bytes)
        .map_err(|err| err.to_string())?;
    String::from_utf8(bytes).map_err(|err| err.to_string())
}
