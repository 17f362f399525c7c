use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExtractError;
use crate::http_client::http_client;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Raw model output for one screenshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub usage: Option<UsageMetadata>,
    pub cached: bool,
}

/// Turns one screenshot into the model's text reply.
pub trait ImageExtractor {
    fn extract(&mut self, image: &Path) -> Result<Extraction, ExtractError>;
}

pub struct GeminiClient {
    client: &'static Client,
    api_key: String,
    model: String,
    prompt: String,
    pacing: Duration,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        pacing: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.into(),
            model: model.into(),
            prompt: prompt.into(),
            pacing,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }
}

impl ImageExtractor for GeminiClient {
    fn extract(&mut self, image: &Path) -> Result<Extraction, ExtractError> {
        let bytes = read_image(image)?;
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: &self.prompt,
                    },
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: mime_type(image),
                            data: BASE64.encode(&bytes),
                        },
                    },
                ],
            }],
        };

        // Free-tier rate limit.
        if !self.pacing.is_zero() {
            thread::sleep(self.pacing);
        }
        log::info!("sending {} to {}", image.display(), self.model);

        let resp = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()?;
        let status = resp.status();
        let raw = resp.text()?;
        if !status.is_success() {
            return Err(ExtractError::Api {
                status: status.as_u16(),
                body: raw,
            });
        }

        let extraction = parse_generate_response(&raw)?;
        if let Some(usage) = &extraction.usage {
            log::info!("{}: {usage}", image.display());
        }
        Ok(extraction)
    }
}

pub fn read_image(path: &Path) -> Result<Vec<u8>, ExtractError> {
    fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ExtractError::ImageNotFound(path.to_path_buf()),
        _ => ExtractError::ImageRead {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => "image/png",
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<Value>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
    #[serde(default)]
    pub total_token_count: u64,
}

impl std::fmt::Display for UsageMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tokens prompt={} output={} total={}",
            self.prompt_token_count, self.candidates_token_count, self.total_token_count
        )
    }
}

/// Reads a `generateContent` body: the text parts of the first candidate,
/// joined.
pub fn parse_generate_response(raw: &str) -> Result<Extraction, ExtractError> {
    let resp: GenerateResponse = serde_json::from_str(raw)?;
    let first = resp.candidates.into_iter().next();
    let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
    let text = first
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let feedback = match (resp.prompt_feedback, finish_reason) {
            (Some(fb), _) => Some(fb.to_string()),
            (None, Some(reason)) => Some(format!("finishReason={reason}")),
            (None, None) => None,
        };
        return Err(ExtractError::EmptyResponse { feedback });
    }

    Ok(Extraction {
        text,
        usage: resp.usage_metadata,
        cached: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "```json\n{\"a\":"}, {"text": " 1}\n```"}]}, "finishReason": "STOP"},
                {"content": {"parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 1290, "candidatesTokenCount": 410, "totalTokenCount": 1700}
        }"#;
        let extraction = parse_generate_response(raw).expect("parses");
        assert_eq!(extraction.text, "```json\n{\"a\": 1}\n```");
        let usage = extraction.usage.expect("usage");
        assert_eq!(usage.total_token_count, 1700);
        assert!(!extraction.cached);
    }

    #[test]
    fn blocked_prompt_reports_feedback() {
        let raw = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        match parse_generate_response(raw) {
            Err(ExtractError::EmptyResponse { feedback }) => {
                assert!(feedback.expect("feedback").contains("SAFETY"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(mime_type(Path::new("a/b.PNG")), "image/png");
        assert_eq!(mime_type(Path::new("shot.jpeg")), "image/jpeg");
        assert_eq!(mime_type(Path::new("noext")), "image/png");
    }

    #[test]
    fn missing_image_is_not_found() {
        let err = read_image(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, ExtractError::ImageNotFound(_)));
    }

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: "prompt" },
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: BASE64.encode(b"png"),
                        },
                    },
                ],
            }],
        };
        let value = serde_json::to_value(&body).expect("serializes");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(
            value["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(value["contents"][0]["parts"][1]["inline_data"]["data"], "cG5n");
    }
}
