use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::{Config, EDIT_SYSTEM_INSTRUCTION};
use crate::llm::media::{detect_mime_type, gemini_supports_image_mime, normalize_gemini_mime_type};
use crate::llm::{EditRequest, EditRequestError, ImageEditor};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone)]
pub struct GeminiImageEditor {
    api_key: String,
    base_url: String,
    model: String,
    safety_profile: String,
}

impl GeminiImageEditor {
    pub fn from_config(config: &Config) -> Self {
        GeminiImageEditor {
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_api_base_url.clone(),
            model: config.gemini_image_model.clone(),
            safety_profile: config.gemini_safety_settings.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    async fn send_edit(&self, request: &EditRequest<'_>) -> Result<Vec<u8>, EditRequestError> {
        if self.api_key.trim().is_empty() {
            return Err(EditRequestError::Validation(
                "GEMINI_API_KEY is not set; cannot contact the image model.".to_string(),
            ));
        }

        let payload = build_edit_payload(request, &self.safety_profile)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(&payload);
            debug!(target: "llm.gemini", model = %self.model, payload = %payload_summary);
        }

        let response = get_http_client()
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status()
                );
                EditRequestError::Network(format!("Gemini request failed: {}", err_text))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = self.redact_api_key(&message.unwrap_or(body_summary));
            return Err(EditRequestError::Model(format!(
                "Gemini request failed with status {}: {}",
                status, detail
            )));
        }

        let value = response.json::<GeminiResponse>().await.map_err(|err| {
            EditRequestError::Model(format!(
                "Could not decode the Gemini response: {}",
                self.redact_api_key(&err.to_string())
            ))
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = %self.model, response = %response_summary);
        }

        extract_edited_image(value, &self.model)
    }
}

impl ImageEditor for GeminiImageEditor {
    async fn edit_image(&self, request: &EditRequest<'_>) -> Result<Vec<u8>> {
        let metadata = json!({
            "mimeType": request.mime_type,
            "imageBytes": request.image_bytes.len(),
            "promptChars": request.prompt.chars().count(),
            "aspectRatio": request.aspect_ratio,
        });
        let image = log_llm_timing("gemini", &self.model, "edit_image", Some(metadata), || {
            self.send_edit(request)
        })
        .await?;
        Ok(image)
    }
}

fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

fn build_image_config(aspect_ratio: Option<&str>) -> Option<Value> {
    let mut map = Map::new();

    if let Some(aspect_ratio) = aspect_ratio {
        let trimmed = aspect_ratio.trim();
        if !trimmed.is_empty() {
            map.insert("aspectRatio".to_string(), json!(trimmed));
        }
    }

    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

fn resolve_image_mime(declared: &str, bytes: &[u8]) -> Option<String> {
    let mut candidates = Vec::new();
    if !declared.trim().is_empty() {
        candidates.push(declared.to_string());
    }
    if let Some(detected) = detect_mime_type(bytes) {
        candidates.push(detected);
    }

    candidates
        .into_iter()
        .map(|candidate| normalize_gemini_mime_type(&candidate))
        .find(|candidate| gemini_supports_image_mime(candidate))
}

fn build_edit_payload(
    request: &EditRequest<'_>,
    safety_profile: &str,
) -> Result<Value, EditRequestError> {
    if request.image_bytes.is_empty() {
        return Err(EditRequestError::Validation(
            "The source image is empty.".to_string(),
        ));
    }
    if request.prompt.trim().is_empty() {
        return Err(EditRequestError::Validation(
            "Nothing to edit: choose at least one control or write an instruction.".to_string(),
        ));
    }
    let mime_type = resolve_image_mime(request.mime_type, request.image_bytes).ok_or_else(|| {
        EditRequestError::Validation(format!(
            "Unsupported image type '{}'; use PNG, JPEG, WebP, HEIC or HEIF.",
            request.mime_type
        ))
    })?;

    let parts = vec![
        json!({
            "inlineData": {
                "mimeType": mime_type,
                "data": general_purpose::STANDARD.encode(request.image_bytes)
            }
        }),
        json!({ "text": request.prompt }),
    ];

    let mut generation_config = json!({
        "responseModalities": ["TEXT", "IMAGE"]
    });
    if let Some(image_config) = build_image_config(request.aspect_ratio) {
        if let Some(config_object) = generation_config.as_object_mut() {
            config_object.insert("imageConfig".to_string(), image_config);
        }
    }

    Ok(json!({
        "systemInstruction": { "parts": [{ "text": EDIT_SYSTEM_INSTRUCTION }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config,
        "safetySettings": build_safety_settings(safety_profile),
    }))
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if payload.pointer("/systemInstruction").is_some() {
        summary.insert(
            "systemInstruction".to_string(),
            Value::String("edit_system_instruction".to_string()),
        );
    }

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[]);
        for part in parts {
            match part {
                GeminiPart::Text { text } => {
                    text_parts += 1;
                    if text_preview.is_none() && !text.trim().is_empty() {
                        text_preview = Some(truncate_for_log(text, 200));
                    }
                }
                GeminiPart::InlineData { inline_data } => {
                    if inline_data.mime_type.starts_with("image/") {
                        image_parts += 1;
                    }
                }
                GeminiPart::Other(_) => {}
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview,
        "blockReason": response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone()),
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_edited_image(response: GeminiResponse, model: &str) -> Result<Vec<u8>, EditRequestError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(EditRequestError::Model(format!(
            "The request was blocked by Gemini (reason: {reason})."
        )));
    }

    let mut text_parts = Vec::new();
    let mut finish_reason = None;
    for candidate in response.candidates.unwrap_or_default() {
        if finish_reason.is_none() {
            finish_reason = candidate.finish_reason;
        }
        let Some(parts) = candidate.content.and_then(|content| content.parts) else {
            continue;
        };
        for part in parts {
            match part {
                GeminiPart::InlineData { inline_data } if inline_data.mime_type.starts_with("image/") => {
                    return general_purpose::STANDARD
                        .decode(inline_data.data.trim())
                        .map_err(|err| {
                            EditRequestError::Model(format!(
                                "Gemini returned image data that is not valid base64: {err}"
                            ))
                        });
                }
                GeminiPart::Text { text } if !text.trim().is_empty() => {
                    text_parts.push(text.trim().to_string());
                }
                _ => {}
            }
        }
    }

    let message = if !text_parts.is_empty() {
        format!(
            "No image returned by Gemini (model: {}). The model said: {}",
            model,
            truncate_for_log(&text_parts.join("\n"), 500)
        )
    } else if let Some(reason) = finish_reason {
        format!(
            "No image returned by Gemini (model: {}, finish reason: {}).",
            model, reason
        )
    } else {
        format!("No image returned by Gemini (model: {}).", model)
    };
    Err(EditRequestError::Model(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R',
    ];

    fn request<'a>(bytes: &'a [u8], mime_type: &'a str, prompt: &'a str) -> EditRequest<'a> {
        EditRequest {
            image_bytes: bytes,
            mime_type,
            prompt,
            aspect_ratio: None,
        }
    }

    fn parse_response(value: Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn payload_puts_image_before_prompt() {
        let mut edit = request(&PNG_HEADER, "image/png", "Rotate the camera.");
        edit.aspect_ratio = Some("4:3");
        let payload = build_edit_payload(&edit, "standard").unwrap();

        let parts = payload.pointer("/contents/0/parts").unwrap().as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            parts[0]["inlineData"]["data"],
            general_purpose::STANDARD.encode(PNG_HEADER)
        );
        assert_eq!(parts[1]["text"], "Rotate the camera.");
        assert_eq!(
            payload.pointer("/generationConfig/imageConfig/aspectRatio"),
            Some(&json!("4:3"))
        );
        assert_eq!(
            payload.pointer("/safetySettings/0/threshold"),
            Some(&json!("BLOCK_MEDIUM_AND_ABOVE"))
        );
    }

    #[test]
    fn payload_omits_image_config_without_ratio() {
        let payload =
            build_edit_payload(&request(&PNG_HEADER, "image/png", "add a hat"), "permissive")
                .unwrap();
        assert!(payload.pointer("/generationConfig/imageConfig").is_none());
        assert_eq!(
            payload.pointer("/generationConfig/responseModalities"),
            Some(&json!(["TEXT", "IMAGE"]))
        );
    }

    #[test]
    fn payload_falls_back_to_sniffed_mime() {
        let payload =
            build_edit_payload(&request(&PNG_HEADER, "application/octet-stream", "x"), "permissive")
                .unwrap();
        assert_eq!(
            payload.pointer("/contents/0/parts/0/inlineData/mimeType"),
            Some(&json!("image/png"))
        );
    }

    #[test]
    fn payload_validation_errors() {
        assert!(matches!(
            build_edit_payload(&request(&[], "image/png", "x"), "permissive"),
            Err(EditRequestError::Validation(_))
        ));
        assert!(matches!(
            build_edit_payload(&request(&PNG_HEADER, "image/png", "  "), "permissive"),
            Err(EditRequestError::Validation(_))
        ));
        assert!(matches!(
            build_edit_payload(&request(b"GIF89a-not-really", "image/gif", "x"), "permissive"),
            Err(EditRequestError::Validation(_))
        ));
    }

    #[test]
    fn extracts_first_inline_image() {
        let encoded = general_purpose::STANDARD.encode(b"fake-png");
        let response = parse_response(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here you go" },
                    { "thoughtSignature": "abc" },
                    { "inlineData": { "mimeType": "image/png", "data": encoded } }
                ]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_edited_image(response, "m").unwrap(), b"fake-png".to_vec());
    }

    #[test]
    fn unknown_parts_are_skipped_in_the_summary() {
        let encoded = general_purpose::STANDARD.encode(b"img");
        let response = parse_response(json!({
            "candidates": [{
                "content": { "parts": [
                    { "functionCall": { "name": "noop", "args": { "depth": [1, 2] } } },
                    { "thoughtSignature": "abc" },
                    { "inlineData": { "mimeType": "image/png", "data": encoded } }
                ]}
            }]
        }));
        let summary = summarize_gemini_response(&response);
        assert_eq!(summary["textParts"], 0);
        assert_eq!(summary["imageParts"], 1);
        assert_eq!(extract_edited_image(response, "m").unwrap(), b"img".to_vec());
    }

    #[test]
    fn text_only_response_is_a_model_error() {
        let response = parse_response(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "I can't edit this image." }] },
                "finishReason": "STOP"
            }]
        }));
        let err = extract_edited_image(response, "img-model").unwrap_err();
        assert_eq!(
            err,
            EditRequestError::Model(
                "No image returned by Gemini (model: img-model). The model said: I can't edit this image."
                    .to_string()
            )
        );
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let response = parse_response(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }));
        let err = extract_edited_image(response, "m").unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn empty_candidates_mention_finish_reason() {
        let response = parse_response(json!({
            "candidates": [{ "finishReason": "IMAGE_SAFETY" }]
        }));
        let err = extract_edited_image(response, "m").unwrap_err();
        assert!(err.to_string().contains("IMAGE_SAFETY"));
    }

    #[test]
    fn error_body_prefers_api_message() {
        let (message, summary) =
            summarize_error_body(r#"{"error":{"code":400,"message":"API key not valid."}}"#);
        assert_eq!(message.as_deref(), Some("API key not valid."));
        assert!(summary.contains("400"));

        let (message, summary) = summarize_error_body("   ");
        assert_eq!(message, None);
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn redacts_api_key() {
        let editor = GeminiImageEditor {
            api_key: "secret-key".to_string(),
            base_url: "https://example.test".to_string(),
            model: "m".to_string(),
            safety_profile: "permissive".to_string(),
        };
        assert_eq!(
            editor.redact_api_key("url?key=secret-key failed"),
            "url?key=[redacted] failed"
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let editor = GeminiImageEditor {
            api_key: String::new(),
            base_url: "https://example.test".to_string(),
            model: "m".to_string(),
            safety_profile: "permissive".to_string(),
        };
        let err = editor
            .edit_image(&request(&PNG_HEADER, "image/png", "add a hat"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EditRequestError>(),
            Some(EditRequestError::Validation(_))
        ));
    }

    #[test]
    fn payload_summary_hides_image_data() {
        let payload =
            build_edit_payload(&request(&PNG_HEADER, "image/png", "add a hat"), "permissive")
                .unwrap();
        let summary = summarize_gemini_payload(&payload);
        assert_eq!(
            summary.pointer("/contents/0/parts/0/inlineData/dataLen"),
            Some(&json!(general_purpose::STANDARD.encode(PNG_HEADER).len()))
        );
        assert_eq!(summary["safetySettingsCount"], 5);
    }
}
