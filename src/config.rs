use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_api_base_url: String,
    pub gemini_image_model: String,
    pub gemini_safety_settings: String,
    pub gemini_request_timeout_seconds: u64,
    pub edited_image_path: PathBuf,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_first_non_empty(names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn normalize_gemini_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }
    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "standard" | "permissive" => lowered,
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                trimmed
            );
            "permissive".to_string()
        }
    }
}

fn normalize_base_url(value: String) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/').to_string();
    if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
        return Err(anyhow!(
            "GEMINI_API_BASE_URL must be an http(s) URL, got '{}'",
            value
        ));
    }
    Ok(trimmed)
}

impl Config {
    pub fn load() -> Result<Self> {
        let gemini_api_base_url = normalize_base_url(env_string(
            "GEMINI_API_BASE_URL",
            "https://generativelanguage.googleapis.com/v1beta",
        ))?;

        let log_dir = env_string("LOG_DIR", "logs");
        let log_dir = if log_dir.trim().is_empty() {
            PathBuf::from("logs")
        } else {
            PathBuf::from(log_dir.trim())
        };

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir,
            gemini_api_key: env_first_non_empty(&["GEMINI_API_KEY", "API_KEY"]),
            gemini_api_base_url,
            gemini_image_model: env_string(
                "GEMINI_IMAGE_MODEL",
                "gemini-2.5-flash-image-preview",
            ),
            gemini_safety_settings: normalize_gemini_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            gemini_request_timeout_seconds: env_u64("GEMINI_REQUEST_TIMEOUT_SECONDS", 120).max(1),
            edited_image_path: PathBuf::from(env_string("EDITED_IMAGE_PATH", "edited-image.png")),
        })
    }
}

pub const EDIT_SYSTEM_INSTRUCTION: &str = "You are an image editor. Apply the user's instructions to the provided image and keep everything that is not mentioned unchanged: identity, clothing, lighting, and background. CRITICAL: respond with the edited image, NOT TEXT.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_profile_falls_back_to_permissive() {
        assert_eq!(
            normalize_gemini_safety_settings("Standard".to_string()),
            "standard"
        );
        assert_eq!(normalize_gemini_safety_settings(String::new()), "permissive");
        assert_eq!(
            normalize_gemini_safety_settings("paranoid".to_string()),
            "permissive"
        );
    }

    #[test]
    fn base_url_must_be_http() {
        assert_eq!(
            normalize_base_url("https://example.test/v1beta/".to_string()).unwrap(),
            "https://example.test/v1beta"
        );
        assert!(normalize_base_url("ftp://example.test".to_string()).is_err());
    }
}
