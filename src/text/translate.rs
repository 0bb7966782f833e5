//! Google Translate client
//!
//! Uses the public `translate_a/single` endpoint, which answers with nested
//! JSON arrays: `[[["translated", "original", ...], ...], ...]`.

use serde_json::Value;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

use super::Translator;
use crate::config::TranslationConfig;
use crate::error::TranslationError;

/// Longest input the service accepts, in characters
pub const MAX_TRANSLATION_CHARS: usize = 5000;

/// Blocking Google Translate client
pub struct GoogleTranslator {
    endpoint: String,
    http_client: reqwest::Client,
    runtime: Runtime,
}

impl GoogleTranslator {
    pub fn new(settings: &TranslationConfig) -> Result<Self, TranslationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            endpoint: settings.endpoint.clone(),
            http_client,
            runtime,
        })
    }

    async fn request(&self, text: &str, source: &str, target: &str) -> Result<Value, TranslationError> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranslationError::BadStatus(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }
}

impl Translator for GoogleTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
        validate_input(text)?;

        let body = self.runtime.block_on(self.request(text, source, target))?;
        let translated = parse_translation(&body)?;
        debug!("Translated {} chars into {} chars", text.chars().count(), translated.chars().count());

        Ok(translated)
    }
}

/// Reject input the service would refuse anyway
pub fn validate_input(text: &str) -> Result<(), TranslationError> {
    if text.trim().is_empty() {
        return Err(TranslationError::EmptyInput);
    }
    let len = text.chars().count();
    if len > MAX_TRANSLATION_CHARS {
        return Err(TranslationError::TooLong {
            len,
            limit: MAX_TRANSLATION_CHARS,
        });
    }
    Ok(())
}

/// Concatenate the translated segments of a response
pub fn parse_translation(body: &Value) -> Result<String, TranslationError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::InvalidResponse("missing segment list".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        return Err(TranslationError::InvalidResponse("no translated text".to_string()));
    }
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_multi_segment_response() {
        let body = json!([
            [
                ["Hello\n", "Привет\n", null, null, 10],
                ["world", "мир", null, null, 10]
            ],
            null,
            "ru"
        ]);
        assert_eq!(parse_translation(&body).unwrap(), "Hello\nworld");
    }

    #[test]
    fn test_parse_rejects_unexpected_shape() {
        assert!(matches!(
            parse_translation(&json!({"error": "nope"})),
            Err(TranslationError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_translation(&json!([[]])),
            Err(TranslationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_validate_input() {
        assert!(matches!(validate_input(" \n "), Err(TranslationError::EmptyInput)));
        assert!(validate_input("Привет").is_ok());

        let long = "я".repeat(MAX_TRANSLATION_CHARS + 1);
        assert!(matches!(
            validate_input(&long),
            Err(TranslationError::TooLong { len, .. }) if len == MAX_TRANSLATION_CHARS + 1
        ));
        assert!(validate_input(&"я".repeat(MAX_TRANSLATION_CHARS)).is_ok());
    }

    #[test]
    fn test_empty_text_fails_without_request() {
        let settings = TranslationConfig {
            endpoint: "http://127.0.0.1:9/translate".to_string(),
            timeout_secs: 1,
        };
        let translator = GoogleTranslator::new(&settings).unwrap();
        assert!(matches!(
            translator.translate("", "auto", "en"),
            Err(TranslationError::EmptyInput)
        ));
    }
}
