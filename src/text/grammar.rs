//! LanguageTool grammar correction client

use serde::Deserialize;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

use super::GrammarCorrector;
use crate::config::GrammarConfig;
use crate::error::GrammarError;

/// One rule match reported by LanguageTool
#[derive(Debug, Clone, Deserialize)]
pub struct RuleMatch {
    /// Start of the flagged span, in UTF-16 code units
    pub offset: usize,
    /// Length of the flagged span, in UTF-16 code units
    pub length: usize,
    #[serde(default)]
    pub replacements: Vec<Replacement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Replacement {
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    matches: Vec<RuleMatch>,
}

/// Blocking client for the LanguageTool `/v2/check` API
pub struct LanguageToolClient {
    check_url: String,
    http_client: reqwest::Client,
    runtime: Runtime,
}

impl LanguageToolClient {
    pub fn new(settings: &GrammarConfig) -> Result<Self, GrammarError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            check_url: format!("{}/v2/check", settings.endpoint.trim_end_matches('/')),
            http_client,
            runtime,
        })
    }

    async fn check(&self, text: &str, language: &str) -> Result<Vec<RuleMatch>, GrammarError> {
        let response = self
            .http_client
            .post(&self.check_url)
            .form(&[("text", text), ("language", language)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GrammarError::BadStatus(response.status().as_u16()));
        }

        let body: CheckResponse = response.json().await?;
        Ok(body.matches)
    }
}

impl GrammarCorrector for LanguageToolClient {
    fn correct(&self, text: &str, language: &str) -> Result<String, GrammarError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let matches = self.runtime.block_on(self.check(text, language))?;
        debug!("LanguageTool reported {} matches", matches.len());

        Ok(apply_corrections(text, &matches))
    }
}

/// Apply the first suggested replacement of every match
///
/// Matches refer to the original text; later spans are shifted by earlier
/// edits. A match whose span no longer holds the originally flagged text is
/// skipped.
pub fn apply_corrections(text: &str, matches: &[RuleMatch]) -> String {
    let mut chars: Vec<char> = text.chars().collect();

    // UTF-16 offset -> char index
    let mut utf16_to_char = Vec::with_capacity(text.len() + 1);
    for (i, c) in text.chars().enumerate() {
        for _ in 0..c.len_utf16() {
            utf16_to_char.push(i);
        }
    }
    utf16_to_char.push(chars.len());
    let to_char = |offset: usize| utf16_to_char.get(offset).copied();

    let mut shift: isize = 0;
    for m in matches {
        let Some(replacement) = m.replacements.first() else {
            continue;
        };
        let (Some(start), Some(end)) = (to_char(m.offset), to_char(m.offset + m.length)) else {
            continue;
        };
        let original: Vec<char> = text.chars().skip(start).take(end - start).collect();

        let from = start as isize + shift;
        let to = end as isize + shift;
        if from < 0 || to as usize > chars.len() || chars[from as usize..to as usize] != original[..] {
            continue;
        }

        let new: Vec<char> = replacement.value.chars().collect();
        shift += new.len() as isize - original.len() as isize;
        chars.splice(from as usize..to as usize, new);
    }

    chars.into_iter().collect()
}
