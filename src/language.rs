//! Supported languages
//!
//! One closed set is used both as the detection hint and the translation
//! target. Each language knows which recognition model family reads it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Script family sharing one recognition model and character dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptFamily {
    English,
    Latin,
    EastSlavic,
    Cyrillic,
    Arabic,
    Japanese,
    Chinese,
    Korean,
    Devanagari,
}

impl ScriptFamily {
    /// Directory name of the recognition model in the model repository
    pub fn model_dir(&self) -> &'static str {
        match self {
            ScriptFamily::English => "english",
            ScriptFamily::Latin => "latin",
            ScriptFamily::EastSlavic => "eslav",
            ScriptFamily::Cyrillic => "cyrillic",
            ScriptFamily::Arabic => "arabic",
            ScriptFamily::Japanese => "japanese",
            ScriptFamily::Chinese => "chinese",
            ScriptFamily::Korean => "korean",
            ScriptFamily::Devanagari => "hindi",
        }
    }
}

/// A language the tool can read and translate into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    Russian,
    English,
    Spanish,
    German,
    French,
    Kyrgyz,
    Italian,
    Portuguese,
    Dutch,
    Polish,
    Arabic,
    Japanese,
    ChineseSimplified,
    Korean,
    Hindi,
}

impl Language {
    pub const ALL: [Language; 15] = [
        Language::Russian,
        Language::English,
        Language::Spanish,
        Language::German,
        Language::French,
        Language::Kyrgyz,
        Language::Italian,
        Language::Portuguese,
        Language::Dutch,
        Language::Polish,
        Language::Arabic,
        Language::Japanese,
        Language::ChineseSimplified,
        Language::Korean,
        Language::Hindi,
    ];

    /// Short code used on the command line and as the detection hint
    pub fn code(&self) -> &'static str {
        match self {
            Language::Russian => "ru",
            Language::English => "en",
            Language::Spanish => "es",
            Language::German => "de",
            Language::French => "fr",
            Language::Kyrgyz => "ky",
            Language::Italian => "it",
            Language::Portuguese => "pt",
            Language::Dutch => "nl",
            Language::Polish => "pl",
            Language::Arabic => "ar",
            Language::Japanese => "ja",
            Language::ChineseSimplified => "zh-cn",
            Language::Korean => "ko",
            Language::Hindi => "hi",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Russian => "Russian",
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::German => "German",
            Language::French => "French",
            Language::Kyrgyz => "Kyrgyz",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Dutch => "Dutch",
            Language::Polish => "Polish",
            Language::Arabic => "Arabic",
            Language::Japanese => "Japanese",
            Language::ChineseSimplified => "Chinese (simplified)",
            Language::Korean => "Korean",
            Language::Hindi => "Hindi",
        }
    }

    /// Code expected by the translation service
    pub fn translation_code(&self) -> &'static str {
        match self {
            Language::ChineseSimplified => "zh-CN",
            other => other.code(),
        }
    }

    pub fn script_family(&self) -> ScriptFamily {
        match self {
            Language::English => ScriptFamily::English,
            Language::Spanish
            | Language::German
            | Language::French
            | Language::Italian
            | Language::Portuguese
            | Language::Dutch
            | Language::Polish => ScriptFamily::Latin,
            Language::Russian => ScriptFamily::EastSlavic,
            Language::Kyrgyz => ScriptFamily::Cyrillic,
            Language::Arabic => ScriptFamily::Arabic,
            Language::Japanese => ScriptFamily::Japanese,
            Language::ChineseSimplified => ScriptFamily::Chinese,
            Language::Korean => ScriptFamily::Korean,
            Language::Hindi => ScriptFamily::Devanagari,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unknown language code, with the closest known code if one is near
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown language '{input}'{}", .suggestion.map(|s| format!(", did you mean '{s}'?")).unwrap_or_default())]
pub struct LanguageParseError {
    pub input: String,
    pub suggestion: Option<&'static str>,
}

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();

        if let Some(lang) = Language::ALL.iter().find(|l| {
            l.code() == needle || l.display_name().to_lowercase() == needle
        }) {
            return Ok(*lang);
        }

        // Suggest by code or display name, whichever is closer
        let suggestion = Language::ALL
            .iter()
            .map(|l| {
                let by_code = strsim::normalized_levenshtein(&needle, l.code());
                let by_name =
                    strsim::normalized_levenshtein(&needle, &l.display_name().to_lowercase());
                (l.code(), by_code.max(by_name))
            })
            .filter(|(_, score)| *score >= 0.5)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(code, _)| code);

        Err(LanguageParseError {
            input: s.to_string(),
            suggestion,
        })
    }
}

impl TryFrom<String> for Language {
    type Error = LanguageParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.code().to_string()
    }
}
