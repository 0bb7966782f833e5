//! Text Layer
//!
//! Assembles recognized fragments and refines them through grammar
//! correction and translation services.

pub mod grammar;
pub mod translate;

use crate::error::{GrammarError, TranslationError};

pub use grammar::LanguageToolClient;
pub use translate::GoogleTranslator;

/// Source language value asking the translator to detect the language itself
pub const AUTO_DETECT: &str = "auto";

/// Join recognized fragments with newlines, keeping their order
pub fn assemble<S: AsRef<str>>(fragments: &[S]) -> String {
    fragments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Grammar and spelling correction capability
pub trait GrammarCorrector {
    fn correct(&self, text: &str, language: &str) -> Result<String, GrammarError>;
}

/// Machine translation capability
pub trait Translator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_preserves_order() {
        assert_eq!(assemble(&["a", "b", "c"]), "a\nb\nc");
        assert_eq!(assemble(&["c", "a", "b"]), "c\na\nb");
    }

    #[test]
    fn test_assemble_empty() {
        let empty: [&str; 0] = [];
        assert_eq!(assemble(&empty), "");
    }

    #[test]
    fn test_assemble_does_not_sanitize() {
        let fragments = vec![" Hello ".to_string(), "日本".to_string()];
        assert_eq!(assemble(&fragments), " Hello \n日本");
    }
}
