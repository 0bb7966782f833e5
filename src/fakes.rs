//! In-memory capability stand-ins for tests

use image::GrayImage;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{DetectionError, GrammarError, TranslationError};
use crate::text::{GrammarCorrector, Translator};
use crate::vision::{DetectionResult, TextDetector};

/// What a `FakeDetector` was asked to do
#[derive(Debug, Clone)]
pub struct DetectorCall {
    pub dimensions: (u32, u32),
    pub language: String,
    pub use_acceleration: bool,
    /// Pixel value at the image center
    pub sample: u8,
}

/// Detector returning scripted results
pub struct FakeDetector {
    outcome: Result<Vec<DetectionResult>, DetectionError>,
    calls: Vec<DetectorCall>,
}

impl FakeDetector {
    pub fn returning(results: Vec<DetectionResult>) -> Self {
        Self {
            outcome: Ok(results),
            calls: Vec::new(),
        }
    }

    pub fn failing(error: DetectionError) -> Self {
        Self {
            outcome: Err(error),
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[DetectorCall] {
        &self.calls
    }
}

impl TextDetector for FakeDetector {
    fn detect(
        &mut self,
        image: &GrayImage,
        language: &str,
        use_acceleration: bool,
    ) -> Result<Vec<DetectionResult>, DetectionError> {
        let sample = if image.width() > 0 && image.height() > 0 {
            image.get_pixel(image.width() / 2, image.height() / 2)[0]
        } else {
            0
        };
        self.calls.push(DetectorCall {
            dimensions: image.dimensions(),
            language: language.to_string(),
            use_acceleration,
            sample,
        });
        self.outcome.clone()
    }
}

/// Grammar corrector doing a plain substring replacement
pub struct FakeGrammar {
    from: String,
    to: String,
    fail: bool,
    languages: Rc<RefCell<Vec<String>>>,
}

impl FakeGrammar {
    pub fn replacing(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            fail: false,
            languages: Rc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replacing("", "")
        }
    }

    /// Languages passed to `correct`, shared with the caller
    pub fn languages(&self) -> Rc<RefCell<Vec<String>>> {
        self.languages.clone()
    }
}

impl GrammarCorrector for FakeGrammar {
    fn correct(&self, text: &str, language: &str) -> Result<String, GrammarError> {
        self.languages.borrow_mut().push(language.to_string());
        if self.fail {
            return Err(GrammarError::BadStatus(503));
        }
        Ok(text.replace(&self.from, &self.to))
    }
}

/// Translator tagging text with its language pair
pub struct FakeTranslator;

impl Translator for FakeTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslationError> {
        Ok(format!("[{}->{}] {}", source, target, text))
    }
}

/// Translator that always fails
pub struct FailingTranslator;

impl Translator for FailingTranslator {
    fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Err(TranslationError::EmptyInput);
        }
        Err(TranslationError::BadStatus(429))
    }
}
