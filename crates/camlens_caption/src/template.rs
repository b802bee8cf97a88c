//! Deterministic offline captions.

use crate::captioner::{findings, Captioner};
use crate::config::{CaptionConfig, DEFAULT_THRESHOLD};
use crate::error::Result;

/// Caption used when no label exceeds the threshold.
pub const NO_FINDINGS_CAPTION: &str = "The highlighted regions indicate areas of the image that \
the model considered while making its prediction. No findings exceeded the confidence threshold.";

const FINDINGS_PREFIX: &str = "The highlighted regions show parts of the X-ray image that most \
influenced the model\u{2019}s predictions for the following categories: ";

const FINDINGS_SUFFIX: &str =
    ". These visualizations help understand model behavior and are not medical diagnoses.";

/// Captioner that fills a fixed template with the labels above the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateCaptioner {
    threshold: f32,
}

impl Default for TemplateCaptioner {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl TemplateCaptioner {
    /// Template captioner with the default threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Template captioner using the threshold from `config`.
    pub fn from_config(config: &CaptionConfig) -> Self {
        Self {
            threshold: config.threshold,
        }
    }
}

impl Captioner for TemplateCaptioner {
    fn name(&self) -> &str {
        "template"
    }

    fn caption(&self, predictions: &[f32], labels: &[String]) -> Result<String> {
        let found = findings(predictions, labels, self.threshold)?;
        if found.is_empty() {
            return Ok(NO_FINDINGS_CAPTION.to_string());
        }
        let names: Vec<&str> = found.iter().map(|f| f.label.as_str()).collect();
        Ok(format!("{FINDINGS_PREFIX}{}{FINDINGS_SUFFIX}", names.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["Pneumonia".to_string(), "Edema".to_string()]
    }

    #[test]
    fn test_mentions_only_findings() {
        let caption = TemplateCaptioner::new().caption(&[0.9, 0.3], &labels()).unwrap();
        assert!(caption.contains("Pneumonia"));
        assert!(!caption.contains("Edema"));
        assert!(caption.ends_with("are not medical diagnoses."));
    }

    #[test]
    fn test_no_findings() {
        let caption = TemplateCaptioner::new().caption(&[0.1, 0.2], &labels()).unwrap();
        assert_eq!(caption, NO_FINDINGS_CAPTION);
        assert!(caption.contains("No findings exceeded the confidence threshold."));
    }

    #[test]
    fn test_multiple_findings_in_label_order() {
        let caption = TemplateCaptioner::new().caption(&[0.7, 0.8], &labels()).unwrap();
        assert!(caption.contains("categories: Pneumonia, Edema."));
    }

    #[test]
    fn test_configured_threshold() {
        let config = CaptionConfig::default().with_threshold(0.2);
        let captioner = TemplateCaptioner::from_config(&config);
        let caption = captioner.caption(&[0.1, 0.3], &labels()).unwrap();
        assert!(caption.contains("Edema"));
        assert!(!caption.contains("Pneumonia"));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(TemplateCaptioner::new().caption(&[0.9], &labels()).is_err());
    }
}
