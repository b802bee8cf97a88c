//! The captioner interface and runtime selection.

use std::fmt;

use crate::config::CaptionConfig;
use crate::error::{CaptionError, Result};
use crate::ollama::OllamaCaptioner;
use crate::template::TemplateCaptioner;

/// Produces a plain-language caption for per-label confidences.
pub trait Captioner: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Caption `predictions`, where `predictions[i]` is the confidence of `labels[i]`.
    fn caption(&self, predictions: &[f32], labels: &[String]) -> Result<String>;
}

/// A label whose confidence exceeded the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// Label name.
    pub label: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (confidence {:.2})", self.label, self.confidence)
    }
}

/// Labels whose confidence is strictly greater than `threshold`, in label order.
pub fn findings(predictions: &[f32], labels: &[String], threshold: f32) -> Result<Vec<Finding>> {
    if predictions.len() != labels.len() {
        return Err(CaptionError::LengthMismatch {
            predictions: predictions.len(),
            labels: labels.len(),
        });
    }
    Ok(predictions
        .iter()
        .zip(labels)
        .filter(|(confidence, _)| **confidence > threshold)
        .map(|(confidence, label)| Finding {
            label: label.clone(),
            confidence: *confidence,
        })
        .collect())
}

/// Whether the text-generation service answers at `config.base_url`.
///
/// Any HTTP response counts, including error statuses; only transport
/// failures (refused connection, timeout) mean unavailable.
pub fn service_available(config: &CaptionConfig) -> bool {
    let agent = ureq::AgentBuilder::new()
        .timeout(config.probe_timeout())
        .build();
    match agent.get(&config.base_url).call() {
        Ok(_) | Err(ureq::Error::Status(..)) => true,
        Err(ureq::Error::Transport(transport)) => {
            tracing::debug!(
                url = %config.base_url,
                error = %transport,
                "caption service probe failed"
            );
            false
        }
    }
}

/// Wraps a captioner and answers with a [`TemplateCaptioner`] when it fails.
///
/// Length mismatches are not retried; the template would reject them too.
#[derive(Debug, Clone)]
pub struct TemplateFallback<C> {
    primary: C,
    fallback: TemplateCaptioner,
}

impl<C: Captioner> TemplateFallback<C> {
    /// Use `primary`, falling back to `fallback` on errors.
    pub fn new(primary: C, fallback: TemplateCaptioner) -> Self {
        Self { primary, fallback }
    }

    /// The wrapped captioner.
    pub fn primary(&self) -> &C {
        &self.primary
    }
}

impl<C: Captioner> Captioner for TemplateFallback<C> {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn caption(&self, predictions: &[f32], labels: &[String]) -> Result<String> {
        match self.primary.caption(predictions, labels) {
            Ok(caption) => Ok(caption),
            Err(err @ CaptionError::LengthMismatch { .. }) => Err(err),
            Err(err) => {
                tracing::warn!(
                    captioner = self.primary.name(),
                    error = %err,
                    "caption failed, using template"
                );
                self.fallback.caption(predictions, labels)
            }
        }
    }
}

/// The service captioner when the service is reachable, the template otherwise.
///
/// The service captioner is wrapped in [`TemplateFallback`], so a request that
/// fails after a successful probe still yields a template caption.
pub fn select_captioner(config: &CaptionConfig) -> Box<dyn Captioner> {
    if service_available(config) {
        tracing::info!(url = %config.base_url, model = %config.model, "using caption service");
        Box::new(TemplateFallback::new(
            OllamaCaptioner::new(config.clone()),
            TemplateCaptioner::from_config(config),
        ))
    } else {
        tracing::warn!(
            url = %config.base_url,
            "caption service unavailable, falling back to template captions"
        );
        Box::new(TemplateCaptioner::from_config(config))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_findings_strictly_above_threshold() {
        let found = findings(
            &[0.9, 0.5, 0.51],
            &labels(&["Pneumonia", "Edema", "Mass"]),
            0.5,
        )
        .unwrap();
        let names: Vec<&str> = found.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(names, vec!["Pneumonia", "Mass"]);
    }

    #[test]
    fn test_findings_length_mismatch() {
        let result = findings(&[0.9], &labels(&["Pneumonia", "Edema"]), 0.5);
        assert!(matches!(
            result,
            Err(CaptionError::LengthMismatch {
                predictions: 1,
                labels: 2
            })
        ));
    }

    #[test]
    fn test_finding_display() {
        let finding = Finding {
            label: "Pneumonia".to_string(),
            confidence: 0.934,
        };
        assert_eq!(finding.to_string(), "Pneumonia (confidence 0.93)");
    }

    /// Always fails with the given HTTP status.
    struct Failing(u16);

    impl Captioner for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn caption(&self, _predictions: &[f32], _labels: &[String]) -> Result<String> {
            Err(CaptionError::Status {
                code: self.0,
                url: "http://localhost:11434/api/generate".to_string(),
            })
        }
    }

    #[test]
    fn test_fallback_on_failure() {
        let captioner = TemplateFallback::new(Failing(503), TemplateCaptioner::new());
        assert_eq!(captioner.name(), "failing");

        let caption = captioner
            .caption(&[0.9, 0.3], &labels(&["Pneumonia", "Edema"]))
            .unwrap();
        assert!(caption.contains("Pneumonia"));
        assert!(!caption.contains("Edema"));
    }

    #[test]
    fn test_fallback_keeps_length_mismatch() {
        let captioner = TemplateFallback::new(TemplateCaptioner::new(), TemplateCaptioner::new());
        let result = captioner.caption(&[0.9], &labels(&["Pneumonia", "Edema"]));
        assert!(matches!(result, Err(CaptionError::LengthMismatch { .. })));
    }

    #[test]
    fn test_unreachable_service_selects_template() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = CaptionConfig::default()
            .with_base_url(format!("http://127.0.0.1:{port}"))
            .with_probe_timeout(Duration::from_millis(200));
        assert!(!service_available(&config));
        assert_eq!(select_captioner(&config).name(), "template");
    }
}
