//! Captioning configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default address of the local text-generation service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default text-generation model.
pub const DEFAULT_MODEL: &str = "tinyllama";

/// Confidences strictly above this value count as findings.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Configuration shared by the captioners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Base URL of the text-generation service.
    pub base_url: String,
    /// Model name sent with each generation request.
    pub model: String,
    /// Timeout of the availability probe, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Timeout of a generation request, in milliseconds.
    pub request_timeout_ms: u64,
    /// Confidence threshold for reporting a finding.
    pub threshold: f32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            probe_timeout_ms: 2_000,
            request_timeout_ms: 30_000,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl CaptionConfig {
    /// Set the service base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the generation model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the probe timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the confidence threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Probe timeout as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// URL of the generation endpoint.
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}
