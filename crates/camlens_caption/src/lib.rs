//! # camlens_caption
//!
//! Plain-language captions for classifier predictions.
//!
//! Two [`Captioner`] implementations share one interface:
//! - [`OllamaCaptioner`] asks a local text-generation service
//! - [`TemplateCaptioner`] fills a fixed, offline template
//!
//! [`select_captioner`] probes the service once and returns whichever applies;
//! a selected service captioner falls back to the template if a request fails.
//!
//! ## Example
//!
//! ```rust,ignore
//! use camlens_caption::{select_captioner, CaptionConfig};
//!
//! let captioner = select_captioner(&CaptionConfig::default());
//! let caption = captioner.caption(&[0.9, 0.3], &labels)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod captioner;
mod config;
mod error;
mod ollama;
mod template;

pub use captioner::{
    findings, select_captioner, service_available, Captioner, Finding, TemplateFallback,
};
pub use config::{CaptionConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_THRESHOLD};
pub use error::{CaptionError, Result};
pub use ollama::{OllamaCaptioner, SYSTEM_PROMPT};
pub use template::{TemplateCaptioner, NO_FINDINGS_CAPTION};
