//! Captions from a local text-generation service speaking the Ollama API.

use serde::{Deserialize, Serialize};

use crate::captioner::{findings, Captioner};
use crate::config::CaptionConfig;
use crate::error::{CaptionError, Result};

/// Instructions prepended to every generation prompt.
pub const SYSTEM_PROMPT: &str = "You are an AI assistant explaining the behavior of a machine \
learning model that analyzes chest X-ray images.

IMPORTANT RULES:
- This system is for EDUCATIONAL and RESEARCH purposes only.
- You must NOT provide medical diagnoses or medical advice.
- You must NOT suggest treatment or clinical decisions.
- Explain what the model focused on, NOT what a patient has.
- Use plain, non-alarming language.";

const NO_FINDINGS_LINE: &str = "No findings exceeded the confidence threshold.";

const TASK: &str = "Explain what the highlighted regions in the Grad-CAM visualization represent.
Do NOT interpret this as a medical diagnosis.";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
}

/// Captioner backed by a `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaCaptioner {
    config: CaptionConfig,
    agent: ureq::Agent,
}

impl OllamaCaptioner {
    /// Client for the service described by `config`.
    pub fn new(config: CaptionConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout())
            .build();
        Self { config, agent }
    }

    /// The client configuration.
    pub fn config(&self) -> &CaptionConfig {
        &self.config
    }

    /// Build the generation prompt for `predictions`.
    pub fn prompt(&self, predictions: &[f32], labels: &[String]) -> Result<String> {
        let found = findings(predictions, labels, self.config.threshold)?;
        let findings_line = if found.is_empty() {
            NO_FINDINGS_LINE.to_string()
        } else {
            found
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        Ok(format!(
            "{SYSTEM_PROMPT}\n\nModel output:\n{findings_line}\n\nTask:\n{TASK}\n"
        ))
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.config.generate_url();
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
        };

        tracing::debug!(%url, model = %self.config.model, "requesting caption");
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(&request)
            .map_err(|e| CaptionError::from_ureq(&url, e))?;

        let reply: GenerateReply = response
            .into_json()
            .map_err(|e| CaptionError::Decode(e.to_string()))?;
        Ok(reply.response.trim().to_string())
    }
}

impl Captioner for OllamaCaptioner {
    fn name(&self) -> &str {
        "ollama"
    }

    fn caption(&self, predictions: &[f32], labels: &[String]) -> Result<String> {
        let prompt = self.prompt(predictions, labels)?;
        self.generate(&prompt)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use super::*;
    use crate::captioner::{select_captioner, service_available};

    fn labels() -> Vec<String> {
        vec!["Pneumonia".to_string(), "Edema".to_string()]
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed before headers");
            buffer.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while buffer.len() < header_end + content_length {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Serve `count` requests with a fixed reply, returning the raw requests.
    fn serve(
        status: &'static str,
        body: &'static str,
        count: usize,
    ) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for _ in 0..count {
                let (mut stream, _) = listener.accept().unwrap();
                requests.push(read_request(&mut stream));
                write!(
                    stream,
                    "HTTP/1.1 {status}\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
            }
            requests
        });
        (url, handle)
    }

    #[test]
    fn test_prompt_lists_findings() {
        let captioner = OllamaCaptioner::new(CaptionConfig::default());
        let prompt = captioner.prompt(&[0.934, 0.3], &labels()).unwrap();
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.contains("Model output:\nPneumonia (confidence 0.93)\n"));
        assert!(!prompt.contains("Edema"));

        let prompt = captioner.prompt(&[0.1, 0.2], &labels()).unwrap();
        assert!(prompt.contains("No findings exceeded the confidence threshold."));
    }

    #[test]
    fn test_caption_round_trip() {
        let reply = r#"{"response": "  The model looked at the lower lobes.\n"}"#;
        let (url, server) = serve("200 OK", reply, 1);
        let captioner = OllamaCaptioner::new(CaptionConfig::default().with_base_url(url));

        let caption = captioner.caption(&[0.9, 0.3], &labels()).unwrap();
        assert_eq!(caption, "The model looked at the lower lobes.");

        let requests = server.join().unwrap();
        let request = &requests[0];
        assert!(request.starts_with("POST /api/generate"));
        let body_start = request.find("\r\n\r\n").unwrap() + 4;
        let body: serde_json::Value = serde_json::from_str(&request[body_start..]).unwrap();
        assert_eq!(body["model"], "tinyllama");
        assert_eq!(body["stream"], false);
        assert!(body["prompt"].as_str().unwrap().contains("Pneumonia (confidence 0.90)"));
    }

    #[test]
    fn test_missing_response_field_is_empty() {
        let (url, server) = serve("200 OK", r#"{"done": true}"#, 1);
        let captioner = OllamaCaptioner::new(CaptionConfig::default().with_base_url(url));
        assert_eq!(captioner.caption(&[0.1, 0.1], &labels()).unwrap(), "");
        server.join().unwrap();
    }

    #[test]
    fn test_error_status() {
        let (url, server) = serve("500 Internal Server Error", "{}", 1);
        let captioner = OllamaCaptioner::new(CaptionConfig::default().with_base_url(url));
        let result = captioner.caption(&[0.9, 0.3], &labels());
        assert!(matches!(result, Err(CaptionError::Status { code: 500, .. })));
        server.join().unwrap();
    }

    #[test]
    fn test_invalid_json_reply() {
        let (url, server) = serve("200 OK", "not json", 1);
        let captioner = OllamaCaptioner::new(CaptionConfig::default().with_base_url(url));
        let result = captioner.caption(&[0.9, 0.3], &labels());
        assert!(matches!(result, Err(CaptionError::Decode(_))));
        server.join().unwrap();
    }

    #[test]
    fn test_probe_accepts_any_status() {
        let (url, server) = serve("404 Not Found", "{}", 2);
        let config = CaptionConfig::default().with_base_url(url);
        assert!(service_available(&config));
        assert_eq!(select_captioner(&config).name(), "ollama");
        server.join().unwrap();
    }
}
