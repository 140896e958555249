//! Remote generation through an Ollama server.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sw_core::{BackendError, GenerationBackend, GenerationOptions};
use tracing::{debug, warn};

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// Default model name.
pub const DEFAULT_MODEL: &str = "llama2";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Health checks must answer quickly or the server counts as down.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`OllamaBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Server base URL, e.g. `http://localhost:11434`
    pub base_url: String,
    /// Model to generate with
    pub model: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST`, `STEPWISE_MODEL` and `STEPWISE_TIMEOUT_SECS`,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                config.base_url = normalize_base_url(&host);
            }
        }
        if let Ok(model) = std::env::var("STEPWISE_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Some(secs) = std::env::var("STEPWISE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&secs| secs > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Override the server URL; `host:port` is accepted.
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = normalize_base_url(url);
        self
    }
}

/// Accept `host:port` as well as full URLs; drop trailing slashes.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Generation backend talking to Ollama's `/api/generate`.
///
/// Owns its HTTP client and a current-thread runtime; both live as long as
/// the backend. Must not be called from inside another tokio runtime.
pub struct OllamaBackend {
    config: OllamaConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl OllamaBackend {
    /// Build the client and runtime.
    pub fn new(config: OllamaConfig) -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackendError::unavailable(format!("runtime error: {}", e)))?;

        let client = reqwest::Client::builder()
            .connect_timeout(HEALTH_CHECK_TIMEOUT)
            .build()
            .map_err(|e| BackendError::unavailable(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            config,
            client,
            runtime,
        })
    }

    /// Build from environment variables.
    pub fn from_env() -> Result<Self, BackendError> {
        Self::new(OllamaConfig::from_env())
    }

    /// Connection settings in use.
    #[must_use]
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Check if the Ollama server is reachable.
    pub fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);

        let result = self.runtime.block_on(async {
            self.client
                .get(&url)
                .timeout(HEALTH_CHECK_TIMEOUT)
                .send()
                .await
        });

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(model = %self.config.model, "Ollama health check passed");
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "Ollama health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, url = %self.config.base_url, "Ollama unreachable");
                false
            }
        }
    }

    fn request(&self, prompt: &str, options: &GenerationOptions) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: RequestOptions {
                temperature: options.temperature,
                num_predict: options.output_length_max,
            },
        };
        let timeout = self.config.timeout;

        let call = async {
            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(BackendError::unavailable(format!(
                    "Ollama returned {}: {}",
                    status,
                    text.trim()
                )));
            }

            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;
            Ok(parsed.response)
        };

        self.runtime.block_on(async {
            match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout { timeout }),
            }
        })
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout { timeout }
    } else if error.is_decode() {
        BackendError::unavailable(format!("Ollama JSON parse error: {}", error))
    } else {
        BackendError::unavailable(format!("Ollama HTTP error: {}", error))
    }
}

impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, BackendError> {
        super::warn_on_multiple_samples("ollama", options);
        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            temperature = options.temperature,
            "requesting Ollama completion"
        );
        self.request(prompt, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// One-shot HTTP server on a loopback port.
    ///
    /// Reads one request, then writes `reply` verbatim. With `None` it
    /// holds the connection open without answering.
    fn serve_once(reply: Option<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            match reply {
                Some(reply) => {
                    let _ = stream.write_all(reply.as_bytes());
                    let _ = stream.flush();
                }
                None => thread::sleep(Duration::from_secs(3)),
            }
        });

        url
    }

    /// Consume headers and a `Content-Length` body.
    fn read_request(stream: &mut std::net::TcpStream) {
        let mut request: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let read = stream.read(&mut chunk).unwrap_or(0);
            if read == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let body_len = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + body_len {
                    return;
                }
            }
        }
    }

    fn http_reply(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    fn backend_at(base_url: String, timeout: Duration) -> OllamaBackend {
        OllamaBackend::new(OllamaConfig {
            base_url,
            timeout,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_generate_reads_response_field() {
        let url = serve_once(Some(http_reply(
            "200 OK",
            r#"{"model":"llama2","response":"Step 1\n1.1","done":true}"#,
        )));
        let backend = backend_at(url, Duration::from_secs(10));

        let text = backend.generate("How?", &GenerationOptions::default()).unwrap();
        assert_eq!(text, "Step 1\n1.1");
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let url = serve_once(Some(http_reply("500 Internal Server Error", "boom")));
        let backend = backend_at(url, Duration::from_secs(10));

        match backend.generate("How?", &GenerationOptions::default()) {
            Err(BackendError::Unavailable { reason }) => {
                assert!(reason.contains("500"), "reason: {}", reason);
                assert!(reason.contains("boom"), "reason: {}", reason);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_body_is_unavailable() {
        let url = serve_once(Some(http_reply("200 OK", "not json at all")));
        let backend = backend_at(url, Duration::from_secs(10));

        match backend.generate("How?", &GenerationOptions::default()) {
            Err(BackendError::Unavailable { reason }) => {
                assert!(reason.contains("JSON"), "reason: {}", reason);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_stalled_server_times_out() {
        let url = serve_once(None);
        let backend = backend_at(url, Duration::from_millis(300));

        let result = backend.generate("How?", &GenerationOptions::default());
        assert_eq!(
            result,
            Err(BackendError::Timeout {
                timeout: Duration::from_millis(300)
            })
        );
    }

    #[test]
    fn test_health_check_passes_on_tags() {
        let url = serve_once(Some(http_reply("200 OK", r#"{"models":[]}"#)));
        let backend = backend_at(url, Duration::from_secs(10));
        assert!(backend.health_check());
    }

    #[test]
    fn test_with_base_url_normalizes() {
        let config = OllamaConfig::default().with_base_url("127.0.0.1:9999/");
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_request_shape() {
        let body = GenerateRequest {
            model: "llama2",
            prompt: "How?",
            stream: false,
            options: RequestOptions {
                temperature: 0.5,
                num_predict: 1000,
            },
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "llama2");
        assert_eq!(json["prompt"], "How?");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 1000);
        assert_eq!(json["options"]["temperature"], 0.5);
    }

    #[test]
    fn test_response_parsing_ignores_extra_fields() {
        let raw = r#"{"model":"llama2","response":"Step 1\n1.1.","done":true,"eval_count":12}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.response, "Step 1\n1.1.");
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(normalize_base_url("https://llm.local/"), "https://llm.local");
        assert_eq!(normalize_base_url(" http://h:1 "), "http://h:1");
    }

    #[test]
    fn test_unreachable_server_is_unavailable() {
        // Port 1 is reserved (tcpmux) and not listening in test environments.
        let backend = OllamaBackend::new(OllamaConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap();

        let result = backend.generate("How?", &GenerationOptions::default());
        assert!(
            matches!(result, Err(BackendError::Unavailable { .. })),
            "unexpected result: {:?}",
            result
        );
        assert!(!backend.health_check());
    }
}
