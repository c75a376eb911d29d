//! HTTP Analysis Service
//!
//! Posts each chunk request as JSON to the configured analysis endpoint.
//! The response body is returned as-is (parsed as JSON when possible, else as
//! a JSON string) for the response validator to normalize.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::AnalysisService;
use crate::config::AnalysisConfig;
use crate::constants::network;
use crate::types::{ChunkRequest, LensError, Result};

/// Environment variable consulted when no key is configured or saved
const API_KEY_ENV: &str = "PROMPTLENS_API_KEY";

/// Analysis service client with secure API key handling
pub struct HttpAnalysisService {
    /// API key stored securely - never exposed in logs or debug output
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    template: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpAnalysisService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAnalysisService")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("template", &self.template)
            .finish()
    }
}

impl HttpAnalysisService {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LensError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            endpoint: config.endpoint,
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            template: config.template,
            client,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_body<'a>(&'a self, request: &'a ChunkRequest) -> AnalysisRequestBody<'a> {
        let chunked = request.is_chunked();
        AnalysisRequestBody {
            content: &request.text,
            is_chunked: chunked,
            is_begin: chunked.then(|| request.is_begin()),
            is_end: chunked.then(|| request.is_end()),
            chunk_index: chunked.then_some(request.index),
            total_chunks: chunked.then_some(request.total),
            model_config: ModelConfig {
                model: &self.model,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            },
            template: &self.template,
        }
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyze(&self, request: &ChunkRequest) -> Result<Value> {
        debug!(
            "Sending {} request to {} (chunk {}/{})",
            request.position,
            self.endpoint,
            request.index + 1,
            request.total
        );

        let start_time = Instant::now();
        let body = self.build_body(request);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LensError::upstream(None, format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LensError::upstream(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(LensError::upstream(Some(status.as_u16()), text));
        }

        info!(
            "Analysis service responded in {}ms ({} bytes)",
            start_time.elapsed().as_millis(),
            text.len()
        );

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    fn name(&self) -> &str {
        "http"
    }
}

// Request types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequestBody<'a> {
    content: &'a str,
    is_chunked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_begin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_end: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_chunks: Option<usize>,
    model_config: ModelConfig<'a>,
    template: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelConfig<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn service(endpoint: &str) -> HttpAnalysisService {
        HttpAnalysisService::new(AnalysisConfig {
            endpoint: endpoint.to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/analyze", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });

        (url, handle)
    }

    #[test]
    fn test_single_body_omits_chunk_fields() {
        let service = service("http://localhost/analyze");
        let request = ChunkRequest::single("Write a poem");
        let body = serde_json::to_value(service.build_body(&request)).unwrap();

        assert_eq!(body["content"], "Write a poem");
        assert_eq!(body["isChunked"], false);
        assert!(body.get("isBegin").is_none());
        assert!(body.get("chunkIndex").is_none());
        assert_eq!(body["modelConfig"]["model"], "gpt-4o-mini");
        assert_eq!(body["modelConfig"]["maxTokens"], 1024);
        assert_eq!(body["template"], "prompt-optimizer");
    }

    #[test]
    fn test_chunked_body_flags() {
        let service = service("http://localhost/analyze");

        let first = serde_json::to_value(service.build_body(&ChunkRequest::chunk("a", 0, 3))).unwrap();
        assert_eq!(first["isChunked"], true);
        assert_eq!(first["isBegin"], true);
        assert_eq!(first["isEnd"], false);
        assert_eq!(first["chunkIndex"], 0);
        assert_eq!(first["totalChunks"], 3);

        let last = serde_json::to_value(service.build_body(&ChunkRequest::chunk("c", 2, 3))).unwrap();
        assert_eq!(last["isBegin"], false);
        assert_eq!(last["isEnd"], true);
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", service("http://localhost/analyze"));
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_success_returns_json() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"Evaluation":{"Accuracy":90},"Optimization":{"Reword":"x"}}"#,
        )
        .await;

        let value = service(&url)
            .analyze(&ChunkRequest::single("hello"))
            .await
            .unwrap();
        assert_eq!(value["Evaluation"]["Accuracy"], 90);

        let raw_request = server.await.unwrap();
        assert!(raw_request.contains("Bearer sk-test"));
        assert!(raw_request.contains("\"isChunked\":false"));
    }

    #[tokio::test]
    async fn test_non_json_body_passed_as_string() {
        let (url, _server) = serve_once("200 OK", "plain text answer").await;

        let value = service(&url)
            .analyze(&ChunkRequest::single("hello"))
            .await
            .unwrap();
        assert_eq!(value, Value::String("plain text answer".to_string()));
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream() {
        let (url, _server) = serve_once("503 Service Unavailable", "overloaded").await;

        let err = service(&url)
            .analyze(&ChunkRequest::single("hello"))
            .await
            .unwrap_err();
        match err {
            LensError::Upstream { status, detail } => {
                assert_eq!(status, Some(503));
                assert_eq!(detail, "overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_has_no_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/analyze", listener.local_addr().unwrap());
        drop(listener);

        let err = service(&url)
            .analyze(&ChunkRequest::single("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, LensError::Upstream { status: None, .. }));
    }
}
