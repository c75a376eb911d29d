//! Test doubles shared by unit tests across modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::ai::provider::AnalysisService;
use crate::ai::tokenizer::{Bpe, BpeLoader};
use crate::config::TokenEncoding;
use crate::types::{ChunkRequest, LensError, Result, TokenSequence};

/// One token per character; token 0 stands for a lone UTF-8 continuation
/// byte, as left behind when a window splits a character
pub struct CharBpe;

impl Bpe for CharBpe {
    fn encode_text(&self, text: &str) -> TokenSequence {
        text.chars().map(|c| c as u32).collect()
    }

    fn decode_bytes(&self, tokens: &[u32]) -> std::result::Result<Vec<u8>, String> {
        let mut bytes = Vec::new();
        for &token in tokens {
            match token {
                0 => bytes.push(0x80),
                _ => {
                    let c = char::from_u32(token)
                        .ok_or_else(|| format!("unknown token {}", token))?;
                    bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes());
                }
            }
        }
        Ok(bytes)
    }
}

/// Loader for `CharBpe` that counts loads and can fail or stall on demand
pub struct CharLoader {
    pub loads: AtomicUsize,
    fail_first: usize,
    delay: Option<Duration>,
}

impl CharLoader {
    pub fn new() -> Self {
        Self {
            loads: AtomicUsize::new(0),
            fail_first: 0,
            delay: None,
        }
    }

    pub fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl BpeLoader for CharLoader {
    async fn load(&self, _encoding: TokenEncoding) -> Result<Arc<dyn Bpe>> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if attempt < self.fail_first {
            return Err(LensError::TokenizerUnavailable(
                "rank data missing".to_string(),
            ));
        }
        Ok(Arc::new(CharBpe))
    }
}

type Responder = Box<dyn Fn(&ChunkRequest) -> Result<Value> + Send + Sync>;

/// In-process analysis service that records every request
pub struct ScriptedService {
    responder: Responder,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<ChunkRequest>>,
}

impl ScriptedService {
    pub fn new(responder: impl Fn(&ChunkRequest) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same provider-shaped payload
    pub fn fixed(accuracy: u8, suggestions: &[&str], reword: &str) -> Self {
        let body = provider_payload(accuracy, suggestions, reword);
        Self::new(move |_| Ok(body.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn recorded(&self) -> Vec<ChunkRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisService for ScriptedService {
    async fn analyze(&self, request: &ChunkRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(request)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Response body in the service's `Evaluation`/`Optimization` shape
pub fn provider_payload(accuracy: u8, suggestions: &[&str], reword: &str) -> Value {
    json!({
        "Evaluation": {
            "Accuracy": accuracy,
            "Suggestions": suggestions,
        },
        "Optimization": {
            "Reword": reword,
        }
    })
}

/// Text whose `CharBpe` token count is exactly `len`
pub fn text_of_len(len: usize) -> String {
    "abcdefghij".chars().cycle().take(len).collect()
}
