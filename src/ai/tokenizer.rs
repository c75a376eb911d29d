//! Tokenizer Adapter
//!
//! Wraps a byte-pair-encoding tokenizer behind a lazily initialized handle.
//!
//! ## Strategy
//! - BPE data is loaded at most once per handle, on first use
//! - Concurrent callers arriving during initialization await the same load
//! - A failed load is not remembered: the next call tries again
//!
//! Token counts from this adapter drive every planner threshold, so the
//! encoding should match the model behind the analysis service.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tiktoken_rs::CoreBPE;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::TokenEncoding;
use crate::types::{LensError, Result, TokenSequence};

/// Shared tokenizer handle for concurrent access across analyses.
pub type SharedTokenizer = Arc<Tokenizer>;

/// Encoder/decoder over token ids
pub trait Bpe: Send + Sync {
    fn encode_text(&self, text: &str) -> TokenSequence;

    /// Raw bytes of a token slice; fails only on unknown token ids
    fn decode_bytes(&self, tokens: &[u32]) -> std::result::Result<Vec<u8>, String>;
}

impl Bpe for CoreBPE {
    fn encode_text(&self, text: &str) -> TokenSequence {
        self.encode_with_special_tokens(text)
    }

    fn decode_bytes(&self, tokens: &[u32]) -> std::result::Result<Vec<u8>, String> {
        CoreBPE::decode_bytes(self, tokens).map_err(|e| format!("{:?}", e))
    }
}

/// Source of BPE model data
#[async_trait]
pub trait BpeLoader: Send + Sync {
    async fn load(&self, encoding: TokenEncoding) -> Result<Arc<dyn Bpe>>;
}

/// Loads the encodings bundled with `tiktoken-rs`
#[derive(Debug, Default, Clone, Copy)]
pub struct TiktokenLoader;

#[async_trait]
impl BpeLoader for TiktokenLoader {
    async fn load(&self, encoding: TokenEncoding) -> Result<Arc<dyn Bpe>> {
        // Parsing the rank tables is CPU-bound
        let bpe = tokio::task::spawn_blocking(move || match encoding {
            TokenEncoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            TokenEncoding::O200kBase => tiktoken_rs::o200k_base(),
            TokenEncoding::P50kBase => tiktoken_rs::p50k_base(),
        })
        .await
        .map_err(|e| LensError::TokenizerUnavailable(format!("loader task failed: {}", e)))?
        .map_err(|e| LensError::TokenizerUnavailable(format!("{}: {}", encoding, e)))?;

        Ok(Arc::new(bpe))
    }
}

/// Lazily initialized tokenizer
pub struct Tokenizer {
    encoding: TokenEncoding,
    loader: Arc<dyn BpeLoader>,
    bpe: OnceCell<Arc<dyn Bpe>>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("encoding", &self.encoding)
            .field("initialized", &self.bpe.initialized())
            .finish()
    }
}

impl Tokenizer {
    /// Tokenizer backed by the bundled tiktoken encodings
    pub fn new(encoding: TokenEncoding) -> Self {
        Self::with_loader(encoding, Arc::new(TiktokenLoader))
    }

    pub fn with_loader(encoding: TokenEncoding, loader: Arc<dyn BpeLoader>) -> Self {
        Self {
            encoding,
            loader,
            bpe: OnceCell::new(),
        }
    }

    /// Process-wide handle for the default encoding
    pub fn shared() -> SharedTokenizer {
        static SHARED: OnceLock<SharedTokenizer> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(Tokenizer::new(TokenEncoding::default())))
            .clone()
    }

    pub fn encoding(&self) -> TokenEncoding {
        self.encoding
    }

    pub fn is_initialized(&self) -> bool {
        self.bpe.initialized()
    }

    async fn bpe(&self) -> Result<&Arc<dyn Bpe>> {
        self.bpe
            .get_or_try_init(|| async {
                debug!("Loading {} tokenizer data", self.encoding);
                let loaded = self.loader.load(self.encoding).await;
                if let Err(e) = &loaded {
                    warn!("Tokenizer initialization failed: {}", e);
                }
                loaded
            })
            .await
    }

    /// Encode text into token ids
    pub async fn encode(&self, text: &str) -> Result<TokenSequence> {
        Ok(self.bpe().await?.encode_text(text))
    }

    /// Count tokens in text
    pub async fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text).await?.len())
    }

    /// Decode a token window back into text.
    ///
    /// Windows cut on token boundaries, which can split a multi-byte
    /// character. Only the bytes of such partial characters become U+FFFD;
    /// every complete character in the window is kept.
    pub async fn decode(&self, tokens: &[u32]) -> Result<String> {
        let bytes = self
            .bpe()
            .await?
            .decode_bytes(tokens)
            .map_err(|e| LensError::TokenizerUnavailable(format!("cannot decode window: {}", e)))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CharLoader;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_encode_decode_with_char_bpe() {
        let tokenizer =
            Tokenizer::with_loader(TokenEncoding::default(), Arc::new(CharLoader::new()));

        let tokens = tokenizer.encode("hello").await.unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokenizer.decode(&tokens[1..4]).await.unwrap(), "ell");
        assert_eq!(tokenizer.count("").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_loads_once() {
        let loader = Arc::new(CharLoader::new());
        let tokenizer = Tokenizer::with_loader(TokenEncoding::default(), loader.clone());

        assert!(!tokenizer.is_initialized());
        tokenizer.count("a").await.unwrap();
        tokenizer.count("b").await.unwrap();
        tokenizer.decode(&[97]).await.unwrap();

        assert!(tokenizer.is_initialized());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_initialization() {
        let loader = Arc::new(CharLoader::new().with_delay(std::time::Duration::from_millis(20)));
        let tokenizer = Arc::new(Tokenizer::with_loader(
            TokenEncoding::default(),
            loader.clone(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tokenizer = tokenizer.clone();
                tokio::spawn(async move { tokenizer.count("abc").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 3);
        }
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let loader = Arc::new(CharLoader::new().failing_first(1));
        let tokenizer = Tokenizer::with_loader(TokenEncoding::default(), loader.clone());

        let first = tokenizer.encode("abc").await;
        assert!(matches!(first, Err(LensError::TokenizerUnavailable(_))));
        assert!(!tokenizer.is_initialized());

        let second = tokenizer.encode("abc").await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_partial_character_becomes_replacement() {
        // CharBpe maps token 0 to a lone continuation byte
        let tokenizer =
            Tokenizer::with_loader(TokenEncoding::default(), Arc::new(CharLoader::new()));
        assert_eq!(tokenizer.decode(&[104, 0, 105]).await.unwrap(), "h\u{FFFD}i");
        assert_eq!(tokenizer.decode(&[0, 0, 99]).await.unwrap(), "\u{FFFD}\u{FFFD}c");
    }

    #[tokio::test]
    async fn test_unknown_token_is_an_error() {
        let tokenizer =
            Tokenizer::with_loader(TokenEncoding::default(), Arc::new(CharLoader::new()));
        let err = tokenizer.decode(&[0xD800]).await.unwrap_err();
        assert!(matches!(err, LensError::TokenizerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_window_cut_inside_emoji_keeps_following_text() {
        let text = "🤖🦀🧬 hello world friends";
        let tokenizer = Tokenizer::new(TokenEncoding::Cl100kBase);
        let tokens = tokenizer.encode(text).await.unwrap();
        let bpe = tiktoken_rs::cl100k_base().unwrap();
        let hello = text.find(" hello").unwrap();

        for cut in 1..tokens.len() {
            let offset = Bpe::decode_bytes(&bpe, &tokens[..cut]).unwrap().len();
            let tail = tokenizer.decode(&tokens[cut..]).await.unwrap();

            assert_eq!(
                tail,
                String::from_utf8_lossy(&text.as_bytes()[offset..]),
                "cut at token {}",
                cut
            );
            if offset <= hello {
                assert!(tail.ends_with(" hello world friends"), "cut at token {}", cut);
            }
        }
    }

    #[tokio::test]
    async fn test_tiktoken_round_trip() {
        let tokenizer = Tokenizer::new(TokenEncoding::Cl100kBase);
        let text = "The quick brown fox jumps over the lazy dog.";

        let tokens = tokenizer.encode(text).await.unwrap();
        assert!(!tokens.is_empty());
        assert!(tokens.len() < text.len());
        assert_eq!(tokenizer.decode(&tokens).await.unwrap(), text);
    }
}
