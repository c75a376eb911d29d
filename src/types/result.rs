//! Analysis request and result types shared across the pipeline.

use serde::{Deserialize, Serialize};

/// Ordered token ids produced by encoding a prompt
pub type TokenSequence = Vec<u32>;

/// Where a request sits in a chunked sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkPosition {
    Begin,
    Middle,
    End,
    /// Non-chunked call
    None,
}

impl ChunkPosition {
    /// Position of chunk `index` in a sequence of `total` chunks.
    ///
    /// A one-chunk sequence reports `Begin`; its wire flags mark it as both
    /// first and last.
    pub fn for_index(index: usize, total: usize) -> Self {
        if index == 0 {
            Self::Begin
        } else if index + 1 == total {
            Self::End
        } else {
            Self::Middle
        }
    }
}

impl std::fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Middle => write!(f, "middle"),
            Self::End => write!(f, "end"),
            Self::None => write!(f, "none"),
        }
    }
}

/// One call to the analysis service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub text: String,
    pub position: ChunkPosition,
    pub index: usize,
    pub total: usize,
}

impl ChunkRequest {
    /// Request for an unchunked prompt
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: ChunkPosition::None,
            index: 0,
            total: 1,
        }
    }

    /// Request for chunk `index` of `total`
    pub fn chunk(text: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            text: text.into(),
            position: ChunkPosition::for_index(index, total),
            index,
            total,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.position != ChunkPosition::None
    }

    pub fn is_begin(&self) -> bool {
        self.is_chunked() && self.index == 0
    }

    pub fn is_end(&self) -> bool {
        self.is_chunked() && self.index + 1 == self.total
    }
}

/// Final caller-facing result, same shape for single and chunked analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResult {
    /// Score in [0, 100], one decimal place
    pub accuracy: f64,
    pub suggestions: Vec<String>,
    pub reword: String,
    pub was_chunked: bool,
    pub token_count: usize,
    #[serde(default)]
    pub chunk_count: usize,
    /// Prompt length is already in the optimal band; no service call was made
    #[serde(default)]
    pub already_optimal: bool,
}

impl UnifiedResult {
    /// Result for a prompt that needs no optimization
    pub fn already_optimal(token_count: usize) -> Self {
        Self {
            accuracy: 0.0,
            suggestions: Vec::new(),
            reword: String::new(),
            was_chunked: false,
            token_count,
            chunk_count: 0,
            already_optimal: true,
        }
    }

    /// Score band used for display: good (≥80), fair (≥60), poor
    pub fn grade(&self) -> ScoreGrade {
        ScoreGrade::from_accuracy(self.accuracy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreGrade {
    Good,
    Fair,
    Poor,
}

impl ScoreGrade {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 80.0 {
            Self::Good
        } else if accuracy >= 60.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}
