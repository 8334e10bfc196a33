// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for AniDex

use thiserror::Error;

/// Result type alias for AniDex operations
pub type Result<T> = std::result::Result<T, AniDexError>;

/// AniDex error types
#[derive(Error, Debug)]
pub enum AniDexError {
    /// Input could not be turned into a processable pixel buffer
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Inference completed without a usable result
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AniDexError {
    /// True for the two failure kinds a classification call can surface
    pub fn is_classification_failure(&self) -> bool {
        matches!(self, Self::InvalidImage(_) | Self::AnalysisFailed(_))
    }
}
