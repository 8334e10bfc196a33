// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AniDex: on-device photo identification
//!
//! Classifies a decoded photo with a bundled pre-trained model and returns
//! ranked labels with confidence scores.

pub mod config;
pub mod engine;
pub mod error;
pub mod intelligence;

pub use config::AppConfig;
pub use error::{AniDexError, Result};
pub use intelligence::{Intelligence, LabelConfidence, Photo, PhotoAnalysis, PhotoClassifier};
