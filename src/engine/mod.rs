// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! On-device inference engines

pub mod onnx;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use onnx::OnnxEngine;

/// One ranked guess as produced by an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub identifier: String,
    pub confidence: f32,
}

impl Observation {
    pub fn new(identifier: impl Into<String>, confidence: f32) -> Self {
        Self {
            identifier: identifier.into(),
            confidence,
        }
    }
}

/// A pre-trained image classifier.
///
/// `classify` blocks for the duration of one inference pass and is always
/// called off the async executor. Implementations return observations ranked
/// by descending confidence.
pub trait InferenceEngine: Send + Sync + 'static {
    /// Name of this engine, for logs and status output
    fn name(&self) -> &'static str;

    /// Run one classification pass over an upright image
    fn classify(&self, image: &DynamicImage) -> Result<Vec<Observation>>;
}

/// Sort observations by descending confidence, keeping engine order for ties
pub fn rank(observations: &mut [Observation]) {
    observations.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}
