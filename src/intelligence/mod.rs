// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! On-device photo classification

pub mod photo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::engine::{rank, InferenceEngine, Observation};
use crate::{AniDexError, Result};

pub use photo::{OrientationPolicy, Photo};

/// Result count used when the caller has no preference
pub const DEFAULT_TOP_K: usize = 5;

/// One labeled guess
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfidence {
    pub id: Uuid,
    pub label: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

impl LabelConfidence {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            confidence,
        }
    }
}

/// Labels for one photo, best first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoAnalysis {
    pub labels: Vec<LabelConfidence>,
    /// Engine that produced the labels
    pub engine: String,
    /// Wall-clock time spent in inference
    pub elapsed_ms: u64,
    pub analyzed_at: DateTime<Utc>,
}

impl PhotoAnalysis {
    pub fn best_label(&self) -> Option<&LabelConfidence> {
        self.labels.first()
    }

    pub fn into_best_label(self) -> Option<LabelConfidence> {
        self.labels.into_iter().next()
    }
}

/// Anything that can identify a photo.
///
/// Callers depend on this rather than on [`Intelligence`] so a whole
/// classifier can be swapped out in tests.
#[async_trait]
pub trait PhotoClassifier: Send + Sync {
    /// Classify `photo` and return up to `top_k` labels, best first
    async fn analyze(&self, photo: &Photo, top_k: usize) -> Result<PhotoAnalysis>;

    /// The single best label, if any
    async fn best_label(&self, photo: &Photo) -> Result<Option<LabelConfidence>> {
        Ok(self.analyze(photo, 1).await?.into_best_label())
    }
}

/// Classification service over an injected inference engine.
///
/// Holds no per-request state; clones share the same engine.
pub struct Intelligence {
    engine: Arc<dyn InferenceEngine>,
    orientation: OrientationPolicy,
}

impl Clone for Intelligence {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            orientation: self.orientation,
        }
    }
}

impl Intelligence {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            orientation: OrientationPolicy::default(),
        }
    }

    /// Set how unrecognized orientation tags are handled
    pub fn with_orientation_policy(mut self, policy: OrientationPolicy) -> Self {
        self.orientation = policy;
        self
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn orientation_policy(&self) -> OrientationPolicy {
        self.orientation
    }
}

#[async_trait]
impl PhotoClassifier for Intelligence {
    async fn analyze(&self, photo: &Photo, top_k: usize) -> Result<PhotoAnalysis> {
        let image = photo.to_upright(self.orientation)?;

        let engine = Arc::clone(&self.engine);
        let started = Instant::now();
        let observations = tokio::task::spawn_blocking(move || engine.classify(&image))
            .await
            .map_err(|e| AniDexError::AnalysisFailed(format!("inference task failed: {}", e)))??;
        let elapsed = started.elapsed();

        let labels = select_labels(observations, top_k)?;

        debug!(
            "{} produced {} label(s) in {:?}",
            self.engine.name(),
            labels.len(),
            elapsed
        );

        Ok(PhotoAnalysis {
            labels,
            engine: self.engine.name().to_string(),
            elapsed_ms: elapsed.as_millis() as u64,
            analyzed_at: Utc::now(),
        })
    }
}

/// Validate engine output and keep the `top_k` most confident entries
fn select_labels(mut observations: Vec<Observation>, top_k: usize) -> Result<Vec<LabelConfidence>> {
    if observations.is_empty() {
        return Err(AniDexError::AnalysisFailed("engine returned no observations".to_string()));
    }

    if let Some(bad) = observations
        .iter()
        .find(|o| !(0.0..=1.0).contains(&o.confidence))
    {
        return Err(AniDexError::AnalysisFailed(format!(
            "confidence {} for '{}' is outside [0, 1]",
            bad.confidence, bad.identifier
        )));
    }

    rank(&mut observations);

    Ok(observations
        .into_iter()
        .take(top_k)
        .map(|o| LabelConfidence::new(o.identifier, o.confidence))
        .collect())
}
