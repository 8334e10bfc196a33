// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Bundled ONNX image classifier run through tract

use image::{imageops::FilterType, DynamicImage};
use std::path::Path;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use super::{rank, InferenceEngine, Observation};
use crate::config::ModelConfig;
use crate::{AniDexError, Result};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// Image classifier backed by an ONNX model (MobileNet-style `[1, N]` output)
pub struct OnnxEngine {
    model: Plan,
    labels: Vec<String>,
    input_width: u32,
    input_height: u32,
    mean: [f32; 3],
    std: [f32; 3],
    softmax: bool,
}

impl OnnxEngine {
    /// Load model and labels described by `config`
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let labels = load_labels(Path::new(&config.labels))?;

        let (w, h) = (config.input_width as usize, config.input_height as usize);
        let model = tract_onnx::onnx()
            .model_for_path(&config.path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, 3, h, w]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| AniDexError::Model(format!("Failed to load {}: {:#}", config.path, e)))?;

        info!(
            "Loaded ONNX model {} ({} labels, input {}x{})",
            config.path,
            labels.len(),
            config.input_width,
            config.input_height
        );

        Ok(Self {
            model,
            labels,
            input_width: config.input_width,
            input_height: config.input_height,
            mean: config.mean,
            std: config.std,
            softmax: config.softmax,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }
}

impl InferenceEngine for OnnxEngine {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn classify(&self, image: &DynamicImage) -> Result<Vec<Observation>> {
        let input = preprocess(image, self.input_width, self.input_height, self.mean, self.std);

        let outputs = self
            .model
            .run(tvec!(input.into_tvalue()))
            .map_err(|e| AniDexError::AnalysisFailed(format!("inference error: {:#}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| AniDexError::AnalysisFailed("model produced no outputs".to_string()))?;
        postprocess(output_scores(output)?, &self.labels, self.softmax)
    }
}

/// Flatten a `[N]` or `[1, N]` f32 output tensor into scores
pub fn output_scores(output: &Tensor) -> Result<Vec<f32>> {
    let view = output
        .to_array_view::<f32>()
        .map_err(|e| AniDexError::AnalysisFailed(format!("unexpected output type: {}", e)))?;

    match view.shape() {
        [_] | [1, _] => {}
        other => {
            return Err(AniDexError::AnalysisFailed(format!(
                "unexpected output shape {:?}",
                other
            )))
        }
    }
    debug!("Model output shape {:?}", view.shape());

    Ok(view.iter().copied().collect())
}

/// Read a label file: one label per line, blank lines ignored
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let labels: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    if labels.is_empty() {
        return Err(AniDexError::Model(format!("No labels in {}", path.display())));
    }
    Ok(labels)
}

/// Resize, scale to [0,1], normalize per channel, lay out as NCHW
pub fn preprocess(
    image: &DynamicImage,
    width: u32,
    height: u32,
    mean: [f32; 3],
    std: [f32; 3],
) -> Tensor {
    let rgb = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();

    tract_ndarray::Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, c, y, x)| {
            let value = rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - mean[c]) / std[c]
        },
    )
    .into_tensor()
}

/// Map raw scores onto labels and rank them
pub fn postprocess(mut scores: Vec<f32>, labels: &[String], softmax: bool) -> Result<Vec<Observation>> {
    // Some exports prepend a background class
    if scores.len() == labels.len() + 1 {
        scores.remove(0);
    }
    if scores.len() != labels.len() {
        return Err(AniDexError::AnalysisFailed(format!(
            "model produced {} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }

    if softmax {
        softmax_in_place(&mut scores);
    }

    let mut observations: Vec<Observation> = labels
        .iter()
        .zip(scores)
        .map(|(label, confidence)| Observation::new(label.clone(), confidence))
        .collect();
    rank(&mut observations);
    Ok(observations)
}

fn softmax_in_place(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}
