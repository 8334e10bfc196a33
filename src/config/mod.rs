// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for AniDex

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::intelligence::{OrientationPolicy, DEFAULT_TOP_K};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Bundled model asset
    #[serde(default)]
    pub model: ModelConfig,

    /// Classifier defaults
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModelConfig {
    /// ONNX model file
    #[serde(default = "default_model_path")]
    pub path: String,
    /// Label file, one label per line in output order
    #[serde(default = "default_labels_path")]
    pub labels: String,
    #[serde(default = "default_input_size")]
    pub input_width: u32,
    #[serde(default = "default_input_size")]
    pub input_height: u32,
    /// Per-channel RGB mean applied after scaling to [0,1]
    #[serde(default = "default_mean")]
    pub mean: [f32; 3],
    /// Per-channel RGB standard deviation
    #[serde(default = "default_std")]
    pub std: [f32; 3],
    /// Apply softmax to raw model output (disable for models emitting probabilities)
    #[serde(default = "default_true")]
    pub softmax: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub orientation: OrientationPolicy,
}

// Default value functions
fn default_model_path() -> String { "models/mobilenetv2-7.onnx".to_string() }
fn default_labels_path() -> String { "models/imagenet_labels.txt".to_string() }
fn default_input_size() -> u32 { 224 }
fn default_mean() -> [f32; 3] { [0.485, 0.456, 0.406] }
fn default_std() -> [f32; 3] { [0.229, 0.224, 0.225] }
fn default_true() -> bool { true }
fn default_top_k() -> usize { DEFAULT_TOP_K }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            labels: default_labels_path(),
            input_width: default_input_size(),
            input_height: default_input_size(),
            mean: default_mean(),
            std: default_std(),
            softmax: true,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            orientation: OrientationPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::AniDexError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the classifier cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.classifier.top_k == 0 {
            return Err(crate::AniDexError::Config("classifier.top_k must be at least 1".to_string()));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(crate::AniDexError::Config(format!(
                "model input size must be non-zero, got {}x{}",
                self.model.input_width, self.model.input_height
            )));
        }
        if self.model.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(crate::AniDexError::Config(format!(
                "model.std must be finite and non-zero, got {:?}",
                self.model.std
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.top_k, DEFAULT_TOP_K);
        assert_eq!(config.classifier.orientation, OrientationPolicy::Lenient);
        assert_eq!(config.model.input_width, 224);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "classifier": { "top_k": 3, "orientation": "strict" } }"#
        ).unwrap();

        assert_eq!(config.classifier.top_k, 3);
        assert_eq!(config.classifier.orientation, OrientationPolicy::Strict);
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.model.path = "assets/species.onnx".to_string();
        config.model.softmax = false;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.model, config.model);
        assert_eq!(loaded.classifier, config.classifier);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.classifier.top_k, 5);
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "classifier": { "top_k": 0 } }"#).unwrap();

        match AppConfig::load(&path) {
            Err(crate::AniDexError::Config(msg)) => assert!(msg.contains("top_k")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_std_rejected() {
        let mut config = AppConfig::default();
        config.model.std = [0.229, 0.0, 0.225];
        assert!(config.validate().is_err());
    }
}
