//! Configuration management for the preprocessing pipeline
//!
//! Every operating constant of the pipeline (loudness target, filter cutoff
//! and order, onset framing, segment length, feature layout, inference
//! endpoint) is loaded from JSON so that deployments and tests can adjust them
//! without recompilation. Missing sections fall back to the reference values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

/// Version tag for the feature layout. The resample rate, mel-bin count, FFT
/// geometry and tensor shape must change together with the trained model.
pub const FEATURE_LAYOUT_VERSION: &str = "mel224x224x3-sr347530-nfft2048-hop512-v1";

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalization: NormalizationConfig,
    pub low_pass: LowPassConfig,
    pub onset: OnsetConfig,
    pub segment: SegmentConfig,
    pub features: FeatureConfig,
    pub inference: InferenceConfig,
}

/// Amplitude normalization target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Target loudness in dBFS (RMS relative to full scale)
    pub target_dbfs: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self { target_dbfs: -30.0 }
    }
}

/// Zero-phase Butterworth low-pass parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowPassConfig {
    /// Cutoff frequency in Hz
    pub cutoff_hz: f64,
    /// Butterworth order
    pub order: usize,
}

impl Default for LowPassConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: 2500.0,
            order: 20,
        }
    }
}

/// Onset detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// Samples spanned by each envelope frame
    pub frame_size: usize,
    /// Samples between consecutive frame starts
    pub hop_length: usize,
    /// Envelope amplitude that must be strictly exceeded
    pub threshold: f32,
    /// Rate used to convert frame indices to seconds; `None` uses the
    /// recording's own sample rate. `Some(22050)` reproduces models trained on
    /// timestamps computed at librosa's default rate.
    pub time_reference_rate: Option<u32>,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            frame_size: 400,
            hop_length: 210,
            threshold: 0.018,
            time_reference_rate: None,
        }
    }
}

/// Segment extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Segment length in milliseconds
    pub duration_ms: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self { duration_ms: 330.0 }
    }
}

/// Mel-spectrogram feature layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Rate the segment is resampled to before the STFT
    pub sample_rate: u32,
    /// Mel bins (tensor height)
    pub n_mels: usize,
    /// FFT window length
    pub n_fft: usize,
    /// STFT hop length
    pub hop_length: usize,
    /// STFT frames (tensor width)
    pub n_frames: usize,
    /// Replicated channels
    pub channels: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 347_530,
            n_mels: 224,
            n_fft: 2048,
            hop_length: 512,
            n_frames: 224,
            channels: 3,
        }
    }
}

/// Inference collaborator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Model server predict URL (TensorFlow Serving REST)
    pub endpoint: Option<String>,
    /// Per-request timeout
    pub timeout_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 10_000,
        }
    }
}

impl OnsetConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.frame_size == 0 {
            return Err(PipelineError::invalid_config("onset.frame_size", "must be > 0"));
        }
        if self.hop_length == 0 {
            return Err(PipelineError::invalid_config("onset.hop_length", "must be > 0"));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(PipelineError::invalid_config(
                "onset.threshold",
                format!("must be finite and non-negative (got {})", self.threshold),
            ));
        }
        if self.time_reference_rate == Some(0) {
            return Err(PipelineError::invalid_config(
                "onset.time_reference_rate",
                "must be > 0 when set",
            ));
        }
        Ok(())
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sample_rate == 0 {
            return Err(PipelineError::invalid_config("features.sample_rate", "must be > 0"));
        }
        if self.n_fft < 2 {
            return Err(PipelineError::invalid_config("features.n_fft", "must be >= 2"));
        }
        if self.hop_length == 0 {
            return Err(PipelineError::invalid_config("features.hop_length", "must be > 0"));
        }
        if self.n_mels == 0 {
            return Err(PipelineError::invalid_config("features.n_mels", "must be > 0"));
        }
        if self.n_frames == 0 {
            return Err(PipelineError::invalid_config("features.n_frames", "must be > 0"));
        }
        if self.channels == 0 {
            return Err(PipelineError::invalid_config("features.channels", "must be > 0"));
        }
        Ok(())
    }

    /// Tensor shape produced under this layout.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.n_mels, self.n_frames, self.channels)
    }
}

impl PipelineConfig {
    /// Check every section. Filter parameters that depend on the input sample
    /// rate are re-checked per recording.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.normalization.target_dbfs.is_finite() {
            return Err(PipelineError::invalid_config(
                "normalization.target_dbfs",
                "must be finite",
            ));
        }
        if !self.low_pass.cutoff_hz.is_finite() || self.low_pass.cutoff_hz <= 0.0 {
            return Err(PipelineError::invalid_config(
                "low_pass.cutoff_hz",
                "must be finite and > 0",
            ));
        }
        if self.low_pass.order == 0 {
            return Err(PipelineError::invalid_config("low_pass.order", "must be > 0"));
        }
        if !self.segment.duration_ms.is_finite() || self.segment.duration_ms <= 0.0 {
            return Err(PipelineError::invalid_config(
                "segment.duration_ms",
                "must be finite and > 0",
            ));
        }
        self.onset.validate()?;
        self.features.validate()?;
        Ok(())
    }

    /// Strict load: read and parse errors are returned.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.as_ref().display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
