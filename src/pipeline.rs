//! CoughPipeline - one recording in, one classification (or failure) out
//!
//! Stages run strictly in order, each consuming the previous stage's value:
//!
//! ```text
//! decode -> normalize -> low-pass -> onset -> segment -> features -> inference
//!                 \_______________________________/^
//!                   segment cuts the normalized signal
//! ```
//!
//! The low-passed signal is used only to locate the onset. A missing onset is
//! the single tolerated anomaly: it resolves to 0.0 s, is logged at warn level
//! and is reported through `PreprocessReport::onset.detected`. Every other
//! failure aborts the invocation with no partial result.
//!
//! A pipeline holds only immutable state (configuration, FFT plan, mel
//! filterbank, adapter), so one instance can serve concurrent requests from
//! an `Arc`.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::analysis::filter::lowpass;
use crate::analysis::normalize::{normalize, NormalizeOutcome};
use crate::analysis::onset::{OnsetDetection, OnsetDetector};
use crate::analysis::segment::segment;
use crate::analysis::{FeatureExtractor, FeatureTensor, TensorStats};
use crate::audio::{load_bytes, load_path, AudioFormat, Waveform};
use crate::config::{PipelineConfig, FEATURE_LAYOUT_VERSION};
use crate::error::{log_pipeline_error, PipelineError};
use crate::inference::{
    ClassProbabilities, CoughClass, InferenceAdapter, ServingAdapter, UnconfiguredAdapter,
};

/// What the numeric stages observed for one recording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessReport {
    pub sample_rate: u32,
    pub duration_secs: f64,
    /// Loudness before normalization; `None` for an all-zero recording
    pub original_dbfs: Option<f64>,
    pub gain_db: Option<f64>,
    pub onset: OnsetDetection,
    pub segment_samples: usize,
    pub tensor_shape: (usize, usize, usize),
    pub tensor_stats: TensorStats,
    pub feature_layout: &'static str,
}

/// Feature tensor plus the report describing how it was produced
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    pub features: FeatureTensor,
    pub report: PreprocessReport,
}

/// Final pipeline result
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub label: CoughClass,
    pub confidence: f32,
    pub probabilities: ClassProbabilities,
    pub report: PreprocessReport,
}

pub struct CoughPipeline {
    config: PipelineConfig,
    onset: OnsetDetector,
    features: FeatureExtractor,
    adapter: Box<dyn InferenceAdapter>,
}

impl CoughPipeline {
    /// Validate `config` and build the configuration-dependent state.
    ///
    /// Filter coefficients depend on each recording's sample rate and are
    /// designed (and cached process-wide) on first use of that rate.
    pub fn new(
        config: PipelineConfig,
        adapter: Box<dyn InferenceAdapter>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let onset = OnsetDetector::new(config.onset.clone());
        let features = FeatureExtractor::new(config.features.clone())?;

        tracing::info!(
            "[CoughPipeline] Ready: target {} dBFS, low-pass {} Hz order {}, segment {} ms, features {:?}, adapter {}",
            config.normalization.target_dbfs,
            config.low_pass.cutoff_hz,
            config.low_pass.order,
            config.segment.duration_ms,
            config.features.shape(),
            adapter.name()
        );

        Ok(Self {
            config,
            onset,
            features,
            adapter,
        })
    }

    /// Build a pipeline whose adapter comes from `config.inference`: a
    /// TF-Serving client when an endpoint is set, otherwise an adapter that
    /// refuses to classify.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let adapter: Box<dyn InferenceAdapter> = match &config.inference.endpoint {
            Some(endpoint) => Box::new(ServingAdapter::new(
                endpoint.clone(),
                Duration::from_millis(config.inference.timeout_ms),
            )?),
            None => Box::new(UnconfiguredAdapter),
        };
        Self::new(config, adapter)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Run every numeric stage on an already-decoded recording.
    pub fn preprocess(&self, waveform: &Waveform) -> Result<PreprocessOutput, PipelineError> {
        let span = tracing::info_span!(
            "preprocess",
            sample_rate = waveform.sample_rate(),
            samples = waveform.len()
        );
        let _guard = span.enter();
        let started = Instant::now();

        let normalized = normalize(waveform, self.config.normalization.target_dbfs)?;
        let (original_dbfs, gain_db) = match &normalized {
            NormalizeOutcome::Applied {
                original_dbfs,
                gain_db,
                ..
            } => (Some(*original_dbfs), Some(*gain_db)),
            NormalizeOutcome::Silent(_) => (None, None),
        };
        let normalized = normalized.into_waveform();

        let filtered = lowpass(
            &normalized,
            self.config.low_pass.cutoff_hz,
            self.config.low_pass.order,
        )?;
        tracing::debug!("[CoughPipeline] Normalized and filtered in {:?}", started.elapsed());

        let onset = self.onset.detect(&filtered);
        if !onset.detected {
            tracing::warn!(
                "[CoughPipeline] Onset not found; segmenting from {:.3} s (classification quality degrades)",
                onset.time_secs
            );
        }

        let window = segment(&normalized, onset.time_secs, self.config.segment.duration_ms)?;
        let features = self.features.extract(&window)?;

        let report = PreprocessReport {
            sample_rate: waveform.sample_rate(),
            duration_secs: waveform.duration_secs(),
            original_dbfs,
            gain_db,
            onset,
            segment_samples: window.len(),
            tensor_shape: features.shape(),
            tensor_stats: features.stats(),
            feature_layout: FEATURE_LAYOUT_VERSION,
        };

        tracing::debug!(
            "[CoughPipeline] Preprocessed {:.3} s recording in {:?} (onset {:.3} s, detected {})",
            report.duration_secs,
            started.elapsed(),
            onset.time_secs,
            onset.detected
        );

        Ok(PreprocessOutput { features, report })
    }

    pub fn extract_features_path<P: AsRef<Path>>(
        &self,
        path: P,
        format: AudioFormat,
    ) -> Result<PreprocessOutput, PipelineError> {
        let waveform = load_path(path, format)?;
        self.preprocess(&waveform)
    }

    pub fn extract_features_bytes(
        &self,
        bytes: &[u8],
        format: AudioFormat,
    ) -> Result<PreprocessOutput, PipelineError> {
        let waveform = load_bytes(bytes, format)?;
        self.preprocess(&waveform)
    }

    /// Preprocess and classify a decoded recording.
    pub fn classify_waveform(&self, waveform: &Waveform) -> Result<Classification, PipelineError> {
        let result = self.classify_inner(waveform);
        if let Err(err) = &result {
            log_pipeline_error(err, "classify");
        }
        result
    }

    fn classify_inner(&self, waveform: &Waveform) -> Result<Classification, PipelineError> {
        let PreprocessOutput { features, report } = self.preprocess(waveform)?;

        let started = Instant::now();
        let probabilities = self.adapter.infer(&features)?;
        let (label, confidence) = probabilities.top();

        tracing::info!(
            "[CoughPipeline] Classified as {} ({:.3}) via {} in {:?}",
            label,
            confidence,
            self.adapter.name(),
            started.elapsed()
        );

        Ok(Classification {
            label,
            confidence,
            probabilities,
            report,
        })
    }

    pub fn classify_path<P: AsRef<Path>>(
        &self,
        path: P,
        format: AudioFormat,
    ) -> Result<Classification, PipelineError> {
        let waveform = load_path(path, format).map_err(|err| {
            let err = PipelineError::from(err);
            log_pipeline_error(&err, "classify_path");
            err
        })?;
        self.classify_waveform(&waveform)
    }

    pub fn classify_bytes(
        &self,
        bytes: &[u8],
        format: AudioFormat,
    ) -> Result<Classification, PipelineError> {
        let waveform = load_bytes(bytes, format).map_err(|err| {
            let err = PipelineError::from(err);
            log_pipeline_error(&err, "classify_bytes");
            err
        })?;
        self.classify_waveform(&waveform)
    }
}

impl std::fmt::Debug for CoughPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoughPipeline")
            .field("config", &self.config)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}
