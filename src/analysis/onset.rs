// OnsetDetector - amplitude envelope threshold crossing
//
// This module locates the start of a cough in a low-pass filtered recording.
//
// Algorithm:
// 1. Frame the signal every `hop_length` samples, each frame spanning up to
//    `frame_size` samples (frames overlap when frame_size > hop_length)
// 2. Envelope value per frame: max |x[n]| over the frame
// 3. Frame time: index * hop_length / rate
// 4. Onset: time of the first frame whose envelope strictly exceeds `threshold`
//
// When nothing crosses the threshold the onset falls back to 0.0 s. That
// fallback is reported through `OnsetDetection::detected == false` and a warn
// log, never as an error.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::config::OnsetConfig;

/// One analysis frame of the amplitude envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvelopeFrame {
    pub time_secs: f64,
    pub amplitude: f32,
}

/// Per-frame maximum absolute amplitude over a waveform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    frames: Vec<EnvelopeFrame>,
}

impl Envelope {
    pub fn frames(&self) -> &[EnvelopeFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the first frame whose amplitude is strictly above `threshold`.
    pub fn first_crossing(&self, threshold: f32) -> Option<usize> {
        self.frames.iter().position(|f| f.amplitude > threshold)
    }
}

/// Outcome of onset detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnsetDetection {
    /// Onset offset into the recording in seconds (0.0 when not detected)
    pub time_secs: f64,
    /// False when no frame crossed the threshold and the default was used
    pub detected: bool,
    /// Envelope frame that crossed the threshold
    pub frame_index: Option<usize>,
}

impl OnsetDetection {
    /// Default onset used when the envelope never crosses the threshold.
    pub const DEFAULT_TIME_SECS: f64 = 0.0;

    pub fn not_found() -> Self {
        Self {
            time_secs: Self::DEFAULT_TIME_SECS,
            detected: false,
            frame_index: None,
        }
    }
}

/// Threshold-crossing onset detector over a max-amplitude envelope
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    config: OnsetConfig,
}

impl OnsetDetector {
    /// Create a detector. Zero frame/hop sizes are clamped to 1; callers that
    /// need strict checking run `OnsetConfig::validate` first.
    pub fn new(config: OnsetConfig) -> Self {
        let config = OnsetConfig {
            frame_size: config.frame_size.max(1),
            hop_length: config.hop_length.max(1),
            ..config
        };
        Self { config }
    }

    pub fn config(&self) -> &OnsetConfig {
        &self.config
    }

    /// Seconds per hop for `waveform`.
    fn frame_period(&self, waveform: &Waveform) -> f64 {
        let rate = self
            .config
            .time_reference_rate
            .filter(|&r| r > 0)
            .unwrap_or(waveform.sample_rate());
        self.config.hop_length as f64 / rate as f64
    }

    /// Compute the amplitude envelope: ceil(len / hop_length) frames.
    pub fn envelope(&self, waveform: &Waveform) -> Envelope {
        let samples = waveform.samples();
        let period = self.frame_period(waveform);
        let frame_size = self.config.frame_size;

        let frames = (0..samples.len())
            .step_by(self.config.hop_length)
            .enumerate()
            .map(|(index, start)| {
                let end = (start + frame_size).min(samples.len());
                let amplitude = samples[start..end]
                    .iter()
                    .fold(0.0f32, |acc, &s| acc.max(s.abs()));
                EnvelopeFrame {
                    time_secs: index as f64 * period,
                    amplitude,
                }
            })
            .collect();

        Envelope { frames }
    }

    /// Locate the first threshold crossing, falling back to the default onset.
    pub fn detect(&self, waveform: &Waveform) -> OnsetDetection {
        let envelope = self.envelope(waveform);
        self.detect_in(&envelope)
    }

    /// Same as [`detect`](Self::detect) for a precomputed envelope.
    pub fn detect_in(&self, envelope: &Envelope) -> OnsetDetection {
        match envelope.first_crossing(self.config.threshold) {
            Some(index) => {
                let frame = envelope.frames()[index];
                debug!(
                    "[OnsetDetector] Onset at frame {} ({:.4}s, amplitude {:.5} > {})",
                    index, frame.time_secs, frame.amplitude, self.config.threshold
                );
                OnsetDetection {
                    time_secs: frame.time_secs,
                    detected: true,
                    frame_index: Some(index),
                }
            }
            None => {
                let peak = envelope
                    .frames()
                    .iter()
                    .fold(0.0f32, |acc, f| acc.max(f.amplitude));
                warn!(
                    "[OnsetDetector] No frame exceeded threshold {} (peak {:.5}, {} frames); using default onset {}s",
                    self.config.threshold,
                    peak,
                    envelope.len(),
                    OnsetDetection::DEFAULT_TIME_SECS
                );
                OnsetDetection::not_found()
            }
        }
    }
}
