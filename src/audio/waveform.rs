// Waveform - mono PCM buffer shared between pipeline stages

use crate::error::DecodeError;

/// Mono floating-point samples at a fixed sample rate.
///
/// Samples are nominally in [-1.0, 1.0] (full scale = 1.0). Every stage
/// produces a new `Waveform`; none mutates its input.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Build a waveform, enforcing `sample_rate > 0`, a non-empty buffer and
    /// finite samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::InvalidSampleRate);
        }
        if samples.is_empty() {
            return Err(DecodeError::EmptyAudio);
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(DecodeError::Malformed {
                details: format!("non-finite sample at index {index}"),
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed waveform; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Root-mean-square amplitude, accumulated in f64.
    pub fn rms(&self) -> f64 {
        let sum_sq: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_sq / self.samples.len() as f64).sqrt()
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }

    /// Same sample rate, new samples. Used by stages that keep the timebase.
    pub(crate) fn with_samples(&self, samples: Vec<f32>) -> Result<Self, DecodeError> {
        Self::new(samples, self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_sample_rate() {
        assert_eq!(
            Waveform::new(vec![0.1], 0).unwrap_err(),
            DecodeError::InvalidSampleRate
        );
    }

    #[test]
    fn test_rejects_empty_buffer() {
        assert_eq!(
            Waveform::new(Vec::new(), 16000).unwrap_err(),
            DecodeError::EmptyAudio
        );
    }

    #[test]
    fn test_rejects_non_finite_samples() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert_eq!(
                Waveform::new(vec![0.1, 0.2, bad, 0.3], 16000).unwrap_err(),
                DecodeError::Malformed {
                    details: "non-finite sample at index 2".to_string()
                }
            );
        }
    }

    #[test]
    fn test_rms_and_peak() {
        let wave = Waveform::new(vec![0.5, -0.5, 0.5, -0.5], 8000).unwrap();
        assert!((wave.rms() - 0.5).abs() < 1e-12);
        assert_eq!(wave.peak(), 0.5);
        assert!((wave.duration_secs() - 0.0005).abs() < 1e-12);
    }
}
