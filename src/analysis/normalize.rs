// Normalizer - RMS loudness matching
//
// Loudness is the log-ratio of RMS amplitude to full scale (1.0):
//   dBFS = 20 * log10(rms)
// A uniform gain of (target - current) dB brings the waveform to the target.

use log::{debug, warn};

use crate::audio::Waveform;
use crate::error::DecodeError;

/// Reference target loudness in dBFS.
pub const DEFAULT_TARGET_DBFS: f64 = -30.0;

/// Result of a normalization pass
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    /// Gain applied; waveform now sits at the target loudness
    Applied {
        waveform: Waveform,
        original_dbfs: f64,
        gain_db: f64,
    },
    /// Input was all zeros and is returned unchanged
    Silent(Waveform),
}

impl NormalizeOutcome {
    pub fn waveform(&self) -> &Waveform {
        match self {
            NormalizeOutcome::Applied { waveform, .. } => waveform,
            NormalizeOutcome::Silent(waveform) => waveform,
        }
    }

    pub fn into_waveform(self) -> Waveform {
        match self {
            NormalizeOutcome::Applied { waveform, .. } => waveform,
            NormalizeOutcome::Silent(waveform) => waveform,
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, NormalizeOutcome::Silent(_))
    }
}

/// Loudness in dBFS, or `None` for digital silence.
pub fn loudness_dbfs(waveform: &Waveform) -> Option<f64> {
    let rms = waveform.rms();
    if rms > 0.0 && rms.is_finite() {
        Some(20.0 * rms.log10())
    } else {
        None
    }
}

/// Apply a uniform gain so the waveform's loudness equals `target_dbfs`.
///
/// Fails with `DecodeError::Malformed` when the gain drives a sample past the
/// f32 range.
pub fn normalize(
    waveform: &Waveform,
    target_dbfs: f64,
) -> Result<NormalizeOutcome, DecodeError> {
    let Some(current) = loudness_dbfs(waveform) else {
        warn!("[Normalizer] Input is silent; leaving amplitude unchanged");
        return Ok(NormalizeOutcome::Silent(waveform.clone()));
    };

    let gain_db = target_dbfs - current;
    let multiplier = 10f64.powf(gain_db / 20.0);
    let samples: Vec<f32> = waveform
        .samples()
        .iter()
        .map(|&s| (s as f64 * multiplier) as f32)
        .collect();

    debug!(
        "[Normalizer] {:.2} dBFS -> {:.2} dBFS (gain {:+.2} dB, x{:.5})",
        current, target_dbfs, gain_db, multiplier
    );

    Ok(NormalizeOutcome::Applied {
        waveform: waveform.with_samples(samples)?,
        original_dbfs: current,
        gain_db,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: u32, freq: f32, amplitude: f32, n: usize) -> Waveform {
        let samples = (0..n)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect();
        Waveform::new(samples, sample_rate).unwrap()
    }

    #[test]
    fn test_full_scale_square_is_zero_dbfs() {
        let wave = Waveform::new(vec![1.0, -1.0, 1.0, -1.0], 8000).unwrap();
        assert!(loudness_dbfs(&wave).unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_normalized_loudness_matches_target() {
        let cases = [(0.9f32, -30.0), (0.001, -30.0), (0.3, -12.5), (0.05, -45.0)];
        for &(amplitude, target) in &cases {
            let wave = sine(16000, 440.0, amplitude, 16000);
            let outcome = normalize(&wave, target).unwrap();
            let measured = loudness_dbfs(outcome.waveform()).unwrap();
            assert!(
                (measured - target).abs() < 0.01,
                "amplitude {} -> {} dBFS, target {}",
                amplitude,
                measured,
                target
            );
        }
    }

    #[test]
    fn test_gain_reported() {
        let wave = Waveform::new(vec![0.1, -0.1, 0.1, -0.1], 8000).unwrap();
        match normalize(&wave, -30.0).unwrap() {
            NormalizeOutcome::Applied {
                original_dbfs,
                gain_db,
                ..
            } => {
                assert!((original_dbfs + 20.0).abs() < 1e-6);
                assert!((gain_db + 10.0).abs() < 1e-6);
            }
            other => panic!("Expected Applied, got {:?}", other),
        }
    }

    #[test]
    fn test_silence_is_left_unchanged() {
        let wave = Waveform::new(vec![0.0; 1000], 16000).unwrap();
        let outcome = normalize(&wave, DEFAULT_TARGET_DBFS).unwrap();
        assert!(outcome.is_silent());
        assert_eq!(outcome.into_waveform(), wave);
    }

    #[test]
    fn test_shape_and_rate_preserved() {
        let wave = sine(22050, 300.0, 0.2, 5000);
        let out = normalize(&wave, -30.0).unwrap().into_waveform();
        assert_eq!(out.len(), wave.len());
        assert_eq!(out.sample_rate(), 22050);
    }

    #[test]
    fn test_gain_overflow_is_an_error() {
        let wave = sine(16000, 440.0, 0.5, 1000);
        assert!(matches!(
            normalize(&wave, 1000.0),
            Err(DecodeError::Malformed { .. })
        ));
    }
}
