// FeatureExtractor - mel-spectrogram tensor for the cough classifier
//
// Module organization:
// - types: FeatureTensor (HWC, channel-replicated)
// - resample: sinc resampling to the feature sample rate
// - fft: centered STFT power spectra
// - mel: Slaney mel filterbank
// - mod.rs: Coordinator (FeatureExtractor)
//
// Pipeline:
// 1. Resample the segment to `FeatureConfig::sample_rate`
// 2. Power spectrogram with a periodic Hann window, exactly `n_frames` frames
// 3. Mel projection to `n_mels` bands (power, no log compression)
// 4. Replicate into `channels` identical channels

mod fft;
mod mel;
mod resample;
mod types;

pub use fft::StftProcessor;
pub use mel::{hz_to_mel, mel_to_hz, MelFilterbank};
pub use resample::{resample, resampled_len};
pub use types::{FeatureTensor, TensorStats};

use log::debug;

use crate::audio::Waveform;
use crate::config::FeatureConfig;
use crate::error::PipelineError;

/// FeatureExtractor coordinates resampling, STFT and mel projection
///
/// The FFT plan and the mel filterbank depend only on the configuration and
/// are built once; `extract` takes `&self` and can be shared across threads.
pub struct FeatureExtractor {
    config: FeatureConfig,
    stft: StftProcessor,
    filterbank: MelFilterbank,
}

impl FeatureExtractor {
    /// Create an extractor for `config`.
    pub fn new(config: FeatureConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let stft = StftProcessor::new(config.n_fft, config.hop_length);
        let filterbank = MelFilterbank::new(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            0.0,
            config.sample_rate as f64 / 2.0,
        );

        let empty = filterbank.empty_bands();
        if !empty.is_empty() {
            debug!(
                "[FeatureExtractor] {} of {} mel bands have no FFT bin support (lowest-frequency bands)",
                empty.len(),
                config.n_mels
            );
        }

        Ok(Self {
            config,
            stft,
            filterbank,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Single-channel `[n_mels][n_frames]` mel power spectrogram.
    pub fn mel_spectrogram(&self, segment: &Waveform) -> Result<Vec<Vec<f32>>, PipelineError> {
        let resampled = resample(
            segment.samples(),
            segment.sample_rate(),
            self.config.sample_rate,
        )?;

        let natural = self.stft.natural_frames(resampled.len());
        if natural != self.config.n_frames {
            debug!(
                "[FeatureExtractor] Segment spans {} STFT frames; fixing width at {}",
                natural, self.config.n_frames
            );
        }

        let power = self.stft.power_frames(&resampled, self.config.n_frames);
        Ok(self.filterbank.apply(&power))
    }

    /// Extract the `(n_mels, n_frames, channels)` feature tensor.
    pub fn extract(&self, segment: &Waveform) -> Result<FeatureTensor, PipelineError> {
        let mel = self.mel_spectrogram(segment)?;
        Ok(FeatureTensor::replicate(&mel, self.config.channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(sample_rate: u32, freq: f32, n: usize, amplitude: f32) -> Waveform {
        let samples = (0..n)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect();
        Waveform::new(samples, sample_rate).unwrap()
    }

    /// Smaller layout so the tests stay quick.
    fn small_config() -> FeatureConfig {
        FeatureConfig {
            sample_rate: 16000,
            n_mels: 40,
            n_fft: 512,
            hop_length: 128,
            n_frames: 32,
            channels: 3,
        }
    }

    #[test]
    fn test_reference_shape_for_full_segment() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let segment = tone(16000, 440.0, 5280, 0.05);
        let tensor = extractor.extract(&segment).unwrap();
        assert_eq!(tensor.shape(), (224, 224, 3));
        assert!(tensor.channels_identical());
        assert!(tensor.stats().max > 0.0);
    }

    #[test]
    fn test_reference_shape_for_truncated_segment() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let segment = tone(16000, 440.0, 1200, 0.05);
        let tensor = extractor.extract(&segment).unwrap();
        assert_eq!(tensor.shape(), (224, 224, 3));
        assert!(tensor.channels_identical());
    }

    #[test]
    fn test_shape_at_other_input_rates() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        for &(rate, n) in &[(8000u32, 2000usize), (16000, 5280), (44100, 14553), (48000, 100)] {
            let tensor = extractor.extract(&tone(rate, 300.0, n, 0.1)).unwrap();
            assert_eq!(tensor.shape(), (40, 32, 3), "rate {}", rate);
            assert!(tensor.channels_identical());
        }
    }

    #[test]
    fn test_tone_energy_lands_in_matching_mel_band() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let mel = extractor
            .mel_spectrogram(&tone(16000, 2000.0, 16000, 0.5))
            .unwrap();

        let frame = 16;
        let loudest = (0..40)
            .max_by(|&a, &b| mel[a][frame].partial_cmp(&mel[b][frame]).unwrap())
            .unwrap();
        let bank = MelFilterbank::new(16000, 512, 40, 0.0, 8000.0);
        let center = bank.center_hz(loudest).unwrap();
        assert!(
            (center - 2000.0).abs() < 300.0,
            "loudest band {} centered at {} Hz",
            loudest,
            center
        );
    }

    #[test]
    fn test_silence_yields_zero_tensor() {
        let extractor = FeatureExtractor::new(small_config()).unwrap();
        let tensor = extractor
            .extract(&Waveform::new(vec![0.0; 4000], 16000).unwrap())
            .unwrap();
        assert!(tensor.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = small_config();
        config.n_mels = 0;
        assert!(FeatureExtractor::new(config).is_err());
    }
}
