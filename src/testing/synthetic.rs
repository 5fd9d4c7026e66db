//! Deterministic synthetic recordings for tests, demos and the CLI `synth`
//! command.
//!
//! A synthetic cough is a quiet noise floor, a broadband burst with a fast
//! attack and exponential decay, and a quiet tail. With a fixed seed the same
//! spec always yields the same samples.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::io::Cursor;
use std::path::Path;

use crate::audio::Waveform;
use crate::error::DecodeError;

/// Description of a synthetic cough recording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticCough {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Noise floor before the burst
    #[serde(default = "default_lead_in_ms")]
    pub lead_in_ms: u32,
    #[serde(default = "default_burst_ms")]
    pub burst_ms: u32,
    #[serde(default = "default_tail_ms")]
    pub tail_ms: u32,
    /// Peak burst amplitude (full scale 1.0)
    #[serde(default = "default_burst_amplitude")]
    pub burst_amplitude: f32,
    /// Noise floor amplitude
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f32,
    /// Tonal component of the burst, mixed with noise
    #[serde(default = "default_tone_hz")]
    pub tone_hz: f32,
    #[serde(default)]
    pub seed: u64,
}

impl Default for SyntheticCough {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            lead_in_ms: default_lead_in_ms(),
            burst_ms: default_burst_ms(),
            tail_ms: default_tail_ms(),
            burst_amplitude: default_burst_amplitude(),
            noise_amplitude: default_noise_amplitude(),
            tone_hz: default_tone_hz(),
            seed: 0,
        }
    }
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_lead_in_ms() -> u32 {
    500
}

fn default_burst_ms() -> u32 {
    250
}

fn default_tail_ms() -> u32 {
    500
}

fn default_burst_amplitude() -> f32 {
    0.6
}

fn default_noise_amplitude() -> f32 {
    0.0005
}

fn default_tone_hz() -> f32 {
    350.0
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

impl SyntheticCough {
    /// Burst start in seconds.
    pub fn onset_secs(&self) -> f64 {
        ms_to_samples(self.lead_in_ms, self.sample_rate) as f64 / self.sample_rate as f64
    }

    pub fn render(&self) -> Result<Waveform, DecodeError> {
        let rate = self.sample_rate.max(1);
        let lead = ms_to_samples(self.lead_in_ms, rate);
        let burst = ms_to_samples(self.burst_ms, rate);
        let tail = ms_to_samples(self.tail_ms, rate);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut samples = Vec::with_capacity(lead + burst + tail);
        for _ in 0..lead {
            samples.push(self.noise_amplitude * rng.gen_range(-1.0f32..=1.0));
        }

        // 5 ms linear attack, then decay to about -40 dB by the end of the burst.
        let attack = (rate as usize / 200).max(1);
        let decay_rate = 4.6 / (burst.max(1) as f32 / rate as f32);
        for i in 0..burst {
            let t = i as f32 / rate as f32;
            let envelope = if i < attack {
                i as f32 / attack as f32
            } else {
                (-(t - attack as f32 / rate as f32) * decay_rate).exp()
            };
            let tone = (2.0 * PI * self.tone_hz * t).sin();
            let noise = rng.gen_range(-1.0f32..=1.0);
            samples.push(self.burst_amplitude * envelope * (0.6 * tone + 0.4 * noise));
        }

        for _ in 0..tail {
            samples.push(self.noise_amplitude * rng.gen_range(-1.0f32..=1.0));
        }

        Waveform::new(samples, self.sample_rate)
    }

    /// Render as a 16-bit mono WAV file image.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        let waveform = self.render()?;
        let mut cursor = Cursor::new(Vec::new());
        write_wav(&waveform, &mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn write_wav_file<P: AsRef<Path>>(&self, path: P) -> Result<(), DecodeError> {
        let waveform = self.render()?;
        let file = std::fs::File::create(path.as_ref())?;
        write_wav(&waveform, std::io::BufWriter::new(file))
    }
}

/// Encode `waveform` as 16-bit PCM mono WAV.
pub fn write_wav<W: std::io::Write + std::io::Seek>(
    waveform: &Waveform,
    writer: W,
) -> Result<(), DecodeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wav = hound::WavWriter::new(writer, spec)?;
    for &sample in waveform.samples() {
        let clamped = sample.clamp(-1.0, 1.0);
        wav.write_sample((clamped * i16::MAX as f32).round() as i16)?;
    }
    wav.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{load_bytes, AudioFormat};

    #[test]
    fn test_render_is_deterministic() {
        let spec = SyntheticCough {
            seed: 7,
            ..Default::default()
        };
        assert_eq!(spec.render().unwrap(), spec.render().unwrap());

        let other = SyntheticCough {
            seed: 8,
            ..Default::default()
        };
        assert_ne!(spec.render().unwrap(), other.render().unwrap());
    }

    #[test]
    fn test_layout_lengths() {
        let spec = SyntheticCough::default();
        let waveform = spec.render().unwrap();
        assert_eq!(waveform.len(), 8000 + 4000 + 8000);
        assert!((spec.onset_secs() - 0.5).abs() < 1e-9);
        assert!(waveform.samples()[..8000].iter().all(|s| s.abs() <= 0.0005));
        assert!(waveform.peak() > 0.2);
    }

    #[test]
    fn test_wav_bytes_decode() {
        let spec = SyntheticCough {
            sample_rate: 22_050,
            ..Default::default()
        };
        let decoded = load_bytes(&spec.to_wav_bytes().unwrap(), AudioFormat::Wav).unwrap();
        let rendered = spec.render().unwrap();
        assert_eq!(decoded.sample_rate(), 22_050);
        assert_eq!(decoded.len(), rendered.len());
        let max_err = decoded
            .samples()
            .iter()
            .zip(rendered.samples())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max quantization error {}", max_err);
    }

    #[test]
    fn test_partial_json_spec() {
        let spec: SyntheticCough = serde_json::from_str(r#"{ "sample_rate": 44100 }"#).unwrap();
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.lead_in_ms, 500);
    }
}
