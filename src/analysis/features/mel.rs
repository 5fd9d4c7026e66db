// Mel module - Slaney-style mel filterbank
//
// Mel scale (Slaney / Auditory Toolbox, librosa's htk=False):
//   below 1 kHz: mel = hz / (200/3)
//   above 1 kHz: mel = 15 + ln(hz / 1000) / (ln(6.4) / 27)
//
// Triangular filters on n_mels + 2 equally spaced mel points between fmin and
// fmax, each scaled by 2 / (f_right - f_left) so every band has equal area
// ("slaney" normalization). At high sample rates and small FFT sizes the
// lowest bands can be narrower than one FFT bin and come out all-zero.

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Convert frequency in Hz to the Slaney mel scale
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert Slaney mel back to Hz
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// One triangular band, stored sparsely from its first non-zero bin
#[derive(Debug, Clone)]
struct MelBand {
    start_bin: usize,
    weights: Vec<f32>,
    center_hz: f64,
}

/// Mel filterbank mapping `n_fft/2 + 1` power bins onto `n_mels` bands
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    bands: Vec<MelBand>,
    num_bins: usize,
}

impl MelFilterbank {
    /// Build a filterbank spanning `fmin..fmax` Hz.
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f64, fmax: f64) -> Self {
        let num_bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..num_bins)
            .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let mel_hz: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let bands = (0..n_mels)
            .map(|m| {
                let left = mel_hz[m];
                let center = mel_hz[m + 1];
                let right = mel_hz[m + 2];
                let enorm = 2.0 / (right - left);

                let dense: Vec<f64> = fft_freqs
                    .iter()
                    .map(|&f| {
                        let lower = (f - left) / (center - left);
                        let upper = (right - f) / (right - center);
                        lower.min(upper).max(0.0) * enorm
                    })
                    .collect();

                match dense.iter().position(|&w| w > 0.0) {
                    Some(first) => {
                        let last = dense.iter().rposition(|&w| w > 0.0).unwrap_or(first);
                        MelBand {
                            start_bin: first,
                            weights: dense[first..=last].iter().map(|&w| w as f32).collect(),
                            center_hz: center,
                        }
                    }
                    None => MelBand {
                        start_bin: 0,
                        weights: Vec::new(),
                        center_hz: center,
                    },
                }
            })
            .collect();

        Self { bands, num_bins }
    }

    pub fn n_mels(&self) -> usize {
        self.bands.len()
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Indices of bands with no non-zero weight.
    pub fn empty_bands(&self) -> Vec<usize> {
        self.bands
            .iter()
            .enumerate()
            .filter(|(_, band)| band.weights.is_empty())
            .map(|(m, _)| m)
            .collect()
    }

    pub fn center_hz(&self, band: usize) -> Option<f64> {
        self.bands.get(band).map(|b| b.center_hz)
    }

    /// Dense weight of `band` at FFT bin `bin`.
    pub fn weight(&self, band: usize, bin: usize) -> f32 {
        self.bands
            .get(band)
            .and_then(|b| bin.checked_sub(b.start_bin).and_then(|i| b.weights.get(i)))
            .copied()
            .unwrap_or(0.0)
    }

    /// Project `[frame][bin]` power spectra to a `[mel][frame]` spectrogram.
    pub fn apply(&self, power_frames: &[Vec<f32>]) -> Vec<Vec<f32>> {
        self.bands
            .iter()
            .map(|band| {
                power_frames
                    .iter()
                    .map(|frame| {
                        frame
                            .iter()
                            .skip(band.start_bin)
                            .zip(&band.weights)
                            .map(|(p, w)| p * w)
                            .sum()
                    })
                    .collect()
            })
            .collect()
    }
}
