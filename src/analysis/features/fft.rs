// FFT module - centered short-time power spectrum
//
// Frames are taken from the signal conceptually zero-padded by n_fft/2 on
// both sides, so frame t is centered on sample t * hop. Samples outside the
// signal read as zero; a caller asking for more frames than the signal
// covers gets silent trailing frames rather than a shorter result.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// STFT processor producing power spectra
pub struct StftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    hop_size: usize,
    /// Periodic Hann window (divides by N, not N-1)
    window: Vec<f32>,
}

impl StftProcessor {
    /// Create a new STFT processor
    ///
    /// # Arguments
    /// * `fft_size` - FFT window size (2048 for the classifier features)
    /// * `hop_size` - Hop between frame centers
    pub fn new(fft_size: usize, hop_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos())
            })
            .collect();

        Self {
            fft,
            fft_size,
            hop_size,
            window,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Frame count librosa's centered STFT would produce for `len` samples.
    pub fn natural_frames(&self, len: usize) -> usize {
        1 + len / self.hop_size
    }

    /// Compute exactly `n_frames` power spectra (`|X[k]|^2`, k in 0..=n_fft/2).
    ///
    /// # Returns
    /// `n_frames` vectors of `num_bins()` values
    pub fn power_frames(&self, signal: &[f32], n_frames: usize) -> Vec<Vec<f32>> {
        let pad = (self.fft_size / 2) as isize;
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];

        (0..n_frames)
            .map(|t| {
                let start = (t * self.hop_size) as isize - pad;
                for (i, slot) in buffer.iter_mut().enumerate() {
                    let idx = start + i as isize;
                    let sample = if idx >= 0 && (idx as usize) < signal.len() {
                        signal[idx as usize]
                    } else {
                        0.0
                    };
                    *slot = Complex::new(sample * self.window[i], 0.0);
                }

                self.fft.process_with_scratch(&mut buffer, &mut scratch);

                buffer[..self.num_bins()]
                    .iter()
                    .map(|c| c.norm_sqr())
                    .collect()
            })
            .collect()
    }
}
