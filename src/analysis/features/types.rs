// Types module - the feature tensor handed to the classifier

use serde::Serialize;

/// Fixed-shape (height × width × channels) spectrogram tensor.
///
/// Stored row-major in HWC order: `data[(h * width + w) * channels + c]`.
/// Height indexes mel bins, width indexes STFT frames. Every channel holds the
/// same single-channel spectrogram.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor {
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
}

/// Summary statistics over a tensor, for reports and logs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TensorStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// Mel bins that are zero across every frame
    pub empty_rows: usize,
}

impl FeatureTensor {
    /// Replicate a `[height][width]` spectrogram across `channels`.
    ///
    /// Rows shorter than the first row are zero-filled.
    pub fn replicate(spectrogram: &[Vec<f32>], channels: usize) -> Self {
        let height = spectrogram.len();
        let width = spectrogram.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(height * width * channels);

        for row in spectrogram {
            for w in 0..width {
                let value = row.get(w).copied().unwrap_or(0.0);
                data.extend(std::iter::repeat(value).take(channels));
            }
        }

        Self {
            height,
            width,
            channels,
            data,
        }
    }

    /// (height, width, channels)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    pub fn get(&self, h: usize, w: usize, c: usize) -> Option<f32> {
        if h >= self.height || w >= self.width || c >= self.channels {
            return None;
        }
        self.data.get((h * self.width + w) * self.channels + c).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// One channel as a `[height][width]` matrix.
    pub fn channel(&self, c: usize) -> Option<Vec<Vec<f32>>> {
        if c >= self.channels {
            return None;
        }
        Some(
            (0..self.height)
                .map(|h| {
                    (0..self.width)
                        .map(|w| self.data[(h * self.width + w) * self.channels + c])
                        .collect()
                })
                .collect(),
        )
    }

    /// Nested `[height][width][channels]` view, the layout JSON model servers expect.
    pub fn to_nested(&self) -> Vec<Vec<Vec<f32>>> {
        self.data
            .chunks(self.width * self.channels)
            .map(|row| row.chunks(self.channels).map(<[f32]>::to_vec).collect())
            .collect()
    }

    /// True when every channel holds identical values.
    pub fn channels_identical(&self) -> bool {
        self.data
            .chunks(self.channels)
            .all(|pixel| pixel.iter().all(|&v| v.to_bits() == pixel[0].to_bits()))
    }

    pub fn stats(&self) -> TensorStats {
        if self.data.is_empty() {
            return TensorStats {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                empty_rows: self.height,
            };
        }

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        for &v in &self.data {
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
        }

        let row_len = self.width * self.channels;
        let empty_rows = self
            .data
            .chunks(row_len.max(1))
            .filter(|row| row.iter().all(|&v| v == 0.0))
            .count();

        TensorStats {
            min,
            max,
            mean: (sum / self.data.len() as f64) as f32,
            empty_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureTensor {
        FeatureTensor::replicate(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![0.0, 0.0]], 3)
    }

    #[test]
    fn test_shape_and_layout() {
        let t = sample();
        assert_eq!(t.shape(), (3, 2, 3));
        assert_eq!(t.as_slice().len(), 18);
        assert_eq!(t.get(1, 0, 2), Some(3.0));
        assert_eq!(t.get(0, 1, 0), Some(2.0));
        assert_eq!(t.get(3, 0, 0), None);
    }

    #[test]
    fn test_channels_are_identical() {
        let t = sample();
        assert!(t.channels_identical());
        assert_eq!(t.channel(0), t.channel(2));
        assert_eq!(t.channel(0).unwrap()[1], vec![3.0, 4.0]);
    }

    #[test]
    fn test_nested_view() {
        let nested = sample().to_nested();
        assert_eq!(nested.len(), 3);
        assert_eq!(nested[0].len(), 2);
        assert_eq!(nested[1][1], vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 4.0);
        assert!((stats.mean - 10.0 / 6.0).abs() < 1e-6);
        assert_eq!(stats.empty_rows, 1);
    }
}
