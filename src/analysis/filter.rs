// LowPassFilter - zero-phase Butterworth low-pass
//
// Design:
// 1. Analog Butterworth prototype poles p_k on the left half unit circle
// 2. Pre-warp the cutoff: wc = K * tan(pi * Wn / 2), K = 2 * fs = 4 with fs
//    normalized to 2
// 3. Bilinear transform each conjugate pole pair: z = (K + s) / (K - s)
// 4. Each biquad gets a double zero at z = -1 and unity DC gain
//
// Application is forward-backward (filtfilt) over an odd extension of the
// signal, with steady-state initial conditions scaled by the edge sample, so
// the output has no group delay relative to the input.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, RwLock};

use log::{debug, warn};
use once_cell::sync::Lazy;
use rustfft::num_complex::Complex;

use crate::audio::Waveform;
use crate::error::FilterError;

/// Highest order accepted by the designer.
pub const MAX_FILTER_ORDER: usize = 64;

/// Reference cutoff in Hz.
pub const DEFAULT_CUTOFF_HZ: f64 = 2500.0;

/// Reference filter order.
pub const DEFAULT_ORDER: usize = 20;

/// Process-wide cache of designed coefficients. Entries are never mutated
/// after insertion.
static COEFFICIENT_CACHE: Lazy<RwLock<HashMap<DesignKey, Arc<SosCoefficients>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DesignKey {
    cutoff_bits: u64,
    order: usize,
    sample_rate: u32,
}

/// Parameters of a digital Butterworth low-pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButterworthDesign {
    pub cutoff_hz: f64,
    pub order: usize,
    pub sample_rate: u32,
}

/// One second-order section in direct form II transposed. `a[0]` is always 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (self.a[0] + self.a[1] + self.a[2])
    }

    /// Steady-state state vector for a unit step input.
    fn step_state(&self) -> [f64; 2] {
        let gain = self.dc_gain();
        let z1 = self.b[2] - self.a[2] * gain;
        let z0 = self.b[1] - self.a[1] * gain + z1;
        [z0, z1]
    }

    fn is_first_order(&self) -> bool {
        self.b[2] == 0.0 && self.a[2] == 0.0
    }

    fn response(&self, z_inv: Complex<f64>) -> Complex<f64> {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + z_inv * self.b[1] + z_inv2 * self.b[2];
        let den = self.a[0] + z_inv * self.a[1] + z_inv2 * self.a[2];
        num / den
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct SosCoefficients {
    sections: Vec<Biquad>,
    design: ButterworthDesign,
}

impl ButterworthDesign {
    pub fn new(cutoff_hz: f64, order: usize, sample_rate: u32) -> Self {
        Self {
            cutoff_hz,
            order,
            sample_rate,
        }
    }

    /// Cutoff as a fraction of Nyquist.
    pub fn normalized_cutoff(&self) -> f64 {
        self.cutoff_hz / (0.5 * self.sample_rate as f64)
    }

    fn key(&self) -> DesignKey {
        DesignKey {
            cutoff_bits: self.cutoff_hz.to_bits(),
            order: self.order,
            sample_rate: self.sample_rate,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> FilterError {
        FilterError::InvalidFilterParameters {
            cutoff_hz: self.cutoff_hz,
            order: self.order,
            sample_rate: self.sample_rate,
            reason: reason.into(),
        }
    }

    /// Check parameters without designing.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.order == 0 {
            return Err(self.invalid("order must be at least 1"));
        }
        if self.order > MAX_FILTER_ORDER {
            return Err(self.invalid(format!("order exceeds maximum of {}", MAX_FILTER_ORDER)));
        }
        if self.sample_rate == 0 {
            return Err(self.invalid("sample rate must be greater than 0"));
        }
        let wn = self.normalized_cutoff();
        if !wn.is_finite() || wn <= 0.0 || wn >= 1.0 {
            return Err(self.invalid(format!(
                "normalized cutoff {:.6} must lie strictly within (0, 1)",
                wn
            )));
        }
        Ok(())
    }

    /// Design the SOS cascade.
    pub fn design(&self) -> Result<SosCoefficients, FilterError> {
        self.validate()?;

        let k = 4.0; // 2 * fs with fs normalized to 2
        let warped = k * (PI * self.normalized_cutoff() / 2.0).tan();
        let n = self.order;
        let mut sections = Vec::with_capacity(n.div_ceil(2));

        if n % 2 == 1 {
            let z = (k - warped) / (k + warped);
            let gain = (1.0 - z) / 2.0;
            sections.push(Biquad {
                b: [gain, gain, 0.0],
                a: [1.0, -z, 0.0],
            });
        }

        // Pole pairs ordered farthest-from-unit-circle first.
        for pair in (0..n / 2).rev() {
            let m = (n - 1 - 2 * pair) as f64;
            let phi = PI * m / (2.0 * n as f64);
            let s = Complex::new(-phi.cos(), phi.sin()) * warped;
            let z = (Complex::new(k, 0.0) + s) / (Complex::new(k, 0.0) - s);

            let a1 = -2.0 * z.re;
            let a2 = z.norm_sqr();
            let gain = (1.0 + a1 + a2) / 4.0;
            sections.push(Biquad {
                b: [gain, 2.0 * gain, gain],
                a: [1.0, a1, a2],
            });
        }

        for section in &sections {
            let radius = if section.is_first_order() {
                section.a[1].abs()
            } else {
                section.a[2].sqrt()
            };
            if !radius.is_finite() || radius >= 1.0 {
                return Err(self.invalid(format!(
                    "pole radius {:.9} is not inside the unit circle",
                    radius
                )));
            }
        }

        debug!(
            "[LowPassFilter] Designed order-{} Butterworth, cutoff {} Hz @ {} Hz ({} sections)",
            self.order,
            self.cutoff_hz,
            self.sample_rate,
            sections.len()
        );

        Ok(SosCoefficients {
            sections,
            design: *self,
        })
    }
}

/// Fetch (or design and memoize) coefficients for `design`.
pub fn sos_coefficients(design: ButterworthDesign) -> Result<Arc<SosCoefficients>, FilterError> {
    let key = design.key();

    match COEFFICIENT_CACHE.read() {
        Ok(cache) => {
            if let Some(existing) = cache.get(&key) {
                return Ok(Arc::clone(existing));
            }
        }
        Err(_) => warn!("[LowPassFilter] Coefficient cache lock poisoned; designing uncached"),
    }

    let designed = Arc::new(design.design()?);

    match COEFFICIENT_CACHE.write() {
        Ok(mut cache) => Ok(Arc::clone(cache.entry(key).or_insert(designed))),
        Err(_) => Ok(designed),
    }
}

impl SosCoefficients {
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    pub fn design(&self) -> ButterworthDesign {
        self.design
    }

    /// Magnitude of the single-pass response at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.design.sample_rate as f64;
        let z_inv = Complex::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }

    /// Edge padding used by `filtfilt` before clamping to the signal length.
    fn edge_padding(&self) -> usize {
        let first_order = self.sections.iter().filter(|s| s.is_first_order()).count();
        3 * (2 * self.sections.len() + 1 - first_order.min(1))
    }

    /// Per-section initial conditions for a unit step, cascaded through the
    /// DC gain of preceding sections.
    fn step_initial_conditions(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z0, z1] = section.step_state();
                let zi = [scale * z0, scale * z1];
                scale *= section.dc_gain();
                zi
            })
            .collect()
    }

    /// Single forward pass with explicit initial state.
    fn filter_with_state(&self, input: &[f64], mut state: Vec<[f64; 2]>) -> Vec<f64> {
        input
            .iter()
            .map(|&x| {
                let mut value = x;
                for (section, z) in self.sections.iter().zip(state.iter_mut()) {
                    let y = section.b[0] * value + z[0];
                    z[0] = section.b[1] * value - section.a[1] * y + z[1];
                    z[1] = section.b[2] * value - section.a[2] * y;
                    value = y;
                }
                value
            })
            .collect()
    }

    fn scaled_state(base: &[[f64; 2]], x0: f64) -> Vec<[f64; 2]> {
        base.iter().map(|z| [z[0] * x0, z[1] * x0]).collect()
    }

    /// Zero-phase forward-backward filtering. Output length equals input length.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        if n == 0 {
            return Vec::new();
        }

        let padlen = self.edge_padding().min(n - 1);
        let first = input[0];
        let last = input[n - 1];

        let mut extended = Vec::with_capacity(n + 2 * padlen);
        extended.extend((1..=padlen).rev().map(|i| 2.0 * first - input[i]));
        extended.extend_from_slice(input);
        extended.extend((1..=padlen).map(|i| 2.0 * last - input[n - 1 - i]));

        let zi = self.step_initial_conditions();

        let forward = self.filter_with_state(&extended, Self::scaled_state(&zi, extended[0]));

        let reversed: Vec<f64> = forward.into_iter().rev().collect();
        let backward = self.filter_with_state(&reversed, Self::scaled_state(&zi, reversed[0]));

        let mut output: Vec<f64> = backward.into_iter().rev().collect();
        output.drain(..padlen);
        output.truncate(n);
        output
    }
}

/// Low-pass `waveform` at `cutoff_hz` with a zero-phase Butterworth of `order`.
pub fn lowpass(waveform: &Waveform, cutoff_hz: f64, order: usize) -> Result<Waveform, FilterError> {
    let coefficients = sos_coefficients(ButterworthDesign::new(
        cutoff_hz,
        order,
        waveform.sample_rate(),
    ))?;

    let input: Vec<f64> = waveform.samples().iter().map(|&s| s as f64).collect();
    let filtered: Vec<f32> = coefficients
        .filtfilt(&input)
        .into_iter()
        .map(|s| s as f32)
        .collect();

    // Length and rate are unchanged from a valid waveform.
    waveform
        .with_samples(filtered)
        .map_err(|err| FilterError::InvalidFilterParameters {
            cutoff_hz,
            order,
            sample_rate: waveform.sample_rate(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: u32, freq: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_section_count() {
        let even = ButterworthDesign::new(2500.0, 20, 16000).design().unwrap();
        assert_eq!(even.sections().len(), 10);

        let odd = ButterworthDesign::new(1000.0, 5, 16000).design().unwrap();
        assert_eq!(odd.sections().len(), 3);
        assert!(odd.sections()[0].is_first_order());
    }

    #[test]
    fn test_unity_dc_and_half_power_at_cutoff() {
        let designs = [(2500.0, 20, 16000), (2500.0, 20, 44100), (800.0, 3, 8000)];
        for &(cutoff, order, rate) in &designs {
            let sos = ButterworthDesign::new(cutoff, order, rate).design().unwrap();
            assert!((sos.magnitude_at(0.0) - 1.0).abs() < 1e-9);
            assert!(
                (sos.magnitude_at(cutoff) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6,
                "cutoff gain {} for {:?}",
                sos.magnitude_at(cutoff),
                (cutoff, order, rate)
            );
        }
    }

    #[test]
    fn test_attenuation_increases_with_frequency() {
        let sos = ButterworthDesign::new(1000.0, 4, 16000).design().unwrap();
        let gains: Vec<f64> = [1500.0, 2500.0, 4000.0, 7000.0]
            .iter()
            .map(|&f| sos.magnitude_at(f))
            .collect();
        for pair in gains.windows(2) {
            assert!(pair[1] < pair[0], "gains not decreasing: {:?}", gains);
        }
        assert!(gains[3] < 1e-3);
    }

    #[test]
    fn test_rejects_cutoff_at_or_above_nyquist() {
        let err = ButterworthDesign::new(8000.0, 4, 16000).design().unwrap_err();
        assert!(matches!(err, FilterError::InvalidFilterParameters { .. }));
        assert!(ButterworthDesign::new(9000.0, 4, 16000).validate().is_err());
        assert!(ButterworthDesign::new(0.0, 4, 16000).validate().is_err());
        assert!(ButterworthDesign::new(-10.0, 4, 16000).validate().is_err());
        assert!(ButterworthDesign::new(f64::NAN, 4, 16000).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_order() {
        assert!(ButterworthDesign::new(1000.0, 0, 16000).validate().is_err());
        assert!(ButterworthDesign::new(1000.0, MAX_FILTER_ORDER + 1, 16000)
            .validate()
            .is_err());
    }

    #[test]
    fn test_coefficients_are_memoized() {
        let design = ButterworthDesign::new(1234.5, 6, 22050);
        let first = sos_coefficients(design).unwrap();
        let second = sos_coefficients(design).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_passband_sine_is_unchanged_and_aligned() {
        let rate = 16000;
        let input = sine(rate, 200.0, 16000);
        let sos = sos_coefficients(ButterworthDesign::new(2500.0, 20, rate)).unwrap();
        let output = sos.filtfilt(&input);
        assert_eq!(output.len(), input.len());

        // Zero phase: sample-for-sample agreement away from the edges.
        let max_err = input[4000..12000]
            .iter()
            .zip(&output[4000..12000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(max_err < 1e-3, "max deviation {}", max_err);

        let ratio = rms(&output[4000..12000]) / rms(&input[4000..12000]);
        assert!((ratio - 1.0).abs() < 1e-3, "amplitude ratio {}", ratio);
    }

    #[test]
    fn test_stopband_sine_is_removed() {
        let rate = 16000;
        let input = sine(rate, 6000.0, 16000);
        let sos = sos_coefficients(ButterworthDesign::new(2500.0, 20, rate)).unwrap();
        let output = sos.filtfilt(&input);
        let ratio = rms(&output[4000..12000]) / rms(&input[4000..12000]);
        assert!(ratio < 1e-4, "stopband ratio {}", ratio);
    }

    #[test]
    fn test_constant_signal_passes_through() {
        let sos = sos_coefficients(ButterworthDesign::new(2500.0, 20, 16000)).unwrap();
        let output = sos.filtfilt(&vec![0.25; 500]);
        for v in output {
            assert!((v - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_short_signals_do_not_panic() {
        let sos = sos_coefficients(ButterworthDesign::new(2500.0, 20, 16000)).unwrap();
        assert_eq!(sos.filtfilt(&[0.5]).len(), 1);
        assert_eq!(sos.filtfilt(&[0.5, -0.5, 0.1]).len(), 3);
        assert!(sos.filtfilt(&[]).is_empty());
    }

    #[test]
    fn test_lowpass_waveform_keeps_rate_and_length() {
        let samples: Vec<f32> = sine(16000, 300.0, 2000).into_iter().map(|s| s as f32).collect();
        let wave = Waveform::new(samples, 16000).unwrap();
        let out = lowpass(&wave, 2500.0, 20).unwrap();
        assert_eq!(out.len(), wave.len());
        assert_eq!(out.sample_rate(), 16000);
    }

    #[test]
    fn test_lowpass_rejects_cutoff_above_nyquist_for_input_rate() {
        let wave = Waveform::new(vec![0.1; 100], 4000).unwrap();
        let err = lowpass(&wave, 2500.0, 20).unwrap_err();
        assert!(matches!(err, FilterError::InvalidFilterParameters { sample_rate: 4000, .. }));
    }
}
