// Resample module - band-limited sample-rate conversion ahead of the STFT
//
// Output length is ceil(len * target / source). The sinc resampler lags its
// input by a rate-dependent number of output samples. The lag is measured
// once per rate pair by pushing an impulse through a fresh resampler, then
// trimmed so that output sample n lines up with input position n / ratio.

use std::collections::HashMap;
use std::sync::RwLock;

use log::{debug, warn};
use once_cell::sync::Lazy;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::PipelineError;

const CHUNK_SIZE: usize = 1024;
const SINC_LEN: usize = 256;

/// Measured output lag per (source, target) rate pair.
static DELAY_CACHE: Lazy<RwLock<HashMap<(u32, u32), usize>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Number of samples produced when resampling `len` samples.
pub fn resampled_len(len: usize, source_rate: u32, target_rate: u32) -> usize {
    (len as f64 * target_rate as f64 / source_rate as f64).ceil() as usize
}

fn resample_error(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::invalid_config("features.sample_rate", format!("resampling failed: {err}"))
}

fn build_resampler(ratio: f64) -> Result<SincFixedIn<f32>, PipelineError> {
    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1).map_err(resample_error)
}

/// Output lag of the resampler for `ratio`, rounded to whole output samples.
///
/// An impulse at input position `SINC_LEN` should peak at `SINC_LEN * ratio`.
/// The peak is located with parabolic interpolation around the largest
/// magnitude and the difference is the lag.
fn measure_delay(ratio: f64) -> Result<usize, PipelineError> {
    let mut resampler = build_resampler(ratio)?;
    let mut impulse = vec![0.0f32; CHUNK_SIZE];
    impulse[SINC_LEN] = 1.0;

    let mut response = resampler
        .process(&[&impulse[..]], None)
        .map_err(resample_error)?
        .remove(0);
    let silence = vec![0.0f32; CHUNK_SIZE];
    let out = resampler
        .process(&[&silence[..]], None)
        .map_err(resample_error)?;
    response.extend_from_slice(&out[0]);

    let Some((peak, _)) = response
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
    else {
        return Ok(0);
    };

    let mut position = peak as f64;
    if peak > 0 && peak + 1 < response.len() {
        let (y0, y1, y2) = (
            response[peak - 1] as f64,
            response[peak] as f64,
            response[peak + 1] as f64,
        );
        let denom = y0 - 2.0 * y1 + y2;
        if denom.abs() > f64::EPSILON {
            position += 0.5 * (y0 - y2) / denom;
        }
    }

    let lag = (position - SINC_LEN as f64 * ratio).round();
    Ok(if lag > 0.0 { lag as usize } else { 0 })
}

/// Fetch (or measure and memoize) the lag for a rate pair.
fn output_lag(source_rate: u32, target_rate: u32, ratio: f64) -> Result<usize, PipelineError> {
    let key = (source_rate, target_rate);

    match DELAY_CACHE.read() {
        Ok(cache) => {
            if let Some(&lag) = cache.get(&key) {
                return Ok(lag);
            }
        }
        Err(_) => warn!("[Resample] Delay cache lock poisoned; measuring uncached"),
    }

    let lag = measure_delay(ratio)?;
    debug!(
        "[Resample] Measured lag of {} output samples for {} Hz -> {} Hz",
        lag, source_rate, target_rate
    );

    match DELAY_CACHE.write() {
        Ok(mut cache) => Ok(*cache.entry(key).or_insert(lag)),
        Err(_) => Ok(lag),
    }
}

/// Resample mono `samples` from `source_rate` to `target_rate`.
pub fn resample(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, PipelineError> {
    if source_rate == 0 || target_rate == 0 {
        return Err(PipelineError::invalid_config(
            "features.sample_rate",
            "sample rates must be greater than 0",
        ));
    }
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let lag = output_lag(source_rate, target_rate, ratio)?;
    let mut resampler = build_resampler(ratio)?;

    let expected = resampled_len(samples.len(), source_rate, target_rate);
    let mut output: Vec<f32> = Vec::with_capacity(expected + lag + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let out = resampler.process(&[chunk], None).map_err(resample_error)?;
        output.extend_from_slice(&out[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let out = resampler
            .process_partial(Some(&[remainder][..]), None)
            .map_err(resample_error)?;
        output.extend_from_slice(&out[0]);
    }

    // Drain the filter tail so the last input samples reach the output.
    while output.len() < expected + lag {
        let out = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(resample_error)?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..lag.min(output.len()));
    output.truncate(expected);

    debug!(
        "[Resample] {} samples @ {} Hz -> {} samples @ {} Hz (lag {})",
        samples.len(),
        source_rate,
        output.len(),
        target_rate,
        lag
    );

    Ok(output)
}
