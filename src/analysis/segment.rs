// Segmenter - fixed-duration window starting at the onset
//
// Operates on the normalized, unfiltered waveform. The window is
// [round(onset * sr), round(onset * sr) + round(duration_ms * sr / 1000)),
// truncated at the end of the recording. Never padded.

use log::debug;

use crate::audio::Waveform;
use crate::error::PipelineError;

/// Reference segment duration in milliseconds.
pub const DEFAULT_SEGMENT_MS: f64 = 330.0;

/// Number of samples a full-length segment of `duration_ms` spans at `sample_rate`.
pub fn requested_len(duration_ms: f64, sample_rate: u32) -> usize {
    (duration_ms * sample_rate as f64 / 1000.0).round().max(0.0) as usize
}

/// Extract `duration_ms` of audio beginning at `onset_secs`.
///
/// The result is shorter than requested when the recording ends first.
/// Fails with `EmptySegment` when the onset lies at or past the last sample.
pub fn segment(
    waveform: &Waveform,
    onset_secs: f64,
    duration_ms: f64,
) -> Result<Waveform, PipelineError> {
    let rate = waveform.sample_rate();
    let start = (onset_secs.max(0.0) * rate as f64).round() as usize;
    let requested = requested_len(duration_ms, rate);
    let end = start.saturating_add(requested).min(waveform.len());

    if start >= end {
        return Err(PipelineError::EmptySegment {
            start_sample: start,
            available: waveform.len(),
        });
    }

    if end - start < requested {
        debug!(
            "[Segmenter] Truncated segment: {} of {} requested samples available from {}",
            end - start,
            requested,
            start
        );
    }

    Ok(waveform.with_samples(waveform.samples()[start..end].to_vec())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, rate: u32) -> Waveform {
        Waveform::new((0..len).map(|i| i as f32).collect(), rate).unwrap()
    }

    #[test]
    fn test_full_length_segment() {
        let wave = ramp(16000, 16000);
        let seg = segment(&wave, 0.2, 330.0).unwrap();
        assert_eq!(seg.len(), (0.33f64 * 16000.0).round() as usize);
        assert_eq!(seg.len(), 5280);
        assert_eq!(seg.samples()[0], 3200.0);
        assert_eq!(seg.sample_rate(), 16000);
    }

    #[test]
    fn test_truncates_without_padding() {
        let wave = ramp(8000, 16000); // 0.5 s
        let seg = segment(&wave, 0.2, 330.0).unwrap();
        assert_eq!(seg.len(), 8000 - 3200);
        assert!(seg.len() < 5280);
        assert_eq!(*seg.samples().last().unwrap(), 7999.0);
    }

    #[test]
    fn test_onset_past_end_is_an_error() {
        let wave = ramp(1600, 16000);
        let err = segment(&wave, 0.2, 330.0).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptySegment {
                start_sample: 3200,
                available: 1600
            }
        ));
    }

    #[test]
    fn test_zero_onset_starts_at_first_sample() {
        let wave = ramp(10000, 16000);
        let seg = segment(&wave, 0.0, 330.0).unwrap();
        assert_eq!(seg.samples()[0], 0.0);
        assert_eq!(seg.len(), 5280);
    }

    #[test]
    fn test_requested_len_at_common_rates() {
        assert_eq!(requested_len(330.0, 16000), 5280);
        assert_eq!(requested_len(330.0, 44100), 14553);
        assert_eq!(requested_len(330.0, 48000), 15840);
    }
}
