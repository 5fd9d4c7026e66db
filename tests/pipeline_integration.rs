use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use cough_pipeline::analysis::{loudness_dbfs, normalize, sos_coefficients, ButterworthDesign};
use cough_pipeline::analysis::FeatureTensor;
use cough_pipeline::error::{DecodeError, InferenceError};
use cough_pipeline::testing::SyntheticCough;
use cough_pipeline::{
    AudioFormat, ClassProbabilities, CoughClass, CoughPipeline, InferenceAdapter, PipelineConfig,
    PipelineError, Waveform,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Adapter that derives a deterministic score row from the tensor contents
/// and counts how often it is called.
struct CountingAdapter {
    calls: Arc<AtomicUsize>,
}

impl InferenceAdapter for CountingAdapter {
    fn name(&self) -> &str {
        "counting"
    }

    fn infer(&self, features: &FeatureTensor) -> Result<ClassProbabilities, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(features.shape(), (224, 224, 3));
        assert!(features.channels_identical());
        let stats = features.stats();
        let bucket = ((stats.mean * 1e6) as usize) % 4;
        let mut row = [0.1f32; 4];
        row[bucket] = 0.7;
        ClassProbabilities::from_slice(&row)
    }
}

fn pipeline() -> (CoughPipeline, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let adapter = CountingAdapter {
        calls: Arc::clone(&calls),
    };
    let pipeline =
        CoughPipeline::new(PipelineConfig::default(), Box::new(adapter)).expect("pipeline");
    (pipeline, calls)
}

#[test]
fn lead_in_then_burst_classifies_at_common_rates() {
    let (pipeline, calls) = pipeline();
    for &rate in &[16_000u32, 22_050, 44_100, 48_000] {
        let spec = SyntheticCough {
            sample_rate: rate,
            seed: rate as u64,
            ..Default::default()
        };
        let bytes = spec.to_wav_bytes().expect("wav bytes");
        let result = pipeline
            .classify_bytes(&bytes, AudioFormat::Wav)
            .unwrap_or_else(|err| panic!("{} Hz failed: {}", rate, err));

        assert!(CoughClass::ALL.contains(&result.label));
        assert!(result.report.onset.detected, "{} Hz: onset missed", rate);
        assert!(
            (result.report.onset.time_secs - spec.onset_secs()).abs() < 0.05,
            "{} Hz: onset {} vs burst {}",
            rate,
            result.report.onset.time_secs,
            spec.onset_secs()
        );
        assert_eq!(
            result.report.segment_samples,
            (330.0 * rate as f64 / 1000.0).round() as usize
        );
        assert_eq!(result.report.tensor_shape, (224, 224, 3));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn unsupported_containers_fail_before_numeric_stages() {
    let (pipeline, calls) = pipeline();
    let inputs: [(&[u8], &str); 3] = [
        (&b"fLaC\x00\x00\x00\x22rest-of-flac"[..], "FLAC"),
        (&b"OggS\x00\x02\x00\x00\x00\x00"[..], "Ogg"),
        (&b"ID3\x04\x00\x00\x00\x00\x00\x00"[..], "MP3"),
    ];

    for (bytes, name) in inputs {
        let err = pipeline
            .classify_bytes(bytes, AudioFormat::Wav)
            .expect_err("unsupported container must fail");
        match err {
            PipelineError::Decode(DecodeError::UnsupportedContainer { detected, .. }) => {
                assert_eq!(detected, name)
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(pipeline
            .extract_features_bytes(bytes, AudioFormat::Wav)
            .is_err());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn truncated_wav_is_a_decode_error() {
    let (pipeline, calls) = pipeline();
    let bytes = SyntheticCough::default().to_wav_bytes().expect("wav bytes");
    let err = pipeline
        .classify_bytes(&bytes[..30], AudioFormat::Wav)
        .expect_err("truncated header");
    assert!(err.is_caller_misuse(), "got {:?}", err);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn nan_in_float_wav_fails_before_inference() {
    let (pipeline, calls) = pipeline();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
        for i in 0..16_000 {
            let sample = match i {
                100 => f32::NAN,
                0..=7_999 => 0.0,
                _ => 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin(),
            };
            writer.write_sample(sample).expect("sample");
        }
        writer.finalize().expect("finalize");
    }

    let err = pipeline
        .classify_bytes(cursor.get_ref(), AudioFormat::Wav)
        .expect_err("NaN sample must be rejected");
    assert!(
        matches!(err, PipelineError::Decode(DecodeError::Malformed { .. })),
        "got {:?}",
        err
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_file_is_a_decode_error() {
    let (pipeline, _) = pipeline();
    let err = pipeline
        .classify_path("/nonexistent/cough.wav", AudioFormat::Wav)
        .expect_err("missing file");
    assert!(matches!(err, PipelineError::Decode(DecodeError::Io { .. })));
}

#[test]
fn short_and_long_recordings_keep_tensor_shape() {
    let (pipeline, _) = pipeline();

    let short = SyntheticCough {
        lead_in_ms: 20,
        burst_ms: 60,
        tail_ms: 20,
        ..Default::default()
    };
    let output = pipeline
        .preprocess(&short.render().expect("render"))
        .expect("short recording");
    assert!(output.report.segment_samples < 5280);
    assert_eq!(output.features.shape(), (224, 224, 3));

    let long = SyntheticCough {
        lead_in_ms: 4_000,
        tail_ms: 6_000,
        ..Default::default()
    };
    let output = pipeline
        .preprocess(&long.render().expect("render"))
        .expect("long recording");
    assert_eq!(output.report.segment_samples, 5280);
    assert_eq!(output.features.shape(), (224, 224, 3));
}

#[test]
fn normalized_loudness_hits_target() {
    let mut rng = StdRng::seed_from_u64(42);
    for target in [-30.0, -20.0, -12.5] {
        for _ in 0..5 {
            let scale: f32 = rng.gen_range(0.001..0.9);
            let samples: Vec<f32> = (0..4000).map(|_| scale * rng.gen_range(-1.0..1.0)).collect();
            let waveform = Waveform::new(samples, 16_000).expect("waveform");
            let outcome = normalize(&waveform, target).expect("normalize");
            let measured = loudness_dbfs(outcome.waveform()).expect("non-silent");
            assert!(
                (measured - target).abs() < 0.01,
                "target {} measured {}",
                target,
                measured
            );
        }
    }
}

#[test]
fn filter_design_is_shared_process_wide() {
    let first = sos_coefficients(ButterworthDesign::new(2500.0, 20, 16_000)).expect("design");
    let second = sos_coefficients(ButterworthDesign::new(2500.0, 20, 16_000)).expect("design");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.sections().len(), 10);
}

#[test]
fn concurrent_requests_share_one_pipeline() {
    let (pipeline, calls) = pipeline();
    let pipeline = Arc::new(pipeline);
    let bytes = Arc::new(SyntheticCough::default().to_wav_bytes().expect("wav bytes"));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let bytes = Arc::clone(&bytes);
            thread::spawn(move || {
                pipeline
                    .classify_bytes(&bytes, AudioFormat::Wav)
                    .expect("classification")
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("worker thread"))
        .collect();
    for result in &results[1..] {
        assert_eq!(result.label, results[0].label);
        assert_eq!(result.report, results[0].report);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
