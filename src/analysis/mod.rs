// Analysis module - numeric stages of the cough preprocessing pipeline
//
// Stage order (each stage consumes the previous stage's output):
// - normalize: RMS loudness to a fixed dBFS target
// - filter: zero-phase Butterworth low-pass, used only for onset detection
// - onset: amplitude-envelope threshold crossing on the filtered signal
// - segment: fixed-duration window of the normalized (unfiltered) signal
// - features: resampled mel spectrogram replicated into a 3-channel tensor

pub mod features;
pub mod filter;
pub mod normalize;
pub mod onset;
pub mod segment;

pub use features::{FeatureExtractor, FeatureTensor, TensorStats};
pub use filter::{lowpass, sos_coefficients, ButterworthDesign, SosCoefficients};
pub use normalize::{loudness_dbfs, normalize, NormalizeOutcome};
pub use onset::{Envelope, EnvelopeFrame, OnsetDetection, OnsetDetector};
pub use segment::segment;
