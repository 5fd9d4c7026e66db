// Cough Pipeline - audio preprocessing for respiratory sound classification
// One recording in: normalize, low-pass, locate the cough onset, cut a fixed
// window, turn it into a mel-spectrogram tensor and ask a model for a label.

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod testing;

#[cfg(feature = "http")]
pub mod http;

// Re-exports for convenience
pub use audio::{AudioFormat, Waveform};
pub use config::PipelineConfig;
pub use error::{DecodeError, FilterError, InferenceError, PipelineError};
pub use inference::{ClassProbabilities, CoughClass, InferenceAdapter};
pub use pipeline::{Classification, CoughPipeline, PreprocessOutput, PreprocessReport};
