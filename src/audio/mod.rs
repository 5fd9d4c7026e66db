// Audio input: the Waveform value type and the container loader

pub mod loader;
mod waveform;

pub use loader::{load_bytes, load_path, sniff_format, AudioFormat, ContainerKind};
pub use waveform::Waveform;
