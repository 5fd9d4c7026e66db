//! Deterministic test signals shared by unit tests, integration tests and the
//! CLI.

pub mod synthetic;

pub use synthetic::{write_wav, SyntheticCough};
