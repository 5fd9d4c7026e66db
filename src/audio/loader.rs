//! Loader - decode an input recording into a mono [`Waveform`].
//!
//! Only RIFF/WAVE is decoded. Other common containers are recognised by their
//! magic bytes so that callers get an `UnsupportedContainer` error naming what
//! was actually supplied instead of a generic parse failure.

use std::fmt;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::Waveform;
use crate::error::DecodeError;

/// Container formats the loader can be asked to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
}

impl AudioFormat {
    fn container(self) -> ContainerKind {
        match self {
            AudioFormat::Wav => ContainerKind::Wav,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.container().fmt(f)
    }
}

/// Container identified from leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Wav,
    Flac,
    Ogg,
    Mp3,
    Mp4,
    Aiff,
    Matroska,
    Unknown,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::Wav => "WAV",
            ContainerKind::Flac => "FLAC",
            ContainerKind::Ogg => "Ogg",
            ContainerKind::Mp3 => "MP3",
            ContainerKind::Mp4 => "MP4/M4A",
            ContainerKind::Aiff => "AIFF",
            ContainerKind::Matroska => "Matroska/WebM",
            ContainerKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Identify the container from its magic bytes.
pub fn sniff_format(bytes: &[u8]) -> ContainerKind {
    let at = |offset: usize, magic: &[u8]| bytes.get(offset..offset + magic.len()) == Some(magic);

    if at(0, b"RIFF") && at(8, b"WAVE") {
        ContainerKind::Wav
    } else if at(0, b"fLaC") {
        ContainerKind::Flac
    } else if at(0, b"OggS") {
        ContainerKind::Ogg
    } else if at(0, b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
    {
        ContainerKind::Mp3
    } else if at(4, b"ftyp") {
        ContainerKind::Mp4
    } else if at(0, b"FORM") && (at(8, b"AIFF") || at(8, b"AIFC")) {
        ContainerKind::Aiff
    } else if at(0, &[0x1A, 0x45, 0xDF, 0xA3]) {
        ContainerKind::Matroska
    } else {
        ContainerKind::Unknown
    }
}

/// Decode a file on disk.
pub fn load_path<P: AsRef<Path>>(path: P, format: AudioFormat) -> Result<Waveform, DecodeError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| DecodeError::Io {
        details: format!("failed to read {}: {err}", path.display()),
    })?;
    let waveform = load_bytes(&bytes, format)?;
    info!(
        "[Loader] Loaded {} ({} samples @ {} Hz, {:.3}s)",
        path.display(),
        waveform.len(),
        waveform.sample_rate(),
        waveform.duration_secs()
    );
    Ok(waveform)
}

/// Decode an in-memory byte stream.
pub fn load_bytes(bytes: &[u8], format: AudioFormat) -> Result<Waveform, DecodeError> {
    let detected = sniff_format(bytes);
    if detected != format.container() {
        return Err(DecodeError::UnsupportedContainer {
            expected: format.to_string(),
            detected: detected.to_string(),
        });
    }

    match format {
        AudioFormat::Wav => {
            let reader = hound::WavReader::new(Cursor::new(bytes))?;
            read_wav(reader)
        }
    }
}

fn read_wav<R: Read>(mut reader: hound::WavReader<R>) -> Result<Waveform, DecodeError> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(DecodeError::Malformed {
            details: "WAV header declares zero channels".to_string(),
        });
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(DecodeError::UnsupportedEncoding {
                    details: format!("{}-bit float samples", spec.bits_per_sample),
                });
            }
            reader
                .samples::<f32>()
                .map(|sample| sample.map_err(DecodeError::from))
                .collect::<Result<Vec<f32>, _>>()?
        }
        hound::SampleFormat::Int => match spec.bits_per_sample {
            bits @ 8..=32 => {
                let max = ((1i64 << (bits - 1)) - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(DecodeError::from))
                    .collect::<Result<Vec<f32>, _>>()?
            }
            bits => {
                return Err(DecodeError::UnsupportedEncoding {
                    details: format!("{}-bit integer samples", bits),
                })
            }
        },
    };

    debug!(
        "[Loader] WAV spec: channels={}, rate={}, bits={}, format={:?}",
        spec.channels, spec.sample_rate, spec.bits_per_sample, spec.sample_format
    );

    let mono = if spec.channels == 1 {
        samples
    } else {
        downmix(&samples, spec.channels as usize)
    };

    Waveform::new(mono, spec.sample_rate)
}

/// Average interleaved frames into a single channel. A trailing partial frame is dropped.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().copied().sum::<f32>() / channels as f32)
        .collect()
}
