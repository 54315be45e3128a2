//! Artifact layout shared by the encoder and decoder.
//!
//! Binary artifacts (version 1), all integers little-endian:
//!
//! ```text
//! [4 bytes]  magic "FNNC"
//! [4 bytes]  format version, u32
//! [8 bytes]  header length N, u64
//! [N bytes]  UTF-8 JSON header: architecture + tensor manifest
//! [...]      payload: tensor data as f32 little-endian, in manifest order
//! ```
//!
//! The manifest gives each tensor's key, dtype, shape and `[start, end)` byte
//! offsets into the payload, so the header can be checked before any tensor
//! data is read.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CheckpointError, Result};
use crate::math::tensor::DTYPE_F32;
use crate::network::architecture::ArchitectureDescriptor;

pub const MAGIC: [u8; 4] = *b"FNNC";

/// Current artifact format version, written into every artifact.
pub const FORMAT_VERSION: u32 = 1;

/// Magic + version + header length.
pub const PREAMBLE_LEN: usize = 16;

/// Tag written into JSON artifacts in place of the binary magic.
pub const JSON_FORMAT_TAG: &str = "ferrite-checkpoint";

/// How a checkpoint file is encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointFormat {
    /// Length-prefixed JSON header followed by raw little-endian tensors.
    #[default]
    Binary,
    /// Single pretty-printed JSON document; larger, but readable.
    Json,
}

impl CheckpointFormat {
    /// `.json` selects JSON; every other extension (or none) is binary.
    pub fn from_path(path: &Path) -> CheckpointFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => CheckpointFormat::Json,
            _ => CheckpointFormat::Binary,
        }
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            CheckpointFormat::Binary => "fnnc",
            CheckpointFormat::Json => "json",
        }
    }
}

/// One tensor's entry in the binary header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorEntry {
    pub key: String,
    pub dtype: String,
    pub shape: Vec<usize>,
    /// Byte range `[start, end)` within the payload.
    pub offsets: [u64; 2],
}

impl TensorEntry {
    pub fn byte_len(&self) -> u64 {
        self.offsets[1].saturating_sub(self.offsets[0])
    }
}

/// Decoded binary header: the architecture and the tensor manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub architecture: ArchitectureDescriptor,
    pub parameters: Vec<TensorEntry>,
}

impl ArtifactHeader {
    /// Total payload size the manifest describes.
    pub fn payload_len(&self) -> u64 {
        self.parameters.last().map(|e| e.offsets[1]).unwrap_or(0)
    }

    /// Checks that the header is self-consistent: a usable architecture,
    /// `f32` tensors only, unique keys, and contiguous offsets whose spans
    /// match the declared shapes.
    pub fn validate(&self) -> Result<()> {
        self.architecture
            .validate()
            .map_err(|e| CheckpointError::corrupt(format!("stored architecture: {e}")))?;

        let mut seen = HashSet::new();
        let mut cursor = 0u64;
        for entry in &self.parameters {
            if !seen.insert(entry.key.as_str()) {
                return Err(CheckpointError::corrupt(format!("duplicate parameter key {:?}", entry.key)));
            }
            if entry.dtype != DTYPE_F32 {
                return Err(CheckpointError::corrupt(format!(
                    "{}: unsupported dtype {:?}", entry.key, entry.dtype
                )));
            }
            let [start, end] = entry.offsets;
            if start != cursor || end < start {
                return Err(CheckpointError::corrupt(format!(
                    "{}: offsets [{start}, {end}) are not contiguous (expected start {cursor})",
                    entry.key
                )));
            }
            let expected = shape_byte_len(&entry.shape).ok_or_else(|| {
                CheckpointError::corrupt(format!("{}: shape {:?} overflows", entry.key, entry.shape))
            })?;
            if entry.byte_len() != expected {
                return Err(CheckpointError::corrupt(format!(
                    "{}: {} payload bytes for shape {:?} (expected {expected})",
                    entry.key, entry.byte_len(), entry.shape
                )));
            }
            cursor = end;
        }
        Ok(())
    }
}

/// Bytes an `f32` tensor of `shape` occupies, or `None` on overflow.
pub fn shape_byte_len(shape: &[usize]) -> Option<u64> {
    shape.iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d as u64))?
        .checked_mul(std::mem::size_of::<f32>() as u64)
}
