use std::io::{self, Read, Write};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::checkpoint::format::{
    ArtifactHeader, TensorEntry, FORMAT_VERSION, JSON_FORMAT_TAG, MAGIC, PREAMBLE_LEN,
};
use crate::checkpoint::options::CodecOptions;
use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::math::tensor::{Tensor, DTYPE_F32};
use crate::network::architecture::ArchitectureDescriptor;
use crate::network::params::ParameterSet;

// ---------------------------------------------------------------------------
// Binary encoding
// ---------------------------------------------------------------------------

/// Encodes a descriptor and its parameters into a binary artifact.
///
/// The parameter set is written as given; its consistency with `descriptor`
/// is the caller's responsibility and is checked on rehydration.
pub fn encode(descriptor: &ArchitectureDescriptor, params: &ParameterSet) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(PREAMBLE_LEN + params.element_count() * 4);
    encode_to(&mut out, descriptor, params)?;
    Ok(out)
}

/// Streams a binary artifact into `writer`.
pub fn encode_to<W: Write>(
    writer: &mut W,
    descriptor: &ArchitectureDescriptor,
    params: &ParameterSet,
) -> Result<()> {
    let header = build_header(descriptor, params);
    let header_bytes = serde_json::to_vec(&header)?;

    writer.write_all(&MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(header_bytes.len() as u64).to_le_bytes())?;
    writer.write_all(&header_bytes)?;

    let mut buf = Vec::new();
    for (_, tensor) in params.iter() {
        buf.clear();
        tensor.write_le_bytes(&mut buf);
        writer.write_all(&buf)?;
    }

    debug!(
        "encoded checkpoint: {} tensors, header {} bytes, payload {} bytes",
        params.len(),
        header_bytes.len(),
        header.payload_len()
    );
    Ok(())
}

fn build_header(descriptor: &ArchitectureDescriptor, params: &ParameterSet) -> ArtifactHeader {
    let mut cursor = 0u64;
    let parameters = params.iter()
        .map(|(key, tensor)| {
            let start = cursor;
            cursor += tensor.byte_len() as u64;
            TensorEntry {
                key: key.to_string(),
                dtype: DTYPE_F32.to_string(),
                shape: tensor.shape().to_vec(),
                offsets: [start, cursor],
            }
        })
        .collect();
    ArtifactHeader { architecture: descriptor.clone(), parameters }
}

// ---------------------------------------------------------------------------
// Binary decoding
// ---------------------------------------------------------------------------

/// Decodes a binary artifact held in memory.
pub fn decode(bytes: &[u8]) -> Result<Checkpoint> {
    let mut reader = bytes;
    decode_from(&mut reader, &CodecOptions::default())
}

/// Reads the preamble and header of a binary artifact without touching the
/// tensor payload. The header is validated before it is returned.
pub fn read_header<R: Read>(reader: &mut R, options: &CodecOptions) -> Result<ArtifactHeader> {
    let mut preamble = [0u8; PREAMBLE_LEN];
    read_section(reader, &mut preamble, "preamble")?;

    if preamble[0..4] != MAGIC {
        return Err(CheckpointError::corrupt(format!(
            "bad magic {:?}, not a checkpoint artifact",
            &preamble[0..4]
        )));
    }
    let version = u32::from_le_bytes([preamble[4], preamble[5], preamble[6], preamble[7]]);
    if version != FORMAT_VERSION {
        return Err(CheckpointError::corrupt(format!(
            "unsupported format version {version} (this build reads {FORMAT_VERSION})"
        )));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&preamble[8..16]);
    let header_len = u64::from_le_bytes(len_bytes);
    if header_len > options.max_header_len {
        return Err(CheckpointError::corrupt(format!(
            "header length {header_len} exceeds limit {}",
            options.max_header_len
        )));
    }

    let mut header_bytes = vec![0u8; to_usize(header_len)?];
    read_section(reader, &mut header_bytes, "header")?;
    let header: ArtifactHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| CheckpointError::corrupt(format!("unreadable header: {e}")))?;
    header.validate()?;
    Ok(header)
}

/// Decodes a binary artifact from a stream. The stream must end exactly where
/// the payload described by the header ends.
pub fn decode_from<R: Read>(reader: &mut R, options: &CodecOptions) -> Result<Checkpoint> {
    let header = read_header(reader, options)?;

    let mut parameters = ParameterSet::new();
    let mut buf = Vec::new();
    for entry in &header.parameters {
        buf.resize(to_usize(entry.byte_len())?, 0);
        read_section(reader, &mut buf, &entry.key)?;
        let tensor = Tensor::from_le_bytes(entry.shape.clone(), &buf).ok_or_else(|| {
            CheckpointError::corrupt(format!("{}: payload does not match shape", entry.key))
        })?;
        parameters.insert(entry.key.clone(), tensor);
    }

    let mut extra = [0u8; 1];
    if reader.read(&mut extra)? != 0 {
        return Err(CheckpointError::corrupt("trailing bytes after tensor payload"));
    }

    debug!(
        "decoded checkpoint: {} tensors, {} payload bytes",
        parameters.len(),
        header.payload_len()
    );
    Ok(Checkpoint::new(header.architecture, parameters))
}

/// `read_exact` that reports a short read as a truncated artifact.
fn read_section<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            CheckpointError::corrupt(format!("artifact truncated while reading {what}"))
        }
        _ => CheckpointError::Io(e),
    })
}

fn to_usize(n: u64) -> Result<usize> {
    usize::try_from(n).map_err(|_| CheckpointError::corrupt(format!("length {n} does not fit in memory")))
}

// ---------------------------------------------------------------------------
// JSON encoding
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonArtifactRef<'a> {
    format: &'a str,
    version: u32,
    architecture: &'a ArchitectureDescriptor,
    parameters: &'a ParameterSet,
}

#[derive(Deserialize)]
struct JsonArtifact {
    format: String,
    version: u32,
    architecture: ArchitectureDescriptor,
    parameters: ParameterSet,
}

/// Encodes a checkpoint as a pretty-printed JSON document.
///
/// JSON has no NaN or infinity, so a tensor holding one fails with
/// `NonFiniteValue` instead of being written as `null`.
pub fn encode_json(checkpoint: &Checkpoint) -> Result<Vec<u8>> {
    for (key, tensor) in checkpoint.parameters.iter() {
        if let Some(index) = tensor.data().iter().position(|x| !x.is_finite()) {
            return Err(CheckpointError::NonFiniteValue { key: key.to_string(), index });
        }
    }
    let doc = JsonArtifactRef {
        format: JSON_FORMAT_TAG,
        version: FORMAT_VERSION,
        architecture: &checkpoint.architecture,
        parameters: &checkpoint.parameters,
    };
    Ok(serde_json::to_vec_pretty(&doc)?)
}

/// Decodes a JSON checkpoint document.
pub fn decode_json(bytes: &[u8]) -> Result<Checkpoint> {
    let doc: JsonArtifact = serde_json::from_slice(bytes)
        .map_err(|e| CheckpointError::corrupt(format!("unreadable JSON checkpoint: {e}")))?;
    if doc.format != JSON_FORMAT_TAG {
        return Err(CheckpointError::corrupt(format!("unknown format tag {:?}", doc.format)));
    }
    if doc.version != FORMAT_VERSION {
        return Err(CheckpointError::corrupt(format!("unsupported format version {}", doc.version)));
    }
    doc.architecture
        .validate()
        .map_err(|e| CheckpointError::corrupt(format!("stored architecture: {e}")))?;
    Ok(Checkpoint::new(doc.architecture, doc.parameters))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Checkpoint {
        let mut params = ParameterSet::new();
        params.insert("output.weight", Tensor::from_vec(vec![2, 3], vec![0.1, -0.2, 0.3, 1e-8, -0.0, 7.5]).unwrap());
        params.insert("output.bias", Tensor::from_vec(vec![2], vec![0.25, -1.0]).unwrap());
        Checkpoint::new(ArchitectureDescriptor::new(3, 2, vec![]), params)
    }

    fn encoded() -> Vec<u8> {
        let c = sample();
        encode(&c.architecture, &c.parameters).unwrap()
    }

    #[test]
    fn preamble_layout() {
        let bytes = encoded();
        assert_eq!(&bytes[0..4], b"FNNC");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
        let header_len = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) as usize;
        let header: serde_json::Value = serde_json::from_slice(&bytes[16..16 + header_len]).unwrap();
        assert_eq!(header["architecture"]["input_size"], 3);
        assert_eq!(header["parameters"][0]["key"], "output.weight");
        assert_eq!(header["parameters"][1]["offsets"], serde_json::json!([24, 32]));
        assert_eq!(bytes.len(), 16 + header_len + 32);
    }

    #[test]
    fn binary_round_trip_is_bit_exact() {
        let back = decode(&encoded()).unwrap();
        assert_eq!(back, sample());
        let neg_zero = back.parameters.get("output.weight").unwrap().data()[4];
        assert!(neg_zero.is_sign_negative());
    }

    #[test]
    fn read_header_skips_payload() {
        let bytes = encoded();
        let mut reader = &bytes[..];
        let header = read_header(&mut reader, &CodecOptions::default()).unwrap();
        assert_eq!(header.parameters.len(), 2);
        assert_eq!(reader.len() as u64, header.payload_len());
    }

    #[test]
    fn wrong_magic_is_corrupt() {
        let mut bytes = encoded();
        bytes[0] = b'X';
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn future_version_is_corrupt() {
        let mut bytes = encoded();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 2"));
    }

    #[test]
    fn truncation_anywhere_is_corrupt() {
        let bytes = encoded();
        for cut in [0, 3, 15, 20, bytes.len() - 1] {
            let err = decode(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, CheckpointError::CorruptArtifact { .. }), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let mut bytes = encoded();
        bytes.push(0);
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("trailing bytes"));
    }

    #[test]
    fn oversized_header_is_rejected_before_reading() {
        let bytes = encoded();
        let options = CodecOptions::default().max_header_len(8);
        let err = decode_from(&mut &bytes[..], &options).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn json_round_trip() {
        let json = encode_json(&sample()).unwrap();
        let text = String::from_utf8(json.clone()).unwrap();
        assert!(text.contains("\"format\": \"ferrite-checkpoint\""));
        assert_eq!(decode_json(&json).unwrap(), sample());
    }

    #[test]
    fn json_with_foreign_tag_is_corrupt() {
        let json = br#"{"format":"other","version":1,"architecture":{"input_size":1,"output_size":1,"hidden_sizes":[]},"parameters":[]}"#;
        let err = decode_json(json).unwrap_err();
        assert!(err.to_string().contains("unknown format tag"), "{err}");
        assert!(matches!(decode_json(b"[1, 2"), Err(CheckpointError::CorruptArtifact { .. })));
    }

    #[test]
    fn json_with_future_version_is_corrupt() {
        let json = br#"{"format":"ferrite-checkpoint","version":2,"architecture":{"input_size":1,"output_size":1,"hidden_sizes":[]},"parameters":[]}"#;
        let err = decode_json(json).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 2"), "{err}");
    }

    #[test]
    fn json_with_overflowing_shape_is_corrupt() {
        let json = br#"{"format":"ferrite-checkpoint","version":1,"architecture":{"input_size":1,"output_size":1,"hidden_sizes":[]},"parameters":[{"key":"output.weight","shape":[9223372036854775808,4],"dtype":"f32","data":[]}]}"#;
        assert!(matches!(decode_json(json), Err(CheckpointError::CorruptArtifact { .. })));
    }

    #[test]
    fn json_refuses_non_finite_values() {
        let mut c = sample();
        let mut values = c.parameters.get("output.bias").unwrap().data().to_vec();
        values[1] = f32::NAN;
        c.parameters.insert("output.bias", Tensor::from_vec(vec![2], values).unwrap());
        match encode_json(&c) {
            Err(CheckpointError::NonFiniteValue { key, index }) => {
                assert_eq!(key, "output.bias");
                assert_eq!(index, 1);
            }
            other => panic!("expected NonFiniteValue, got {other:?}"),
        }
        assert!(encode(&c.architecture, &c.parameters).is_ok());
    }
}
