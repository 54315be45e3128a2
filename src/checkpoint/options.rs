use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Upper bound on the JSON header of a binary artifact unless configured
/// otherwise.
pub const DEFAULT_MAX_HEADER_LEN: u64 = 16 * 1024 * 1024;

/// Knobs for writing and reading checkpoint files.
///
/// Can be read from a JSON config file; missing fields take their defaults.
///
/// # Example
///
/// ```
/// use ferrite_checkpoint::CodecOptions;
///
/// let options = CodecOptions::default().sync(false);
/// assert!(options.atomic_write);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Write to a temporary file next to the destination and rename it into
    /// place, so readers never observe a half-written artifact.
    pub atomic_write: bool,
    /// Flush file contents to disk before the artifact becomes visible.
    pub sync: bool,
    /// Headers longer than this are rejected as corrupt before allocation.
    pub max_header_len: u64,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            atomic_write: true,
            sync: true,
            max_header_len: DEFAULT_MAX_HEADER_LEN,
        }
    }
}

impl CodecOptions {
    pub fn atomic_write(mut self, enabled: bool) -> Self {
        self.atomic_write = enabled;
        self
    }

    pub fn sync(mut self, enabled: bool) -> Self {
        self.sync = enabled;
        self
    }

    pub fn max_header_len(mut self, bytes: u64) -> Self {
        self.max_header_len = bytes;
        self
    }

    /// Deserializes options from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<CodecOptions> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
