pub mod codec;
pub mod file;
pub mod format;
pub mod options;
pub mod rehydrate;

use serde::{Deserialize, Serialize};

use crate::network::architecture::ArchitectureDescriptor;
use crate::network::params::ParameterSet;

pub use codec::{decode, decode_from, decode_json, encode, encode_json, encode_to, read_header};
pub use file::{load, load_with, save, save_with};
pub use format::{ArtifactHeader, CheckpointFormat, TensorEntry};
pub use options::CodecOptions;
pub use rehydrate::{rehydrate, rehydrate_checkpoint, rehydrate_file};

/// An architecture together with a snapshot of parameter values.
///
/// Owns its tensors: later changes to the network it was taken from do not
/// reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub architecture: ArchitectureDescriptor,
    pub parameters: ParameterSet,
}

impl Checkpoint {
    pub fn new(architecture: ArchitectureDescriptor, parameters: ParameterSet) -> Self {
        Checkpoint { architecture, parameters }
    }

    pub fn into_parts(self) -> (ArchitectureDescriptor, ParameterSet) {
        (self.architecture, self.parameters)
    }
}
