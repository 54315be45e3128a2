use std::path::Path;

use log::{info, warn};

use crate::checkpoint::{codec, file, Checkpoint};
use crate::error::Result;
use crate::network::network::{verify_parameters, Network};

/// Decodes a binary artifact and rebuilds the network it describes.
pub fn rehydrate(bytes: &[u8]) -> Result<Network> {
    rehydrate_checkpoint(codec::decode(bytes)?)
}

/// Loads a checkpoint file and rebuilds the network it describes.
pub fn rehydrate_file<P: AsRef<Path>>(path: P) -> Result<Network> {
    let path = path.as_ref();
    let network = rehydrate_checkpoint(file::load(path)?)?;
    info!("rehydrated network from {}", path.display());
    Ok(network)
}

/// Builds a network from the stored architecture and copies every stored
/// parameter into it.
///
/// The parameter set must match the architecture key for key and shape for
/// shape; otherwise this fails with `ShapeMismatch`, `MissingKey` or
/// `UnexpectedKey` and no network is returned. The check runs before any
/// layer is allocated, so a header declaring huge layers without the data
/// to back them is rejected cheaply.
pub fn rehydrate_checkpoint(checkpoint: Checkpoint) -> Result<Network> {
    let (architecture, parameters) = checkpoint.into_parts();
    if let Err(e) = verify_parameters(&architecture.parameter_shapes(), &parameters) {
        warn!("checkpoint does not fit its own architecture: {e}");
        return Err(e);
    }
    let mut network = Network::new(architecture)?;
    network.load_parameters(parameters)?;
    Ok(network)
}
