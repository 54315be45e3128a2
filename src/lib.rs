pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod checkpoint;
pub mod error;

// Convenience re-exports
pub use math::tensor::Tensor;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{ArchitectureDescriptor, Network, ParameterSet};
pub use checkpoint::{
    decode, encode, load, rehydrate, rehydrate_file, save, Checkpoint, CheckpointFormat,
    CodecOptions,
};
pub use error::{CheckpointError, Result, ShapeMismatchEntry};
