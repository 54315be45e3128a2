use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{CheckpointError, Result};

/// Key prefix of the i-th hidden layer's parameters.
pub const HIDDEN_PREFIX: &str = "hidden_layers";
/// Key prefix of the output layer's parameters.
pub const OUTPUT_PREFIX: &str = "output";

/// Describes the shape of a feed-forward classifier.
///
/// Fields:
/// - `input_size`   — dimensionality of the input feature vector
/// - `output_size`  — number of output classes
/// - `hidden_sizes` — width of each hidden layer, input side first; may be
///                    empty for a direct input → output mapping
///
/// The descriptor fully determines every parameter key and shape (see
/// [`ArchitectureDescriptor::parameter_shapes`]), which is what lets a
/// checkpoint be restored without knowing the architecture in advance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchitectureDescriptor {
    pub input_size: usize,
    pub output_size: usize,
    pub hidden_sizes: Vec<usize>,
}

impl ArchitectureDescriptor {
    pub fn new(input_size: usize, output_size: usize, hidden_sizes: Vec<usize>) -> Self {
        ArchitectureDescriptor { input_size, output_size, hidden_sizes }
    }

    /// Checks that every size is positive and that the parameter count fits
    /// in `usize`.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(CheckpointError::invalid_architecture("input_size must be positive"));
        }
        if self.output_size == 0 {
            return Err(CheckpointError::invalid_architecture("output_size must be positive"));
        }
        if let Some(i) = self.hidden_sizes.iter().position(|&h| h == 0) {
            return Err(CheckpointError::invalid_architecture(format!(
                "hidden_sizes[{i}] must be positive"
            )));
        }
        if self.parameter_count().is_none() {
            return Err(CheckpointError::invalid_architecture("parameter count overflows usize"));
        }
        Ok(())
    }

    /// Number of linear layers, output included.
    pub fn layer_count(&self) -> usize {
        self.hidden_sizes.len() + 1
    }

    /// `(size, input_size)` of each linear layer in construction order.
    pub fn layer_dims(&self) -> Vec<(usize, usize)> {
        let mut dims = Vec::with_capacity(self.layer_count());
        let mut fan_in = self.input_size;
        for &width in &self.hidden_sizes {
            dims.push((width, fan_in));
            fan_in = width;
        }
        dims.push((self.output_size, fan_in));
        dims
    }

    /// Every parameter key with the shape a freshly built network gives it,
    /// in construction order (weight before bias, output layer last).
    pub fn parameter_shapes(&self) -> Vec<(String, Vec<usize>)> {
        let dims = self.layer_dims();
        let last = dims.len() - 1;
        dims.into_iter()
            .enumerate()
            .flat_map(|(i, (size, input_size))| {
                let prefix = if i == last {
                    OUTPUT_PREFIX.to_string()
                } else {
                    format!("{HIDDEN_PREFIX}.{i}")
                };
                [
                    (format!("{prefix}.weight"), vec![size, input_size]),
                    (format!("{prefix}.bias"), vec![size]),
                ]
            })
            .collect()
    }

    /// Total number of scalar parameters, or `None` if it overflows `usize`.
    pub fn parameter_count(&self) -> Option<usize> {
        self.layer_dims().iter().try_fold(0usize, |total, &(size, input)| {
            let layer = size.checked_mul(input)?.checked_add(size)?;
            total.checked_add(layer)
        })
    }

    /// Serializes the descriptor to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| CheckpointError::Io(e.into()))
    }

    /// Deserializes and validates a descriptor from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<ArchitectureDescriptor> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let descriptor: ArchitectureDescriptor = serde_json::from_reader(reader)?;
        descriptor.validate()?;
        Ok(descriptor)
    }
}
