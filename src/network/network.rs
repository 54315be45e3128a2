use std::collections::HashSet;
use std::path::Path;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::activation::activation::ActivationFunction;
use crate::checkpoint::{self, Checkpoint};
use crate::error::{CheckpointError, Result, ShapeMismatchEntry};
use crate::layers::dense::Layer;
use crate::network::architecture::ArchitectureDescriptor;
use crate::network::params::ParameterSet;

/// A feed-forward classifier built from an [`ArchitectureDescriptor`].
///
/// Hidden layers apply ReLU; the output layer applies log-softmax, so
/// `forward` returns log-probabilities. Every `Network` owns its parameters;
/// snapshots taken with [`Network::parameters`] are independent copies.
#[derive(Debug, Clone)]
pub struct Network {
    descriptor: ArchitectureDescriptor,
    layers: Vec<Layer>,
}

impl Network {
    /// Builds a freshly initialized network using the thread RNG.
    pub fn new(descriptor: ArchitectureDescriptor) -> Result<Network> {
        Network::with_rng(descriptor, &mut rand::thread_rng())
    }

    /// Builds a network whose initial weights depend only on `seed`.
    pub fn seeded(descriptor: ArchitectureDescriptor, seed: u64) -> Result<Network> {
        Network::with_rng(descriptor, &mut StdRng::seed_from_u64(seed))
    }

    pub fn with_rng<R: Rng + ?Sized>(descriptor: ArchitectureDescriptor, rng: &mut R) -> Result<Network> {
        descriptor.validate()?;
        let dims = descriptor.layer_dims();
        let last = dims.len() - 1;
        let layers = dims.into_iter()
            .enumerate()
            .map(|(i, (size, input_size))| {
                let activation = if i == last {
                    ActivationFunction::LogSoftmax
                } else {
                    ActivationFunction::ReLU
                };
                Layer::new(size, input_size, activation, &mut *rng)
            })
            .collect();
        Ok(Network { descriptor, layers })
    }

    pub fn descriptor(&self) -> &ArchitectureDescriptor {
        &self.descriptor
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Forward pass; returns log-probabilities over the output classes.
    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.descriptor.input_size {
            return Err(CheckpointError::InputSize {
                expected: self.descriptor.input_size,
                actual: input.len(),
            });
        }
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.feed_from(&current);
        }
        Ok(current)
    }

    /// Class probabilities: `exp` of the forward pass.
    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>> {
        Ok(self.forward(input)?.into_iter().map(f32::exp).collect())
    }

    /// Snapshot of every parameter, keyed the way checkpoints store them.
    pub fn parameters(&self) -> ParameterSet {
        let keys = self.descriptor.parameter_shapes();
        let tensors = self.layers.iter().flat_map(|l| [l.weight.clone(), l.bias.clone()]);
        keys.into_iter().map(|(k, _)| k).zip(tensors).collect()
    }

    /// Replaces every parameter with the values in `params`.
    ///
    /// The whole set is checked against this network's architecture first;
    /// on any mismatch the network is left untouched.
    pub fn load_parameters(&mut self, mut params: ParameterSet) -> Result<()> {
        let expected = self.descriptor.parameter_shapes();
        verify_parameters(&expected, &params)?;

        let mut loaded = Vec::with_capacity(expected.len());
        for (key, _) in &expected {
            let tensor = params
                .remove(key)
                .ok_or_else(|| CheckpointError::MissingKey { keys: vec![key.clone()] })?;
            loaded.push(tensor);
        }

        let mut tensors = loaded.into_iter();
        for layer in &mut self.layers {
            if let (Some(weight), Some(bias)) = (tensors.next(), tensors.next()) {
                layer.weight = weight;
                layer.bias = bias;
            }
        }
        Ok(())
    }

    /// Architecture plus a copy of the current parameters.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.descriptor.clone(), self.parameters())
    }

    /// Writes a checkpoint of this network to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        checkpoint::save(path, &self.checkpoint())
    }
}

/// Compares `params` with the `(key, shape)` list an architecture requires.
///
/// Reports, in order of precedence, every shape mismatch, every missing key,
/// then every unexpected key.
pub fn verify_parameters(expected: &[(String, Vec<usize>)], params: &ParameterSet) -> Result<()> {
    let mut mismatches = Vec::new();
    let mut missing = Vec::new();

    for (key, model_shape) in expected {
        match params.get(key) {
            Some(t) if t.shape() != model_shape.as_slice() => mismatches.push(ShapeMismatchEntry {
                key: key.clone(),
                artifact_shape: t.shape().to_vec(),
                model_shape: model_shape.clone(),
            }),
            Some(_) => {}
            None => missing.push(key.clone()),
        }
    }

    if !mismatches.is_empty() {
        return Err(CheckpointError::ShapeMismatch { mismatches });
    }
    if !missing.is_empty() {
        return Err(CheckpointError::MissingKey { keys: missing });
    }

    let known: HashSet<&str> = expected.iter().map(|(k, _)| k.as_str()).collect();
    let unexpected: Vec<String> = params.keys()
        .filter(|k| !known.contains(k))
        .map(str::to_string)
        .collect();
    if !unexpected.is_empty() {
        return Err(CheckpointError::UnexpectedKey { keys: unexpected });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tensor::Tensor;

    fn small() -> ArchitectureDescriptor {
        ArchitectureDescriptor::new(4, 3, vec![5])
    }

    #[test]
    fn parameters_follow_descriptor_order() {
        let net = Network::seeded(small(), 0).unwrap();
        let params = net.parameters();
        let keys: Vec<&str> = params.keys().collect();
        assert_eq!(keys, vec!["hidden_layers.0.weight", "hidden_layers.0.bias", "output.weight", "output.bias"]);
        assert_eq!(params.get("output.weight").unwrap().shape(), &[3, 5]);
    }

    #[test]
    fn seeded_networks_are_identical() {
        let a = Network::seeded(small(), 42).unwrap();
        let b = Network::seeded(small(), 42).unwrap();
        assert_eq!(a.parameters(), b.parameters());
        let c = Network::seeded(small(), 43).unwrap();
        assert_ne!(a.parameters(), c.parameters());
    }

    #[test]
    fn invalid_descriptor_is_rejected() {
        let err = Network::new(ArchitectureDescriptor::new(4, 3, vec![0])).unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidArchitecture { .. }));
    }

    #[test]
    fn forward_yields_log_probabilities() {
        let net = Network::seeded(small(), 3).unwrap();
        let probs = net.predict(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        let err = net.forward(&[1.0]).unwrap_err();
        assert!(matches!(err, CheckpointError::InputSize { expected: 4, actual: 1 }));
    }

    #[test]
    fn snapshot_is_independent_of_later_loads() {
        let mut net = Network::seeded(small(), 1).unwrap();
        let before = net.parameters();
        let other = Network::seeded(small(), 2).unwrap().parameters();
        net.load_parameters(other.clone()).unwrap();
        assert_eq!(net.parameters(), other);
        assert_ne!(before, other);
    }

    #[test]
    fn failed_load_leaves_network_untouched() {
        let mut net = Network::seeded(small(), 1).unwrap();
        let before = net.parameters();

        let mut params = Network::seeded(small(), 2).unwrap().parameters();
        params.insert("output.bias", Tensor::zeros(&[7]));
        let err = net.load_parameters(params).unwrap_err();
        assert!(matches!(err, CheckpointError::ShapeMismatch { .. }));
        assert_eq!(net.parameters(), before);
    }

    #[test]
    fn verify_reports_missing_then_unexpected() {
        let expected = small().parameter_shapes();
        let mut params = Network::seeded(small(), 1).unwrap().parameters();
        params.remove("hidden_layers.0.bias");
        params.insert("hidden_layers.1.weight", Tensor::zeros(&[1, 1]));

        match verify_parameters(&expected, &params) {
            Err(CheckpointError::MissingKey { keys }) => assert_eq!(keys, vec!["hidden_layers.0.bias"]),
            other => panic!("expected MissingKey, got {other:?}"),
        }

        params.insert("hidden_layers.0.bias", Tensor::zeros(&[5]));
        match verify_parameters(&expected, &params) {
            Err(CheckpointError::UnexpectedKey { keys }) => assert_eq!(keys, vec!["hidden_layers.1.weight"]),
            other => panic!("expected UnexpectedKey, got {other:?}"),
        }
    }
}
