use rand::Rng;

use crate::{activation::activation::ActivationFunction, math::tensor::Tensor};

/// A fully connected layer: `a = activation(W·x + b)`.
///
/// `weight` has shape `[size, input_size]` and `bias` has shape `[size]`,
/// matching the parameter layout stored in checkpoints.
#[derive(Debug, Clone)]
pub struct Layer {
    pub size: usize,
    pub input_size: usize,
    pub weight: Tensor,
    pub bias: Tensor,
    pub activator: ActivationFunction,
}

impl Layer {
    /// Creates a layer with fan-in uniform initialization, U(-1/√in, 1/√in).
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let bound = 1.0 / (input_size as f32).sqrt();
        Layer {
            size,
            input_size,
            weight: Tensor::uniform(&[size, input_size], bound, rng),
            bias: Tensor::uniform(&[size], bound, rng),
            activator: activation,
        }
    }

    pub fn feed_from(&self, input: &[f32]) -> Vec<f32> {
        let mut z = self.weight.matvec(input);
        for (zi, bi) in z.iter_mut().zip(self.bias.data()) {
            *zi += bi;
        }
        self.activator.apply(&mut z);
        z
    }
}
