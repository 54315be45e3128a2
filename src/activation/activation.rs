use serde::{Serialize, Deserialize};

/// Non-linearity applied after a linear layer.
///
/// Hidden layers use `ReLU`; the output layer uses `LogSoftmax`, which is
/// vector-valued and therefore applied through `apply()` rather than
/// element-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    ReLU,
    LogSoftmax,
}

impl ActivationFunction {
    /// Applies the activation to a whole layer output in place.
    pub fn apply(&self, values: &mut [f32]) {
        match self {
            ActivationFunction::ReLU => {
                for x in values.iter_mut() {
                    if *x < 0.0 {
                        *x = 0.0;
                    }
                }
            }
            ActivationFunction::LogSoftmax => log_softmax(values),
        }
    }
}

/// Numerically stable log-softmax: x_i - max - ln(sum(exp(x_j - max))).
fn log_softmax(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let log_sum = values.iter().map(|x| (x - max).exp()).sum::<f32>().ln();
    for x in values.iter_mut() {
        *x = *x - max - log_sum;
    }
}
