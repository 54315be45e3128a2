use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Element type of every stored tensor. Artifacts carry this tag per tensor.
pub const DTYPE_F32: &str = "f32";

/// A dense row-major `f32` tensor.
///
/// `data.len()` always equals the product of `shape`; the constructors that
/// take raw data check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor", into = "RawTensor")]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// # Panics
    /// Panics if the element count of `shape` overflows `usize`.
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![0.0; checked_count(shape)],
        }
    }

    /// Builds a tensor from row-major data, or `None` if the lengths disagree
    /// or the shape's element count overflows.
    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Option<Tensor> {
        if element_count(&shape)? != data.len() {
            return None;
        }
        Some(Tensor { shape, data })
    }

    /// Samples every element from U(-bound, bound).
    ///
    /// With `bound = 1/sqrt(fan_in)` this is the usual fan-in initialization
    /// for linear layers.
    ///
    /// # Panics
    /// Panics if the element count of `shape` overflows `usize`.
    pub fn uniform<R: Rng + ?Sized>(shape: &[usize], bound: f32, rng: &mut R) -> Tensor {
        let dist = Uniform::new_inclusive(-bound, bound);
        let data = (0..checked_count(shape)).map(|_| dist.sample(rng)).collect();
        Tensor { shape: shape.to_vec(), data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the little-endian payload this tensor occupies in an artifact.
    pub fn byte_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Appends the data as little-endian `f32` bytes.
    pub fn write_le_bytes(&self, out: &mut Vec<u8>) {
        out.reserve(self.byte_len());
        for x in &self.data {
            out.extend_from_slice(&x.to_le_bytes());
        }
    }

    /// Reads a tensor of `shape` from little-endian bytes, or `None` if the
    /// byte count does not match the shape.
    pub fn from_le_bytes(shape: Vec<usize>, bytes: &[u8]) -> Option<Tensor> {
        let width = std::mem::size_of::<f32>();
        if bytes.len() != element_count(&shape)?.checked_mul(width)? {
            return None;
        }
        let data = bytes
            .chunks_exact(width)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Tensor { shape, data })
    }

    /// Matrix-vector product for a `[rows, cols]` tensor: returns `self · x`.
    ///
    /// # Panics
    /// Panics if the tensor is not 2-D or `x.len() != cols`.
    pub fn matvec(&self, x: &[f32]) -> Vec<f32> {
        assert_eq!(self.shape.len(), 2, "matvec needs a 2-D tensor");
        let cols = self.shape[1];
        assert_eq!(x.len(), cols, "Matrix and vector are of incorrect sizes");

        self.data
            .chunks_exact(cols)
            .map(|row| row.iter().zip(x).map(|(w, v)| w * v).sum())
            .collect()
    }
}

/// Product of the dimensions; 1 for a scalar (empty shape). `None` when the
/// product overflows `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

fn checked_count(shape: &[usize]) -> usize {
    match element_count(shape) {
        Some(n) => n,
        None => panic!("shape {shape:?} has more elements than fit in memory"),
    }
}

// ---------------------------------------------------------------------------
// Serde representation
// ---------------------------------------------------------------------------

/// On-disk form used by the JSON checkpoint format.
#[derive(Serialize, Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    dtype: String,
    data: Vec<f32>,
}

impl From<Tensor> for RawTensor {
    fn from(t: Tensor) -> Self {
        RawTensor { shape: t.shape, dtype: DTYPE_F32.to_string(), data: t.data }
    }
}

impl TryFrom<RawTensor> for Tensor {
    type Error = String;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        if raw.dtype != DTYPE_F32 {
            return Err(format!("unsupported dtype {:?}", raw.dtype));
        }
        let Some(expected) = element_count(&raw.shape) else {
            return Err(format!("shape {:?} has too many elements", raw.shape));
        };
        let actual = raw.data.len();
        Tensor::from_vec(raw.shape, raw.data).ok_or_else(|| {
            format!("tensor data has {actual} elements, shape needs {expected}")
        })
    }
}
