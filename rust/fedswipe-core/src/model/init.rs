//! Factories for initial parameter vectors.

use rand::{distributions::Uniform, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::model::{ParameterVector, Tensor, TensorSpec};

/// A factory for the parameters of a fresh global model.
///
/// The coordinator calls it once at startup and again every time the global model is reset.
pub trait ModelInitializer: Send + Sync {
    /// Creates a fresh parameter vector.
    fn init(&self) -> ParameterVector;
}

impl<F> ModelInitializer for F
where
    F: Fn() -> ParameterVector + Send + Sync,
{
    fn init(&self) -> ParameterVector {
        self()
    }
}

/// Initializer for a stack of fully connected layers.
///
/// Every layer contributes a `[inputs, units]` kernel drawn from a Glorot uniform
/// distribution and a `[units]` bias filled with zeros. The random generator is seeded
/// anew on every call, hence every call yields the same parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseInitializer {
    layers: Vec<usize>,
    seed: u64,
}

impl DenseInitializer {
    /// Creates an initializer for the given layer widths, input layer first.
    ///
    /// `[34, 20, 10, 2]` describes three dense layers `34 -> 20 -> 10 -> 2`.
    pub fn new(layers: Vec<usize>, seed: u64) -> Self {
        Self { layers, seed }
    }

    /// Gets the tensor layout of the parameters this initializer creates.
    pub fn manifest(&self) -> Vec<TensorSpec> {
        self.layers
            .windows(2)
            .enumerate()
            .flat_map(|(index, pair)| {
                let name = format!("dense_Dense{}", index + 1);
                vec![
                    TensorSpec::new(format!("{}/kernel", name), vec![pair[0], pair[1]]),
                    TensorSpec::new(format!("{}/bias", name), vec![pair[1]]),
                ]
            })
            .collect()
    }
}

impl ModelInitializer for DenseInitializer {
    fn init(&self) -> ParameterVector {
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        let tensors = self
            .manifest()
            .into_iter()
            .map(|spec| match spec.shape.as_slice() {
                &[fan_in, fan_out] => {
                    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt() as f32;
                    let dist = Uniform::new_inclusive(-limit, limit);
                    let values = (&mut rng)
                        .sample_iter(dist)
                        .take(spec.num_elements())
                        .collect();
                    Tensor { spec, values }
                }
                _ => Tensor::zeros(spec),
            })
            .collect();
        ParameterVector::new(tensors)
    }
}
