//! Model representation.
//!
//! A model is handled as an ordered sequence of named tensors, a [`ParameterVector`]. The
//! coordinator never looks into the architecture of the model: it only needs the tensor
//! manifest to check that two vectors are shape-compatible, and the values to average them.

mod init;

use std::slice::Iter;

use derive_more::From;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::init::{DenseInitializer, ModelInitializer};

/// The name and shape of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    /// The name of the tensor, e.g. `dense_Dense1/kernel`.
    pub name: String,
    /// The dimensions of the tensor. An empty shape denotes a scalar.
    pub shape: Vec<usize>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Gets the number of values a tensor with this spec holds.
    ///
    /// Saturates at `usize::MAX`, which no tensor can hold.
    pub fn num_elements(&self) -> usize {
        checked_product(&self.shape).unwrap_or(usize::MAX)
    }
}

/// Multiplies the dimensions of a shape, `None` on overflow.
pub(crate) fn checked_product(shape: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape.iter().try_fold(1_usize, |acc, dim| acc.checked_mul(*dim))
}

/// Errors related to mismatching tensor shapes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("tensor {name} expects {expected} values but got {actual}")]
    ValueCount {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("expected {expected} tensors but got {actual}")]
    TensorCount { expected: usize, actual: usize },
    #[error("tensor {index} mismatch: expected {expected:?} but got {actual:?}")]
    Spec {
        index: usize,
        expected: TensorSpec,
        actual: TensorSpec,
    },
}

/// A named tensor of `f32` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    spec: TensorSpec,
    values: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor.
    ///
    /// # Errors
    /// Fails if the number of values doesn't match the shape of the spec.
    pub fn new(spec: TensorSpec, values: Vec<f32>) -> Result<Self, ShapeError> {
        let expected = spec.num_elements();
        if values.len() != expected {
            return Err(ShapeError::ValueCount {
                name: spec.name,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { spec, values })
    }

    /// Creates a tensor filled with zeros.
    pub fn zeros(spec: TensorSpec) -> Self {
        let values = vec![0.0; spec.num_elements()];
        Self { spec, values }
    }

    pub fn spec(&self) -> &TensorSpec {
        &self.spec
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// An ordered sequence of named tensors: the full set of trainable parameters of a model.
#[derive(Debug, Clone, PartialEq, Default, From)]
pub struct ParameterVector(Vec<Tensor>);

#[allow(clippy::len_without_is_empty)]
impl ParameterVector {
    pub fn new(tensors: Vec<Tensor>) -> Self {
        Self(tensors)
    }

    /// Creates a parameter vector from a manifest and the values of each tensor.
    ///
    /// # Errors
    /// Fails if the manifest and the values don't line up.
    pub fn from_parts(
        manifest: Vec<TensorSpec>,
        values: Vec<Vec<f32>>,
    ) -> Result<Self, ShapeError> {
        if manifest.len() != values.len() {
            return Err(ShapeError::TensorCount {
                expected: manifest.len(),
                actual: values.len(),
            });
        }
        manifest
            .into_iter()
            .zip(values)
            .map(|(spec, values)| Tensor::new(spec, values))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Gets the number of tensors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Gets the total number of values over all tensors.
    pub fn num_elements(&self) -> usize {
        self.0.iter().map(|tensor| tensor.values.len()).sum()
    }

    pub fn iter(&self) -> Iter<Tensor> {
        self.0.iter()
    }

    /// Gets the ordered list of tensor specs.
    pub fn manifest(&self) -> Vec<TensorSpec> {
        self.0.iter().map(|tensor| tensor.spec.clone()).collect()
    }

    /// Checks that this vector has exactly the given tensor layout.
    ///
    /// # Errors
    /// Fails on the first tensor whose name or shape differs, or if the number of tensors
    /// differs.
    pub fn check_manifest<'a, I>(&self, expected: I) -> Result<(), ShapeError>
    where
        I: IntoIterator<Item = &'a TensorSpec>,
        I::IntoIter: ExactSizeIterator,
    {
        let expected = expected.into_iter();
        if expected.len() != self.0.len() {
            return Err(ShapeError::TensorCount {
                expected: expected.len(),
                actual: self.0.len(),
            });
        }
        for (index, (expected, tensor)) in expected.zip(self.0.iter()).enumerate() {
            if expected != &tensor.spec {
                return Err(ShapeError::Spec {
                    index,
                    expected: expected.clone(),
                    actual: tensor.spec.clone(),
                });
            }
        }
        Ok(())
    }

    /// Checks that this vector has the same tensor layout as `other`.
    pub fn check_compatible(&self, other: &ParameterVector) -> Result<(), ShapeError> {
        self.check_manifest(other.0.iter().map(|tensor| &tensor.spec))
    }
}

impl IntoIterator for ParameterVector {
    type Item = Tensor;
    type IntoIter = std::vec::IntoIter<Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParameterVector {
    type Item = &'a Tensor;
    type IntoIter = Iter<'a, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
