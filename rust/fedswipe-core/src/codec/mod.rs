//! Conversion of parameter vectors into transportable blobs and back.
//!
//! A [`ModelCodec`] turns a [`ParameterVector`] into [`EncodedWeights`]: a flat byte blob
//! plus a manifest of [`WeightSpec`]s describing how the blob is laid out. The default
//! [`Float32Codec`] concatenates the values of all tensors as little-endian `f32`s in manifest
//! order.

mod float32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::float32::Float32Codec;
use crate::model::{checked_product, ParameterVector, ShapeError, TensorSpec};

/// The data type of the values of an encoded tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
}

impl DType {
    /// Gets the number of bytes of a single value.
    pub fn size(&self) -> usize {
        match self {
            DType::Float32 => 4,
        }
    }
}

/// A manifest entry of an encoded tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl WeightSpec {
    pub fn float32(spec: TensorSpec) -> Self {
        Self {
            name: spec.name,
            shape: spec.shape,
            dtype: DType::Float32,
        }
    }

    /// Gets the number of bytes the tensor occupies in the blob.
    ///
    /// Returns `None` if the size doesn't fit into a `usize`.
    pub fn byte_len(&self) -> Option<usize> {
        checked_product(&self.shape)?.checked_mul(self.dtype.size())
    }
}

impl From<WeightSpec> for TensorSpec {
    fn from(spec: WeightSpec) -> Self {
        TensorSpec::new(spec.name, spec.shape)
    }
}

/// An encoded parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedWeights {
    /// The encoded values of all tensors.
    pub data: Vec<u8>,
    /// The layout of `data`.
    pub specs: Vec<WeightSpec>,
}

/// Errors related to decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 blob: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported data type {0:?}")]
    UnsupportedDType(DType),
    #[error("the size of tensor {0} overflows")]
    Overflow(String),
    #[error("blob holds {actual} bytes but the manifest describes {expected} bytes")]
    Length { expected: usize, actual: usize },
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// A pluggable (de)serializer of parameter vectors.
pub trait ModelCodec: Send + Sync {
    /// Encodes the parameters.
    fn encode(&self, parameters: &ParameterVector) -> EncodedWeights;

    /// Decodes parameters.
    ///
    /// # Errors
    /// Fails if the blob doesn't match its manifest.
    fn decode(&self, weights: EncodedWeights) -> Result<ParameterVector, DecodeError>;
}
