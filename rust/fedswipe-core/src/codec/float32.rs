use std::convert::TryInto;

use crate::{
    codec::{DType, DecodeError, EncodedWeights, ModelCodec, WeightSpec},
    model::ParameterVector,
};

/// Codec that lays out the tensors as little-endian `f32` values in manifest order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Float32Codec;

impl ModelCodec for Float32Codec {
    fn encode(&self, parameters: &ParameterVector) -> EncodedWeights {
        let mut data = Vec::with_capacity(parameters.num_elements() * DType::Float32.size());
        let mut specs = Vec::with_capacity(parameters.len());
        for tensor in parameters {
            data.extend(tensor.values().iter().flat_map(|value| value.to_le_bytes()));
            specs.push(WeightSpec::float32(tensor.spec().clone()));
        }
        EncodedWeights { data, specs }
    }

    fn decode(&self, weights: EncodedWeights) -> Result<ParameterVector, DecodeError> {
        let EncodedWeights { data, specs } = weights;

        if let Some(spec) = specs.iter().find(|spec| spec.dtype != DType::Float32) {
            return Err(DecodeError::UnsupportedDType(spec.dtype));
        }
        let mut lengths = Vec::with_capacity(specs.len());
        let mut expected = 0_usize;
        for spec in specs.iter() {
            let overflow = || DecodeError::Overflow(spec.name.clone());
            let len = spec.byte_len().ok_or_else(overflow)?;
            expected = expected.checked_add(len).ok_or_else(overflow)?;
            lengths.push(len);
        }
        if data.len() != expected {
            return Err(DecodeError::Length {
                expected,
                actual: data.len(),
            });
        }

        let mut offset = 0;
        let mut values = Vec::with_capacity(specs.len());
        for len in lengths {
            let end = offset + len;
            let tensor_values = data[offset..end]
                .chunks_exact(4)
                .filter_map(|chunk| chunk.try_into().ok().map(f32::from_le_bytes))
                .collect::<Vec<f32>>();
            values.push(tensor_values);
            offset = end;
        }

        let manifest = specs.into_iter().map(Into::into).collect();
        Ok(ParameterVector::from_parts(manifest, values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Tensor, TensorSpec};

    fn params() -> ParameterVector {
        ParameterVector::new(vec![
            Tensor::new(TensorSpec::new("k", vec![2, 2]), vec![1.0, -2.5, 0.0, 3.25]).unwrap(),
            Tensor::new(TensorSpec::new("b", vec![2]), vec![0.5, f32::MIN_POSITIVE]).unwrap(),
        ])
    }

    #[test]
    fn test_encode_layout() {
        let encoded = Float32Codec.encode(&params());
        assert_eq!(encoded.data.len(), 6 * 4);
        assert_eq!(&encoded.data[..4], &1.0f32.to_le_bytes());
        assert_eq!(&encoded.data[4..8], &(-2.5f32).to_le_bytes());
        assert_eq!(&encoded.data[16..20], &0.5f32.to_le_bytes());
        assert_eq!(
            encoded.specs,
            vec![
                WeightSpec {
                    name: "k".to_string(),
                    shape: vec![2, 2],
                    dtype: DType::Float32,
                },
                WeightSpec {
                    name: "b".to_string(),
                    shape: vec![2],
                    dtype: DType::Float32,
                },
            ]
        );
    }

    #[test]
    fn test_decode() {
        let decoded = Float32Codec.decode(Float32Codec.encode(&params())).unwrap();
        assert_eq!(decoded, params());
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut encoded = Float32Codec.encode(&params());
        encoded.data.pop();
        assert!(matches!(
            Float32Codec.decode(encoded),
            Err(DecodeError::Length {
                expected: 24,
                actual: 23
            })
        ));
    }

    #[test]
    fn test_decode_overflowing_manifest() {
        // the total size wraps around to 4 bytes
        let weights = EncodedWeights {
            data: vec![0; 4],
            specs: vec![
                WeightSpec {
                    name: "a".to_string(),
                    shape: vec![usize::MAX / 4],
                    dtype: DType::Float32,
                },
                WeightSpec {
                    name: "b".to_string(),
                    shape: vec![2],
                    dtype: DType::Float32,
                },
            ],
        };
        assert!(matches!(
            Float32Codec.decode(weights),
            Err(DecodeError::Overflow(name)) if name == "b"
        ));

        let weights = EncodedWeights {
            data: vec![0; 4],
            specs: vec![WeightSpec {
                name: "w".to_string(),
                shape: vec![usize::MAX, 2],
                dtype: DType::Float32,
            }],
        };
        assert!(matches!(
            Float32Codec.decode(weights),
            Err(DecodeError::Overflow(name)) if name == "w"
        ));
    }

    #[test]
    fn test_decode_empty_dimension() {
        let weights = EncodedWeights {
            data: Vec::new(),
            specs: vec![WeightSpec {
                name: "w".to_string(),
                shape: vec![usize::MAX, usize::MAX, 0],
                dtype: DType::Float32,
            }],
        };
        let decoded = Float32Codec.decode(weights).unwrap();
        assert_eq!(decoded.num_elements(), 0);
    }
}
