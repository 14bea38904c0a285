//! Client contributions and their aggregation into a new global model.
//!
//! # Averaging
//!
//! Every buffered [`ClientContribution`] is weighted by the number of samples it was trained
//! on and by a staleness factor, the inverse of the number of global versions that passed
//! since the client fetched the model it trained on. Per value the new global parameter is
//!
//! ```text
//! (current * sample_sum + Σ params_c * samples_c * staleness_c) / ((n + 1) * sample_sum)
//! ```
//!
//! where `n` is the number of contributions and `sample_sum = Σ samples_c`.
//!
//! The contributions are always folded in ascending [`ClientId`] order and summed up in `f64`,
//! so the result doesn't depend on the order in which the contributions arrived.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    common::{ClientId, GlobalModel, ModelVersion},
    model::{ParameterVector, ShapeError},
};

/// The latest parameters submitted by a client in the current round.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientContribution {
    /// The client that submitted the parameters.
    pub client_id: ClientId,
    /// The locally trained parameters.
    pub parameters: ParameterVector,
    /// The global model version the client started training from.
    pub trained_from_version: ModelVersion,
    /// The number of local samples the parameters were trained on.
    pub sample_count: u32,
}

/// Errors that can occur during the aggregation of a round.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("there are no contributions to aggregate")]
    EmptyAggregation,
    #[error("the contributions were trained on zero samples in total")]
    DivideByZero,
    #[error("contribution of {client} doesn't match the global model: {source}")]
    ShapeMismatch {
        client: ClientId,
        #[source]
        source: ShapeError,
    },
}

/// The contributions of the current round, at most one per client.
#[derive(Debug, Default)]
pub struct AggregationBuffer(BTreeMap<ClientId, ClientContribution>);

impl AggregationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers a contribution.
    ///
    /// A previous contribution of the same client is replaced and returned.
    pub fn insert(&mut self, contribution: ClientContribution) -> Option<ClientContribution> {
        self.0.insert(contribution.client_id, contribution)
    }

    /// Drops the contribution of a client, if any.
    pub fn remove(&mut self, client_id: &ClientId) -> Option<ClientContribution> {
        self.0.remove(client_id)
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.0.contains_key(client_id)
    }

    /// Gets the number of buffered contributions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Takes all the buffered contributions, ordered by client id, and leaves the buffer
    /// empty.
    pub fn drain(&mut self) -> Vec<ClientContribution> {
        std::mem::take(&mut self.0).into_values().collect()
    }
}

/// Computes the staleness factor of a contribution.
///
/// The factor is `1` for a contribution trained on the current version and `1 / d` for a
/// contribution trained `d` versions ago. A version from the future counts as current.
pub fn staleness_factor(current: ModelVersion, trained_from: ModelVersion) -> f64 {
    match current.saturating_sub(trained_from) {
        0 => 1.,
        distance => 1. / distance as f64,
    }
}

/// Averages the contributions into the current global parameters.
///
/// The contributions may be given in any order. The caller is responsible for advancing the
/// version of the global model.
///
/// # Errors
/// Fails if there are no contributions, if their samples sum up to zero or if a contribution
/// doesn't have the shape of the global model.
pub fn aggregate(
    current: &GlobalModel,
    contributions: &[ClientContribution],
) -> Result<ParameterVector, AggregationError> {
    if contributions.is_empty() {
        return Err(AggregationError::EmptyAggregation);
    }

    let mut ordered: Vec<&ClientContribution> = contributions.iter().collect();
    ordered.sort_by_key(|contribution| contribution.client_id);

    for contribution in ordered.iter() {
        contribution
            .parameters
            .check_compatible(&current.parameters)
            .map_err(|source| AggregationError::ShapeMismatch {
                client: contribution.client_id,
                source,
            })?;
    }

    let sample_sum: u64 = ordered
        .iter()
        .map(|contribution| u64::from(contribution.sample_count))
        .sum();
    if sample_sum == 0 {
        return Err(AggregationError::DivideByZero);
    }
    let sample_sum = sample_sum as f64;
    let divisor = (ordered.len() + 1) as f64 * sample_sum;

    let weights: Vec<f64> = ordered
        .iter()
        .map(|contribution| {
            f64::from(contribution.sample_count)
                * staleness_factor(current.version, contribution.trained_from_version)
        })
        .collect();

    let mut sums: Vec<Vec<f64>> = current
        .parameters
        .iter()
        .map(|tensor| {
            tensor
                .values()
                .iter()
                .map(|value| f64::from(*value) * sample_sum)
                .collect()
        })
        .collect();
    for (contribution, weight) in ordered.iter().zip(weights.iter()) {
        for (sum, tensor) in sums.iter_mut().zip(contribution.parameters.iter()) {
            for (sum, value) in sum.iter_mut().zip(tensor.values()) {
                *sum += f64::from(*value) * weight;
            }
        }
    }
    let values = sums
        .into_iter()
        .map(|sum| sum.into_iter().map(|value| (value / divisor) as f32).collect())
        .collect();

    ParameterVector::from_parts(current.parameters.manifest(), values).map_err(|source| {
        AggregationError::ShapeMismatch {
            client: ordered[0].client_id,
            source,
        }
    })
}
