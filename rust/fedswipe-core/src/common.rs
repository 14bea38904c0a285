//! Identifiers and the global model shared by the core and the coordinator.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::model::ParameterVector;

/// The version of a global model.
pub type ModelVersion = u64;

/// The version of a freshly initialized global model.
pub const INITIAL_MODEL_VERSION: ModelVersion = 1;

/// An opaque identifier of a connected client.
///
/// Identifiers are issued by the connection registry of the coordinator and are never
/// reused within the lifetime of a process.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Serialize, Deserialize,
)]
#[display(fmt = "client-{}", _0)]
pub struct ClientId(u64);

impl ClientId {
    /// Creates a client identifier from its raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// The authoritative global model: the parameters and the version they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalModel {
    /// The model parameters.
    pub parameters: ParameterVector,
    /// The model version, starting at [`INITIAL_MODEL_VERSION`].
    pub version: ModelVersion,
}

impl GlobalModel {
    /// Creates a global model at the initial version.
    pub fn fresh(parameters: ParameterVector) -> Self {
        Self {
            parameters,
            version: INITIAL_MODEL_VERSION,
        }
    }

    /// Creates the successor of this model with the given parameters.
    ///
    /// The version of the successor is exactly one higher.
    pub fn advance(&self, parameters: ParameterVector) -> Self {
        Self {
            parameters,
            version: self.version + 1,
        }
    }
}
