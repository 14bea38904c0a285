use thiserror::Error;

use crate::state_machine::requests::RequestError;
use fedswipe_core::{codec::DecodeError, ModelVersion};

/// Error type for the submission services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to parse the message: {0}")]
    Parsing(#[from] DecodeError),

    #[error("invalid sample count {0}: at least one sample is required")]
    InvalidSampleCount(u32),

    #[error("invalid model version {0}: versions start at 1")]
    InvalidVersion(ModelVersion),

    #[error("the update was rejected: {0}")]
    StateMachine(RequestError),

    #[error("internal error: {0}")]
    InternalError(String),
}
