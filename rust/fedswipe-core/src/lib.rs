#![cfg_attr(docsrs, feature(doc_cfg))]
//! # fedswipe core
//!
//! Building blocks of the fedswipe coordinator that do not perform any I/O:
//!
//! - [`model`]: named tensors, parameter vectors and the initial parameter factory.
//! - [`aggregation`]: client contributions, the per-round aggregation buffer and the
//!   staleness-aware averaging engine.
//! - [`codec`]: conversion between parameter vectors and transportable byte blobs.
//! - [`message`]: the JSON envelopes exchanged with the clients.
//!
//! The coordinator itself (state machine, connection registry, HTTP API) lives in the
//! `fedswipe-server` crate.

pub mod aggregation;
pub mod codec;
pub mod common;
pub mod message;
pub mod model;

pub use self::{
    common::{ClientId, GlobalModel, ModelVersion, INITIAL_MODEL_VERSION},
    model::{ParameterVector, Tensor, TensorSpec},
};
