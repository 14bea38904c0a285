//! This module implements the services of the coordinator.
//!
//! There are two main types of services:
//!
//! - the services for fetching data published by the state machine:
//!   - [`ModelService`]: for fetching the latest global model
//!   - [`StatusService`]: for fetching the model version, the number of connected clients and
//!     the current phase
//! - the services for handling the updates of the clients:
//!   - [`MessageParser`]: parses incoming messages and decodes the weights
//!   - [`StateMachine`]: passes the updates down to the state machine for actual processing
//!
//! The [`Fetcher`] trait provides a unified interface for the first
//! category of services. The [`SubmissionHandler`] is an interface for the
//! second category of services.
//!
//! [`ModelService`]: crate::services::fetchers::ModelService
//! [`StatusService`]: crate::services::fetchers::StatusService
//! [`MessageParser`]: crate::services::messages::MessageParser
//! [`StateMachine`]: crate::services::messages::StateMachine
//! [`Fetcher`]: crate::services::fetchers::Fetcher
//! [`SubmissionHandler`]: crate::services::messages::SubmissionHandler

pub mod fetchers;
pub mod messages;

#[cfg(test)]
pub(crate) mod tests;
