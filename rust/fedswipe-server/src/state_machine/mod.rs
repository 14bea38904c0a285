//! The state machine that owns the global model and runs the aggregation rounds.
//!
//! # Overview
//!
//! ```text
//!             +-----------+  threshold reached  +-----------+
//!   init ---> |  Collect  | ------------------> | Aggregate |
//!             +-----------+ <------------------ +-----------+
//!               |     ^                               |
//!  no clients   |     |                               | aggregation error
//!    left       v     |                               v
//!             +-----------+                     +-----------+
//!             |   Reset   |                     |  Failure  | ---> Shutdown
//!             +-----------+                     +-----------+
//! ```
//!
//! The [`StateMachine`] is the only writer of the global model and of the aggregation buffer.
//! Everything else reads the global model through the events it publishes or talks to it via
//! requests, hence buffering an update, averaging a round and advancing the version never
//! interleave.
//!
//! # Phase states
//!
//! **Collect**
//!
//! Publishes [`PhaseName::Collect`] and handles requests one at a time. An update is checked
//! against the global model and buffered, replacing an earlier update of the same client. A
//! disconnect drops the buffered update of the client. The phase ends once the number of
//! buffered updates reaches the configured threshold, or once the last client is gone while
//! the global model is not fresh.
//!
//! **Aggregate**
//!
//! Publishes [`PhaseName::Aggregate`], averages the buffered updates into the global model,
//! advances its version by one, publishes the new model and sends it to every connected
//! client. Requests arriving in the meantime wait in the request channel.
//!
//! **Reset**
//!
//! Publishes [`PhaseName::Reset`] and replaces the global model with fresh parameters at the
//! initial version.
//!
//! **Failure**
//!
//! Publishes [`PhaseName::Failure`] and handles [`PhaseError`]s. A failed aggregation discards
//! the round and keeps the global model. If a [`PhaseError::RequestChannel`] occurs, the
//! [`StateMachine`] shuts down.
//!
//! **Shutdown**
//!
//! Publishes [`PhaseName::Shutdown`] and shuts down the [`StateMachine`]. During the shutdown,
//! the [`StateMachine`] closes the request channel and consumes all remaining requests.
//!
//! # Requests
//!
//! [`StateMachineInitializer::init()`] creates the request channel. The sender half
//! ([`RequestSender`]) is handed to the caller, whereas the receiver half
//! ([`RequestReceiver`]) is used by the [`StateMachine`].
//!
//! # Events
//!
//! The current phase and the latest global model are published as events. Everyone who is
//! interested in them can subscribe via the [`EventSubscriber`] returned by
//! [`StateMachineInitializer::init()`].
//!
//! [`PhaseName::Collect`]: crate::state_machine::phases::PhaseName::Collect
//! [`PhaseName::Aggregate`]: crate::state_machine::phases::PhaseName::Aggregate
//! [`PhaseName::Reset`]: crate::state_machine::phases::PhaseName::Reset
//! [`PhaseName::Failure`]: crate::state_machine::phases::PhaseName::Failure
//! [`PhaseName::Shutdown`]: crate::state_machine::phases::PhaseName::Shutdown
//! [`PhaseError`]: crate::state_machine::phases::PhaseError
//! [`PhaseError::RequestChannel`]: crate::state_machine::phases::PhaseError::RequestChannel
//! [`RequestReceiver`]: crate::state_machine::requests::RequestReceiver

pub mod coordinator;
pub mod events;
pub mod initializer;
pub mod phases;
pub mod requests;

#[cfg(test)]
pub(crate) mod tests;

use derive_more::From;

pub use self::{
    events::EventSubscriber,
    initializer::{StateMachineInitializationError, StateMachineInitializer},
    requests::{RequestError, RequestSender},
};
use self::phases::{Aggregate, Collect, Failure, PhaseState, Reset, Shutdown};

/// The state machine with all its states.
#[derive(From)]
pub enum StateMachine {
    Collect(PhaseState<Collect>),
    Aggregate(PhaseState<Aggregate>),
    Reset(PhaseState<Reset>),
    Failure(PhaseState<Failure>),
    Shutdown(PhaseState<Shutdown>),
}

impl StateMachine {
    /// Moves the [`StateMachine`] to the next state and consumes the current one.
    ///
    /// Returns the next state or `None` if the [`StateMachine`] reached the state [`Shutdown`].
    pub async fn next(self) -> Option<Self> {
        match self {
            StateMachine::Collect(state) => state.run_phase().await,
            StateMachine::Aggregate(state) => state.run_phase().await,
            StateMachine::Reset(state) => state.run_phase().await,
            StateMachine::Failure(state) => state.run_phase().await,
            StateMachine::Shutdown(state) => state.run_phase().await,
        }
    }

    /// Runs the state machine until it shuts down.
    ///
    /// The [`StateMachine`] shuts down once all [`RequestSender`]s have been dropped.
    pub async fn run(mut self) -> Option<()> {
        loop {
            self = self.next().await?;
        }
    }
}
