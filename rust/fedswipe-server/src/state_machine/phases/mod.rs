//! This module provides the `PhaseStates` of the [`StateMachine`].
//!
//! [`StateMachine`]: crate::state_machine::StateMachine

mod aggregate;
mod collect;
mod failure;
mod handler;
mod phase;
mod reset;
mod shutdown;

pub use self::{
    aggregate::Aggregate,
    collect::Collect,
    failure::{Failure, PhaseError},
    handler::Handler,
    phase::{Phase, PhaseName, PhaseState, Shared},
    reset::Reset,
    shutdown::Shutdown,
};
