use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::state_machine::{
    phases::{Collect, Phase, PhaseName, PhaseState, Shared, Shutdown},
    StateMachine,
};
use fedswipe_core::aggregation::AggregationError;

/// Errors which can occur during the execution of the [`StateMachine`].
#[derive(Error, Debug)]
pub enum PhaseError {
    #[error("request channel error: {0}")]
    RequestChannel(&'static str),
    #[error("aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),
}

/// The failure state.
#[derive(Debug)]
pub struct Failure {
    error: PhaseError,
}

#[cfg(test)]
impl Failure {
    pub fn error(&self) -> &PhaseError {
        &self.error
    }
}

#[async_trait]
impl Phase for PhaseState<Failure> {
    const NAME: PhaseName = PhaseName::Failure;

    async fn process(&mut self) -> Result<(), PhaseError> {
        error!("phase state error: {}", self.private.error);
        if let PhaseError::Aggregation(_) = self.private.error {
            info!(
                "round discarded, keeping global model version {}",
                self.shared.state.model.version,
            );
        }
        Ok(())
    }

    async fn next(self) -> Option<StateMachine> {
        Some(match self.private.error {
            PhaseError::RequestChannel(_) => PhaseState::<Shutdown>::new(self.shared).into(),
            _ => PhaseState::<Collect>::new(self.shared).into(),
        })
    }
}

impl PhaseState<Failure> {
    /// Creates a new failure state.
    pub fn new(shared: Shared, error: PhaseError) -> Self {
        Self {
            private: Failure { error },
            shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::tests::{builder::StateMachineBuilder, utils};

    #[tokio::test]
    async fn test_failure_to_shutdown() {
        let (state_machine, _request_tx, events) = StateMachineBuilder::new()
            .with_phase(Failure {
                error: PhaseError::RequestChannel(""),
            })
            .build();
        assert!(state_machine.is_failure());

        let state_machine = state_machine.next().await.unwrap();
        assert!(state_machine.is_shutdown());
        assert_eq!(
            events.phase_listener().get_latest().event,
            PhaseName::Failure,
        );
    }

    #[tokio::test]
    async fn test_failure_to_collect() {
        let (state_machine, _request_tx, events) = StateMachineBuilder::new()
            .with_model(utils::global_model(&[1.0], 3))
            .with_phase(Failure {
                error: AggregationError::DivideByZero.into(),
            })
            .build();

        let state_machine = state_machine.next().await.unwrap();
        assert!(state_machine.is_collect());
        assert_eq!(events.model_listener().get_latest().version, 3);
        assert_eq!(
            *state_machine.into_collect_phase_state().shared.state.model,
            utils::global_model(&[1.0], 3)
        );
    }
}
