use async_trait::async_trait;

use crate::state_machine::{
    phases::{Phase, PhaseError, PhaseName, PhaseState, Shared},
    StateMachine,
};

/// The shutdown state.
#[derive(Debug)]
pub struct Shutdown;

#[async_trait]
impl Phase for PhaseState<Shutdown> {
    const NAME: PhaseName = PhaseName::Shutdown;

    /// Shuts down the [`StateMachine`].
    ///
    /// See the [module level documentation] for more details.
    ///
    /// [module level documentation]: crate::state_machine
    async fn process(&mut self) -> Result<(), PhaseError> {
        // clear the request channel
        self.shared.request_rx.close();
        while self.shared.request_rx.recv().await.is_some() {}
        Ok(())
    }

    async fn next(self) -> Option<StateMachine> {
        None
    }
}

impl PhaseState<Shutdown> {
    /// Creates a new shutdown state.
    pub fn new(shared: Shared) -> Self {
        Self {
            private: Shutdown,
            shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::tests::builder::StateMachineBuilder;

    #[tokio::test]
    async fn test_shutdown_closes_request_channel() {
        let (state_machine, request_tx, events) = StateMachineBuilder::new()
            .with_phase(Shutdown)
            .build();
        assert!(state_machine.is_shutdown());

        assert!(state_machine.next().await.is_none());
        assert!(request_tx.is_closed());
        assert_eq!(
            events.phase_listener().get_latest().event,
            PhaseName::Shutdown
        );
    }
}
