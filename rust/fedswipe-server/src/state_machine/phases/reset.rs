use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::state_machine::{
    phases::{Collect, Phase, PhaseError, PhaseName, PhaseState, Shared},
    StateMachine,
};
use fedswipe_core::GlobalModel;

/// The reset state.
#[derive(Debug)]
pub struct Reset;

#[async_trait]
impl Phase for PhaseState<Reset> {
    const NAME: PhaseName = PhaseName::Reset;

    /// Replaces the global model with fresh parameters at the initial version.
    async fn process(&mut self) -> Result<(), PhaseError> {
        let model = Arc::new(GlobalModel::fresh(self.shared.initializer.init()));
        info!(
            "global model version {} replaced by a fresh model",
            self.shared.state.model.version,
        );
        self.shared.state.model = model.clone();
        self.shared.events.broadcast_model(model);
        Ok(())
    }

    /// Sends the fresh model to the clients that connected while the reset was pending.
    fn broadcast(&mut self) {
        if self.shared.registry().is_empty() {
            debug!("no clients to send the fresh model to");
            return;
        }
        if let Err(err) = self.shared.dispatcher.broadcast(&self.shared.state.model) {
            warn!("failed to broadcast the fresh model: {}", err);
        }
    }

    async fn next(self) -> Option<StateMachine> {
        Some(PhaseState::<Collect>::new(self.shared).into())
    }
}

impl PhaseState<Reset> {
    /// Creates a new reset state.
    pub fn new(shared: Shared) -> Self {
        Self {
            private: Reset,
            shared,
        }
    }
}
