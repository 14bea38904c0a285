use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::state_machine::{
    phases::{Aggregate, Handler, Phase, PhaseError, PhaseName, PhaseState, Reset, Shared},
    requests::{DisconnectRequest, RequestError, StateMachineRequest, UpdateRequest},
    StateMachine,
};
use fedswipe_core::{aggregation::AggregationBuffer, INITIAL_MODEL_VERSION};

/// The collect state.
#[derive(Debug, Default)]
pub struct Collect {
    /// The contributions of the current round.
    buffer: AggregationBuffer,
    /// Whether the last client disconnected and the global model must be reset.
    reset: bool,
}

impl Collect {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &AggregationBuffer {
        &self.buffer
    }

    #[cfg(test)]
    pub fn with_buffer(buffer: AggregationBuffer) -> Self {
        Self {
            buffer,
            reset: false,
        }
    }
}

#[async_trait]
impl Phase for PhaseState<Collect> {
    const NAME: PhaseName = PhaseName::Collect;

    async fn process(&mut self) -> Result<(), PhaseError> {
        info!(
            "collecting updates for model version {} ({} required)",
            self.shared.state.model.version, self.shared.state.threshold,
        );
        while !self.is_complete() {
            let (req, span, resp_tx) = self.next_request().await?;
            self.process_single(req, span, resp_tx);
        }
        Ok(())
    }

    async fn next(self) -> Option<StateMachine> {
        let PhaseState {
            private: Collect { mut buffer, reset },
            shared,
        } = self;

        Some(if reset {
            PhaseState::<Reset>::new(shared).into()
        } else {
            PhaseState::<Aggregate>::new(shared, buffer.drain()).into()
        })
    }
}

impl Handler for PhaseState<Collect> {
    fn handle_request(&mut self, req: StateMachineRequest) -> Result<(), RequestError> {
        match req {
            StateMachineRequest::Update(req) => self.handle_update(req),
            StateMachineRequest::Disconnect(req) => {
                self.handle_disconnect(req);
                Ok(())
            }
        }
    }
}

impl PhaseState<Collect> {
    /// Creates a new collect state with an empty buffer.
    pub fn new(shared: Shared) -> Self {
        Self {
            private: Collect::new(),
            shared,
        }
    }

    /// Checks whether the round is over, either because enough contributions are buffered or
    /// because the global model must be reset.
    fn is_complete(&self) -> bool {
        self.private.reset || self.private.buffer.len() as u64 >= self.shared.state.threshold
    }

    /// Validates an update against the global model and buffers it.
    ///
    /// A second update of the same client replaces the first one.
    fn handle_update(&mut self, req: UpdateRequest) -> Result<(), RequestError> {
        let model = &self.shared.state.model;

        if !self.shared.registry().contains(req.client_id) {
            return Err(RequestError::UnknownClient(req.client_id));
        }
        if req.trained_from_version > model.version {
            return Err(RequestError::FutureVersion {
                trained_from: req.trained_from_version,
                current: model.version,
            });
        }
        req.parameters.check_compatible(&model.parameters)?;

        let client_id = req.client_id;
        if self.private.buffer.insert(req.into()).is_some() {
            debug!("{} replaced its buffered update", client_id);
        }
        debug!(
            "{} updates buffered ({} required)",
            self.private.buffer.len(),
            self.shared.state.threshold,
        );
        Ok(())
    }

    /// Drops the buffered update of a disconnected client and requests a reset if it was the
    /// last connected client.
    ///
    /// Clients that connected after the last one left receive the fresh model once the reset
    /// is done.
    fn handle_disconnect(&mut self, req: DisconnectRequest) {
        if self.private.buffer.remove(&req.client_id).is_some() {
            debug!("dropped the buffered update of {}", req.client_id);
        }

        if !req.last {
            return;
        }
        if self.shared.state.model.version == INITIAL_MODEL_VERSION {
            debug!("no clients left, the global model is still fresh");
        } else {
            warn!(
                "no clients left: discarding global model version {}",
                self.shared.state.model.version,
            );
            self.private.reset = true;
        }
    }
}
