use std::{fmt, sync::Arc};

use async_trait::async_trait;
use derive_more::Display;
use futures::StreamExt;
use tracing::{debug, error, error_span, info, Instrument, Span};

use crate::{
    broadcast::Dispatcher,
    registry::ConnectionRegistry,
    state_machine::{
        coordinator::CoordinatorState,
        events::EventPublisher,
        phases::{Failure, PhaseError},
        requests::{RequestReceiver, ResponseSender, StateMachineRequest},
        StateMachine,
    },
};
use fedswipe_core::model::ModelInitializer;

/// The name of the current phase.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum PhaseName {
    #[display(fmt = "Collect")]
    Collect,
    #[display(fmt = "Aggregate")]
    Aggregate,
    #[display(fmt = "Reset")]
    Reset,
    #[display(fmt = "Failure")]
    Failure,
    #[display(fmt = "Shutdown")]
    Shutdown,
}

/// A trait that must be implemented by a state in order to move to a next state.
///
/// See the [module level documentation] for more details.
///
/// [module level documentation]: crate::state_machine
#[async_trait]
pub trait Phase {
    /// The name of the current phase.
    const NAME: PhaseName;

    /// Performs the tasks of this phase.
    async fn process(&mut self) -> Result<(), PhaseError>;

    /// Broadcasts data of this phase (nothing by default).
    fn broadcast(&mut self) {}

    /// Moves from this phase to the next phase.
    async fn next(self) -> Option<StateMachine>;
}

/// A struct that contains the coordinator state and the I/O interfaces that are shared and
/// accessible by all `PhaseState`s.
pub struct Shared {
    /// The coordinator state.
    pub(in crate::state_machine) state: CoordinatorState,
    /// The request receiver half.
    pub(in crate::state_machine) request_rx: RequestReceiver,
    /// The event publisher.
    pub(in crate::state_machine) events: EventPublisher,
    /// The dispatcher pushing new global models to the connected clients.
    pub(in crate::state_machine) dispatcher: Dispatcher,
    /// The factory for fresh global model parameters.
    pub(in crate::state_machine) initializer: Arc<dyn ModelInitializer>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("state", &self.state)
            .field("request_rx", &self.request_rx)
            .field("events", &self.events)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Shared {
    /// Creates a new shared state.
    pub fn new(
        coordinator_state: CoordinatorState,
        publisher: EventPublisher,
        request_rx: RequestReceiver,
        dispatcher: Dispatcher,
        initializer: Arc<dyn ModelInitializer>,
    ) -> Self {
        Self {
            state: coordinator_state,
            request_rx,
            events: publisher,
            dispatcher,
            initializer,
        }
    }

    /// Returns the registry of the connected clients.
    pub fn registry(&self) -> &ConnectionRegistry {
        self.dispatcher.registry()
    }
}

/// The state corresponding to a phase of the coordinator.
///
/// This contains the state-dependent `private` state and the state-independent `shared` state
/// which is shared across state transitions.
#[derive(Debug)]
pub struct PhaseState<S> {
    /// The private state.
    pub(in crate::state_machine) private: S,
    /// The shared coordinator state and I/O interfaces.
    pub(in crate::state_machine) shared: Shared,
}

impl<S> PhaseState<S>
where
    S: Send,
    Self: Phase,
{
    /// Runs the current phase to completion.
    ///
    /// 1. Performs the phase tasks.
    /// 2. Broadcasts the phase data.
    /// 3. Transitions to the next phase.
    pub async fn run_phase(mut self) -> Option<StateMachine> {
        let phase = Self::NAME;
        let span = error_span!("run_phase", phase = %phase);

        async move {
            info!("starting phase");
            self.shared.events.broadcast_phase(phase);

            if let Err(err) = self.process().await {
                error!("failed to perform the phase tasks");
                return Some(self.into_failure_state(err));
            }
            info!("phase ran successfully");

            self.broadcast();

            info!("transitioning to the next phase");
            self.next().await
        }
        .instrument(span)
        .await
    }
}

impl<S> PhaseState<S> {
    /// Receives the next [`StateMachineRequest`].
    ///
    /// # Errors
    /// Returns [`PhaseError::RequestChannel`] when all sender halves have been dropped.
    pub async fn next_request(
        &mut self,
    ) -> Result<(StateMachineRequest, Span, ResponseSender), PhaseError> {
        debug!("waiting for the next incoming request");
        self.shared.request_rx.next().await.ok_or_else(|| {
            error!("request receiver broken: senders have been dropped");
            PhaseError::RequestChannel("all message senders have been dropped!")
        })
    }

    fn into_failure_state(self, err: PhaseError) -> StateMachine {
        PhaseState::<Failure>::new(self.shared, err).into()
    }
}
