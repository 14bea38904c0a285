use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    broadcast::Dispatcher,
    settings::AggregationSettings,
    state_machine::{
        coordinator::CoordinatorState,
        events::{EventPublisher, EventSubscriber},
        phases::{Collect, PhaseName, PhaseState, Shared},
        requests::{RequestReceiver, RequestSender},
        StateMachine,
    },
};
use fedswipe_core::{model::ModelInitializer, GlobalModel};

type StateMachineInitializationResult<T> = Result<T, StateMachineInitializationError>;

/// Error that can occur during the initialization of the [`StateMachine`].
#[derive(Debug, Error)]
pub enum StateMachineInitializationError {
    #[error("the aggregation threshold must be at least 1")]
    InvalidThreshold,
    #[error("the model initializer produced a model without parameters")]
    EmptyModel,
}

/// The state machine initializer that initializes a new state machine.
pub struct StateMachineInitializer {
    aggregation_settings: AggregationSettings,
    initializer: Arc<dyn ModelInitializer>,
    dispatcher: Dispatcher,
}

impl StateMachineInitializer {
    /// Creates a new [`StateMachineInitializer`].
    pub fn new(
        aggregation_settings: AggregationSettings,
        initializer: Arc<dyn ModelInitializer>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            aggregation_settings,
            initializer,
            dispatcher,
        }
    }

    /// Initializes a new [`StateMachine`] with a fresh global model.
    ///
    /// # Errors
    /// Fails if the threshold is zero or if the initializer produces an empty model.
    pub fn init(
        self,
    ) -> StateMachineInitializationResult<(StateMachine, RequestSender, EventSubscriber)> {
        let threshold = self.aggregation_settings.threshold;
        if threshold == 0 {
            return Err(StateMachineInitializationError::InvalidThreshold);
        }

        let parameters = self.initializer.init();
        if parameters.num_elements() == 0 {
            return Err(StateMachineInitializationError::EmptyModel);
        }
        let model = GlobalModel::fresh(parameters);
        info!(
            "initialized global model version {} with {} parameters",
            model.version,
            model.parameters.num_elements(),
        );

        let coordinator_state = CoordinatorState::new(model, threshold);
        let (event_publisher, event_subscriber) =
            EventPublisher::init(PhaseName::Collect, coordinator_state.model.clone());
        let (request_rx, request_tx) = RequestReceiver::new();
        let shared = Shared::new(
            coordinator_state,
            event_publisher,
            request_rx,
            self.dispatcher,
            self.initializer,
        );

        let state_machine = StateMachine::from(PhaseState::<Collect>::new(shared));
        Ok((state_machine, request_tx, event_subscriber))
    }
}
