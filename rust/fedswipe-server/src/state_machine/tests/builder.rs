use std::sync::Arc;

use crate::{
    registry::ConnectionRegistry,
    state_machine::{
        coordinator::CoordinatorState,
        events::EventSubscriber,
        phases::{self, Phase, PhaseState},
        requests::RequestSender,
        tests::utils,
        StateMachine,
    },
};
use fedswipe_core::{model::ModelInitializer, GlobalModel};

pub struct StateMachineBuilder<P> {
    coordinator_state: CoordinatorState,
    registry: ConnectionRegistry,
    initializer: Arc<dyn ModelInitializer>,
    phase_state: P,
}

impl StateMachineBuilder<phases::Collect> {
    pub fn new() -> Self {
        Self {
            coordinator_state: utils::coordinator_state(),
            registry: ConnectionRegistry::new(),
            initializer: utils::initializer(),
            phase_state: phases::Collect::new(),
        }
    }
}

impl<P> StateMachineBuilder<P>
where
    PhaseState<P>: Phase,
    StateMachine: From<PhaseState<P>>,
{
    pub fn build(self) -> (StateMachine, RequestSender, EventSubscriber) {
        let Self {
            coordinator_state,
            registry,
            initializer,
            phase_state,
        } = self;

        let (mut shared, request_tx, event_subscriber) =
            utils::init_shared(coordinator_state, registry, initializer);

        // Make sure the events that the listeners have are up to date
        shared
            .events
            .broadcast_phase(<PhaseState<P> as Phase>::NAME);

        let state = PhaseState {
            private: phase_state,
            shared,
        };

        let state_machine = StateMachine::from(state);
        (state_machine, request_tx, event_subscriber)
    }

    pub fn with_model(mut self, model: GlobalModel) -> Self {
        self.coordinator_state.model = Arc::new(model);
        self
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.coordinator_state.threshold = threshold;
        self
    }

    pub fn with_registry(mut self, registry: ConnectionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_initializer(mut self, initializer: Arc<dyn ModelInitializer>) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn with_phase<State>(self, phase_state: State) -> StateMachineBuilder<State> {
        let Self {
            coordinator_state,
            registry,
            initializer,
            ..
        } = self;
        StateMachineBuilder {
            coordinator_state,
            registry,
            initializer,
            phase_state,
        }
    }
}
