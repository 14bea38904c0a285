use std::sync::Arc;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::{
    broadcast::Dispatcher,
    registry::ConnectionRegistry,
    state_machine::{
        coordinator::CoordinatorState,
        events::{EventPublisher, EventSubscriber},
        phases::{PhaseName, Shared},
        requests::{RequestReceiver, RequestSender, UpdateRequest},
    },
};
use fedswipe_core::{
    aggregation::ClientContribution,
    model::{ModelInitializer, ParameterVector, Tensor, TensorSpec},
    ClientId,
    GlobalModel,
    ModelVersion,
};

pub fn enable_logging() {
    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(true)
        .try_init();
}

/// A parameter vector with a single tensor `w` holding `values`.
pub fn params(values: &[f32]) -> ParameterVector {
    ParameterVector::new(vec![Tensor::new(
        TensorSpec::new("w", vec![values.len()]),
        values.to_vec(),
    )
    .unwrap()])
}

pub fn global_model(values: &[f32], version: ModelVersion) -> GlobalModel {
    GlobalModel {
        parameters: params(values),
        version,
    }
}

pub fn update(
    client_id: ClientId,
    values: &[f32],
    trained_from_version: ModelVersion,
    sample_count: u32,
) -> UpdateRequest {
    UpdateRequest {
        client_id,
        parameters: params(values),
        trained_from_version,
        sample_count,
    }
}

pub fn contribution(
    client_id: u64,
    values: &[f32],
    trained_from_version: ModelVersion,
    sample_count: u32,
) -> ClientContribution {
    update(
        ClientId::new(client_id),
        values,
        trained_from_version,
        sample_count,
    )
    .into()
}

pub fn coordinator_state() -> CoordinatorState {
    CoordinatorState::new(global_model(&[0.0], 1), 1)
}

pub fn initializer() -> Arc<dyn ModelInitializer> {
    Arc::new(|| params(&[0.0]))
}

pub fn init_shared(
    coordinator_state: CoordinatorState,
    registry: ConnectionRegistry,
    initializer: Arc<dyn ModelInitializer>,
) -> (Shared, RequestSender, EventSubscriber) {
    let (event_publisher, event_subscriber) =
        EventPublisher::init(PhaseName::Collect, coordinator_state.model.clone());
    let (request_rx, request_tx) = RequestReceiver::new();
    let shared = Shared::new(
        coordinator_state,
        event_publisher,
        request_rx,
        Dispatcher::new(registry),
        initializer,
    );
    (shared, request_tx, event_subscriber)
}
