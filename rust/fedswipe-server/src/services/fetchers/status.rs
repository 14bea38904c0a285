use std::task::{Context, Poll};

use futures::future::{self, Ready};
use serde::{Deserialize, Serialize};
use tower::Service;
use tracing::{error_span, instrument::Instrumented, Instrument};

use crate::{
    registry::ConnectionRegistry,
    state_machine::{
        events::{EventListener, EventSubscriber},
        phases::PhaseName,
    },
};
use fedswipe_core::{GlobalModel, ModelVersion};

/// [`StatusService`]'s request type
#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub struct StatusRequest;

/// [`StatusService`]'s response type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// The version of the latest global model.
    pub model_version: ModelVersion,
    /// The number of connected clients.
    pub connected_clients: usize,
    /// The current phase of the coordinator.
    pub phase: String,
}

/// A service that serves an overview of the coordinator
pub struct StatusService {
    phase: EventListener<PhaseName>,
    model: EventListener<std::sync::Arc<GlobalModel>>,
    registry: ConnectionRegistry,
}

impl StatusService {
    pub fn new(events: &EventSubscriber, registry: ConnectionRegistry) -> Self {
        Self {
            phase: events.phase_listener(),
            model: events.model_listener(),
            registry,
        }
    }
}

impl Service<StatusRequest> for StatusService {
    type Response = StatusResponse;
    type Error = std::convert::Infallible;
    type Future = Instrumented<Ready<Result<Self::Response, Self::Error>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: StatusRequest) -> Self::Future {
        let status = StatusResponse {
            model_version: self.model.get_latest().event.version,
            connected_clients: self.registry.len(),
            phase: self.phase.get_latest().event.to_string(),
        };
        future::ready(Ok(status)).instrument(error_span!("status_fetch_request"))
    }
}
