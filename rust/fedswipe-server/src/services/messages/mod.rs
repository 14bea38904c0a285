//! This module provides the services for processing the updates submitted by the clients.
//!
//! There are two such services and the [`SubmissionHandler`] provides a single unifying
//! interface for them:
//!
//! 1. The [`MessageParser`] parses the JSON message, decodes the weights blob and performs the
//!    checks that don't need the global model.
//! 2. The [`StateMachine`] service hands the update to the state machine, which validates it
//!    against the global model and buffers it.

mod error;
mod message_parser;
mod state_machine;

use std::{pin::Pin, sync::Arc};

use futures::{future::poll_fn, Future};
use rayon::ThreadPool;
use tower::Service;
use tracing::{error_span, Instrument};

pub use self::{
    error::ServiceError,
    message_parser::{MessageParser, RawUpdate},
    state_machine::StateMachine,
};
use crate::state_machine::requests::{DisconnectRequest, RequestSender, UpdateRequest};
use fedswipe_core::{codec::ModelCodec, ClientId};

/// A boxed future returned by the submission services.
pub type BoxedServiceFuture<Response, Error> =
    Pin<Box<dyn Future<Output = Result<Response, Error>> + 'static + Send>>;

/// A single interface for all the submission processing sub-services.
#[derive(Debug, Clone)]
pub struct SubmissionHandler {
    message_parser: MessageParser,
    state_machine: StateMachine,
}

impl SubmissionHandler {
    pub fn new(
        requests_tx: RequestSender,
        codec: Arc<dyn ModelCodec>,
        thread_pool: Arc<ThreadPool>,
    ) -> Self {
        Self {
            message_parser: MessageParser::new(codec, thread_pool),
            state_machine: StateMachine::new(requests_tx),
        }
    }

    /// Parses an update message of a client and has it buffered by the state machine.
    ///
    /// # Errors
    /// Fails if the message is invalid or if the state machine rejects the update.
    pub async fn handle_message(
        &mut self,
        client_id: ClientId,
        payload: String,
    ) -> Result<(), ServiceError> {
        let span = error_span!("submission", client_id = %client_id, length = payload.len());
        async move {
            poll_fn(|cx| {
                <MessageParser as Service<RawUpdate>>::poll_ready(&mut self.message_parser, cx)
            })
            .await?;
            let update = self
                .message_parser
                .call(RawUpdate { client_id, payload })
                .await?;

            poll_fn(|cx| {
                <StateMachine as Service<UpdateRequest>>::poll_ready(&mut self.state_machine, cx)
            })
            .await?;
            self.state_machine.call(update).await
        }
        .instrument(span)
        .await
    }

    /// Tells the state machine that a client is gone.
    ///
    /// `last` tells whether the client was the last connected one.
    pub async fn handle_disconnect(
        &mut self,
        client_id: ClientId,
        last: bool,
    ) -> Result<(), ServiceError> {
        poll_fn(|cx| {
            <StateMachine as Service<DisconnectRequest>>::poll_ready(&mut self.state_machine, cx)
        })
        .await?;
        self.state_machine
            .call(DisconnectRequest { client_id, last })
            .await
    }
}

#[cfg(test)]
mod tests {
    use rayon::ThreadPoolBuilder;

    use super::*;
    use crate::{
        registry::ConnectionRegistry,
        services::tests::utils,
        state_machine::{
            requests::RequestError,
            tests::{builder::StateMachineBuilder, utils as sm_utils},
        },
    };
    use fedswipe_core::codec::Float32Codec;

    fn handler(requests_tx: RequestSender) -> SubmissionHandler {
        let thread_pool = Arc::new(ThreadPoolBuilder::new().num_threads(1).build().unwrap());
        SubmissionHandler::new(requests_tx, Arc::new(Float32Codec), thread_pool)
    }

    #[tokio::test]
    async fn test_submission_reaches_state_machine() {
        let registry = ConnectionRegistry::new();
        let (client_id, _rx) = registry.connect();
        let (state_machine, request_tx, events) = StateMachineBuilder::new()
            .with_registry(registry)
            .with_model(sm_utils::global_model(&[2.0], 1))
            .with_threshold(1)
            .build();
        let mut handler = handler(request_tx);

        let payload = utils::update_message(&sm_utils::params(&[4.0]), 1, 1);
        let (resp, state_machine) =
            tokio::join!(handler.handle_message(client_id, payload), state_machine.next());
        resp.unwrap();

        let state_machine = state_machine.unwrap();
        assert!(state_machine.is_aggregate());
        state_machine.next().await.unwrap();
        assert_eq!(
            *events.model_listener().get_latest().event,
            sm_utils::global_model(&[3.0], 2)
        );
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_rejected() {
        let registry = ConnectionRegistry::new();
        let (client_id, _rx) = registry.connect();
        let (state_machine, request_tx, _events) = StateMachineBuilder::new()
            .with_registry(registry)
            .build();
        let mut handler = handler(request_tx);

        let payload = utils::update_message(&sm_utils::params(&[4.0, 5.0]), 1, 1);
        let requests = async {
            let resp = handler.handle_message(client_id, payload).await;
            drop(handler);
            resp
        };
        let (resp, state_machine) = tokio::join!(requests, state_machine.next());
        assert!(matches!(
            resp,
            Err(ServiceError::StateMachine(RequestError::ShapeMismatch(_)))
        ));
        // all senders are gone
        assert!(state_machine.unwrap().is_failure());
    }

    #[tokio::test]
    async fn test_invalid_message_never_reaches_state_machine() {
        let (state_machine, request_tx, _events) = StateMachineBuilder::new().build();
        let mut handler = handler(request_tx);

        let resp = handler
            .handle_message(ClientId::new(1), "not json".to_string())
            .await;
        assert!(matches!(resp, Err(ServiceError::Parsing(_))));

        drop(handler);
        assert!(state_machine.next().await.unwrap().is_failure());
    }
}
