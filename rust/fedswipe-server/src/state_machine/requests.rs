//! Requests handled by the [`StateMachine`] and the channel they travel through.
//!
//! [`StateMachine`]: crate::state_machine::StateMachine

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use derive_more::From;
use displaydoc::Display;
use futures::Stream;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, Span};

use fedswipe_core::{
    aggregation::ClientContribution,
    model::{ParameterVector, ShapeError},
    ClientId,
    ModelVersion,
};

/// Errors which can occur while the state machine handles a request.
#[derive(Debug, Display, Error)]
pub enum RequestError {
    /// {0} is not connected.
    UnknownClient(ClientId),
    /// The update was trained from version {trained_from} but the current version is {current}.
    FutureVersion {
        trained_from: ModelVersion,
        current: ModelVersion,
    },
    /// The parameters don't match the global model: {0}.
    ShapeMismatch(#[from] ShapeError),
    /// The request could not be processed due to an internal error: {0}.
    InternalError(&'static str),
}

/// An update request.
#[derive(Debug)]
pub struct UpdateRequest {
    /// The client that submitted the update.
    pub client_id: ClientId,
    /// The locally trained parameters.
    pub parameters: ParameterVector,
    /// The global model version the client started training from.
    pub trained_from_version: ModelVersion,
    /// The number of local samples the parameters were trained on.
    pub sample_count: u32,
}

impl From<UpdateRequest> for ClientContribution {
    fn from(req: UpdateRequest) -> Self {
        let UpdateRequest {
            client_id,
            parameters,
            trained_from_version,
            sample_count,
        } = req;
        ClientContribution {
            client_id,
            parameters,
            trained_from_version,
            sample_count,
        }
    }
}

/// A disconnect notification.
#[derive(Debug)]
pub struct DisconnectRequest {
    /// The client that disconnected.
    pub client_id: ClientId,
    /// Whether the client was the last connected one.
    pub last: bool,
}

/// A [`StateMachine`] request.
///
/// [`StateMachine`]: crate::state_machine
#[derive(Debug, From)]
pub enum StateMachineRequest {
    Update(UpdateRequest),
    Disconnect(DisconnectRequest),
}

/// A handle to send requests to the [`StateMachine`].
///
/// [`StateMachine`]: crate::state_machine
#[derive(Clone, From, Debug)]
pub struct RequestSender(mpsc::UnboundedSender<(StateMachineRequest, Span, ResponseSender)>);

impl RequestSender {
    /// Sends a request to the [`StateMachine`] and waits for its response.
    ///
    /// # Errors
    /// Fails if the request was rejected, or if the [`StateMachine`] has already shut down and
    /// the `Request` channel has been closed as a result.
    ///
    /// [`StateMachine`]: crate::state_machine
    pub async fn request(&self, req: StateMachineRequest, span: Span) -> Result<(), RequestError> {
        let (resp_tx, resp_rx) = oneshot::channel::<Result<(), RequestError>>();
        self.0.send((req, span, resp_tx)).map_err(|_| {
            RequestError::InternalError(
                "failed to send request to the state machine: state machine is shutting down",
            )
        })?;
        resp_rx.await.map_err(|_| {
            RequestError::InternalError("failed to receive response from the state machine")
        })?
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// The channel the state machine answers a [`StateMachineRequest`] on.
pub(in crate::state_machine) type ResponseSender = oneshot::Sender<Result<(), RequestError>>;

/// The receiver half of the `Request` channel that is used by the [`StateMachine`] to receive
/// requests.
///
/// [`StateMachine`]: crate::state_machine
#[derive(From, Debug)]
pub struct RequestReceiver(mpsc::UnboundedReceiver<(StateMachineRequest, Span, ResponseSender)>);

impl Stream for RequestReceiver {
    type Item = (StateMachineRequest, Span, ResponseSender);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        trace!("RequestReceiver: polling");
        Pin::new(&mut self.get_mut().0).poll_recv(cx)
    }
}

impl RequestReceiver {
    /// Creates a new `Request` channel and returns the [`RequestReceiver`] as well as the
    /// [`RequestSender`] half.
    pub fn new() -> (Self, RequestSender) {
        let (tx, rx) = mpsc::unbounded_channel::<(StateMachineRequest, Span, ResponseSender)>();
        let receiver = RequestReceiver::from(rx);
        let handle = RequestSender::from(tx);
        (receiver, handle)
    }

    /// Closes the `Request` channel.
    /// See [the `tokio` documentation][close] for more information.
    ///
    /// [close]: https://docs.rs/tokio/1/tokio/sync/mpsc/struct.UnboundedReceiver.html#method.close
    pub fn close(&mut self) {
        self.0.close()
    }

    /// Receives the next request.
    /// See [the `tokio` documentation][receive] for more information.
    ///
    /// [receive]: https://docs.rs/tokio/1/tokio/sync/mpsc/struct.UnboundedReceiver.html#method.recv
    pub async fn recv(&mut self) -> Option<(StateMachineRequest, Span, ResponseSender)> {
        self.0.recv().await
    }
}
