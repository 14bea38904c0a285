//! Websocket sessions of the clients.
//!
//! Every session registers its client in the [`ConnectionRegistry`], pushes the current global
//! model, forwards the updates of the client to the [`SubmissionHandler`] and drains the
//! outbound channel of the client into the socket. When the socket closes, the client is
//! unregistered and the state machine is told that it is gone.
//!
//! [`ConnectionRegistry`]: crate::registry::ConnectionRegistry

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tracing::{debug, error_span, info, warn, Instrument};
use warp::ws::{Message, WebSocket};

use crate::{
    broadcast::Dispatcher,
    registry::{ClientReceiver, Outbound},
    services::messages::SubmissionHandler,
    state_machine::events::{EventListener, EventSubscriber},
};
use fedswipe_core::{message::RejectionMessage, ClientId, GlobalModel};

/// Everything a client session needs. Cloned into every new session.
#[derive(Debug, Clone)]
pub struct Sessions {
    dispatcher: Dispatcher,
    handler: SubmissionHandler,
    models: EventListener<Arc<GlobalModel>>,
}

impl Sessions {
    pub fn new(
        dispatcher: Dispatcher,
        handler: SubmissionHandler,
        event_subscriber: &EventSubscriber,
    ) -> Self {
        Self {
            dispatcher,
            handler,
            models: event_subscriber.model_listener(),
        }
    }

    /// Runs a session until the socket is closed.
    pub async fn run(self, socket: WebSocket) {
        let registry = self.dispatcher.registry().clone();
        let (client_id, outbound_rx) = registry.connect();
        let span = error_span!("session", client_id = %client_id);

        async move {
            info!("client connected");
            let mut session = self;
            session.serve(client_id, socket, outbound_rx).await;

            let last = registry.disconnect(client_id);
            if last {
                info!("last client disconnected");
            } else {
                info!("client disconnected");
            }
            if let Err(err) = session.handler.handle_disconnect(client_id, last).await {
                warn!("failed to notify the state machine: {}", err);
            }
        }
        .instrument(span)
        .await
    }

    async fn serve(&mut self, client_id: ClientId, socket: WebSocket, mut outbound_rx: ClientReceiver) {
        let (mut ws_tx, mut ws_rx) = socket.split();

        let models = &self.models;
        if let Err(err) = self
            .dispatcher
            .push_current(client_id, || models.get_latest().event)
        {
            warn!("failed to push the current model: {}", err);
        }

        let writer = async {
            while let Some(outbound) = outbound_rx.recv().await {
                if let Err(err) = ws_tx.send(Message::text(outbound.as_ref())).await {
                    debug!("failed to write to the socket: {}", err);
                    break;
                }
            }
            let _ = ws_tx.close().await;
        };

        let dispatcher = &self.dispatcher;
        let handler = &mut self.handler;
        let reader = async {
            while let Some(message) = ws_rx.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(err) => {
                        debug!("failed to read from the socket: {}", err);
                        break;
                    }
                };
                if message.is_close() {
                    break;
                }
                let text = match message.to_str() {
                    Ok(text) => text.to_string(),
                    Err(()) => {
                        debug!("ignoring non-text message");
                        continue;
                    }
                };

                if let Err(err) = handler.handle_message(client_id, text).await {
                    info!("update rejected: {}", err);
                    if let Err(err) = reject(dispatcher, client_id, err) {
                        debug!("failed to send the rejection: {}", err);
                    }
                }
            }
        };

        tokio::select! {
            _ = writer => {}
            _ = reader => {}
        }
    }
}

/// Sends the reason of a rejection back to the client.
fn reject(
    dispatcher: &Dispatcher,
    client_id: ClientId,
    reason: impl ToString,
) -> Result<(), anyhow::Error> {
    let message: Outbound = Arc::from(serde_json::to_string(&RejectionMessage::new(reason))?);
    dispatcher.registry().send(client_id, message)?;
    Ok(())
}
