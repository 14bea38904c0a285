//! Distribution of the global model to the connected clients.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::{ConnectionRegistry, Outbound, SendError};
use fedswipe_core::{
    codec::{Float32Codec, ModelCodec},
    message::ModelMessage,
    ClientId,
    GlobalModel,
};

/// Errors that can occur when dispatching a model.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to serialize the model message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Send(#[from] SendError),
}

/// The outcome of a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    /// The number of clients the model was handed to.
    pub delivered: usize,
    /// The number of clients whose connection was already closed.
    pub skipped: usize,
}

/// Serializes global models and pushes them to the clients of a [`ConnectionRegistry`].
///
/// Broadcasts and pushes of all clones of a dispatcher are sent one at a time, so every client
/// receives the models in the order they were dispatched.
#[derive(Clone)]
pub struct Dispatcher {
    registry: ConnectionRegistry,
    codec: Arc<dyn ModelCodec>,
    sending: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher that encodes models with the [`Float32Codec`].
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self::with_codec(registry, Arc::new(Float32Codec))
    }

    pub fn with_codec(registry: ConnectionRegistry, codec: Arc<dyn ModelCodec>) -> Self {
        Self {
            registry,
            codec,
            sending: Arc::new(Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn codec(&self) -> Arc<dyn ModelCodec> {
        self.codec.clone()
    }

    /// Serializes a model into the message sent to the clients.
    ///
    /// `client_count` is the number of connected clients reported along with the model.
    pub fn encode(&self, model: &GlobalModel, client_count: usize) -> Result<Outbound, DispatchError> {
        let weights = self.codec.encode(&model.parameters);
        let message = ModelMessage::new(weights, model.version, client_count);
        Ok(Arc::from(serde_json::to_string(&message)?))
    }

    /// Sends the model to every client connected at the time of the call.
    ///
    /// A client whose connection is gone is skipped; the remaining clients still receive the
    /// model.
    pub fn broadcast(&self, model: &GlobalModel) -> Result<BroadcastSummary, DispatchError> {
        let _sending = self.sending.lock();
        let clients = self.registry.snapshot();
        let payload = self.encode(model, clients.len())?;

        let mut summary = BroadcastSummary::default();
        for (client_id, tx) in clients {
            if tx.send(payload.clone()).is_ok() {
                summary.delivered += 1;
            } else {
                warn!("failed to send model to {}: connection closed", client_id);
                summary.skipped += 1;
            }
        }
        info!(
            "broadcasted model version {} to {} clients ({} skipped)",
            model.version, summary.delivered, summary.skipped,
        );
        Ok(summary)
    }

    /// Sends the current model to a single client.
    ///
    /// `current` is read while no broadcast is in flight. A model published after the read is
    /// broadcast after this push, so the client never ends up with an outdated model.
    pub fn push_current<F>(&self, client_id: ClientId, current: F) -> Result<u64, DispatchError>
    where
        F: FnOnce() -> Arc<GlobalModel>,
    {
        let _sending = self.sending.lock();
        let model = current();
        let payload = self.encode(&model, self.registry.len())?;
        self.registry.send(client_id, payload)?;
        debug!("pushed model version {} to {}", model.version, client_id);
        Ok(model.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedswipe_core::model::{ParameterVector, Tensor, TensorSpec};

    fn model(value: f32, version: u64) -> GlobalModel {
        GlobalModel {
            parameters: ParameterVector::new(vec![
                Tensor::new(TensorSpec::new("w", vec![1]), vec![value]).unwrap()
            ]),
            version,
        }
    }

    fn parse(payload: &str) -> ModelMessage {
        serde_json::from_str(payload).unwrap()
    }

    fn versions(rx: &mut crate::registry::ClientReceiver) -> Vec<u64> {
        let mut versions = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            versions.push(parse(&payload).model_version);
        }
        versions
    }

    #[test]
    fn test_broadcast_skips_closed_connections() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registry.connect();
        let (_b, rx_b) = registry.connect();
        let (_c, mut rx_c) = registry.connect();
        drop(rx_b);

        let dispatcher = Dispatcher::new(registry);
        let summary = dispatcher.broadcast(&model(3.0, 2)).unwrap();
        assert_eq!(
            summary,
            BroadcastSummary {
                delivered: 2,
                skipped: 1
            }
        );

        for rx in [&mut rx_a, &mut rx_c].iter_mut() {
            let message = parse(&rx.try_recv().unwrap());
            assert_eq!(message.model_version, 2);
            assert_eq!(message.latest_client_count, 3);
            let params = Float32Codec.decode(message.weights().unwrap()).unwrap();
            assert_eq!(params, model(3.0, 2).parameters);
        }
    }

    #[test]
    fn test_broadcast_without_clients() {
        let dispatcher = Dispatcher::new(ConnectionRegistry::new());
        assert_eq!(
            dispatcher.broadcast(&model(1.0, 1)).unwrap(),
            BroadcastSummary::default()
        );
    }

    #[test]
    fn test_push() {
        let registry = ConnectionRegistry::new();
        let (client_id, mut rx) = registry.connect();
        let (_other, mut other_rx) = registry.connect();
        let dispatcher = Dispatcher::new(registry);

        let current = || Arc::new(model(1.0, 5));
        assert_eq!(dispatcher.push_current(client_id, current).unwrap(), 5);
        let message = parse(&rx.try_recv().unwrap());
        assert_eq!(message.model_version, 5);
        assert_eq!(message.latest_client_count, 2);
        assert!(other_rx.try_recv().is_err());

        assert!(matches!(
            dispatcher.push_current(ClientId::new(u64::MAX), current),
            Err(DispatchError::Send(SendError::UnknownClient(_)))
        ));
    }

    #[test]
    fn test_push_current_is_not_overtaken_by_a_broadcast() {
        let registry = ConnectionRegistry::new();
        let (client_id, mut rx) = registry.connect();
        let dispatcher = Dispatcher::new(registry);

        // a newer model is published right after the session read the current one
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let mut broadcaster = None;
        dispatcher
            .push_current(client_id, || {
                let dispatcher = dispatcher.clone();
                broadcaster = Some(std::thread::spawn(move || {
                    dispatcher.broadcast(&model(2.0, 2)).unwrap();
                    done_tx.send(()).unwrap();
                }));
                assert!(done_rx
                    .recv_timeout(std::time::Duration::from_millis(50))
                    .is_err());
                Arc::new(model(1.0, 1))
            })
            .unwrap();
        broadcaster.unwrap().join().unwrap();

        assert_eq!(versions(&mut rx), vec![1, 2]);
    }
}
