use std::{fmt, sync::Arc, task::Poll};

use futures::task::Context;
use rayon::ThreadPool;
use tokio::sync::oneshot;
use tower::{limit::concurrency::ConcurrencyLimit, Service, ServiceBuilder};
use tracing::{debug, trace, warn};

use crate::{
    services::messages::{BoxedServiceFuture, ServiceError},
    state_machine::requests::UpdateRequest,
};
use fedswipe_core::{codec::ModelCodec, message::UpdateMessage, ClientId};

/// An update as received from a client, not parsed yet.
#[derive(Debug, Clone)]
pub struct RawUpdate {
    /// The client the message was received from.
    pub client_id: ClientId,
    /// The JSON text of the message.
    pub payload: String,
}

/// A service that parses update messages.
///
/// Decoding the weights of a large model is a CPU-intensive task, hence this service offloads
/// the processing to a `rayon` thread-pool to avoid overloading the tokio thread-pool with
/// blocking tasks.
#[derive(Clone)]
struct Parser {
    /// Thread-pool the CPU-intensive tasks are offloaded to.
    thread_pool: Arc<ThreadPool>,
    /// The codec of the weights blob.
    codec: Arc<dyn ModelCodec>,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("thread_pool", &self.thread_pool)
            .finish()
    }
}

/// Parses and validates an update message.
fn parse(codec: &dyn ModelCodec, req: RawUpdate) -> Result<UpdateRequest, ServiceError> {
    let message = UpdateMessage::from_json(&req.payload)?;
    if message.samples_used < 1 {
        return Err(ServiceError::InvalidSampleCount(message.samples_used));
    }
    if message.model_version < 1 {
        return Err(ServiceError::InvalidVersion(message.model_version));
    }
    let parameters = codec.decode(message.weights()?)?;

    Ok(UpdateRequest {
        client_id: req.client_id,
        parameters,
        trained_from_version: message.model_version,
        sample_count: message.samples_used,
    })
}

impl Service<RawUpdate> for Parser {
    type Response = UpdateRequest;
    type Error = ServiceError;
    type Future = BoxedServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RawUpdate) -> Self::Future {
        let (tx, rx) = oneshot::channel::<Result<UpdateRequest, ServiceError>>();

        let codec = self.codec.clone();
        trace!("spawning parsing task on thread-pool");
        self.thread_pool.spawn(move || {
            let client_id = req.client_id;
            let res = parse(codec.as_ref(), req);
            match &res {
                Ok(update) => debug!(
                    "parsed update of {} trained from version {}",
                    client_id, update.trained_from_version
                ),
                Err(e) => warn!("invalid update of {}: {}", client_id, e),
            }
            let _ = tx.send(res);
        });

        Box::pin(async move {
            rx.await.map_err(|_| {
                ServiceError::InternalError(
                    "failed to receive response from thread-pool".to_string(),
                )
            })?
        })
    }
}

/// A service that turns [`RawUpdate`]s into update requests for the state machine.
#[derive(Debug, Clone)]
pub struct MessageParser(ConcurrencyLimit<Parser>);

impl Service<RawUpdate> for MessageParser {
    type Response = UpdateRequest;
    type Error = ServiceError;
    type Future = BoxedServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, req: RawUpdate) -> Self::Future {
        let fut = self.0.call(req);
        Box::pin(async move { fut.await })
    }
}

impl MessageParser {
    pub fn new(codec: Arc<dyn ModelCodec>, thread_pool: Arc<ThreadPool>) -> Self {
        let limit = thread_pool.current_num_threads();
        let inner = ServiceBuilder::new()
            .concurrency_limit(limit)
            .service(Parser { thread_pool, codec });
        Self(inner)
    }
}
