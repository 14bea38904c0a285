//! This module provides the services for serving data.
//!
//! There are multiple such services and the [`Fetcher`] trait
//! provides a single unifying interface for all of these.

mod model;
mod status;

use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::future::poll_fn;
use tower::{layer::Layer, Service, ServiceBuilder};

pub use self::{
    model::{ModelRequest, ModelResponse, ModelService},
    status::{StatusRequest, StatusResponse, StatusService},
};
use crate::{registry::ConnectionRegistry, state_machine::events::EventSubscriber};

/// A single interface for retrieving data from the coordinator.
#[async_trait]
pub trait Fetcher {
    /// Fetch the latest global model.
    async fn model(&mut self) -> Result<ModelResponse, FetchError>;

    /// Fetch the model version, the number of connected clients and the current phase.
    async fn status(&mut self) -> Result<StatusResponse, FetchError>;
}

/// An error returned by the [`Fetcher`]'s method.
pub type FetchError = anyhow::Error;

fn into_fetch_error<E: Into<Box<dyn ::std::error::Error + 'static + Sync + Send>>>(
    e: E,
) -> FetchError {
    anyhow::anyhow!("Fetcher failed: {:?}", e.into())
}

#[async_trait]
impl<Model, Status> Fetcher for Fetchers<Model, Status>
where
    Self: Send + Sync + 'static,

    Model: Service<ModelRequest, Response = ModelResponse> + Send + 'static,
    <Model as Service<ModelRequest>>::Future: Send + Sync + 'static,
    <Model as Service<ModelRequest>>::Error:
        Into<Box<dyn ::std::error::Error + 'static + Sync + Send>>,

    Status: Service<StatusRequest, Response = StatusResponse> + Send + 'static,
    <Status as Service<StatusRequest>>::Future: Send + Sync + 'static,
    <Status as Service<StatusRequest>>::Error:
        Into<Box<dyn ::std::error::Error + 'static + Sync + Send>>,
{
    async fn model(&mut self) -> Result<ModelResponse, FetchError> {
        poll_fn(|cx| <Model as Service<ModelRequest>>::poll_ready(&mut self.model, cx))
            .await
            .map_err(into_fetch_error)?;
        Ok(
            <Model as Service<ModelRequest>>::call(&mut self.model, ModelRequest)
                .await
                .map_err(into_fetch_error)?,
        )
    }

    async fn status(&mut self) -> Result<StatusResponse, FetchError> {
        poll_fn(|cx| <Status as Service<StatusRequest>>::poll_ready(&mut self.status, cx))
            .await
            .map_err(into_fetch_error)?;
        Ok(
            <Status as Service<StatusRequest>>::call(&mut self.status, StatusRequest)
                .await
                .map_err(into_fetch_error)?,
        )
    }
}

pub(in crate::services) struct FetcherService<S>(S);

impl<S, R> Service<R> for FetcherService<S>
where
    S: Service<R>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        self.0.call(req)
    }
}

pub(in crate::services) struct FetcherLayer;

impl<S> Layer<S> for FetcherLayer {
    type Service = FetcherService<S>;

    fn layer(&self, service: S) -> Self::Service {
        FetcherService(service)
    }
}

#[derive(Debug, Clone)]
pub struct Fetchers<Model, Status> {
    model: Model,
    status: Status,
}

impl<Model, Status> Fetchers<Model, Status> {
    pub fn new(model: Model, status: Status) -> Self {
        Self { model, status }
    }
}

/// Construct a [`Fetcher`] service
pub fn fetcher(
    event_subscriber: &EventSubscriber,
    registry: ConnectionRegistry,
) -> impl Fetcher + Sync + Send + Clone + 'static {
    let model = ServiceBuilder::new()
        .buffer(100)
        .concurrency_limit(100)
        .layer(FetcherLayer)
        .service(ModelService::new(event_subscriber));

    let status = ServiceBuilder::new()
        .buffer(100)
        .concurrency_limit(100)
        .layer(FetcherLayer)
        .service(StatusService::new(event_subscriber, registry));

    Fetchers::new(model, status)
}
