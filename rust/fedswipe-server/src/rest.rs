//! A HTTP API for the clients of the coordinator.
//!
//! | route          | description                                                  |
//! | -------------- | ------------------------------------------------------------ |
//! | `/`            | websocket upgrade; the session of a client                   |
//! | `GET /model`   | the latest global model in the format pushed to the clients |
//! | `GET /status`  | model version, number of connected clients and phase        |

use std::convert::Infallible;

use thiserror::Error;
use tracing::{error, info, warn};
use warp::{
    http::StatusCode,
    reply::{Reply, Response},
    ws::Ws,
    Filter,
};

use crate::{
    broadcast::Dispatcher,
    services::fetchers::Fetcher,
    session::Sessions,
    settings::ApiSettings,
};

/// Starts a HTTP server at the given address, accepting the websocket connections of the
/// clients and answering GET requests for data.
///
/// * `api_settings`: address of the server.
/// * `fetcher`: fetcher for responding to data requests.
/// * `sessions`: the context of the client sessions.
/// * `dispatcher`: serializes the global model for the `/model` route.
///
/// # Errors
/// Fails if the server can't bind to the address.
pub async fn serve<F>(
    api_settings: ApiSettings,
    fetcher: F,
    sessions: Sessions,
    dispatcher: Dispatcher,
) -> Result<(), RestError>
where
    F: Fetcher + Sync + Send + 'static + Clone,
{
    let routes = routes(fetcher, sessions, dispatcher);
    let (address, server) = warp::serve(routes).try_bind_ephemeral(api_settings.bind_address)?;
    info!("listening on {}", address);
    server.await;
    Ok(())
}

/// Builds the routes of the API.
pub fn routes<F>(
    fetcher: F,
    sessions: Sessions,
    dispatcher: Dispatcher,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    F: Fetcher + Sync + Send + 'static + Clone,
{
    let session = warp::path::end()
        .and(warp::ws())
        .and(with_sessions(sessions))
        .map(|ws: Ws, sessions: Sessions| ws.on_upgrade(move |socket| sessions.run(socket)));

    let model = warp::path!("model")
        .and(warp::get())
        .and(with_fetcher(fetcher.clone()))
        .and(with_dispatcher(dispatcher))
        .and_then(handle_model);

    let status = warp::path!("status")
        .and(warp::get())
        .and(with_fetcher(fetcher))
        .and_then(handle_status);

    session
        .or(model)
        .or(status)
        .with(warp::cors().allow_any_origin().allow_methods(vec!["GET"]))
        .recover(handle_reject)
        .with(warp::log("http"))
}

/// Handles and responds to a request for the global model.
async fn handle_model<F: Fetcher>(
    mut fetcher: F,
    dispatcher: Dispatcher,
) -> Result<Response, Infallible> {
    let payload = fetcher.model().await.and_then(|model| {
        dispatcher
            .encode(&model, dispatcher.registry().len())
            .map_err(Into::into)
    });
    Ok(match payload {
        Ok(payload) => {
            warp::reply::with_header(payload.to_string(), "Content-Type", "application/json")
                .into_response()
        }
        Err(e) => {
            warn!("failed to handle model request: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    })
}

/// Handles and responds to a request for the status of the coordinator.
async fn handle_status<F: Fetcher>(mut fetcher: F) -> Result<Response, Infallible> {
    Ok(match fetcher.status().await {
        Ok(status) => warp::reply::json(&status).into_response(),
        Err(e) => {
            warn!("failed to handle status request: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    })
}

/// Converts the session context into a `warp` filter.
fn with_sessions(
    sessions: Sessions,
) -> impl Filter<Extract = (Sessions,), Error = Infallible> + Clone {
    warp::any().map(move || sessions.clone())
}

/// Converts a data fetcher into a `warp` filter.
fn with_fetcher<F: Fetcher + Sync + Send + 'static + Clone>(
    fetcher: F,
) -> impl Filter<Extract = (F,), Error = Infallible> + Clone {
    warp::any().map(move || fetcher.clone())
}

/// Converts a model dispatcher into a `warp` filter.
fn with_dispatcher(
    dispatcher: Dispatcher,
) -> impl Filter<Extract = (Dispatcher,), Error = Infallible> + Clone {
    warp::any().map(move || dispatcher.clone())
}

/// Handles `warp` rejections of bad requests.
async fn handle_reject(err: warp::Rejection) -> Result<impl Reply, Infallible> {
    let code = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        StatusCode::METHOD_NOT_ALLOWED
    } else {
        error!("unhandled rejection: {:?}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    // reply with empty body; the status code is the interesting part
    Ok(warp::reply::with_status(Vec::new(), code))
}

#[derive(Debug, Error)]
/// Errors of the rest server.
pub enum RestError {
    #[error("failed to bind the server: {0}")]
    Bind(#[from] warp::Error),
}
