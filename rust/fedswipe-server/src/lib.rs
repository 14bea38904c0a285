#![cfg_attr(docsrs, feature(doc_cfg))]
//! # fedswipe coordinator
//!
//! The coordinator of a federated learning network for swipe based recommendation models.
//! Clients connect over a websocket, receive the latest global model, train it on their local
//! data and send their parameters back. Once enough distinct clients contributed, the
//! coordinator averages the contributions into a new global model and pushes it to every
//! connected client.
//!
//! The crate is organized as follows:
//!
//! - [`state_machine`]: the single writer of the global model. It buffers the contributions of
//!   a round, aggregates them and resets the model when the last client leaves.
//! - [`services`]: the tower services between the network and the state machine.
//! - [`registry`] and [`broadcast`]: the connected clients and the distribution of the model.
//! - [`session`] and [`rest`]: the websocket sessions and the HTTP API.
//! - [`settings`]: loading and validation of the configuration.

pub mod broadcast;
pub mod registry;
pub mod rest;
pub mod services;
pub mod session;
pub mod settings;
pub mod state_machine;
