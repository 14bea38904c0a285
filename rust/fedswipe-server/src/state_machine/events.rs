//! This module provides the [`StateMachine`]'s `Events`, `EventSubscriber` and `EventPublisher`
//! types.
//!
//! [`StateMachine`]: crate::state_machine::StateMachine

use std::sync::Arc;

use tokio::sync::watch;

use crate::state_machine::phases::PhaseName;
use fedswipe_core::{GlobalModel, ModelVersion};

/// An event emitted by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    /// Metadata that associates this event to the global model version that was current when
    /// it was emitted.
    pub version: ModelVersion,
    /// The event itself
    pub event: E,
}

/// A convenience type to emit any coordinator event.
#[derive(Debug)]
pub struct EventPublisher {
    /// Model version that is attached to all the events.
    version: ModelVersion,
    phase_tx: EventBroadcaster<PhaseName>,
    model_tx: EventBroadcaster<Arc<GlobalModel>>,
}

/// The `EventSubscriber` hands out `EventListener`s for any
/// coordinator event.
#[derive(Debug)]
pub struct EventSubscriber {
    phase_rx: EventListener<PhaseName>,
    model_rx: EventListener<Arc<GlobalModel>>,
}

impl EventPublisher {
    /// Initialize a new event publisher with the given initial events.
    pub fn init(phase: PhaseName, model: Arc<GlobalModel>) -> (Self, EventSubscriber) {
        let version = model.version;

        let (phase_tx, phase_rx) = watch::channel::<Event<PhaseName>>(Event {
            version,
            event: phase,
        });

        let (model_tx, model_rx) = watch::channel::<Event<Arc<GlobalModel>>>(Event {
            version,
            event: model,
        });

        let publisher = EventPublisher {
            version,
            phase_tx: phase_tx.into(),
            model_tx: model_tx.into(),
        };

        let subscriber = EventSubscriber {
            phase_rx: phase_rx.into(),
            model_rx: model_rx.into(),
        };

        (publisher, subscriber)
    }

    fn event<T>(&self, event: T) -> Event<T> {
        Event {
            version: self.version,
            event,
        }
    }

    /// Emit a phase event
    pub fn broadcast_phase(&mut self, phase: PhaseName) {
        self.phase_tx.broadcast(self.event(phase));
    }

    /// Emit a model event.
    ///
    /// The version attached to this and all following events is the version of `model`.
    pub fn broadcast_model(&mut self, model: Arc<GlobalModel>) {
        self.version = model.version;
        self.model_tx.broadcast(self.event(model));
    }
}

impl EventSubscriber {
    /// Get a listener for new phase events
    pub fn phase_listener(&self) -> EventListener<PhaseName> {
        self.phase_rx.clone()
    }

    /// Get a listener for new model events
    pub fn model_listener(&self) -> EventListener<Arc<GlobalModel>> {
        self.model_rx.clone()
    }
}

/// A listener for coordinator events. It can be used to either
/// retrieve the latest `Event<E>` emitted by the coordinator (with
/// `EventListener::get_latest`) or to wait for the next one (with
/// `EventListener::changed`).
#[derive(Debug, Clone)]
pub struct EventListener<E>(watch::Receiver<Event<E>>);

impl<E> From<watch::Receiver<Event<E>>> for EventListener<E> {
    fn from(receiver: watch::Receiver<Event<E>>) -> Self {
        EventListener(receiver)
    }
}

impl<E> EventListener<E>
where
    E: Clone,
{
    pub fn get_latest(&self) -> Event<E> {
        self.0.borrow().clone()
    }

    /// Waits for the next event and returns it.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<Event<E>> {
        self.0.changed().await.ok()?;
        Some(self.0.borrow_and_update().clone())
    }
}

/// A channel to send `Event<E>` to all the `EventListener<E>`.
#[derive(Debug)]
pub struct EventBroadcaster<E>(watch::Sender<Event<E>>);

impl<E> EventBroadcaster<E> {
    /// Send `event` to all the `EventListener<E>`
    fn broadcast(&self, event: Event<E>) {
        // the value is stored even if there is no listener at the moment
        self.0.send_replace(event);
    }
}

impl<E> From<watch::Sender<Event<E>>> for EventBroadcaster<E> {
    fn from(sender: watch::Sender<Event<E>>) -> Self {
        Self(sender)
    }
}
