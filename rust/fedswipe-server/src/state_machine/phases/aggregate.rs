use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::state_machine::{
    phases::{Collect, Phase, PhaseError, PhaseName, PhaseState, Shared},
    StateMachine,
};
use fedswipe_core::aggregation::{aggregate, ClientContribution};

/// The aggregate state.
#[derive(Debug)]
pub struct Aggregate {
    /// The contributions of the round, ordered by client id.
    contributions: Vec<ClientContribution>,
}

#[cfg(test)]
impl Aggregate {
    pub fn new(contributions: Vec<ClientContribution>) -> Self {
        Self { contributions }
    }

    pub fn contributions(&self) -> &[ClientContribution] {
        &self.contributions
    }
}

#[async_trait]
impl Phase for PhaseState<Aggregate> {
    const NAME: PhaseName = PhaseName::Aggregate;

    /// Averages the contributions into the global model and publishes the new model.
    async fn process(&mut self) -> Result<(), PhaseError> {
        let current = &self.shared.state.model;
        info!(
            "aggregating {} contributions into model version {}",
            self.private.contributions.len(),
            current.version,
        );
        let parameters = aggregate(current, &self.private.contributions)?;
        let model = Arc::new(current.advance(parameters));

        info!("global model advanced to version {}", model.version);
        self.shared.state.model = model.clone();
        self.shared.events.broadcast_model(model);
        Ok(())
    }

    fn broadcast(&mut self) {
        let model = &self.shared.state.model;
        match self.shared.dispatcher.broadcast(model) {
            Ok(summary) => debug!(
                "model version {} delivered to {} clients",
                model.version, summary.delivered
            ),
            Err(err) => warn!("failed to broadcast model version {}: {}", model.version, err),
        }
    }

    async fn next(self) -> Option<StateMachine> {
        Some(PhaseState::<Collect>::new(self.shared).into())
    }
}

impl PhaseState<Aggregate> {
    /// Creates a new aggregate state.
    pub fn new(shared: Shared, contributions: Vec<ClientContribution>) -> Self {
        Self {
            private: Aggregate { contributions },
            shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        registry::ConnectionRegistry,
        state_machine::tests::{builder::StateMachineBuilder, utils},
    };
    use fedswipe_core::{
        aggregation::AggregationError,
        codec::{Float32Codec, ModelCodec},
        message::ModelMessage,
        ClientId,
    };

    #[tokio::test]
    async fn test_aggregate_to_collect() {
        let registry = ConnectionRegistry::new();
        let (_client_id, mut rx) = registry.connect();
        let contributions = vec![utils::contribution(1, &[4.0], 1, 1)];
        let (state_machine, _request_tx, events) = StateMachineBuilder::new()
            .with_registry(registry)
            .with_model(utils::global_model(&[2.0], 1))
            .with_phase(Aggregate::new(contributions))
            .build();
        assert!(state_machine.is_aggregate());

        let state_machine = state_machine.next().await.unwrap();
        assert!(state_machine.is_collect());

        let expected = utils::global_model(&[3.0], 2);
        let latest = events.model_listener().get_latest();
        assert_eq!(latest.version, 2);
        assert_eq!(*latest.event, expected);
        assert_eq!(
            events.phase_listener().get_latest().event,
            PhaseName::Aggregate
        );

        let collect = state_machine.into_collect_phase_state();
        assert_eq!(*collect.shared.state.model, expected);
        assert!(collect.private.buffer().is_empty());

        let message: ModelMessage = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(message.model_version, 2);
        assert_eq!(message.latest_client_count, 1);
        assert_eq!(
            Float32Codec.decode(message.weights().unwrap()).unwrap(),
            expected.parameters
        );
    }

    #[tokio::test]
    async fn test_weighted_stale_aggregation() {
        let contributions = vec![
            utils::contribution(2, &[10.0], 3, 1),
            utils::contribution(1, &[20.0], 1, 3),
        ];
        let (state_machine, _request_tx, events) = StateMachineBuilder::new()
            .with_model(utils::global_model(&[0.0], 3))
            .with_phase(Aggregate::new(contributions))
            .build();

        state_machine.next().await.unwrap();
        // (0 * 4 + 10 * 1 * 1 + 20 * 3 * 0.5) / (3 * 4)
        let expected = utils::global_model(&[(40.0f64 / 12.0) as f32], 4);
        assert_eq!(*events.model_listener().get_latest().event, expected);
    }

    #[tokio::test]
    async fn test_aggregate_to_failure() {
        let (state_machine, _request_tx, events) = StateMachineBuilder::new()
            .with_model(utils::global_model(&[2.0], 5))
            .with_phase(Aggregate::new(Vec::new()))
            .build();

        let state_machine = state_machine.next().await.unwrap();
        assert!(state_machine.is_failure());
        assert!(matches!(
            state_machine.into_failure_phase_state().private.error(),
            PhaseError::Aggregation(AggregationError::EmptyAggregation)
        ));
        assert_eq!(events.model_listener().get_latest().version, 5);
    }

    #[tokio::test]
    async fn test_shape_mismatch_leaves_model_unchanged() {
        let contribution = utils::contribution(7, &[1.0, 2.0], 1, 1);
        let (state_machine, _request_tx, events) = StateMachineBuilder::new()
            .with_model(utils::global_model(&[2.0], 1))
            .with_phase(Aggregate::new(vec![contribution]))
            .build();

        let state_machine = state_machine.next().await.unwrap();
        assert!(matches!(
            state_machine.into_failure_phase_state().private.error(),
            PhaseError::Aggregation(AggregationError::ShapeMismatch { client, .. })
                if *client == ClientId::new(7)
        ));
        assert_eq!(
            *events.model_listener().get_latest().event,
            utils::global_model(&[2.0], 1)
        );
    }
}
