//! Coordinator state.

use std::sync::Arc;

use fedswipe_core::GlobalModel;

/// The coordinator state.
#[derive(Debug, Clone)]
pub struct CoordinatorState {
    /// The authoritative global model.
    pub model: Arc<GlobalModel>,
    /// The number of buffered contributions that triggers an aggregation.
    pub threshold: u64,
}

impl CoordinatorState {
    pub fn new(model: GlobalModel, threshold: u64) -> Self {
        Self {
            model: Arc::new(model),
            threshold,
        }
    }
}
