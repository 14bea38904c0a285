use tracing::{debug, info, Span};

use crate::state_machine::{
    phases::{Phase, PhaseState},
    requests::{RequestError, ResponseSender, StateMachineRequest},
};

/// A trait that must be implemented by a state to handle a request.
pub trait Handler {
    /// Handles a request.
    ///
    /// # Errors
    /// Fails if the request is rejected. A rejected request leaves the state untouched.
    fn handle_request(&mut self, req: StateMachineRequest) -> Result<(), RequestError>;
}

impl<S> PhaseState<S>
where
    Self: Phase + Handler,
{
    /// Processes a single request and answers the requester.
    pub(super) fn process_single(
        &mut self,
        req: StateMachineRequest,
        span: Span,
        resp_tx: ResponseSender,
    ) {
        let _span_guard = span.enter();

        let response = self.handle_request(req);
        match &response {
            Ok(()) => debug!("request accepted in {} phase", Self::NAME),
            Err(err) => info!("request rejected in {} phase: {}", Self::NAME, err),
        }

        // This may error out if the receiver has already been dropped but it doesn't matter for us.
        let _ = resp_tx.send(response);
    }
}
