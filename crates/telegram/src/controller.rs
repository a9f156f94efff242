//! Submission state controller.
//!
//! Mediates between the UI and the transport: tracks in-flight / success /
//! error status, guards against a double-click producing two concurrent
//! external calls, and turns transport errors into a short user-facing
//! message while logging the technical detail.

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};
use uuid::Uuid;

use arbora_core::lead::LeadPayload;

use crate::transport::LeadTransport;

/// UI-facing submission status. `is_submitting` is true only while a
/// delivery is in flight; at most one of `is_success` / `error` is terminal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionState {
    pub is_submitting: bool,
    pub is_success: bool,
    pub error: Option<String>,
}

pub struct LeadSubmitter {
    transport: Arc<dyn LeadTransport>,
    state: Mutex<SubmissionState>,
}

impl LeadSubmitter {
    pub fn new(transport: Arc<dyn LeadTransport>) -> Self {
        Self { transport, state: Mutex::new(SubmissionState::default()) }
    }

    pub fn state(&self) -> SubmissionState {
        self.state.lock().expect("submission state lock").clone()
    }

    /// Returns all fields to their initial values. The only way out of a
    /// terminal state without a new submission.
    pub fn reset(&self) {
        *self.state.lock().expect("submission state lock") = SubmissionState::default();
    }

    /// Delivers `payload` through the configured transport. A call while a
    /// submission is already in flight is ignored — never queued — so one
    /// logical submission maps to at most one external call. The guard is
    /// released on every exit path.
    pub async fn submit(&self, payload: LeadPayload) {
        let correlation_id = Uuid::new_v4();

        {
            let mut state = self.state.lock().expect("submission state lock");
            if state.is_submitting {
                warn!(
                    event_name = "lead.submit.duplicate_ignored",
                    correlation_id = %correlation_id,
                    "submission already in flight; duplicate submit ignored"
                );
                return;
            }
            *state = SubmissionState { is_submitting: true, is_success: false, error: None };
        }

        let result = self.transport.deliver(&payload).await;

        let mut state = self.state.lock().expect("submission state lock");
        state.is_submitting = false;
        match result {
            Ok(receipt) => {
                // All receipt variants are UI success, explicitly: confirmed
                // delivery, unconfirmed dispatch, and the spam discard that
                // must stay indistinguishable from success.
                state.is_success = true;
                info!(
                    event_name = "lead.submit.settled",
                    correlation_id = %correlation_id,
                    receipt = ?receipt,
                    "lead submission settled"
                );
            }
            Err(transport_error) => {
                state.error = Some(transport_error.user_message().to_string());
                error!(
                    event_name = "lead.submit.failed",
                    correlation_id = %correlation_id,
                    error = %transport_error,
                    "lead submission failed"
                );
            }
        }
    }
}
