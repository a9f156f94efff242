//! End-to-end lead pipeline: form → validation → cart snapshot → payload →
//! guarded submission → cart cleared on success.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use tracing::info;

use arbora_core::cart::CartStore;
use arbora_core::errors::FieldErrors;
use arbora_core::lead::{build_payload, validate_contact, ContactForm, PageContext};

use crate::controller::{LeadSubmitter, SubmissionState};
use crate::transport::LeadTransport;

/// Owns the cart and the submission controller for one storefront session.
/// Validation failures are returned to the caller without a transport call;
/// a successful submission clears the cart.
pub struct LeadPipeline {
    cart: Mutex<CartStore>,
    submitter: LeadSubmitter,
}

impl LeadPipeline {
    pub fn new(cart: CartStore, transport: Arc<dyn LeadTransport>) -> Self {
        Self { cart: Mutex::new(cart), submitter: LeadSubmitter::new(transport) }
    }

    pub fn cart(&self) -> MutexGuard<'_, CartStore> {
        self.cart.lock().expect("cart lock")
    }

    pub fn state(&self) -> SubmissionState {
        self.submitter.state()
    }

    pub fn reset(&self) {
        self.submitter.reset();
    }

    /// Runs the full submission flow. `Err` carries per-field validation
    /// messages for the UI; transport failures land in [`Self::state`]
    /// instead, mirroring how the form surfaces them.
    pub async fn submit_lead(
        &self,
        form: &ContactForm,
        page: &PageContext,
        meta_overrides: Map<String, Value>,
        honeypot: Option<String>,
    ) -> Result<(), FieldErrors> {
        let contact = validate_contact(form)?;

        let snapshot = self.cart().items();
        let payload = build_payload(contact, &snapshot, page, meta_overrides, honeypot);

        self.submitter.submit(payload).await;

        if self.submitter.state().is_success {
            self.cart().clear();
            info!(event_name = "lead.pipeline.cart_cleared", "cart cleared after submission");
        }
        Ok(())
    }
}
