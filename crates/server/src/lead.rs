//! Relay-mode lead endpoint.
//!
//! Endpoints:
//! - `POST /api/lead` — accept a lead payload, re-validate it, and forward
//!   the rendered message to Telegram
//!
//! Responses follow the original relay contract: 200 `{"status":"success"}`
//! on delivery, 200 `{"status":"ok"}` for the honeypot short-circuit
//! (indistinguishable from success by design), 400 `{"error":"Invalid
//! payload"}` on schema failure, and 500 with an `error`/`details` pair for
//! configuration and downstream faults. Stateless: each request is handled
//! independently, with no retry and no ordering between clients.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    routing::post,
    Json, Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use arbora_core::lead::{render_message, LeadPayload};
use arbora_telegram::client::MessageSink;

/// Wire-schema phone minimum. Looser than the client-side rule so older
/// form variants keep working.
const WIRE_MIN_PHONE_LEN: usize = 5;

#[derive(Clone)]
pub struct LeadState {
    /// `None` when Telegram credentials are absent (development): the
    /// server still boots and answers requests with the 500 contract.
    sink: Option<Arc<dyn MessageSink>>,
}

pub fn router(sink: Option<Arc<dyn MessageSink>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/api/lead", post(submit_lead))
        .layer(cors)
        .with_state(LeadState { sink })
}

pub async fn submit_lead(
    State(state): State<LeadState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let correlation_id = Uuid::new_v4();

    let payload: LeadPayload = match serde_json::from_value(body) {
        Ok(payload) => payload,
        Err(decode_error) => {
            warn!(
                event_name = "lead.relay.decode_failed",
                correlation_id = %correlation_id,
                error = %decode_error,
                "lead payload did not match the wire format"
            );
            return invalid_payload();
        }
    };

    if let Err(reason) = validate_wire(&payload) {
        warn!(
            event_name = "lead.relay.schema_rejected",
            correlation_id = %correlation_id,
            reason,
            "lead payload failed schema validation"
        );
        return invalid_payload();
    }

    // Honeypot short-circuit: success-shaped, nothing forwarded.
    if payload.is_spam() {
        warn!(
            event_name = "lead.relay.honeypot_discarded",
            correlation_id = %correlation_id,
            "honeypot field set; lead discarded without delivery"
        );
        return (StatusCode::OK, Json(json!({ "status": "ok" })));
    }

    let Some(sink) = &state.sink else {
        error!(
            event_name = "lead.relay.unconfigured",
            correlation_id = %correlation_id,
            "telegram credentials are not configured"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Telegram not configured",
                "details": "ARBORA_TELEGRAM_BOT_TOKEN and ARBORA_TELEGRAM_CHAT_ID must be set",
            })),
        );
    };

    let message = render_message(&payload);
    // Single attempt, no retry: a failure surfaces so the user can resubmit.
    if let Err(send_error) = sink.send(&message).await {
        error!(
            event_name = "lead.relay.delivery_failed",
            correlation_id = %correlation_id,
            error = %send_error,
            "telegram rejected the lead message"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Failed to send to Telegram",
                "details": send_error.to_string(),
            })),
        );
    }

    info!(
        event_name = "lead.relay.delivered",
        correlation_id = %correlation_id,
        cart_items = payload.cart_items.len(),
        "lead forwarded to telegram"
    );
    (StatusCode::OK, Json(json!({ "status": "success" })))
}

fn invalid_payload() -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid payload" })))
}

/// Defensive re-validation of the §3 invariants the client should already
/// have enforced.
fn validate_wire(payload: &LeadPayload) -> Result<(), &'static str> {
    if payload.contact.name.trim().is_empty() {
        return Err("contact.name is empty");
    }
    if payload.contact.phone.trim().len() < WIRE_MIN_PHONE_LEN {
        return Err("contact.phone is too short");
    }
    for item in &payload.cart_items {
        if item.qty == 0 {
            return Err("cart item quantity must be positive");
        }
        if item.price < Decimal::ZERO {
            return Err("cart item price must be non-negative");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::Json;
    use serde_json::{json, Value};

    use arbora_telegram::client::{MessageSink, SendError};

    use super::{submit_lead, LeadState};

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
        fail_with: Option<String>,
    }

    impl RecordingSink {
        fn failing(description: &str) -> Self {
            Self { sent: Mutex::new(Vec::new()), fail_with: Some(description.to_string()) }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().expect("sent lock").clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, text: &str) -> Result<(), SendError> {
            if let Some(description) = &self.fail_with {
                return Err(SendError::Api(description.clone()));
            }
            self.sent.lock().expect("sent lock").push(text.to_string());
            Ok(())
        }
    }

    fn state(sink: Option<Arc<RecordingSink>>) -> State<LeadState> {
        State(LeadState { sink: sink.map(|sink| sink as Arc<dyn MessageSink>) })
    }

    fn lead_body(honeypot: &str) -> Value {
        json!({
            "contact": { "name": "Bob", "phone": "5551234", "preferredChannel": "WhatsApp" },
            "cartItems": [ { "id": "1", "title": "Tree", "qty": 2, "price": 100 } ],
            "meta": { "pageUrl": "https://trees.example/checkout" },
            "honeypot": honeypot,
        })
    }

    #[tokio::test]
    async fn valid_lead_is_rendered_and_forwarded() {
        let sink = Arc::new(RecordingSink::default());
        let (status, Json(body)) =
            submit_lead(state(Some(sink.clone())), Json(lead_body(""))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success" }));

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Bob"));
        assert!(sent[0].contains("Tree × 2"));
        assert!(sent[0].contains("*Total:* 200"));
    }

    #[tokio::test]
    async fn honeypot_lead_returns_ok_without_touching_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let (status, Json(body)) =
            submit_lead(state(Some(sink.clone())), Json(lead_body("gotcha"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_and_schema_invalid_bodies_get_the_400_contract() {
        let sink = Arc::new(RecordingSink::default());

        let (status, Json(body)) =
            submit_lead(state(Some(sink.clone())), Json(json!({ "contact": 7 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid payload" }));

        let mut short_phone = lead_body("");
        short_phone["contact"]["phone"] = json!("123");
        let (status, _) = submit_lead(state(Some(sink.clone())), Json(short_phone)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut zero_qty = lead_body("");
        zero_qty["cartItems"][0]["qty"] = json!(0);
        let (status, _) = submit_lead(state(Some(sink.clone())), Json(zero_qty)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_return_the_configuration_error() {
        let (status, Json(body)) = submit_lead(state(None), Json(lead_body(""))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Telegram not configured"));
        assert!(body["details"].as_str().expect("details").contains("TELEGRAM"));
    }

    #[tokio::test]
    async fn preflight_options_is_answered_with_cors_allow_headers() {
        use axum::body::Body;
        use axum::http::{Method, Request};
        use tower::ServiceExt;

        let app = super::router(None);
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/lead")
                    .header("origin", "https://trees.example")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type")
                    .body(Body::empty())
                    .expect("preflight request"),
            )
            .await
            .expect("preflight response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("access-control-allow-origin"));
        assert!(response.headers().contains_key("access-control-allow-methods"));
        assert!(response.headers().contains_key("access-control-allow-headers"));
    }

    #[tokio::test]
    async fn downstream_failure_returns_the_delivery_error() {
        let sink = Arc::new(RecordingSink::failing("chat not found"));
        let (status, Json(body)) = submit_lead(state(Some(sink)), Json(lead_body(""))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Failed to send to Telegram"));
        assert!(body["details"].as_str().expect("details").contains("chat not found"));
    }
}
