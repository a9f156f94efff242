//! Lead delivery transports.
//!
//! One transport is selected at startup from configuration and used for the
//! life of the process:
//!
//! - [`MockTransport`] — development: logs the payload, no network.
//! - [`RelayTransport`] — posts the payload JSON to the trusted relay
//!   endpoint that holds the bot credentials.
//! - [`DirectTransport`] — calls the Telegram Bot API itself; when the
//!   primary call fails it fires a best-effort GET beacon and reports
//!   [`DeliveryReceipt::DispatchedUnconfirmed`] after a bounded wait.
//!
//! Every transport applies the same honeypot gate before touching the
//! network: a non-empty honeypot field is discarded with a success-shaped
//! receipt so automated submitters learn nothing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use arbora_core::config::{AppConfig, TransportMode};
use arbora_core::lead::{render_message, LeadPayload};

use crate::client::TelegramClient;

/// Upper bound on how long the direct-mode fallback waits before declaring
/// the beacon dispatched.
pub const FALLBACK_WAIT: Duration = Duration::from_secs(1);

/// What a transport can truthfully claim about a delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryReceipt {
    /// The notification backend confirmed receipt.
    Delivered,
    /// A fallback attempt was dispatched but its response could not be
    /// read; "attempt dispatched", not "delivery confirmed".
    DispatchedUnconfirmed,
    /// Honeypot tripped; nothing was sent. Success-shaped by design.
    SpamDiscarded,
}

impl DeliveryReceipt {
    pub fn is_confirmed(self) -> bool {
        self == Self::Delivered
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram credentials are not configured: {0}")]
    MissingCredentials(String),
    #[error("lead delivery failed: {0}")]
    Delivery(String),
    #[error("relay rejected the payload: {0}")]
    InvalidPayload(String),
}

impl TransportError {
    /// Short, non-technical text safe to show an end user. Details stay in
    /// the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredentials(_) | Self::InvalidPayload(_) => {
                "Something went wrong while sending your request. Please try again later."
            }
            Self::Delivery(_) => {
                "Your request could not be sent. Please check your connection and try again."
            }
        }
    }
}

#[async_trait]
pub trait LeadTransport: Send + Sync {
    async fn deliver(&self, payload: &LeadPayload) -> Result<DeliveryReceipt, TransportError>;
}

impl std::fmt::Debug for dyn LeadTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn LeadTransport")
    }
}

/// Shared honeypot short-circuit. Kept as one explicit branch so the spam
/// path never blends into legitimate delivery during debugging.
fn spam_gate(payload: &LeadPayload) -> Option<DeliveryReceipt> {
    if payload.is_spam() {
        warn!(
            event_name = "lead.honeypot.discarded",
            honeypot_len = payload.honeypot.len(),
            "honeypot field set; lead discarded without delivery"
        );
        Some(DeliveryReceipt::SpamDiscarded)
    } else {
        None
    }
}

/// Development transport: logs the payload and simulates network latency.
pub struct MockTransport {
    delay: Duration,
}

impl MockTransport {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl LeadTransport for MockTransport {
    async fn deliver(&self, payload: &LeadPayload) -> Result<DeliveryReceipt, TransportError> {
        if let Some(receipt) = spam_gate(payload) {
            return Ok(receipt);
        }

        let rendered = serde_json::to_string_pretty(payload)
            .map_err(|error| TransportError::Delivery(error.to_string()))?;
        info!(
            event_name = "lead.transport.mock_delivery",
            payload = %rendered,
            "mock mode: lead logged instead of sent"
        );

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(DeliveryReceipt::Delivered)
    }
}

/// Posts the payload JSON to the trusted relay endpoint. No retry; a
/// non-success relay answer is surfaced as an error for the user to retry
/// manually.
pub struct RelayTransport {
    http: reqwest::Client,
    url: String,
}

impl RelayTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl LeadTransport for RelayTransport {
    async fn deliver(&self, payload: &LeadPayload) -> Result<DeliveryReceipt, TransportError> {
        if let Some(receipt) = spam_gate(payload) {
            return Ok(receipt);
        }

        let response = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|error| TransportError::Delivery(error.to_string()))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("relay returned an error")
                .to_string();
            if status == reqwest::StatusCode::BAD_REQUEST {
                return Err(TransportError::InvalidPayload(detail));
            }
            return Err(TransportError::Delivery(format!("{detail} (status {status})")));
        }

        match body.get("status").and_then(Value::as_str) {
            Some("success") | Some("ok") => {
                info!(event_name = "lead.transport.relay_delivered", "relay accepted the lead");
                Ok(DeliveryReceipt::Delivered)
            }
            other => Err(TransportError::Delivery(format!(
                "relay answered with unexpected status {other:?}"
            ))),
        }
    }
}

/// Calls the Telegram Bot API directly from the client process. The
/// fallback beacon exists for environments where the primary call is
/// blocked (cross-origin restrictions in the original deployment); its
/// response cannot be read, so success only means the attempt left.
pub struct DirectTransport {
    client: TelegramClient,
    fallback_wait: Duration,
}

impl DirectTransport {
    pub fn new(client: TelegramClient) -> Self {
        Self { client, fallback_wait: FALLBACK_WAIT }
    }

    /// Shrinks the fallback wait. Test hook.
    pub fn with_fallback_wait(mut self, wait: Duration) -> Self {
        self.fallback_wait = wait;
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, TransportError> {
        let bot_token = config.telegram.bot_token.clone().ok_or_else(|| {
            TransportError::MissingCredentials("telegram bot token is not set".to_string())
        })?;
        let chat_id = config.telegram.chat_id.clone().ok_or_else(|| {
            TransportError::MissingCredentials("telegram chat id is not set".to_string())
        })?;
        Ok(Self::new(TelegramClient::new(bot_token, chat_id)))
    }
}

#[async_trait]
impl LeadTransport for DirectTransport {
    async fn deliver(&self, payload: &LeadPayload) -> Result<DeliveryReceipt, TransportError> {
        if let Some(receipt) = spam_gate(payload) {
            return Ok(receipt);
        }

        let text = render_message(payload);

        use crate::client::MessageSink;
        match self.client.send(&text).await {
            Ok(()) => {
                info!(event_name = "lead.transport.direct_delivered", "telegram confirmed the lead");
                Ok(DeliveryReceipt::Delivered)
            }
            Err(primary) => {
                warn!(
                    event_name = "lead.transport.primary_failed",
                    error = %primary,
                    "primary telegram call failed; firing fallback beacon"
                );

                let url = self
                    .client
                    .beacon_url(&text)
                    .map_err(|error| TransportError::Delivery(error.to_string()))?;
                let http = self.client.http();
                let beacon = tokio::spawn(async move {
                    // Fire-and-forget: the response is deliberately ignored.
                    let _ = http.get(url).send().await;
                });
                let _ = tokio::time::timeout(self.fallback_wait, beacon).await;

                info!(
                    event_name = "lead.transport.fallback_dispatched",
                    "fallback beacon dispatched; delivery unconfirmed"
                );
                Ok(DeliveryReceipt::DispatchedUnconfirmed)
            }
        }
    }
}

/// Builds the process-wide transport from configuration. Done once at
/// startup; no runtime mode branching after this point.
pub fn select_transport(config: &AppConfig) -> Result<Arc<dyn LeadTransport>, TransportError> {
    match config.transport.mode {
        TransportMode::Mock => Ok(Arc::new(MockTransport::new(Duration::from_millis(
            config.transport.mock_delay_ms,
        )))),
        TransportMode::Relay => {
            let url = config.transport.relay_url.clone().ok_or_else(|| {
                TransportError::MissingCredentials("relay url is not set".to_string())
            })?;
            Ok(Arc::new(RelayTransport::new(url)))
        }
        TransportMode::Direct => Ok(Arc::new(DirectTransport::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use secrecy::SecretString;
    use serde_json::Map;

    use arbora_core::config::{AppConfig, TransportMode};
    use arbora_core::lead::{build_payload, ContactInfo, PageContext};

    use super::{
        select_transport, DeliveryReceipt, DirectTransport, MockTransport, RelayTransport,
        TransportError,
    };
    use crate::client::TelegramClient;
    use crate::transport::LeadTransport;

    fn payload(honeypot: &str) -> arbora_core::lead::LeadPayload {
        build_payload(
            ContactInfo {
                name: "Bob".to_string(),
                phone: "5551234".to_string(),
                preferred_channel: None,
                comment: None,
            },
            &[],
            &PageContext::default(),
            Map::new(),
            Some(honeypot.to_string()),
        )
    }

    #[tokio::test]
    async fn mock_transport_delivers_clean_payloads() {
        let transport = MockTransport::new(Duration::ZERO);
        let receipt = transport.deliver(&payload("")).await.expect("mock delivery");
        assert_eq!(receipt, DeliveryReceipt::Delivered);
        assert!(receipt.is_confirmed());
    }

    #[tokio::test]
    async fn honeypot_short_circuits_before_any_network_call() {
        // Unroutable endpoints: a network attempt would error, so an Ok
        // receipt proves the gate fired first.
        let spam = payload("x");

        let relay = RelayTransport::new("http://127.0.0.1:1/api/lead");
        assert_eq!(
            relay.deliver(&spam).await.expect("gated"),
            DeliveryReceipt::SpamDiscarded
        );

        let direct = DirectTransport::new(
            TelegramClient::new(SecretString::from("123:abc"), "-1")
                .with_base_url("http://127.0.0.1:1"),
        )
        .with_fallback_wait(Duration::ZERO);
        assert_eq!(
            direct.deliver(&spam).await.expect("gated"),
            DeliveryReceipt::SpamDiscarded
        );

        let mock = MockTransport::new(Duration::from_secs(30));
        let started = Instant::now();
        assert_eq!(
            mock.deliver(&spam).await.expect("gated"),
            DeliveryReceipt::SpamDiscarded
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn direct_transport_falls_back_to_unconfirmed_dispatch() {
        let direct = DirectTransport::new(
            TelegramClient::new(SecretString::from("123:abc"), "-1")
                .with_base_url("http://127.0.0.1:1"),
        )
        .with_fallback_wait(Duration::from_millis(50));

        let receipt = direct.deliver(&payload("")).await.expect("fallback dispatch");
        assert_eq!(receipt, DeliveryReceipt::DispatchedUnconfirmed);
        assert!(!receipt.is_confirmed());
    }

    #[tokio::test]
    async fn relay_transport_reports_unreachable_relay_as_delivery_error() {
        let relay = RelayTransport::new("http://127.0.0.1:1/api/lead");
        let error = relay.deliver(&payload("")).await.expect_err("unreachable relay");
        assert!(matches!(error, TransportError::Delivery(_)));
        assert!(!error.user_message().is_empty());
    }

    #[test]
    fn selection_respects_mode_and_requires_direct_credentials() {
        let mut config = AppConfig::default();
        select_transport(&config).expect("mock transport");

        config.transport.mode = TransportMode::Direct;
        let error = select_transport(&config).expect_err("no credentials");
        assert!(matches!(error, TransportError::MissingCredentials(_)));

        config.telegram.bot_token = Some(SecretString::from("123:abc"));
        config.telegram.chat_id = Some("-1".to_string());
        select_transport(&config).expect("direct transport");

        config.transport.mode = TransportMode::Relay;
        config.transport.relay_url = Some("https://trees.example/api/lead".to_string());
        select_transport(&config).expect("relay transport");
    }
}
