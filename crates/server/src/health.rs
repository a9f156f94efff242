use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    telegram_configured: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub telegram: HealthCheck,
    pub checked_at: String,
}

pub fn router(telegram_configured: bool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { telegram_configured })
}

/// Missing credentials degrade the report but keep the endpoint 200: the
/// relay still serves requests, answering leads with the 500 contract.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let telegram = if state.telegram_configured {
        HealthCheck { status: "configured", detail: "telegram credentials present".to_string() }
    } else {
        HealthCheck {
            status: "unconfigured",
            detail: "telegram credentials absent; lead delivery disabled".to_string(),
        }
    };

    let payload = HealthResponse {
        status: if state.telegram_configured { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "arbora-server runtime initialized".to_string(),
        },
        telegram,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::extract::State;

    use super::{health, HealthState};

    #[tokio::test]
    async fn configured_sink_reports_ready() {
        let (status, response) = health(State(HealthState { telegram_configured: true })).await;
        assert_eq!(status, axum::http::StatusCode::OK);
        assert_eq!(response.0.status, "ready");
        assert_eq!(response.0.telegram.status, "configured");
    }

    #[tokio::test]
    async fn missing_credentials_report_degraded_but_stay_200() {
        let (status, response) = health(State(HealthState { telegram_configured: false })).await;
        assert_eq!(status, axum::http::StatusCode::OK);
        assert_eq!(response.0.status, "degraded");
        assert_eq!(response.0.telegram.status, "unconfigured");
    }
}
