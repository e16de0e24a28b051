//! HTTP control surface — reviewer action events and the "check now"
//! trigger.
//!
//! `/interactions` is the interface boundary for the interactive action
//! channel: whatever delivers button presses (gateway relay, webhook
//! proxy) posts `{custom_id, ...}` here and gets the decision report back.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::action::ActionTag;
use crate::decision::DecisionEngine;
use crate::poller::PollTrigger;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub trigger: PollTrigger,
}

/// Reviewer action event: the tag plus whatever opaque context the
/// delivering transport attaches.
#[derive(Debug, Deserialize)]
pub struct InteractionEvent {
    pub custom_id: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Build the control-surface router.
pub fn routes(engine: Arc<DecisionEngine>, trigger: PollTrigger) -> Router {
    let state = AppState { engine, trigger };

    Router::new()
        .route("/healthz", get(health))
        .route("/interactions", post(handle_interaction))
        .route("/check", post(check_now))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "app-intake"
    }))
}

/// Decode the action tag and run the decision engine. Malformed tags are
/// the caller's problem; everything past decoding reports through the
/// engine's outcome string.
async fn handle_interaction(
    State(state): State<AppState>,
    Json(event): Json<InteractionEvent>,
) -> impl IntoResponse {
    let tag = match ActionTag::decode(&event.custom_id) {
        Ok(tag) => tag,
        Err(e) => {
            warn!(custom_id = %event.custom_id, "Rejected interaction: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            );
        }
    };

    info!(custom_id = %event.custom_id, "Reviewer action received");
    let report = state.engine.decide(tag).await;
    (StatusCode::OK, Json(serde_json::json!({ "report": report })))
}

/// Force an immediate full poll cycle across all sources.
async fn check_now(State(state): State<AppState>) -> impl IntoResponse {
    if state.trigger.check_now().await {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "report": "✅ Done checking all sheets." })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "report": "❌ Check failed." })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_event_decodes_with_and_without_context() {
        let event: InteractionEvent =
            serde_json::from_str(r#"{"custom_id":"accept_0_5"}"#).unwrap();
        assert_eq!(event.custom_id, "accept_0_5");

        let event: InteractionEvent = serde_json::from_str(
            r#"{"custom_id":"reject_3","context":{"message_id":"123"}}"#,
        )
        .unwrap();
        assert_eq!(event.custom_id, "reject_3");
        assert_eq!(event.context["message_id"], "123");
    }
}
