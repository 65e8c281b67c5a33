//! HTTP ingress for Slack webhooks.
//!
//! Two POST routes: `/slashcommand` (the `/pickrandom` command) and
//! `/actions` (interactive button clicks). Both handlers take the raw body
//! so the signature guard sees exactly the bytes Slack signed, then decode
//! the form themselves.

pub mod auth;
pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::config::schema::Config;
use crate::jobs::service::JobService;
use crate::server::auth::verify_slack_signature;
use crate::server::handlers::{handle_action, handle_slash, Reply, SlashForm};
use crate::slack::client::SlackApi;
use crate::slack::format::HELP;

/// Shared application state, created once in `main` and handed to every
/// handler through axum's `State`.
pub struct AppState {
    pub config: Config,
    pub jobs: Arc<Mutex<JobService>>,
    pub slack: Arc<dyn SlackApi>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/slashcommand", post(slashcommand))
        .route("/actions", post(actions))
        .with_state(state)
}

async fn slashcommand(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = verify_slack_signature(
        &headers,
        &body,
        &state.config.slack.signing_secret,
        Utc::now().timestamp(),
    ) {
        warn!("Rejected /slashcommand: {}", e);
        return (StatusCode::UNAUTHORIZED, "Invalid secret").into_response();
    }

    let fields = parse_form(&body);
    let form = match slash_form(&fields) {
        Some(form) => form,
        None => return (StatusCode::BAD_REQUEST, "missing form fields").into_response(),
    };

    match handle_slash(&state, &form).await {
        Ok(reply) => reply.into_response(),
        Err(e) => {
            error!("/slashcommand failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

async fn actions(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(e) = verify_slack_signature(
        &headers,
        &body,
        &state.config.slack.signing_secret,
        Utc::now().timestamp(),
    ) {
        warn!("Rejected /actions: {}", e);
        return (StatusCode::UNAUTHORIZED, "Invalid secret").into_response();
    }

    let fields = parse_form(&body);
    let payload: Value = match fields.get("payload").and_then(|p| serde_json::from_str(p).ok()) {
        Some(payload) => payload,
        None => return (StatusCode::BAD_REQUEST, "missing payload").into_response(),
    };

    match handle_action(&state, &payload).await {
        Ok(()) => "OK".into_response(),
        Err(e) => {
            error!("/actions failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Help => Json(Value::String(HELP.to_string())).into_response(),
            Reply::Text(text) => text.into_response(),
            Reply::Blocks(blocks) => Json(blocks).into_response(),
            Reply::Empty => String::new().into_response(),
        }
    }
}

fn parse_form(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn slash_form(fields: &HashMap<String, String>) -> Option<SlashForm> {
    Some(SlashForm {
        text: fields.get("text")?.clone(),
        user_id: fields.get("user_id")?.clone(),
        channel_id: fields.get("channel_id")?.clone(),
        team_id: fields.get("team_id")?.clone(),
    })
}
