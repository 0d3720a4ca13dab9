//! Channel ingress: `POST /api/messages`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tertulia_agent::TurnRunner;
use tertulia_channel::connector::ReplyConnector;
use tertulia_core::domain::activity::Activity;
use tertulia_core::errors::{ApplicationError, InterfaceError};
use tracing::{error, info};

#[derive(Clone)]
pub struct MessagesState {
    runner: Arc<TurnRunner>,
    connector: Arc<dyn ReplyConnector>,
}

impl MessagesState {
    pub fn new(runner: Arc<TurnRunner>, connector: Arc<dyn ReplyConnector>) -> Self {
        Self { runner, connector }
    }
}

/// Inline response body for `deliveryMode = "expectReplies"`.
#[derive(Debug, Serialize)]
pub struct ExpectedReplies {
    pub activities: Vec<Activity>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    correlation_id: String,
}

pub fn router(state: MessagesState) -> Router {
    Router::new().route("/api/messages", post(messages)).with_state(state)
}

pub async fn messages(
    State(state): State<MessagesState>,
    Json(activity): Json<Activity>,
) -> Response {
    info!(
        event_name = "ingress.activity.received",
        correlation_id = %activity.correlation_id(),
        conversation_id = %activity.conversation.id,
        channel_id = %activity.channel_id,
        activity_type = ?activity.activity_type,
        "activity received"
    );

    let replies = state.runner.on_turn(activity.clone()).await;

    if activity.expects_replies() {
        let activities = replies.iter().map(|reply| reply.to_activity(&activity)).collect();
        return (StatusCode::OK, Json(ExpectedReplies { activities })).into_response();
    }

    match state.connector.send(&activity, &replies).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(delivery_error) => {
            error!(
                event_name = "egress.connector.failed",
                correlation_id = %activity.correlation_id(),
                conversation_id = %activity.conversation.id,
                error = %delivery_error,
                "reply delivery failed"
            );
            let interface = ApplicationError::Integration(delivery_error.to_string())
                .into_interface(activity.correlation_id());
            error_response(&interface)
        }
    }
}

fn error_response(interface: &InterfaceError) -> Response {
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        error: interface.user_message(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (status, Json(body)).into_response()
}
