//! Channel handlers: registry listing and server-side publish.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{ChannelInfo, ChannelListResponse, PublishRequest, PublishResponse};
use crate::app_state::AppState;
use crate::domain::{Channel, Event};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /channels` — List channels with their subscriber counts.
#[utoipa::path(
    get,
    path = "/api/v1/channels",
    tag = "Channels",
    summary = "List channels",
    description = "Returns every channel of the fixed registry with its current subscriber count.",
    responses(
        (status = 200, description = "Channel listing", body = ChannelListResponse),
    )
)]
pub async fn list_channels(State(state): State<AppState>) -> Json<ChannelListResponse> {
    let mut channels = Vec::with_capacity(Channel::ALL.len());
    for channel in Channel::ALL {
        channels.push(ChannelInfo {
            channel,
            subscribers: state.manager.subscriber_count(channel).await,
        });
    }
    Json(ChannelListResponse {
        channels,
        total_connections: state.manager.connection_count().await,
    })
}

/// `POST /channels/{channel}/events` — Publish an event to subscribers.
///
/// Used by in-cluster producers (news ingestion, admin tooling) that push
/// events without an upstream stream.
///
/// # Errors
///
/// Returns [`GatewayError::UnknownChannel`] for a name outside the registry
/// and [`GatewayError::InvalidRequest`] for an empty event type.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{channel}/events",
    tag = "Channels",
    summary = "Publish an event",
    description = "Broadcasts the event to every connection subscribed to the channel and returns how many connections it was queued for.",
    params(("channel" = String, Path, description = "Channel name")),
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Event published", body = PublishResponse),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 404, description = "Unknown channel", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let channel: Channel = channel.parse()?;
    let event_type = req.event_type.trim();
    if event_type.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "event type must not be empty".to_string(),
        ));
    }

    let delivered = state
        .manager
        .publish(channel, Event::new(event_type, req.data))
        .await;
    tracing::info!(%channel, event_type, delivered, "event published via api");

    Ok(Json(PublishResponse {
        channel,
        event_type: event_type.to_string(),
        delivered,
        published_at: Utc::now(),
    }))
}

/// Channel routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/channels", get(list_channels))
        .route("/channels/{channel}/events", post(publish_event))
}
