//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

use crate::api::dto::{ChannelInfo, ChannelListResponse, PublishRequest, PublishResponse};
use crate::api::handlers::{channels, system};
use crate::bridge::{BridgeState, BridgeStatus};
use crate::domain::{Channel, ConnectionId};
use crate::error::{ErrorBody, ErrorResponse};
use crate::ws::handler as ws_handler;
use crate::ws::messages::{ConnectionInfo, StatsSnapshot};

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "trading-gateway",
        description = "Real-time event distribution for the trading platform. Clients connect to `/ws` for channel broadcasts; in-cluster producers publish through `/api/v1/channels/{channel}/events`."
    ),
    paths(
        system::health_handler,
        channels::list_channels,
        channels::publish_event,
        ws_handler::stats_handler,
    ),
    components(schemas(
        Channel,
        ConnectionId,
        ChannelInfo,
        ChannelListResponse,
        PublishRequest,
        PublishResponse,
        StatsSnapshot,
        ConnectionInfo,
        BridgeState,
        BridgeStatus,
        system::HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Channels", description = "Channel registry and server-side publish"),
        (name = "WebSocket", description = "Live connection statistics"),
    )
)]
pub struct ApiDoc;
