//! Axum-based HTTP API
//!
//! The web layer never touches controller state directly: it reads the
//! latest published snapshot from a `watch` channel and sends
//! [`ControllerCommand`]s. Sensor bridges publish readings into the shared
//! [`EntityHub`].

use crate::config::Config;
use crate::controller::{ControllerCommand, ControllerSnapshot};
use crate::controls::{ChargingControls, cap_options, validate_current_cap};
use crate::error::ChargeCtlError;
use crate::hub::{EntityHub, EntityState};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod logs;

#[derive(Clone)]
pub struct AppState {
    pub commands_tx: mpsc::UnboundedSender<ControllerCommand>,
    pub snapshot_rx: watch::Receiver<Arc<ControllerSnapshot>>,
    pub status_tx: broadcast::Sender<String>,
    pub hub: Arc<EntityHub>,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EnabledBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CurrentCapBody {
    pub amps: u32,
}

/// Entity update pushed by a sensor bridge
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntityBody {
    pub state: String,
    /// Replaces the option list when present
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ControlsView {
    #[serde(flatten)]
    pub controls: ChargingControls,
    pub current_cap_options: Vec<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

fn send_command(state: &AppState, cmd: ControllerCommand) -> Result<(), Response> {
    state.commands_tx.send(cmd).map_err(|_| {
        error_response(StatusCode::SERVICE_UNAVAILABLE, "controller is not running")
    })
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
)))]
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/status", responses(
    (status = 200, description = "Latest controller snapshot", body = ControllerSnapshot)
)))]
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json((*snapshot).clone())
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/controls", responses((status = 200, body = ControlsView))))]
pub async fn get_controls(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(ControlsView {
        controls: ChargingControls {
            enabled: snapshot.enabled,
            current_cap: snapshot.current_cap,
        },
        current_cap_options: cap_options(),
    })
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/controls/enabled", request_body = EnabledBody, responses((status = 200))))]
pub async fn set_enabled(
    State(state): State<AppState>,
    Json(body): Json<EnabledBody>,
) -> Response {
    if let Err(resp) = send_command(&state, ControllerCommand::SetEnabled(body.enabled)) {
        return resp;
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"ok": true, "enabled": body.enabled})),
    )
        .into_response()
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/controls/current_cap", request_body = CurrentCapBody, responses((status = 200), (status = 400))))]
pub async fn set_current_cap(
    State(state): State<AppState>,
    Json(body): Json<CurrentCapBody>,
) -> Response {
    if let Err(e) = validate_current_cap(body.amps) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }
    if let Err(resp) = send_command(&state, ControllerCommand::SetCurrentCap(body.amps)) {
        return resp;
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"ok": true, "current_cap": body.amps})),
    )
        .into_response()
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/update_charger", responses((status = 202))))]
pub async fn update_charger(State(state): State<AppState>) -> Response {
    if let Err(resp) = send_command(&state, ControllerCommand::UpdateCharger) {
        return resp;
    }
    (StatusCode::ACCEPTED, Json(serde_json::json!({"ok": true}))).into_response()
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/entities", responses((status = 200))))]
pub async fn list_entities(State(state): State<AppState>) -> impl IntoResponse {
    let entities: BTreeMap<String, EntityState> = state.hub.snapshot().into_iter().collect();
    Json(entities)
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/entities/{id}", params(("id" = String, Path, description = "Entity id")), responses((status = 200, body = EntityState), (status = 404))))]
pub async fn get_entity(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.hub.get(&id) {
        Some(entity) => Json(entity).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("unknown entity {}", id)),
    }
}

#[cfg_attr(feature = "openapi", utoipa::path(put, path = "/api/entities/{id}", params(("id" = String, Path, description = "Entity id")), request_body = EntityBody, responses((status = 200, body = EntityState), (status = 400))))]
pub async fn put_entity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EntityBody>,
) -> Response {
    if id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "entity id must not be empty");
    }
    match body.options {
        Some(options) => state.hub.upsert(&id, body.state, options),
        None => state.hub.set_state(&id, body.state),
    };
    match state.hub.get(&id) {
        Some(entity) => Json(entity).into_response(),
        None => error_response(StatusCode::INTERNAL_SERVER_ERROR, "entity vanished"),
    }
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/config", responses((status = 200))))]
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(
        serde_json::to_value(state.config.as_ref())
            .unwrap_or(serde_json::json!({"error": "serialization"})),
    )
}

#[cfg(feature = "openapi")]
#[utoipa::path(get, path = "/api/config/schema", responses((status = 200)))]
pub async fn get_config_schema() -> impl IntoResponse {
    let schema = schemars::schema_for!(crate::config::Config);
    Json(serde_json::to_value(&schema).unwrap_or(serde_json::json!({"error": "schema"})))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/events", responses((status = 200))))]
pub async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.status_tx.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok::<Event, std::convert::Infallible>(
            Event::default().event("status").data(payload),
        )),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        health, status, get_controls, set_enabled, set_current_cap, update_charger,
        list_entities, get_entity, put_entity, get_config, get_config_schema, events,
        logs::logs_tail, logs::logs_stream,
    ),
    components(schemas(
        EnabledBody, CurrentCapBody, EntityBody, ControlsView, EntityState,
        ControllerSnapshot, ChargingControls, logs::TailParams,
    )),
    tags((name = "chargectl", description = "Charging controller API"))
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/events", get(events))
        .route("/api/controls", get(get_controls))
        .route("/api/controls/enabled", post(set_enabled))
        .route("/api/controls/current_cap", post(set_current_cap))
        .route("/api/update_charger", post(update_charger))
        .route("/api/entities", get(list_entities))
        .route("/api/entities/{id}", get(get_entity).put(put_entity))
        .route("/api/config", get(get_config))
        .merge(logs::routes());

    #[cfg(feature = "openapi")]
    let router = {
        use utoipa::OpenApi;
        router
            .route("/api/config/schema", get(get_config_schema))
            .merge(
                utoipa_swagger_ui::SwaggerUi::new("/docs")
                    .url("/openapi.json", ApiDoc::openapi()),
            )
    };

    let router = router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    #[cfg(feature = "compression")]
    let router = router.layer(tower_http::compression::CompressionLayer::new());

    router
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ChargeCtlError::web(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api)",
        local_addr.ip(),
        local_addr.port()
    ));
    axum::serve(listener, router).await?;
    Ok(())
}
