//! HTTP handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use beacon_core::{Event, NewSensor, NewUser, Sensor, SensorId, User, UserId};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::health::HealthResponse;
use crate::server::AppState;

/// Body of `POST /events`.
#[derive(Debug, Deserialize)]
pub struct IngestEvent {
    /// Serial number of the reporting sensor.
    pub sensor_serial_number: String,
    /// Reading value.
    pub payload: i64,
}

/// Query of `GET /sensors/{sensor_id}/history`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Inclusive lower bound, RFC 3339.
    pub start_date: Option<String>,
    /// Inclusive upper bound, RFC 3339.
    pub end_date: Option<String>,
}

/// Body of `POST /users/{user_id}/sensors`.
#[derive(Debug, Deserialize)]
pub struct SensorBinding {
    /// Sensor to attach.
    pub sensor_id: i64,
}

fn parse_sensor_id(raw: &str) -> Result<SensorId, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidSensorId)
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidUserId)
}

fn parse_bound(raw: Option<&str>, field: &'static str) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ApiError::InvalidTimestamp(field))
    })
    .transpose()
}

/// GET /ping
pub async fn ping() -> &'static str {
    "pong"
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::snapshot(
        state.start_time,
        state.shutdown.is_accepting(),
        state.push.connection_count(),
        state.service.sensor_count(),
    ))
}

/// POST /sensors
pub async fn register_sensor(
    State(state): State<AppState>,
    body: Result<Json<NewSensor>, JsonRejection>,
) -> Result<(StatusCode, Json<Sensor>), ApiError> {
    let Json(new) = body?;
    let sensor = state.service.register_sensor(new)?;
    Ok((StatusCode::CREATED, Json(sensor)))
}

/// GET /sensors
pub async fn list_sensors(State(state): State<AppState>) -> Json<Vec<Sensor>> {
    Json(state.service.sensors())
}

/// GET /sensors/{sensor_id}
pub async fn get_sensor(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Sensor>, ApiError> {
    let id = parse_sensor_id(&raw_id)?;
    Ok(Json(state.service.sensor(id)?))
}

/// POST /events
pub async fn ingest_event(
    State(state): State<AppState>,
    body: Result<Json<IngestEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let Json(req) = body?;
    let event = state
        .service
        .receive_event(&req.sensor_serial_number, req.payload, Utc::now())?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /sensors/{sensor_id}/history
pub async fn sensor_history(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let id = parse_sensor_id(&raw_id)?;
    let start = parse_bound(query.start_date.as_deref(), "start_date")?;
    let end = parse_bound(query.end_date.as_deref(), "end_date")?;
    let events = state.service.sensor_history(id, start, end).await?;
    Ok(Json(events))
}

/// POST /users
pub async fn register_user(
    State(state): State<AppState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(new) = body?;
    Ok(Json(state.service.register_user(new)?))
}

/// GET /users/{user_id}/sensors
pub async fn user_sensors(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<Sensor>>, ApiError> {
    let user_id = parse_user_id(&raw_id)?;
    Ok(Json(state.service.user_sensors(user_id)?))
}

/// POST /users/{user_id}/sensors
pub async fn attach_user_sensor(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Result<Json<SensorBinding>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let user_id = parse_user_id(&raw_id)?;
    let Json(binding) = body?;
    if binding.sensor_id <= 0 {
        return Err(ApiError::InvalidSensorId);
    }
    state
        .service
        .attach_sensor_to_user(user_id, SensorId::new(binding.sensor_id))?;
    Ok(StatusCode::CREATED)
}

/// GET /sensors/{sensor_id}/events
///
/// Every check runs before the upgrade, so a rejected request never opens a
/// stream.
pub async fn sensor_events(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let sensor_id = parse_sensor_id(&raw_id)?;
    if !state.shutdown.is_accepting() {
        return Err(ApiError::ShuttingDown);
    }
    let sensor = state.push.resolve_sensor(sensor_id).await?;

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(sensor_id = %sensor_id, error = %rejection, "not a websocket request");
            return Ok(rejection.into_response());
        }
    };

    let push = state.push.clone();
    let request = state.shutdown.token().child_token();
    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(sensor_id = %sensor_id, error = %e, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let _ = push.serve_socket(sensor.id, &request, socket).await;
        }))
}
