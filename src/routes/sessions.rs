use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query as UrlQuery, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::SharedState;
use crate::error::ApiError;
use crate::models::{SensorData, Session, TrajectoryPoint};
use crate::store::{DataStore, Query, SENSOR_DATA_TABLE, SESSIONS_TABLE};
use crate::telemetry::{self, SessionStats};

const TRAJECTORY_COLUMNS: &str = "timestamp,uwb_x,uwb_y,steering_angle";

#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsParams {
    pub user_id: Option<String>,
}

pub async fn list_sessions<S: DataStore>(
    State(state): State<SharedState<S>>,
    params: Result<UrlQuery<ListSessionsParams>, QueryRejection>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let UrlQuery(params) = params?;
    let store = state.store()?;

    let mut query = Query::new().order_by("created_at", true);
    if let Some(user_id) = params.user_id.as_deref().filter(|u| !u.is_empty()) {
        query = query.eq("user_id", user_id);
    }

    let sessions = store
        .query(SESSIONS_TABLE, &query)
        .await
        .map_err(ApiError::data)?;
    Ok(Json(sessions))
}

pub async fn create_session<S: DataStore>(
    State(state): State<SharedState<S>>,
    payload: Result<Json<Session>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let Json(session) = payload?;
    session.validate().map_err(ApiError::Validation)?;
    let store = state.store()?;

    let stored: Vec<Session> = store
        .insert(SESSIONS_TABLE, &[session.to_new_row()])
        .await
        .map_err(ApiError::data)?;
    let created = stored
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Rejected("Failed to create session".to_string()))?;

    log::info!("Created session {}", created.id.as_deref().unwrap_or("<no id>"));
    Ok((StatusCode::CREATED, Json(created)))
}

async fn session_records<S: DataStore>(
    store: &S,
    session_id: &str,
    columns: &str,
) -> Result<Vec<SensorData>, ApiError> {
    let query = Query::new()
        .select(columns)
        .eq("session_id", session_id)
        .order_by("timestamp", false);
    store
        .query(SENSOR_DATA_TABLE, &query)
        .await
        .map_err(ApiError::data)
}

pub async fn trajectory<S: DataStore>(
    State(state): State<SharedState<S>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<TrajectoryPoint>>, ApiError> {
    let store = state.store()?;
    let records = session_records(store, &session_id, TRAJECTORY_COLUMNS).await?;
    Ok(Json(telemetry::trajectory(&records)))
}

pub async fn stats<S: DataStore>(
    State(state): State<SharedState<S>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStats>, ApiError> {
    let store = state.store()?;
    let records = session_records(store, &session_id, "*").await?;
    let stats = telemetry::session_stats(&session_id, &records)?;
    Ok(Json(stats))
}

pub async fn add_sensor_data<S: DataStore>(
    State(state): State<SharedState<S>>,
    Path(session_id): Path<String>,
    payload: Result<Json<SensorData>, JsonRejection>,
) -> Result<(StatusCode, Json<SensorData>), ApiError> {
    let Json(mut record) = payload?;
    record.session_id = session_id;
    record.validate().map_err(ApiError::Validation)?;
    let store = state.store()?;

    let stored: Vec<SensorData> = store
        .insert(SENSOR_DATA_TABLE, std::slice::from_ref(&record))
        .await
        .map_err(ApiError::data)?;
    let created = stored
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Rejected("Failed to add sensor data".to_string()))?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Inserts a whole batch in one upstream call.
pub async fn add_sensor_batch<S: DataStore>(
    State(state): State<SharedState<S>>,
    Path(session_id): Path<String>,
    payload: Result<Json<Vec<SensorData>>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(mut records) = payload?;
    if records.is_empty() {
        return Err(ApiError::Validation("at least one sensor record is required".to_string()));
    }
    for (i, record) in records.iter_mut().enumerate() {
        record.session_id = session_id.clone();
        record
            .validate()
            .map_err(|e| ApiError::Validation(format!("record {}: {}", i, e)))?;
    }
    let store = state.store()?;

    let stored: Vec<Value> = store
        .insert(SENSOR_DATA_TABLE, &records)
        .await
        .map_err(ApiError::data)?;

    log::debug!("Session {}: stored {} sensor records", session_id, stored.len());
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Added {} data points", stored.len()),
            "inserted": stored.len(),
        })),
    ))
}
