//! The generic CRUD handlers. `db` and `table` query parameters select the target;
//! both are checked before anything else, including the request body.

use crate::error::AppError;
use crate::extractors::Principal;
use crate::resolver::ResolvedHandle;
use crate::response::{success_one, success_one_ok, success_page, SuccessOne};
use crate::service::{list_query, CrudService};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

/// Both selector parameters, or `MissingParameter` naming the first absent one.
/// Blank values count as absent; others are passed on exactly as sent.
fn selector(params: &HashMap<String, String>) -> Result<(&str, &str), AppError> {
    let get = |key: &'static str| {
        params
            .get(key)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or(AppError::MissingParameter(key))
    };
    Ok((get("db")?, get("table")?))
}

async fn resolve(state: &AppState, params: &HashMap<String, String>) -> Result<ResolvedHandle, AppError> {
    let (db, table) = selector(params)?;
    state.resolver().resolve(Some(db), Some(table)).await
}

fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("request body is empty".into()));
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))
}

pub async fn list(
    State(state): State<AppState>,
    _principal: Principal,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let handle = resolve(&state, &params).await?;
    let query = list_query(handle.schema(), &params)?;
    let page = CrudService::list(&handle, &query).await?;
    Ok(success_page(page))
}

pub async fn count(
    State(state): State<AppState>,
    _principal: Principal,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let handle = resolve(&state, &params).await?;
    let query = list_query(handle.schema(), &params)?;
    let count = CrudService::count(&handle, &query.filters).await?;
    Ok(success_one_ok(serde_json::json!({
        "db": handle.alias(),
        "table": handle.schema().name,
        "count": count,
    })))
}

pub async fn retrieve(
    State(state): State<AppState>,
    _principal: Principal,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let handle = resolve(&state, &params).await?;
    let row = CrudService::retrieve(&handle, &id).await?;
    Ok(success_one_ok(row))
}

pub async fn create(
    State(state): State<AppState>,
    _principal: Principal,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let handle = resolve(&state, &params).await?;
    let payload = parse_body(&body)?;
    let row = CrudService::create(&state.resolver(), &handle, &payload).await?;
    Ok(success_one(row))
}

pub async fn replace(
    State(state): State<AppState>,
    _principal: Principal,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    update(state, id, params, body, false).await
}

pub async fn partial_update(
    State(state): State<AppState>,
    _principal: Principal,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    update(state, id, params, body, true).await
}

async fn update(
    state: AppState,
    id: String,
    params: HashMap<String, String>,
    body: Bytes,
    partial: bool,
) -> Result<(StatusCode, Json<SuccessOne<Value>>), AppError> {
    let handle = resolve(&state, &params).await?;
    let payload = parse_body(&body)?;
    let row = CrudService::update(&state.resolver(), &handle, &id, &payload, partial).await?;
    Ok(success_one_ok(row))
}

pub async fn destroy(
    State(state): State<AppState>,
    _principal: Principal,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let handle = resolve(&state, &params).await?;
    CrudService::delete(&handle, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
