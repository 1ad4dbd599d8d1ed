use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::ApiError;
use crate::server::SharedState;
use crate::store::{IdentityRecord, Status};

fn status_response(state: &SharedState, record: &IdentityRecord) -> Result<Response, ApiError> {
    match record.status {
        Status::Verified => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/ld+json")],
            record.document.clone(),
        )
            .into_response()),
        Status::Revoked => Ok((
            StatusCode::GONE,
            Json(json!({ "status": "revoked" })),
        )
            .into_response()),
        Status::Superseded => {
            let newest = state
                .store
                .get_newest_by_root(&record.root)
                .map_err(ApiError::Store)?
                .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;
            let location = format!("{}/{}", state.base_url, newest.id);
            Ok((
                StatusCode::SEE_OTHER,
                [(header::LOCATION, location)],
                Json(json!({ "supersededBy": newest.id })),
            )
                .into_response())
        }
        Status::Init => Ok((StatusCode::NOT_FOUND, Json(json!({ "status": "not found" }))).into_response()),
    }
}

/// `GET /{id}`
pub async fn by_id(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.get_by_id(&id).map_err(ApiError::Store)? {
        Some(record) => status_response(&state, &record),
        None => Ok((StatusCode::NOT_FOUND, Json(json!({ "status": "not found" }))).into_response()),
    }
}

/// `GET /root/{id}` — newest record in the lineage rooted at `id`.
pub async fn by_root(
    State(state): State<Arc<SharedState>>,
    Path(root): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.get_newest_by_root(&root).map_err(ApiError::Store)? {
        Some(record) => status_response(&state, &record),
        None => Ok((StatusCode::NOT_FOUND, Json(json!({ "status": "not found" }))).into_response()),
    }
}

/// `GET /history/{id}` — ordered, `init`-excluded lineage history.
pub async fn history(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let anchor = state
        .store
        .get_by_id(&id)
        .map_err(ApiError::Store)?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    let records = state
        .store
        .get_history_by_root(&anchor.root)
        .map_err(ApiError::Store)?;

    let entries: Vec<_> = records
        .iter()
        .map(|r| match r.status {
            Status::Verified => json!({ "did": r.id, "valid": r.created }),
            Status::Superseded => {
                json!({ "did": r.id, "superseded": r.superseded_at.clone().unwrap_or_default() })
            }
            Status::Revoked => json!({ "did": r.id, "revoked": r.modified }),
            Status::Init => json!({ "did": r.id }),
        })
        .collect();

    Ok(Json(json!({ "history": entries })).into_response())
}
