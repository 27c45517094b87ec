use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{Pagination, ResetResponse, ScanRequest};
use super::model::FoodEntry;
use super::services::{reset_log, scan_and_log, ScanError};
use crate::analysis::ANALYSIS_FAILED_MESSAGE;
use crate::images::services::{presign_entry_image, stored_key, CapturedImage};
use crate::state::AppState;

type Created = (StatusCode, [(HeaderName, String); 1], Json<FoodEntry>);

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries).delete(reset_entries))
        .route("/entries/scan", post(scan_base64))
        .route("/entries/upload", post(scan_multipart))
        .route("/entries/:id", get(get_entry))
        .route("/entries/:id/photo", get(get_entry_photo))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
pub async fn list_entries(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Json<Vec<FoodEntry>> {
    let journal = state.journal.lock().await;
    let items = journal
        .log()
        .history(p.limit, p.offset)
        .into_iter()
        .cloned()
        .collect();
    Json(items)
}

#[instrument(skip(state))]
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FoodEntry>, (StatusCode, String)> {
    let journal = state.journal.lock().await;
    match journal.log().find(id) {
        Some(entry) => Ok(Json(entry.clone())),
        None => Err((StatusCode::NOT_FOUND, "Entry not found".into())),
    }
}

/// POST /entries/scan { "image": "data:image/jpeg;base64,..." }
#[instrument(skip(state, body))]
pub async fn scan_base64(
    State(state): State<AppState>,
    Json(body): Json<ScanRequest>,
) -> Result<Created, (StatusCode, String)> {
    let image = CapturedImage::from_data_uri(&body.image).map_err(bad_request)?;
    let entry = scan_and_log(&state, image).await.map_err(scan_failure)?;
    Ok(created(entry))
}

/// POST /entries/upload (multipart, field `file`)
#[instrument(skip(state, mp))]
pub async fn scan_multipart(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<Created, (StatusCode, String)> {
    let mut image = None;
    while let Some(field) = mp.next_field().await.map_err(bad_request)? {
        if !matches!(field.name(), Some("file" | "files" | "files[]")) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(bad_request)?;
        image = Some(CapturedImage::from_bytes(data, content_type.as_deref()).map_err(bad_request)?);
        break;
    }
    let Some(image) = image else {
        return Err((StatusCode::BAD_REQUEST, "file is required".into()));
    };

    let entry = scan_and_log(&state, image).await.map_err(scan_failure)?;
    Ok(created(entry))
}

#[instrument(skip(state))]
pub async fn reset_entries(
    State(state): State<AppState>,
) -> Result<Json<ResetResponse>, (StatusCode, String)> {
    let discarded = reset_log(&state).await.map_err(|e| {
        error!(error = %e, "reset failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(ResetResponse {
        discarded: discarded.len(),
    }))
}

/// Redirects to the stored image, or serves the inline one.
#[instrument(skip(state))]
pub async fn get_entry_photo(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let Some(entry) = state.journal.lock().await.log().find(id).cloned() else {
        return (StatusCode::NOT_FOUND, "Entry not found").into_response();
    };

    if let (Some(key), Some(storage)) = (stored_key(&entry), &state.storage) {
        return match presign_entry_image(storage.as_ref(), key).await {
            Ok(url) => Redirect::temporary(&url).into_response(),
            Err(e) => {
                error!(error = %e, %id, "presign failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "presign failed").into_response()
            }
        };
    }

    match entry.image_url.as_deref().map(CapturedImage::from_data_uri) {
        Some(Ok(image)) => ([(header::CONTENT_TYPE, image.mime)], Body::from(image.bytes)).into_response(),
        Some(Err(e)) => {
            warn!(error = %e, %id, "stored image reference is unreadable");
            (StatusCode::NOT_FOUND, "Photo not found").into_response()
        }
        None => (StatusCode::NOT_FOUND, "Photo not found").into_response(),
    }
}

fn created(entry: FoodEntry) -> Created {
    info!(id = %entry.id, name = %entry.name, calories = entry.calories, "entry logged");
    let location = format!("/api/v1/entries/{}", entry.id);
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(entry))
}

fn scan_failure(e: ScanError) -> (StatusCode, String) {
    match e {
        ScanError::Busy(e) => (StatusCode::CONFLICT, e.to_string()),
        ScanError::Analysis(_) => (StatusCode::BAD_GATEWAY, ANALYSIS_FAILED_MESSAGE.into()),
        ScanError::Record(e) => {
            error!(error = %e, "recording scanned entry failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
