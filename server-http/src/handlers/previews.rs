use crate::api::DeleteResponse;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use darkroom::domain::response::{InvalidateResponse, PreviewStats};
use darkroom::{ImageId, PreviewAdmin, PreviewOperations, StoredObject};
use shared::Error;
use tracing::info;

pub const PREVIEW_CACHE_HEADER: &str = "x-preview-cache";

fn parse_id(raw: &str) -> Result<ImageId, ApiError> {
    Ok(raw.parse::<ImageId>()?)
}

/// GET /images/:id/preview
pub async fn get_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let response = state.previews.get_preview(&id).await?;

    let cache_status = if response.from_cache { "hit" } else { "miss" };
    let (bytes, content_type) = response.preview.into_parts();
    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::HeaderName::from_static(PREVIEW_CACHE_HEADER),
                HeaderValue::from_static(cache_status),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// PUT /images/:id
pub async fn put_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidInput("Content-Type header is required".to_string()))?;
    if body.is_empty() {
        return Err(Error::InvalidInput("image body is empty".to_string()).into());
    }

    info!("PUT image: id={}, type={}, size={}", id, content_type, body.len());
    state
        .previews
        .store_original(id, StoredObject::new(body, content_type))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /images/:id
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&id)?;
    info!("DELETE image: id={}", id);
    let deleted = state.previews.delete_image(&id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// DELETE /images/:id/preview
pub async fn invalidate_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.previews.invalidate(&id).await?))
}

/// DELETE /previews
pub async fn clear_previews(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.previews.clear_cache().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /previews/stats
pub async fn preview_stats(
    State(state): State<AppState>,
) -> Result<Json<PreviewStats>, ApiError> {
    Ok(Json(state.previews.stats().await?))
}
