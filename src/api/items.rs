use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, DeletedDto, forms};
use crate::models::ItemRecord;
use crate::services::ItemsListing;

pub async fn list_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ItemsListing>>, ApiError> {
    let listing = state.items.list().await?;
    Ok(Json(ApiResponse::success(listing)))
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ItemRecord>>, ApiError> {
    let fields = forms::read_item_form(&mut multipart).await?;
    let write = state.items.create(fields).await?;
    Ok(Json(ApiResponse::success(write.item)))
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ItemRecord>>, ApiError> {
    let fields = forms::read_item_form(&mut multipart).await?;
    let write = state.items.update(&id, fields).await?;
    Ok(Json(ApiResponse::success(write.item)))
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedDto>>, ApiError> {
    let outcome = state.items.delete(&id).await?;
    Ok(Json(ApiResponse::success(DeletedDto {
        deleted: outcome.deleted,
    })))
}
