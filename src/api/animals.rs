use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, DeletedDto, forms};
use crate::models::AnimalRecord;

pub async fn list_animals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<AnimalRecord>>>, ApiError> {
    let animals = state.animals.list().await?;
    Ok(Json(ApiResponse::success(animals)))
}

pub async fn create_animal(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<AnimalRecord>>, ApiError> {
    let fields = forms::read_animal_form(&mut multipart).await?;
    let write = state.animals.create(fields).await?;
    Ok(Json(ApiResponse::with_warning(write.animal, write.warning)))
}

pub async fn update_animal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<AnimalRecord>>, ApiError> {
    let fields = forms::read_animal_form(&mut multipart).await?;
    let write = state.animals.update(&id, fields).await?;
    Ok(Json(ApiResponse::with_warning(write.animal, write.warning)))
}

pub async fn delete_animal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedDto>>, ApiError> {
    let outcome = state.animals.delete(&id).await?;
    Ok(Json(ApiResponse::with_warning(
        DeletedDto {
            deleted: outcome.deleted,
        },
        outcome.warning,
    )))
}
