use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::assets::MAX_UPLOAD_BYTES;
use crate::config::Config;
use crate::services::{AnimalService, ItemService};

mod animals;
mod error;
mod forms;
mod items;
mod types;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub animals: Arc<AnimalService>,

    pub items: Arc<ItemService>,
}

#[must_use]
pub fn create_app_state(config: &Config) -> Arc<AppState> {
    let data_root = &config.storage.data_root;
    Arc::new(AppState {
        animals: Arc::new(AnimalService::new(data_root)),
        items: Arc::new(ItemService::new(data_root)),
    })
}

/// Builds the application router: the CRUD endpoints, static serving of
/// stored assets under `/data`, permissive CORS (the admin frontend is
/// served from wherever), and request tracing.
pub fn router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The multipart body carries up to one image plus form fields; leave
    // headroom above the asset size cap.
    let body_limit = usize::try_from(MAX_UPLOAD_BYTES)
        .unwrap_or(usize::MAX)
        .saturating_add(1024 * 1024);

    Router::new()
        .route(
            "/api/animals",
            get(animals::list_animals).post(animals::create_animal),
        )
        .route(
            "/api/animals/{id}",
            put(animals::update_animal).delete(animals::delete_animal),
        )
        .route("/api/items", get(items::list_items).post(items::create_item))
        .route(
            "/api/items/{id}",
            put(items::update_item).delete(items::delete_item),
        )
        .nest_service("/data", ServeDir::new(&config.storage.data_root))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
