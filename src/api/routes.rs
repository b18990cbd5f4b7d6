//! HTTP route definitions

use crate::api::handlers;
use crate::api::models::*;
use crate::storage::ImageRecord;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Prompt Image Gateway API",
        description = "Generate images from prompt files, validate rendered text with OCR, and store images in a cloud bucket.",
        license(name = "MIT"),
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        handlers::list_images,
        handlers::fetch_and_upload,
        handlers::upload,
        handlers::health_check,
    ),
    components(schemas(
        ImageRecord,
        ImageListResponse,
        FetchAndUploadForm,
        FetchAndUploadResponse,
        UploadForm,
        UploadResponse,
        ErrorResponse,
        HealthResponse,
    )),
    tags(
        (name = "Images", description = "Image generation, proxying and listing"),
        (name = "Health", description = "Health and monitoring endpoints"),
    )
)]
pub struct ApiDoc;

/// Create the main application router
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let max_upload_bytes = state.settings.server.max_upload_bytes;

    let api_routes = Router::new()
        .route("/images", get(handlers::list_images))
        .route("/fetch-and-upload", post(handlers::fetch_and_upload))
        .route("/upload", post(handlers::upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
