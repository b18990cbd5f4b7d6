//! HTTP request handlers

use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::models::{
    FetchAndUploadForm, FetchAndUploadResponse, HealthResponse, ImageListResponse, UploadResponse,
};
use crate::backend::validate_http_url;
use crate::error::AppError;
use crate::pipeline::{self, GenerationRequest};
use crate::AppState;

/// List generated images, newest first
#[utoipa::path(
    get,
    path = "/api/images",
    tag = "Images",
    responses(
        (status = 200, description = "Stored images", body = ImageListResponse),
        (status = 500, description = "Storage failure", body = crate::api::models::ErrorResponse)
    )
)]
pub async fn list_images(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ImageListResponse>, AppError> {
    let images = pipeline::list_generated(&state).await?;
    info!(count = images.len(), "Listed generated images");
    Ok(Json(ImageListResponse { images }))
}

/// Copy an external image into storage
#[utoipa::path(
    post,
    path = "/api/fetch-and-upload",
    tag = "Images",
    request_body(
        content = FetchAndUploadForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Also accepted as multipart/form-data"
    ),
    responses(
        (status = 200, description = "Image stored", body = FetchAndUploadResponse),
        (status = 400, description = "Invalid image URL", body = crate::api::models::ErrorResponse),
        (status = 500, description = "Fetch or upload failure", body = crate::api::models::ErrorResponse)
    )
)]
pub async fn fetch_and_upload(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<FetchAndUploadResponse>, AppError> {
    let form = read_fetch_form(request).await?;
    info!(image_url = %form.image_url, "Received fetch-and-upload request");

    validate_http_url(&form.image_url)?;
    let gcs_url = pipeline::proxy_image(&state, &form.image_url).await?;

    Ok(Json(FetchAndUploadResponse { gcs_url }))
}

/// Browsers post `FormData` as multipart; everything else is treated as urlencoded
async fn read_fetch_form(request: Request) -> Result<FetchAndUploadForm, AppError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| {
            ct.trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        });

    if !is_multipart {
        let Form(form) = Form::<FetchAndUploadForm>::from_request(request, &())
            .await
            .map_err(|e| AppError::InvalidInput(format!("Invalid form body: {}", e)))?;
        return Ok(form);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid form body: {}", e)))?;

    let mut image_url = None;
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() == Some("image_url") {
            image_url = Some(field.text().await.map_err(malformed)?);
        }
    }

    image_url
        .map(|image_url| FetchAndUploadForm { image_url })
        .ok_or_else(|| AppError::InvalidInput("Image URL is required.".to_string()))
}

/// Generate an image from uploaded prompt files, optionally validating its text with OCR
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "Images",
    request_body(content = crate::api::models::UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image generated (and OCR matched, if requested)", body = UploadResponse),
        (status = 400, description = "Empty prompt or OCR mismatch", body = UploadResponse),
        (status = 500, description = "Provider, fetch or OCR failure", body = crate::api::models::ErrorResponse)
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut fragments: Vec<String> = Vec::new();
    let mut reference_image: Option<Vec<u8>> = None;
    let mut ocr_requested = false;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => {
                let bytes = field.bytes().await.map_err(malformed)?;
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    AppError::InvalidInput("Prompt files must be UTF-8 text".to_string())
                })?;
                fragments.push(text);
            }
            "image" => {
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    reference_image = Some(bytes.to_vec());
                }
            }
            "ocr" => {
                let value = field.text().await.map_err(malformed)?;
                ocr_requested = value.trim().eq_ignore_ascii_case("true");
            }
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    info!(
        prompt_files = fragments.len(),
        reference_image = reference_image.is_some(),
        ocr = ocr_requested,
        "Received upload request"
    );

    let request = GenerationRequest::from_fragments(&fragments, reference_image, ocr_requested)?;
    let result = pipeline::run_generation(&state, request).await?;

    if result.matched == Some(false) {
        return Err(AppError::OcrMismatch {
            image_url: result.image_url,
            extracted_text: result.extracted_text.unwrap_or_default(),
            expected_text: result.expected_text.unwrap_or_default(),
        });
    }

    info!(image_url = %result.image_url, matched = ?result.matched, "Upload request completed");
    Ok(Json(UploadResponse::from(result)))
}

fn malformed(e: MultipartError) -> AppError {
    AppError::InvalidInput(format!("Malformed multipart body: {}", e))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
