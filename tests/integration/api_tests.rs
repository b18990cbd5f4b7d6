//! API endpoint integration tests

use axum::body::Body;
use axum::http::{Request, StatusCode};
use prompt_image_gateway::api::models::{NO_OCR_MESSAGE, OCR_MISMATCH_MESSAGE, OCR_SUCCESS_MESSAGE};
use prompt_image_gateway::api::routes::create_router;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    fetch_and_upload_multipart_request, fetch_and_upload_request, json_body, mocks,
    multipart_body, png_bytes, test_settings, test_state, upload_request, BOUNDARY, BUCKET,
};

async fn servers() -> (MockServer, MockServer) {
    (MockServer::start().await, MockServer::start().await)
}

#[tokio::test]
async fn test_health_check() {
    let (provider, storage) = servers().await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_images_filters_and_sorts() {
    let (provider, storage) = servers().await;
    mocks::storage_listing(
        &storage,
        &[
            "generated/",
            "generated/2024-01-01-00-00-00-aaaa_proxied-image.png",
            "generated/2025-06-01-12-00-00-bbbb_generated-image.png",
            "generated/2024-12-31-23-59-59-cccc_proxied-image.png",
        ],
    )
    .await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(Request::builder().uri("/api/images").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let images = body["images"].as_array().unwrap();
    let names: Vec<&str> = images.iter().map(|i| i["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "generated/2025-06-01-12-00-00-bbbb_generated-image.png",
            "generated/2024-12-31-23-59-59-cccc_proxied-image.png",
            "generated/2024-01-01-00-00-00-aaaa_proxied-image.png",
        ]
    );
    assert_eq!(
        images[0]["url"],
        format!(
            "{}/storage/v1/b/{}/o/generated/2025-06-01-12-00-00-bbbb_generated-image.png?alt=media",
            storage.uri(),
            BUCKET
        )
    );
}

#[tokio::test]
async fn test_list_images_storage_failure() {
    let (provider, storage) = servers().await;
    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{}/o", BUCKET)))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&storage)
        .await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(Request::builder().uri("/api/images").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "storage_failed");
    assert!(!body["error"].as_str().unwrap().contains("backend unavailable"));
}

#[tokio::test]
async fn test_fetch_and_upload_rejects_non_http_scheme() {
    let (provider, storage) = servers().await;
    mocks::storage_upload(&storage, 0).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app.oneshot(fetch_and_upload_request("ftp://x")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_fetch_and_upload_twice_stores_two_objects() {
    let (provider, storage) = servers().await;
    mocks::generated_image(&provider, png_bytes(), 2).await;
    mocks::storage_upload(&storage, 2).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));
    let source = format!("{}{}", provider.uri(), mocks::GENERATED_PATH);

    let first = app
        .clone()
        .oneshot(fetch_and_upload_request(&source))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = json_body(first).await;

    let second = app.oneshot(fetch_and_upload_request(&source)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second = json_body(second).await;

    // Names only differ by a 16-bit suffix within one second, so distinctness
    // is covered by the naming unit tests; here both uploads must happen.
    let names = mocks::uploaded_names(&storage).await;
    assert_eq!(names.len(), 2);
    for (name, body) in names.iter().zip([&first, &second]) {
        assert!(name.starts_with("generated/"));
        assert!(name.ends_with("_proxied-image.png"));
        assert!(body["gcs_url"].as_str().unwrap().ends_with("_proxied-image.png?alt=media"));
    }
}

#[tokio::test]
async fn test_fetch_and_upload_accepts_multipart_form() {
    let (provider, storage) = servers().await;
    mocks::generated_image(&provider, png_bytes(), 1).await;
    mocks::storage_upload(&storage, 1).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));
    let source = format!("{}{}", provider.uri(), mocks::GENERATED_PATH);

    let response = app
        .oneshot(fetch_and_upload_multipart_request(&source))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["gcs_url"]
        .as_str()
        .unwrap()
        .starts_with(&format!("{}/storage/v1/b/{}/o/generated/", storage.uri(), BUCKET)));
    assert_eq!(mocks::uploaded_names(&storage).await.len(), 1);
}

#[tokio::test]
async fn test_fetch_and_upload_multipart_without_url() {
    let (provider, storage) = servers().await;
    mocks::storage_upload(&storage, 0).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let request = Request::builder()
        .method("POST")
        .uri("/api/fetch-and-upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(&[("other", None, b"x".to_vec())])))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_fetch_and_upload_source_not_found() {
    let (provider, storage) = servers().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&provider)
        .await;
    mocks::storage_upload(&storage, 0).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(fetch_and_upload_request(&format!("{}/missing.png", provider.uri())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "upstream_fetch_failed");
}

#[tokio::test]
async fn test_upload_empty_prompt_makes_no_provider_calls() {
    let (provider, storage) = servers().await;
    mocks::image_generation(&provider, 0).await;
    mocks::expected_text_completion(&provider, "unused", 0).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(upload_request(&[
            ("prompt", Some("a.txt"), b"   \n\t ".to_vec()),
            ("prompt", Some("b.txt"), Vec::new()),
            ("ocr", None, b"true".to_vec()),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn test_upload_without_ocr() {
    let (provider, storage) = servers().await;
    mocks::image_generation(&provider, 1).await;
    mocks::generated_image(&provider, png_bytes(), 1).await;
    mocks::expected_text_completion(&provider, "unused", 0).await;
    mocks::storage_upload(&storage, 0).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(upload_request(&[(
            "prompt",
            Some("prompt.txt"),
            b"a lighthouse at dusk".to_vec(),
        )]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], NO_OCR_MESSAGE);
    assert_eq!(body["extracted_text"], "");
    assert_eq!(
        body["image_url"],
        format!("{}{}", provider.uri(), mocks::GENERATED_PATH)
    );
    assert!(body.get("expected_text").is_none());
    assert!(body.get("gcs_url").is_none());
}

#[tokio::test]
async fn test_upload_ocr_match() {
    let (provider, storage) = servers().await;
    mocks::image_generation(&provider, 1).await;
    mocks::generated_image(&provider, png_bytes(), 1).await;
    mocks::expected_text_completion(&provider, "Grand Opening", 1).await;
    let app = create_router(test_state(
        test_settings(&provider.uri(), &storage.uri()),
        "GRAND OPENING\n",
    ));

    let response = app
        .oneshot(upload_request(&[
            ("prompt", Some("scene.txt"), b"A storefront banner".to_vec()),
            ("prompt", Some("text.txt"), b"that reads \"Grand Opening\"".to_vec()),
            ("ocr", None, b"true".to_vec()),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], OCR_SUCCESS_MESSAGE);
    assert_eq!(body["extracted_text"], "GRAND OPENING");
    assert_eq!(body["expected_text"], "Grand Opening");
}

#[tokio::test]
async fn test_upload_ocr_mismatch() {
    let (provider, storage) = servers().await;
    mocks::image_generation(&provider, 1).await;
    mocks::generated_image(&provider, png_bytes(), 1).await;
    mocks::expected_text_completion(&provider, "Grand Opening", 1).await;
    let app = create_router(test_state(
        test_settings(&provider.uri(), &storage.uri()),
        "CLOSED",
    ));

    let response = app
        .oneshot(upload_request(&[
            ("prompt", Some("prompt.txt"), b"A banner reading Grand Opening".to_vec()),
            ("ocr", None, b"TRUE".to_vec()),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["message"], OCR_MISMATCH_MESSAGE);
    assert_eq!(body["extracted_text"], "CLOSED");
    assert_eq!(body["expected_text"], "Grand Opening");
    assert_eq!(
        body["image_url"],
        format!("{}{}", provider.uri(), mocks::GENERATED_PATH)
    );
}

#[tokio::test]
async fn test_upload_generated_image_not_found() {
    let (provider, storage) = servers().await;
    let missing = format!("{}/files/expired.png", provider.uri());
    mocks::image_generation_with_url(&provider, &missing, 1).await;
    Mock::given(method("GET"))
        .and(path("/files/expired.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&provider)
        .await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(upload_request(&[("prompt", Some("p.txt"), b"a quiet harbor".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "upstream_fetch_failed");
}

#[tokio::test]
async fn test_upload_non_http_generated_url_is_server_error() {
    let (provider, storage) = servers().await;
    mocks::image_generation_with_url(&provider, "ftp://cdn.example/generated.png", 1).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(upload_request(&[("prompt", Some("p.txt"), b"a quiet harbor".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "upstream_fetch_failed");
}

#[tokio::test]
async fn test_upload_rejects_non_utf8_prompt() {
    let (provider, storage) = servers().await;
    mocks::image_generation(&provider, 0).await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(upload_request(&[("prompt", Some("bin.txt"), vec![0xff, 0xfe, 0x00])]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_generation_failure() {
    let (provider, storage) = servers().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "message": "content policy violation" }
        })))
        .expect(1)
        .mount(&provider)
        .await;
    let app = create_router(test_state(test_settings(&provider.uri(), &storage.uri()), ""));

    let response = app
        .oneshot(upload_request(&[("prompt", Some("p.txt"), b"forbidden".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "upstream_generation_failed");
    assert!(!body["error"].as_str().unwrap().contains("content policy"));
}
