//! End-to-end pipeline behaviour with in-process gateways

use async_trait::async_trait;
use parking_lot::Mutex;
use prompt_image_gateway::backend::{CompletionPrompt, ImageGenerator, TextCompleter};
use prompt_image_gateway::pipeline::{self, GenerationRequest, GENERATED_SUFFIX};
use prompt_image_gateway::storage::{ImageRecord, ObjectStore};
use prompt_image_gateway::{AppError, AppState, Result};
use std::sync::Arc;
use wiremock::MockServer;

use crate::common::{mocks, png_bytes, test_settings, FixedOcr};

#[derive(Default)]
struct MemoryStore {
    objects: Mutex<Vec<(String, Vec<u8>, String)>>,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str, content_type: &str) -> Result<String> {
        self.objects
            .lock()
            .push((name.to_string(), bytes, content_type.to_string()));
        Ok(format!("memory://{}", name))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ImageRecord>> {
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|(name, _, _)| name.starts_with(prefix))
            .map(|(name, _, _)| ImageRecord {
                name: name.clone(),
                url: format!("memory://{}", name),
            })
            .collect())
    }
}

struct RecordingGenerator {
    image_url: String,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.image_url.clone())
    }
}

/// Answers style questions and expected-text questions differently
struct ScriptedCompleter {
    style: &'static str,
    expected: &'static str,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl TextCompleter for ScriptedCompleter {
    async fn complete(&self, prompt: CompletionPrompt) -> Result<String> {
        self.calls.lock().push(prompt.system.clone());
        if prompt.system.contains("artistic style") {
            Ok(self.style.to_string())
        } else {
            Ok(self.expected.to_string())
        }
    }
}

struct Harness {
    _server: MockServer,
    state: AppState,
    store: Arc<MemoryStore>,
    generator: Arc<RecordingGenerator>,
    completer: Arc<ScriptedCompleter>,
}

async fn harness(ocr_text: &str, persist: bool, fetches: u64) -> Harness {
    let server = MockServer::start().await;
    mocks::generated_image(&server, png_bytes(), fetches).await;

    let mut settings = test_settings(&server.uri(), &server.uri());
    settings.storage.persist_generated = persist;

    let store = Arc::new(MemoryStore::default());
    let generator = Arc::new(RecordingGenerator {
        image_url: format!("{}{}", server.uri(), mocks::GENERATED_PATH),
        prompts: Mutex::new(Vec::new()),
    });
    let completer = Arc::new(ScriptedCompleter {
        style: "ukiyo-e woodblock, muted indigo",
        expected: "Tea House",
        calls: Mutex::new(Vec::new()),
    });

    let state = AppState::with_gateways(
        settings,
        store.clone(),
        generator.clone(),
        completer.clone(),
        Arc::new(FixedOcr(ocr_text.to_string())),
    )
    .unwrap();

    Harness {
        _server: server,
        state,
        store,
        generator,
        completer,
    }
}

#[tokio::test]
async fn test_reference_image_augments_prompt_with_style() {
    let h = harness("", false, 1).await;
    let request =
        GenerationRequest::from_fragments(["a mountain tea house"], Some(png_bytes()), false).unwrap();

    let result = pipeline::run_generation(&h.state, request).await.unwrap();

    assert_eq!(
        h.generator.prompts.lock().as_slice(),
        ["a mountain tea house, in the style of ukiyo-e woodblock, muted indigo"]
    );
    assert_eq!(h.completer.calls.lock().len(), 1);
    assert_eq!(result.matched, None);
    assert_eq!(result.extracted_text, None);
}

#[tokio::test]
async fn test_without_reference_image_prompt_is_unchanged() {
    let h = harness("", false, 1).await;
    let request = GenerationRequest::from_fragments(["line one", "line two\n"], None, false).unwrap();

    pipeline::run_generation(&h.state, request).await.unwrap();

    assert_eq!(h.generator.prompts.lock().as_slice(), ["line one\nline two"]);
    assert!(h.completer.calls.lock().is_empty());
}

#[tokio::test]
async fn test_ocr_uses_original_prompt_for_expectation() {
    let h = harness("  TEA HOUSE  ", false, 1).await;
    let request = GenerationRequest::from_fragments(
        ["a sign that says Tea House"],
        Some(png_bytes()),
        true,
    )
    .unwrap();

    let result = pipeline::run_generation(&h.state, request).await.unwrap();

    assert_eq!(result.matched, Some(true));
    assert_eq!(result.extracted_text.as_deref(), Some("TEA HOUSE"));
    assert_eq!(result.expected_text.as_deref(), Some("Tea House"));
    assert_eq!(h.completer.calls.lock().len(), 2);
}

#[tokio::test]
async fn test_persisted_generation_is_listed() {
    let h = harness("Tea House", true, 1).await;
    let request = GenerationRequest::from_fragments(["Tea House"], None, true).unwrap();

    let result = pipeline::run_generation(&h.state, request).await.unwrap();

    let stored = result.stored_url.expect("generated image should be persisted");
    let objects = h.store.objects.lock().clone();
    assert_eq!(objects.len(), 1);
    let (name, bytes, content_type) = &objects[0];
    assert!(name.starts_with("generated/"));
    assert!(name.ends_with(&format!("_{}.png", GENERATED_SUFFIX)));
    assert_eq!(bytes, &png_bytes());
    assert_eq!(content_type, "image/png");
    assert_eq!(stored, format!("memory://{}", name));

    let listed = pipeline::list_generated(&h.state).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_mismatch_is_not_persisted() {
    let h = harness("CLOSED", true, 1).await;
    let request = GenerationRequest::from_fragments(["Tea House"], None, true).unwrap();

    let result = pipeline::run_generation(&h.state, request).await.unwrap();

    assert_eq!(result.matched, Some(false));
    assert_eq!(result.stored_url, None);
    assert!(h.store.objects.lock().is_empty());
}

#[tokio::test]
async fn test_proxy_fetch_failure_stores_nothing() {
    let h = harness("", false, 0).await;
    let err = pipeline::proxy_image(&h.state, "http://127.0.0.1:9/none.png")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UpstreamFetchFailed { .. }));
    assert!(h.store.objects.lock().is_empty());
}
