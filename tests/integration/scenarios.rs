//! End-to-end dispatch against stubbed vendors

use async_trait::async_trait;
use media_dispatch::config::ProviderEntry;
use media_dispatch::providers::{
    compose_prompt, finish, FailureText, GoogleAdapter, ProviderAdapter, StyleConvention,
};
use media_dispatch::transport::{Auth, HttpTransport};
use media_dispatch::types::{GenerationData, MediaType, VideoConfig};
use media_dispatch::utils::PathMapper;
use media_dispatch::{
    Dispatcher, Error, ErrorKind, GenerationRequest, GenerationResponse, ModelCapabilities,
    ProviderId, ProviderRegistry, Settings,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::mock_server::MockServerFixture;

const P1_TEXT: FailureText = FailureText {
    authentication: "p1 authentication failed. Check API key.",
    quota: "p1 quota exceeded. Try again later.",
    content_safety: "p1 blocked this request.",
};

/// Minimal synchronous vendor: POST /generate answers with an image URL.
#[derive(Debug)]
struct P1Adapter {
    transport: HttpTransport,
    capabilities: ModelCapabilities,
}

impl P1Adapter {
    fn new(base_url: &str) -> Self {
        let mut capabilities = ModelCapabilities::new(ProviderId::new("p1"), "Provider One");
        capabilities.supports_image = true;
        capabilities.cost_per_image = Some(0.004);
        Self {
            transport: HttpTransport::new(base_url, Auth::Bearer("p1-key".into())).unwrap(),
            capabilities,
        }
    }

    async fn image(&self, request: &GenerationRequest) -> media_dispatch::Result<GenerationData> {
        let prompt = compose_prompt(&request.prompt, request.style.as_deref(), StyleConvention::Suffix);
        let body = self
            .transport
            .send_json(self.transport.post("/generate").json(&json!({ "prompt": prompt })))
            .await?;
        let (_, url) = PathMapper::first_str(&body, &["images[0].url", "url"])
            .ok_or_else(|| Error::no_result("No image returned from p1"))?;
        Ok(GenerationData::from_url(url, "image/png", ProviderId::new("p1")))
    }
}

#[async_trait]
impl ProviderAdapter for P1Adapter {
    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn generate_image(&self, request: &GenerationRequest) -> GenerationResponse {
        finish(&self.capabilities, MediaType::Image, &P1_TEXT, self.image(request).await)
    }

    async fn generate_video(&self, _request: &GenerationRequest) -> GenerationResponse {
        media_dispatch::providers::unsupported(&self.capabilities, MediaType::Video)
    }
}

fn p1_dispatcher(fixture: &MockServerFixture) -> Dispatcher {
    let adapter: Arc<dyn ProviderAdapter> = Arc::new(P1Adapter::new(&fixture.base_url));
    Dispatcher::new(Arc::new(ProviderRegistry::from_adapters([adapter])))
}

fn red_apple() -> GenerationRequest {
    GenerationRequest::image("a red apple", ProviderId::new("p1"))
}

#[tokio::test]
async fn image_url_comes_back_with_cost() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json(
            "POST",
            "/generate",
            200,
            r#"{"images": [{"url": "https://cdn.example/apple.png"}]}"#,
        )
        .await;

    let response = p1_dispatcher(&fixture).dispatch(&red_apple()).await;
    mock.assert_async().await;

    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(
        wire,
        json!({
            "success": true,
            "data": {
                "mediaUrl": "https://cdn.example/apple.png",
                "mimeType": "image/png",
                "provider": "p1",
                "cost": 0.004
            }
        })
    );
}

#[tokio::test]
async fn rate_limited_vendor_gives_quota_failure() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json("POST", "/generate", 429, r#"{"error": {"message": "Too many requests"}}"#)
        .await;

    let response = p1_dispatcher(&fixture).dispatch(&red_apple()).await;
    assert!(!response.is_success());
    assert_eq!(response.error_kind(), Some(ErrorKind::QuotaExceeded));
    assert_eq!(
        response.error(),
        Some("p1 quota exceeded. Try again later. (Too many requests)")
    );
    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire["success"], false);
    assert!(wire.get("data").is_none());
}

#[tokio::test]
async fn unconfigured_vendor_output_is_no_result() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture.mock_json("POST", "/generate", 200, r#"{"images": []}"#).await;

    let response = p1_dispatcher(&fixture).dispatch(&red_apple()).await;
    assert_eq!(response.error_kind(), Some(ErrorKind::NoResult));
    assert_eq!(response.error(), Some("No image returned from p1"));
}

const OPERATION_PENDING: &str = r#"{"name": "operations/veo-1", "done": false}"#;

fn operation_done(video_uri: &str) -> String {
    json!({
        "name": "operations/veo-1",
        "done": true,
        "response": {
            "generateVideoResponse": {
                "generatedSamples": [{ "video": { "uri": video_uri } }]
            }
        }
    })
    .to_string()
}

fn veo_request() -> GenerationRequest {
    GenerationRequest::video("waves crashing at sunset", ProviderId::GOOGLE).with_video_config(
        VideoConfig {
            duration: Some(8),
            ..VideoConfig::default()
        },
    )
}

#[tokio::test]
async fn veo_operation_finishes_on_third_poll() {
    let mut fixture = MockServerFixture::new().await;
    let submit = fixture
        .mock_json(
            "POST",
            "/models/veo-3.1-fast-generate-preview:predictLongRunning",
            200,
            r#"{"name": "operations/veo-1"}"#,
        )
        .await;
    let done = operation_done(&fixture.url("/files/veo-1.mp4"));
    let (poll, calls) = fixture
        .mock_status_sequence("/operations/veo-1", OPERATION_PENDING, &done, 3)
        .await;
    let asset = fixture.mock_asset("/files/veo-1.mp4", "video/mp4", b"\x00\x00\x00\x18ftypmp42").await;

    let adapter = GoogleAdapter::new(fixture.options("g-key")).unwrap();
    let response = adapter.generate_video(&veo_request()).await;

    submit.assert_async().await;
    poll.assert_async().await;
    asset.assert_async().await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(fixture.sleeper.pauses(), vec![Duration::from_secs(5); 3]);

    let data = response.data().expect("video generated");
    assert_eq!(data.mime_type, "video/mp4");
    assert_eq!(data.provider, ProviderId::GOOGLE);
    assert_eq!(data.cost, Some(0.05));
    assert!(data.media_base64.is_some());
    assert!(data.media_url.is_none());
}

#[tokio::test]
async fn endless_processing_times_out_at_max_attempts() {
    let mut fixture = MockServerFixture::new().await;
    let _submit = fixture
        .mock_json(
            "POST",
            "/models/veo-3.1-fast-generate-preview:predictLongRunning",
            200,
            r#"{"name": "operations/veo-2"}"#,
        )
        .await;
    let poll = fixture
        .server
        .mock("GET", "/operations/veo-2")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(OPERATION_PENDING)
        .expect(4)
        .create_async()
        .await;

    let options = fixture.options("g-key").with_poll_overrides(None, Some(4));
    let adapter = GoogleAdapter::new(options).unwrap();
    let response = adapter.generate_video(&veo_request()).await;

    poll.assert_async().await;
    assert_eq!(fixture.sleeper.pauses().len(), 4);
    assert_eq!(response.error_kind(), Some(ErrorKind::Timeout));
    assert_eq!(
        response.error(),
        Some("Video generation timed out after 4 polling attempts")
    );
}

#[tokio::test]
async fn vendor_failure_during_polling_is_not_a_timeout() {
    let mut fixture = MockServerFixture::new().await;
    let _submit = fixture
        .mock_json(
            "POST",
            "/models/veo-3.1-fast-generate-preview:predictLongRunning",
            200,
            r#"{"name": "operations/veo-3"}"#,
        )
        .await;
    let failed = r#"{"name": "operations/veo-3", "done": true, "error": {"code": 13, "message": "Internal error while rendering"}}"#;
    let (_poll, calls) = fixture
        .mock_status_sequence("/operations/veo-3", OPERATION_PENDING, failed, 2)
        .await;

    let adapter = GoogleAdapter::new(fixture.options("g-key")).unwrap();
    let response = adapter.generate_video(&veo_request()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(response.error_kind(), Some(ErrorKind::Unknown));
    assert_eq!(response.error(), Some("Internal error while rendering"));
}

#[tokio::test]
async fn registry_built_from_settings_dispatches_to_mock() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json(
            "POST",
            "/models/gemini-2.5-flash-image:generateContent",
            200,
            r#"{"candidates": [{"content": {"parts": [
                {"text": "Here is your image"},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
            ]}, "finishReason": "STOP"}]}"#,
        )
        .await;

    let settings = Settings::default().with_provider(
        ProviderEntry::new(ProviderId::GOOGLE)
            .with_api_key("g-key")
            .with_base_url(&fixture.base_url),
    );
    let registry = ProviderRegistry::initialize(&settings);
    assert_eq!(registry.list(), vec![ProviderId::GOOGLE]);

    let request = GenerationRequest::image("a red apple", ProviderId::GOOGLE).with_seed(7);
    let response = Dispatcher::new(Arc::new(registry)).dispatch(&request).await;
    mock.assert_async().await;

    let data = response.data().expect("image generated");
    assert_eq!(data.media_base64.as_deref(), Some("iVBORw0KGgo="));
    assert_eq!(data.cost, Some(0.001));
    assert_eq!(data.seed, Some(7));
}

#[tokio::test]
async fn google_safety_block_is_reported() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json(
            "POST",
            "/models/gemini-2.5-flash-image:generateContent",
            200,
            r#"{"promptFeedback": {"blockReason": "PROHIBITED_CONTENT"}}"#,
        )
        .await;

    let adapter = GoogleAdapter::new(fixture.options("g-key")).unwrap();
    let response = adapter
        .generate_image(&GenerationRequest::image("something", ProviderId::GOOGLE))
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::ContentSafety));
    assert!(response
        .error()
        .unwrap()
        .starts_with("Google blocked this request on safety grounds."));
}

#[tokio::test]
async fn google_key_travels_as_query_parameter() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/models/gemini-2.5-flash-image:generateContent")
        .match_query(mockito::Matcher::UrlEncoded("key".into(), "g-secret".into()))
        .with_status(403)
        .with_body(r#"{"error": {"code": 403, "message": "API key not valid"}}"#)
        .create_async()
        .await;

    let adapter = GoogleAdapter::new(fixture.options("g-secret")).unwrap();
    let response = adapter
        .generate_image(&GenerationRequest::image("a red apple", ProviderId::GOOGLE))
        .await;
    mock.assert_async().await;
    assert_eq!(response.error_kind(), Some(ErrorKind::Authentication));
    assert_eq!(
        response.error(),
        Some("Google API access denied. Check billing and API enablement. (API key not valid)")
    );
}
