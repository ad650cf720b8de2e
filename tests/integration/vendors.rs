//! Per-vendor request/response shapes against a mock server

use base64::Engine;
use media_dispatch::providers::{
    DevstralAdapter, FalAiAdapter, MinimaxAdapter, OpenRouterAdapter, ProviderAdapter,
    ReplicateAdapter, RunpodAdapter,
};
use media_dispatch::types::{ImageMode, VideoConfig};
use media_dispatch::{ErrorKind, GenerationRequest, ProviderId};
use mockito::Matcher;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::mock_server::MockServerFixture;

#[tokio::test]
async fn falai_queue_round_trip_returns_url() {
    let mut fixture = MockServerFixture::new().await;
    let submit = fixture
        .server
        .mock("POST", "/fal-ai/flux-1/dev")
        .match_header("authorization", "Key fal-secret")
        .match_body(Matcher::PartialJson(json!({
            "prompt": "a lighthouse watercolor",
            "image_size": "landscape_16_9"
        })))
        .with_status(200)
        .with_body(r#"{"request_id": "req-1"}"#)
        .create_async()
        .await;
    let (status, calls) = fixture
        .mock_status_sequence(
            "/fal-ai/flux-1/requests/req-1/status",
            r#"{"status": "IN_PROGRESS"}"#,
            r#"{"status": "COMPLETED"}"#,
            2,
        )
        .await;
    let result = fixture
        .mock_json(
            "GET",
            "/fal-ai/flux-1/requests/req-1",
            200,
            r#"{"images": [{"url": "https://fal.media/files/a.jpg", "content_type": "image/jpeg"}],
                "seed": 991, "has_nsfw_concepts": [false]}"#,
        )
        .await;

    let adapter = FalAiAdapter::new(fixture.options("fal-secret")).unwrap();
    let request = GenerationRequest::image("a lighthouse", ProviderId::FALAI)
        .with_style("watercolor")
        .with_aspect_ratio(media_dispatch::AspectRatio::Landscape);
    let response = adapter.generate_image(&request).await;

    submit.assert_async().await;
    status.assert_async().await;
    result.assert_async().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(fixture.sleeper.pauses(), vec![Duration::from_secs(2); 2]);

    let data = response.data().expect("image generated");
    assert_eq!(data.media_url.as_deref(), Some("https://fal.media/files/a.jpg"));
    assert_eq!(data.mime_type, "image/jpeg");
    assert_eq!(data.seed, Some(991));
    assert_eq!(data.cost, Some(0.002));
}

#[tokio::test]
async fn falai_nsfw_output_is_a_safety_failure() {
    let mut fixture = MockServerFixture::new().await;
    let queued = json!({
        "request_id": "req-2",
        "status_url": fixture.url("/q/req-2/status"),
        "response_url": fixture.url("/q/req-2"),
    })
    .to_string();
    let _submit = fixture.mock_json("POST", "/fal-ai/flux-1/dev", 200, &queued).await;
    let _status = fixture
        .mock_json("GET", "/q/req-2/status", 200, r#"{"status": "COMPLETED"}"#)
        .await;
    let _result = fixture
        .mock_json(
            "GET",
            "/q/req-2",
            200,
            r#"{"images": [{"url": "https://fal.media/files/black.png"}], "has_nsfw_concepts": [true]}"#,
        )
        .await;

    let adapter = FalAiAdapter::new(fixture.options("fal-secret")).unwrap();
    let response = adapter
        .generate_image(&GenerationRequest::image("x", ProviderId::FALAI))
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::ContentSafety));
    assert!(response.error().unwrap().contains("Replicate (fully uncensored)"));
}

#[tokio::test]
async fn replicate_polls_until_succeeded_then_downloads() {
    let mut fixture = MockServerFixture::new().await;
    let created = json!({
        "id": "pred-1",
        "status": "starting",
        "urls": { "get": fixture.url("/predictions/pred-1") }
    })
    .to_string();
    let submit = fixture
        .server
        .mock("POST", "/models/black-forest-labs/flux-schnell/predictions")
        .match_header("authorization", "Token r8_secret")
        .match_header("prefer", "wait")
        .match_body(Matcher::PartialJson(json!({
            "input": { "prompt": "a fox", "aspect_ratio": "9:16", "seed": 12 }
        })))
        .with_status(201)
        .with_body(created)
        .create_async()
        .await;
    let done = json!({
        "id": "pred-1",
        "status": "succeeded",
        "output": [fixture.url("/delivery/fox.png")]
    })
    .to_string();
    let (_poll, calls) = fixture
        .mock_status_sequence(
            "/predictions/pred-1",
            r#"{"id": "pred-1", "status": "processing"}"#,
            &done,
            2,
        )
        .await;
    let asset = fixture.mock_asset("/delivery/fox.png", "image/png", b"\x89PNG\r\n").await;

    let adapter = ReplicateAdapter::new(fixture.options("r8_secret")).unwrap();
    let request = GenerationRequest::image("a fox", ProviderId::REPLICATE)
        .with_aspect_ratio(media_dispatch::AspectRatio::Portrait)
        .with_seed(12);
    let response = adapter.generate_image(&request).await;

    submit.assert_async().await;
    asset.assert_async().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let data = response.data().expect("image generated");
    assert_eq!(
        data.media_base64.as_deref(),
        Some(base64::engine::general_purpose::STANDARD.encode(b"\x89PNG\r\n").as_str())
    );
    assert_eq!(data.mime_type, "image/png");
    assert_eq!(data.seed, Some(12));
}

#[tokio::test]
async fn replicate_failed_prediction_carries_vendor_error() {
    let mut fixture = MockServerFixture::new().await;
    let _submit = fixture
        .mock_json(
            "POST",
            "/models/black-forest-labs/flux-schnell/predictions",
            201,
            r#"{"id": "pred-2", "status": "failed", "error": "CUDA out of memory"}"#,
        )
        .await;

    let adapter = ReplicateAdapter::new(fixture.options("r8_secret")).unwrap();
    let response = adapter
        .generate_image(&GenerationRequest::image("a fox", ProviderId::REPLICATE))
        .await;
    assert_eq!(response.error(), Some("CUDA out of memory"));
    assert!(fixture.sleeper.pauses().is_empty());
}

#[tokio::test]
async fn minimax_image_url_is_downloaded_inline() {
    let mut fixture = MockServerFixture::new().await;
    let body = json!({
        "data": { "image_urls": [fixture.url("/oss/img-1.jpeg")] },
        "base_resp": { "status_code": 0, "status_msg": "success" }
    })
    .to_string();
    let submit = fixture
        .server
        .mock("POST", "/image_generation")
        .match_query(Matcher::UrlEncoded("GroupId".into(), "grp-9".into()))
        .match_header("authorization", "Bearer mm-secret")
        .match_body(Matcher::PartialJson(json!({
            "model": "image-01",
            "aspect_ratio": "1:1",
            "prompt": "a koi pond ukiyo-e"
        })))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;
    let _asset = fixture.mock_asset("/oss/img-1.jpeg", "image/jpeg", b"\xff\xd8\xff").await;

    let adapter = MinimaxAdapter::new(fixture.options("mm-secret"), "grp-9").unwrap();
    let request = GenerationRequest::image("a koi pond", ProviderId::MINIMAX).with_style("ukiyo-e");
    let response = adapter.generate_image(&request).await;

    submit.assert_async().await;
    let data = response.data().expect("image generated");
    assert_eq!(data.mime_type, "image/jpeg");
    assert_eq!(data.cost, Some(0.02));
    assert!(data.media_base64.is_some());
}

#[tokio::test]
async fn minimax_in_body_status_maps_to_quota() {
    let mut fixture = MockServerFixture::new().await;
    let _submit = fixture
        .mock_json(
            "POST",
            "/image_generation",
            200,
            r#"{"base_resp": {"status_code": 1008, "status_msg": "insufficient balance"}}"#,
        )
        .await;

    let adapter = MinimaxAdapter::new(fixture.options("mm-secret"), "grp-9").unwrap();
    let response = adapter
        .generate_image(&GenerationRequest::image("a koi pond", ProviderId::MINIMAX))
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::QuotaExceeded));
    assert!(response
        .error()
        .unwrap()
        .starts_with("Minimax rate limit or balance exhausted."));
}

#[tokio::test]
async fn minimax_video_task_resolves_file_id() {
    let mut fixture = MockServerFixture::new().await;
    let _submit = fixture
        .mock_json(
            "POST",
            "/video_generation",
            200,
            r#"{"task_id": "t-77", "base_resp": {"status_code": 0}}"#,
        )
        .await;
    let (_query, calls) = fixture
        .mock_status_sequence(
            "/query/video_generation",
            r#"{"task_id": "t-77", "status": "Processing", "base_resp": {"status_code": 0}}"#,
            r#"{"task_id": "t-77", "status": "Success", "file_id": "f-5", "base_resp": {"status_code": 0}}"#,
            3,
        )
        .await;
    let file = json!({
        "file": { "file_id": "f-5", "download_url": fixture.url("/dl/f-5.mp4") },
        "base_resp": { "status_code": 0 }
    })
    .to_string();
    let retrieve = fixture
        .server
        .mock("GET", "/files/retrieve")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("file_id".into(), "f-5".into()),
            Matcher::UrlEncoded("GroupId".into(), "grp-9".into()),
        ]))
        .with_status(200)
        .with_body(file)
        .create_async()
        .await;
    let _asset = fixture.mock_asset("/dl/f-5.mp4", "video/mp4", b"\x00\x00\x00\x18ftyp").await;

    let adapter = MinimaxAdapter::new(fixture.options("mm-secret"), "grp-9").unwrap();
    let response = adapter
        .generate_video(&GenerationRequest::video("a koi pond", ProviderId::MINIMAX))
        .await;

    retrieve.assert_async().await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(fixture.sleeper.pauses(), vec![Duration::from_secs(5); 3]);
    let data = response.data().expect("video generated");
    assert_eq!(data.mime_type, "video/mp4");
    assert_eq!(data.cost, Some(0.15));
}

#[tokio::test]
async fn openrouter_data_uri_image_is_inlined() {
    let mut fixture = MockServerFixture::new().await;
    let chat = fixture
        .server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-or")
        .match_header("x-title", "media-dispatch")
        .match_body(Matcher::PartialJson(json!({
            "model": "google/gemini-2.5-flash-image",
            "modalities": ["image", "text"]
        })))
        .with_status(200)
        .with_body(
            r#"{"choices": [{"message": {"role": "assistant", "content": "",
                "images": [{"type": "image_url", "image_url": {"url": "data:image/webp;base64,UklGRg=="}}]}}]}"#,
        )
        .create_async()
        .await;

    let adapter = OpenRouterAdapter::new(fixture.options("sk-or")).unwrap();
    let response = adapter
        .generate_image(&GenerationRequest::image("a paper crane", ProviderId::OPENROUTER))
        .await;

    chat.assert_async().await;
    let data = response.data().expect("image generated");
    assert_eq!(data.media_base64.as_deref(), Some("UklGRg=="));
    assert_eq!(data.mime_type, "image/webp");
    assert_eq!(data.cost, Some(0.0));
}

#[tokio::test]
async fn openrouter_quota_message_is_provider_attributed() {
    let mut fixture = MockServerFixture::new().await;
    let _chat = fixture
        .mock_json(
            "POST",
            "/chat/completions",
            429,
            r#"{"error": {"code": 429, "message": "Rate limit exceeded: free-models-per-day"}}"#,
        )
        .await;

    let adapter = OpenRouterAdapter::new(fixture.options("sk-or")).unwrap();
    let response = adapter
        .generate_image(&GenerationRequest::image("a paper crane", ProviderId::OPENROUTER))
        .await;
    assert_eq!(
        response.error(),
        Some("OpenRouter quota exceeded. Try again later. (Rate limit exceeded: free-models-per-day)")
    );
}

#[tokio::test]
async fn runpod_multi_image_job() {
    let mut fixture = MockServerFixture::new().await;
    let run = fixture
        .server
        .mock("POST", "/ep-img/run")
        .match_header("authorization", "Bearer rp-secret")
        .match_body(Matcher::PartialJson(json!({
            "input": {
                "width": 1344,
                "height": 768,
                "negative_prompt": "blurry",
                "image_mode": "couple"
            }
        })))
        .with_status(200)
        .with_body(r#"{"id": "job-1", "status": "IN_QUEUE"}"#)
        .create_async()
        .await;
    let (_status, calls) = fixture
        .mock_status_sequence(
            "/ep-img/status/job-1",
            r#"{"id": "job-1", "status": "IN_PROGRESS"}"#,
            r#"{"id": "job-1", "status": "COMPLETED", "output": {"image_base64": "QUJD"}}"#,
            2,
        )
        .await;

    let adapter = RunpodAdapter::new(fixture.options("rp-secret"), "ep-img", None).unwrap();
    let mut request = GenerationRequest::image("two friends", ProviderId::RUNPOD)
        .with_aspect_ratio(media_dispatch::AspectRatio::Landscape)
        .with_negative_prompt("blurry")
        .with_source_images(vec!["QUFB".into(), "QkJC".into()]);
    request.image_mode = Some(ImageMode::Couple);
    let response = adapter.generate_image(&request).await;

    run.assert_async().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let data = response.data().expect("image generated");
    assert_eq!(data.media_base64.as_deref(), Some("QUJD"));
    assert_eq!(data.cost, Some(0.01));
}

fn very_long_clip(prompt: &str, provider: ProviderId) -> GenerationRequest {
    GenerationRequest::video(prompt, provider).with_video_config(VideoConfig {
        duration: Some(1_000_000_000),
        ..VideoConfig::default()
    })
}

#[tokio::test]
async fn runpod_video_length_is_capped_at_provider_maximum() {
    let mut fixture = MockServerFixture::new().await;
    let run = fixture
        .server
        .mock("POST", "/ep-vid/run")
        .match_body(Matcher::PartialJson(json!({
            "input": { "num_frames": 80, "num_inference_steps": 25 }
        })))
        .with_status(200)
        .with_body(r#"{"id": "job-v", "status": "IN_QUEUE"}"#)
        .create_async()
        .await;
    let _status = fixture
        .mock_json(
            "GET",
            "/ep-vid/status/job-v",
            200,
            r#"{"id": "job-v", "status": "COMPLETED", "output": {"video_base64": "AAAA"}}"#,
        )
        .await;

    let adapter =
        RunpodAdapter::new(fixture.options("rp-secret"), "ep-img", Some("ep-vid".into())).unwrap();
    let response = adapter
        .generate_video(&very_long_clip("a slow sunrise", ProviderId::RUNPOD))
        .await;

    run.assert_async().await;
    let data = response.data().expect("video generated");
    assert_eq!(data.media_base64.as_deref(), Some("AAAA"));
    assert_eq!(data.mime_type, "video/mp4");
}

#[tokio::test]
async fn replicate_video_length_is_capped_at_provider_maximum() {
    let mut fixture = MockServerFixture::new().await;
    let finished = json!({
        "id": "pred-v",
        "status": "succeeded",
        "output": fixture.url("/delivery/clip.mp4")
    })
    .to_string();
    let submit = fixture
        .server
        .mock("POST", "/predictions")
        .match_body(Matcher::PartialJson(json!({
            "input": { "num_frames": 80, "fps": 8 }
        })))
        .with_status(201)
        .with_body(finished)
        .create_async()
        .await;
    let _asset = fixture.mock_asset("/delivery/clip.mp4", "video/mp4", b"\x00\x00\x00\x18ftyp").await;

    let adapter = ReplicateAdapter::new(fixture.options("r8_secret")).unwrap();
    let response = adapter
        .generate_video(&very_long_clip("a slow sunrise", ProviderId::REPLICATE))
        .await;

    submit.assert_async().await;
    let data = response.data().expect("video generated");
    assert_eq!(data.mime_type, "video/mp4");
}

#[tokio::test]
async fn devstral_text_is_base64_with_usage() {
    let mut fixture = MockServerFixture::new().await;
    let _chat = fixture
        .server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "model": "mistralai/devstral-2512:free",
            "messages": [{ "role": "user", "content": "write hello world in rust" }]
        })))
        .with_status(200)
        .with_body(
            r#"{"model": "mistralai/devstral-2512:free",
                "choices": [{"message": {"role": "assistant", "content": "fn main() { println!(\"hello\"); }"}}],
                "usage": {"prompt_tokens": 9, "completion_tokens": 14}}"#,
        )
        .create_async()
        .await;

    let adapter = DevstralAdapter::new(fixture.options("sk-or")).unwrap();
    let response = adapter
        .generate_text(&GenerationRequest::text("write hello world in rust", ProviderId::DEVSTRAL))
        .await;

    let data = response.data().expect("text generated");
    assert_eq!(data.mime_type, "text/plain; charset=utf-8");
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(data.media_base64.as_deref().unwrap())
        .unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "fn main() { println!(\"hello\"); }");
    let metadata = data.metadata.as_ref().unwrap();
    assert_eq!(metadata["usage"]["completion_tokens"], 14);
    assert_eq!(data.cost, None);
}
