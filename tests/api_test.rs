use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use futures::{StreamExt, stream};
use http_body_util::BodyExt;
use tower::ServiceExt;

use ytaudio::{
    common::types::{Container, VideoId},
    configs::{Config, DeliveryMode, TranscoderConfig},
    pipeline::SourceStream,
    server::AppState,
    sources::{
        UpstreamError, UpstreamKind,
        format::AudioFormat,
        models::{SearchResult, VideoDetails},
        plugin::{MediaResolver, SearchProvider},
    },
    transport::http_server::router,
};

const VIDEO_ID: &str = "dQw4w9WgXcQ";

struct MockSearch {
    results: Result<Vec<SearchResult>, UpstreamError>,
    called: AtomicBool,
}

impl MockSearch {
    fn returning(n: usize) -> Self {
        let results = (0..n)
            .map(|i| {
                let id = format!("vid{:08}", i);
                SearchResult {
                    url: format!("https://www.youtube.com/watch?v={}", id),
                    title: format!("Result {}", i),
                    thumbnail: (i % 2 == 0).then(|| format!("https://i.ytimg.com/vi/{}/hq.jpg", id)),
                    duration: "3:32".to_string(),
                    id,
                }
            })
            .collect();
        Self {
            results: Ok(results),
            called: AtomicBool::new(false),
        }
    }

    fn failing(error: UpstreamError) -> Self {
        Self {
            results: Err(error),
            called: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchResult>, UpstreamError> {
        self.called.store(true, Ordering::SeqCst);
        self.results.clone()
    }
}

/// Sets its flag when dropped, i.e. when the source stream is released.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct MockResolver {
    details: Result<VideoDetails, UpstreamError>,
    chunks: Vec<Bytes>,
    /// Keep the source open forever after the chunks.
    endless: bool,
    resolve_called: AtomicBool,
    open_called: AtomicBool,
    source_dropped: Arc<AtomicBool>,
}

impl MockResolver {
    fn with_formats(formats: Vec<AudioFormat>, chunks: Vec<Bytes>) -> Self {
        Self {
            details: Ok(VideoDetails {
                id: VIDEO_ID.to_string(),
                title: "Never Gonna Give You Up".to_string(),
                author: Some("Rick Astley".to_string()),
                length_seconds: Some(212),
                formats,
            }),
            chunks,
            endless: false,
            resolve_called: AtomicBool::new(false),
            open_called: AtomicBool::new(false),
            source_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    fn failing(error: UpstreamError) -> Self {
        let mut resolver = Self::with_formats(Vec::new(), Vec::new());
        resolver.details = Err(error);
        resolver
    }
}

#[async_trait]
impl MediaResolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve(&self, _video_id: &VideoId) -> Result<VideoDetails, UpstreamError> {
        self.resolve_called.store(true, Ordering::SeqCst);
        self.details.clone()
    }

    async fn open_stream(&self, _format: &AudioFormat) -> Result<SourceStream, UpstreamError> {
        self.open_called.store(true, Ordering::SeqCst);
        let flag = DropFlag(self.source_dropped.clone());
        let chunks = stream::iter(self.chunks.clone().into_iter().map(Ok));
        let source = if self.endless {
            chunks.chain(stream::pending()).boxed()
        } else {
            chunks.boxed()
        };
        Ok(source
            .map(move |item| {
                let _ = &flag;
                item
            })
            .boxed())
    }
}

fn format(id: &str, mime: &str, bitrate: u64, audio_only: bool, len: Option<u64>) -> AudioFormat {
    AudioFormat {
        id: id.to_string(),
        mime_type: mime.to_string(),
        container: Container::from_mime(mime),
        codecs: None,
        bitrate,
        content_length: len,
        audio_only,
        url: format!("https://media.invalid/{}", id),
        user_agent: None,
    }
}

fn audio_formats() -> Vec<AudioFormat> {
    vec![
        format("18", "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"", 600_000, false, None),
        format("140", "audio/mp4; codecs=\"mp4a.40.2\"", 130_000, true, None),
        format("251", "audio/webm; codecs=\"opus\"", 160_000, true, None),
    ]
}

fn fixture() -> Vec<u8> {
    (0..=255u8).cycle().take(200_000).collect()
}

fn fixture_chunks() -> Vec<Bytes> {
    fixture().chunks(64 * 1024).map(Bytes::copy_from_slice).collect()
}

fn transcoder(program: &str, args: &[&str]) -> TranscoderConfig {
    TranscoderConfig {
        program: program.to_string(),
        args: Some(args.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    }
}

fn app(
    config: Config,
    search: Arc<MockSearch>,
    resolver: Arc<MockResolver>,
) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, search, resolver));
    (router(state.clone()), state)
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn search_rejects_blank_query_without_calling_provider() {
    for uri in ["/search", "/search?q=", "/search?q=%20%20%09"] {
        let search = Arc::new(MockSearch::returning(3));
        let resolver = Arc::new(MockResolver::with_formats(Vec::new(), Vec::new()));
        let (app, _) = app(Config::default(), search.clone(), resolver);

        let response = get(app, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("\"q\""));
        assert!(!search.called.load(Ordering::SeqCst), "{uri}");
    }
}

#[tokio::test]
async fn search_without_results_is_not_found() {
    let (app, _) = app(
        Config::default(),
        Arc::new(MockSearch::returning(0)),
        Arc::new(MockResolver::with_formats(Vec::new(), Vec::new())),
    );
    let response = get(app, "/search?q=nothing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "No results found.");
}

#[tokio::test]
async fn search_truncates_to_default_limit_in_order() {
    let (app, _) = app(
        Config::default(),
        Arc::new(MockSearch::returning(12)),
        Arc::new(MockResolver::with_formats(Vec::new(), Vec::new())),
    );
    let response = get(app, "/search?q=never+gonna").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        let id = result["id"].as_str().unwrap();
        assert_eq!(id, format!("vid{:08}", i));
        assert!(!result["title"].as_str().unwrap().is_empty());
        assert_eq!(
            result["url"].as_str().unwrap(),
            format!("https://www.youtube.com/watch?v={}", id)
        );
    }
    assert!(results[1]["thumbnail"].is_null());
}

#[tokio::test]
async fn search_limit_parameter_is_clamped() {
    for (uri, expected) in [
        ("/search?q=x&limit=3", 3),
        ("/search?q=x&limit=50", 10),
        ("/search?q=x&limit=0", 1),
    ] {
        let (app, _) = app(
            Config::default(),
            Arc::new(MockSearch::returning(12)),
            Arc::new(MockResolver::with_formats(Vec::new(), Vec::new())),
        );
        let response = get(app, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["results"].as_array().unwrap().len(), expected, "{uri}");
    }
}

#[tokio::test]
async fn search_rejects_non_numeric_limit() {
    let search = Arc::new(MockSearch::returning(3));
    let (app, _) = app(
        Config::default(),
        search.clone(),
        Arc::new(MockResolver::with_formats(Vec::new(), Vec::new())),
    );
    let response = get(app, "/search?q=x&limit=lots").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!search.called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn search_provider_failure_is_server_error() {
    let (app, _) = app(
        Config::default(),
        Arc::new(MockSearch::failing(UpstreamError::other("search returned 502"))),
        Arc::new(MockResolver::with_formats(Vec::new(), Vec::new())),
    );
    let response = get(app, "/search?q=x").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Failed to search videos.");
    assert_eq!(body["details"], "search returned 502");
}

#[tokio::test]
async fn audio_rejects_malformed_ids_without_resolving() {
    for id in ["short", "dQw4w9WgXcQQ", "dQw4w9WgX%20Q", "dQw4w9WgX.Q"] {
        let resolver = Arc::new(MockResolver::with_formats(audio_formats(), fixture_chunks()));
        let (app, state) = app(
            Config::default(),
            Arc::new(MockSearch::returning(0)),
            resolver.clone(),
        );

        let response = get(app, &format!("/audio/{}", id)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{id}");
        assert_eq!(json_body(response).await["error"], "Invalid video ID.");
        assert!(!resolver.resolve_called.load(Ordering::SeqCst));
        assert_eq!(state.sessions.finished_count(), 0);
    }
}

#[tokio::test]
async fn audio_without_audio_only_format_is_not_found() {
    let resolver = Arc::new(MockResolver::with_formats(
        vec![
            format("18", "video/mp4", 600_000, false, None),
            format("22", "video/mp4", 1_500_000, false, None),
        ],
        fixture_chunks(),
    ));
    let (app, state) = app(
        Config::default(),
        Arc::new(MockSearch::returning(0)),
        resolver.clone(),
    );

    let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "No suitable audio format found.");
    assert!(!resolver.open_called.load(Ordering::SeqCst));
    assert_eq!(state.sessions.finished_count(), 0);
}

#[tokio::test]
async fn audio_blocked_video_is_forbidden() {
    let resolver = Arc::new(MockResolver::failing(UpstreamError::new(
        UpstreamKind::Blocked,
        "LOGIN_REQUIRED: Sign in to confirm you're not a bot",
    )));
    let (app, _) = app(Config::default(), Arc::new(MockSearch::returning(0)), resolver.clone());

    let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"], "This video is blocked or unavailable.");
    assert!(!resolver.open_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn audio_rate_limited_is_server_error() {
    let resolver = Arc::new(MockResolver::failing(UpstreamError::new(
        UpstreamKind::RateLimited,
        "player request returned 429",
    )));
    let (app, _) = app(Config::default(), Arc::new(MockSearch::returning(0)), resolver);

    let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "Failed to fetch video information.");
}

#[tokio::test]
async fn passthrough_streams_selected_format_unchanged() {
    let mut config = Config::default();
    config.delivery.mode = DeliveryMode::Passthrough;
    let total = fixture().len() as u64;
    let mut formats = audio_formats();
    formats[2].content_length = Some(total);

    let resolver = Arc::new(MockResolver::with_formats(formats, fixture_chunks()));
    let (app, state) = app(config, Arc::new(MockSearch::returning(0)), resolver.clone());

    let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/webm");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"dQw4w9WgXcQ.webm\""
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], total.to_string().as_str());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), fixture().as_slice());
    assert!(resolver.source_dropped.load(Ordering::SeqCst));
    assert_eq!(state.sessions.active_count(), 0);
    assert_eq!(state.sessions.finished_count(), 1);
}

fn endless_passthrough() -> (Router, Arc<AppState>, Arc<MockResolver>) {
    let mut config = Config::default();
    config.delivery.mode = DeliveryMode::Passthrough;

    let mut resolver = MockResolver::with_formats(audio_formats(), fixture_chunks());
    resolver.endless = true;
    let resolver = Arc::new(resolver);
    let (app, state) = app(config, Arc::new(MockSearch::returning(0)), resolver.clone());
    (app, state, resolver)
}

#[tokio::test]
async fn passthrough_client_disconnect_releases_source_once() {
    let (app, state, resolver) = endless_passthrough();

    let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    assert!(!frame.into_data().unwrap().is_empty());
    assert_eq!(state.sessions.active_count(), 1);
    assert!(!resolver.source_dropped.load(Ordering::SeqCst));

    drop(body);

    assert!(resolver.source_dropped.load(Ordering::SeqCst));
    assert_eq!(state.sessions.active_count(), 0);
    assert_eq!(state.sessions.finished_count(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(state.sessions.finished_count(), 1);
}

#[tokio::test]
async fn shutdown_ends_passthrough_body_with_error() {
    let (app, state, resolver) = endless_passthrough();

    let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.sessions.active_count(), 1);

    state.sessions.shutdown();
    assert!(response.into_body().collect().await.is_err());

    assert!(resolver.source_dropped.load(Ordering::SeqCst));
    assert_eq!(state.sessions.active_count(), 0);
    assert_eq!(state.sessions.finished_count(), 1);
}

#[cfg(unix)]
mod transcode {
    use super::*;

    async fn wait_for_teardown(state: &AppState, resolver: &MockResolver) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.sessions.active_count() != 0
                || !resolver.source_dropped.load(Ordering::SeqCst)
            {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("session was not torn down");
    }

    #[tokio::test]
    async fn round_trip_through_stub_transcoder_is_byte_identical() {
        let mut config = Config::default();
        config.transcoder = transcoder("cat", &[]);

        let resolver = Arc::new(MockResolver::with_formats(audio_formats(), fixture_chunks()));
        let (app, state) = app(config, Arc::new(MockSearch::returning(0)), resolver.clone());

        let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"dQw4w9WgXcQ.mp3\""
        );
        assert!(response.headers().get("x-ytaudio-version").is_some());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), fixture().as_slice());

        wait_for_teardown(&state, &resolver).await;
        assert_eq!(state.sessions.finished_count(), 1);
    }

    #[tokio::test]
    async fn transcoder_failure_before_output_is_json_500() {
        let mut config = Config::default();
        config.transcoder = transcoder("sh", &["-c", "echo 'Invalid data found' >&2; exit 3"]);

        let resolver = Arc::new(MockResolver::with_formats(audio_formats(), fixture_chunks()));
        let (app, state) = app(config, Arc::new(MockSearch::returning(0)), resolver.clone());

        let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Failed to convert the audio.");
        assert!(body["details"].as_str().unwrap().contains("Invalid data found"));

        wait_for_teardown(&state, &resolver).await;
        assert_eq!(state.sessions.finished_count(), 1);
    }

    #[tokio::test]
    async fn missing_transcoder_is_json_500() {
        let mut config = Config::default();
        config.transcoder = transcoder("ytaudio-no-such-transcoder", &[]);

        let resolver = Arc::new(MockResolver::with_formats(audio_formats(), fixture_chunks()));
        let (app, state) = app(config, Arc::new(MockSearch::returning(0)), resolver.clone());

        let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Failed to convert the audio.");
        assert!(resolver.source_dropped.load(Ordering::SeqCst));
        assert_eq!(state.sessions.finished_count(), 0);
    }

    #[tokio::test]
    async fn transcoder_failure_after_output_truncates_body() {
        let mut config = Config::default();
        config.transcoder = transcoder("sh", &["-c", "printf abc; exit 3"]);

        let resolver = Arc::new(MockResolver::with_formats(audio_formats(), fixture_chunks()));
        let (app, state) = app(config, Arc::new(MockSearch::returning(0)), resolver.clone());

        let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.into_body().collect().await.is_err());

        wait_for_teardown(&state, &resolver).await;
        assert_eq!(state.sessions.finished_count(), 1);
    }

    #[tokio::test]
    async fn client_disconnect_kills_transcoder_and_releases_source() {
        let mut config = Config::default();
        config.transcoder = transcoder("cat", &[]);

        let mut resolver = MockResolver::with_formats(audio_formats(), fixture_chunks());
        resolver.endless = true;
        let resolver = Arc::new(resolver);
        let (app, state) = app(config, Arc::new(MockSearch::returning(0)), resolver.clone());

        let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        assert!(!frame.into_data().unwrap().is_empty());
        assert_eq!(state.sessions.active_count(), 1);
        assert!(state.sessions.snapshot()[0].pid.is_some());

        drop(body);

        wait_for_teardown(&state, &resolver).await;
        assert_eq!(state.sessions.finished_count(), 1);

        // Nothing tears the session down a second time.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.sessions.finished_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_live_sessions() {
        let mut config = Config::default();
        config.transcoder = transcoder("cat", &[]);

        let mut resolver = MockResolver::with_formats(audio_formats(), fixture_chunks());
        resolver.endless = true;
        let resolver = Arc::new(resolver);
        let (app, state) = app(config, Arc::new(MockSearch::returning(0)), resolver.clone());

        let response = get(app, &format!("/audio/{}", VIDEO_ID)).await;
        assert_eq!(response.status(), StatusCode::OK);

        state.sessions.shutdown();
        assert!(response.into_body().collect().await.is_err());

        wait_for_teardown(&state, &resolver).await;
        assert_eq!(state.sessions.finished_count(), 1);
    }
}

#[tokio::test]
async fn cors_and_version_headers_are_present() {
    let (app, _) = app(
        Config::default(),
        Arc::new(MockSearch::returning(1)),
        Arc::new(MockResolver::with_formats(Vec::new(), Vec::new())),
    );
    let response = app
        .oneshot(
            Request::builder()
                .uri("/search?q=x")
                .header(header::ORIGIN, "https://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        response.headers()["x-ytaudio-version"],
        env!("CARGO_PKG_VERSION")
    );
}

#[tokio::test]
async fn health_reports_version_and_active_streams() {
    let (app, _) = app(
        Config::default(),
        Arc::new(MockSearch::returning(0)),
        Arc::new(MockResolver::with_formats(Vec::new(), Vec::new())),
    );
    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["activeStreams"], 0);
}
