use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashboard_engine::{
    AnalysisCache, AnalysisSource, EngineConfig, EngineEvent, FailureKind, HttpAnalysisSource,
    ProgressSink, ResilientFetcher, RetryPolicy, TIMEOUT_MESSAGE,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(dashboard_logging::initialize_for_tests);
}

#[derive(Default, Clone)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn statuses(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::AnalysisStatus { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

const RESULT_JSON: &str = r#"{
    "analysis_id": "run-7",
    "visual": {"average_brightness": 0.42, "scene_cut_timestamps": [1.0, 2.5]},
    "audio": null
}"#;

fn fast_policy(delays_ms: &[u64]) -> RetryPolicy {
    RetryPolicy {
        backoff_delays: delays_ms.iter().copied().map(Duration::from_millis).collect(),
        request_timeout: Duration::from_secs(5),
        ..RetryPolicy::default()
    }
}

fn fetcher_for(server: &MockServer, policy: RetryPolicy) -> ResilientFetcher {
    let config = EngineConfig {
        analysis_endpoint: format!("{}/analysis", server.uri()),
        retry: policy.clone(),
        ..EngineConfig::default()
    };
    let source = HttpAnalysisSource::new(&config).expect("valid endpoint");
    ResilientFetcher::new(Arc::new(source), policy, AnalysisCache::new())
}

#[tokio::test]
async fn gateway_timeouts_are_retried_until_success() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analysis/17"))
        .respond_with(ResponseTemplate::new(504))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/analysis/17"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(RESULT_JSON, "application/json"))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, fast_policy(&[40, 60, 80]));
    let sink = TestSink::default();
    let started = Instant::now();

    let result = fetcher
        .fetch(1, "17", &sink, &CancellationToken::new())
        .await
        .expect("third attempt succeeds");

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(result.analysis_id.as_deref(), Some("run-7"));
    assert_eq!(
        result.visual.as_ref().and_then(|v| v.average_brightness),
        Some(0.42)
    );

    let statuses = sink.statuses();
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].contains("attempt 1/4"), "{}", statuses[0]);
    assert!(statuses[1].contains("attempt 2/4"), "{}", statuses[1]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn persistent_gateway_timeout_exhausts_attempts() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analysis/5"))
        .respond_with(ResponseTemplate::new(504).set_body_string("<html>Gateway Timeout</html>"))
        .mount(&server)
        .await;

    let policy = fast_policy(&[10, 10]);
    let max_attempts = policy.max_attempts();
    let fetcher = fetcher_for(&server, policy);
    let sink = TestSink::default();

    let err = fetcher
        .fetch(3, "5", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(504));
    assert!(err.message.contains("timed out"), "{}", err.message);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        max_attempts
    );
    assert_eq!(sink.statuses().len(), max_attempts - 1);
    assert!(fetcher.cache().is_empty());
}

#[tokio::test]
async fn permanent_failure_uses_body_text_without_retrying() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analysis/9"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Dataset 9 is private"))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, fast_policy(&[10, 10, 10]));
    let sink = TestSink::default();

    let err = fetcher
        .fetch(1, "9", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(403));
    assert_eq!(err.message, "Dataset 9 is private");
    assert!(sink.statuses().is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn array_body_is_a_permanent_failure_and_not_cached() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analysis/6"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"["run-1", {"average_brightness": 7.5}]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, fast_policy(&[10, 10]));
    let sink = TestSink::default();

    let err = fetcher
        .fetch(1, "6", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::InvalidPayload);
    assert!(sink.statuses().is_empty());
    assert!(fetcher.cache().is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cached_results_skip_the_network() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analysis/3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(RESULT_JSON, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, fast_policy(&[10]));
    let sink = TestSink::default();
    let cancel = CancellationToken::new();

    let first = fetcher.fetch(1, "3", &sink, &cancel).await.unwrap();
    let second = fetcher.fetch(2, "3", &sink, &cancel).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fetcher.cache().len(), 1);
    server.verify().await;
}

#[tokio::test]
async fn slow_attempt_times_out() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analysis/8"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(RESULT_JSON, "application/json")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    // The transport would wait 30s; only the per-attempt deadline can end this.
    let config = EngineConfig {
        analysis_endpoint: format!("{}/analysis", server.uri()),
        retry: RetryPolicy {
            request_timeout: Duration::from_secs(30),
            ..RetryPolicy::default()
        },
        ..EngineConfig::default()
    };
    let source = HttpAnalysisSource::new(&config).unwrap();
    let policy = RetryPolicy {
        backoff_delays: Vec::new(),
        request_timeout: Duration::from_millis(150),
        ..RetryPolicy::default()
    };
    let fetcher = ResilientFetcher::new(Arc::new(source), policy, AnalysisCache::new());
    let started = Instant::now();

    let err = fetcher
        .fetch(1, "8", &TestSink::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Timeout);
    assert_eq!(err.message, TIMEOUT_MESSAGE);
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn cancellation_during_backoff_is_silent() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analysis/1"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/analysis/2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(RESULT_JSON, "application/json"))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, fast_policy(&[5_000]));
    let sink = TestSink::default();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = fetcher.fetch(1, "1", &sink, &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(sink.statuses().len(), 1);
    assert_eq!(sink.events.lock().unwrap().len(), 1);

    let next = fetcher
        .fetch(2, "2", &sink, &CancellationToken::new())
        .await
        .expect("a new selection is fetched normally");
    assert_eq!(next.analysis_id.as_deref(), Some("run-7"));
}

#[tokio::test]
async fn unreachable_service_is_retried_like_a_timeout() {
    init_logging();
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let endpoint = format!("http://127.0.0.1:{port}/analysis");

    let policy = fast_policy(&[10]);
    let config = EngineConfig {
        analysis_endpoint: endpoint,
        retry: policy.clone(),
        connect_timeout: Duration::from_millis(500),
        ..EngineConfig::default()
    };
    let source = HttpAnalysisSource::new(&config).unwrap();
    let fetcher = ResilientFetcher::new(Arc::new(source), policy, AnalysisCache::new());
    let sink = TestSink::default();

    let err = fetcher
        .fetch(1, "4", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Timeout);
    assert_eq!(sink.statuses().len(), 1);
}

#[tokio::test]
async fn http_source_stops_when_its_token_fires() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analysis/12"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(RESULT_JSON, "application/json")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = EngineConfig {
        analysis_endpoint: format!("{}/analysis", server.uri()),
        ..EngineConfig::default()
    };
    let source = HttpAnalysisSource::new(&config).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = source.request("12", &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(1));
}
