use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use harbor_fetch::{FetchError, HttpClient, PrefixMirror, Response, staging_path};
use harbor_session::{
    AggregateStatus, ConfigHandle, DownloadEvent, EngineConfig, FileSpec, MetadataResolver, Orchestrator, Phase,
    Platform, SessionError, SessionOptions, SessionReport, UnitStatus,
};
use harbor_verify::{ContentHash, Sha1Hasher};
use tempfile::{TempDir, tempdir};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Route {
    Body(&'static [u8]),
    Status(u16),
    Broken,
    Stall,
}

#[derive(Default)]
struct MockClient {
    routes: Mutex<HashMap<String, Route>>,
    calls:  Mutex<Vec<String>>,
}

impl MockClient {
    fn route(self, url: &str, route: Route) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), route);
        self
    }

    fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
}

impl HttpClient for MockClient {
    async fn stream(&self, url: &str) -> harbor_fetch::Result<Response> {
        self.calls.lock().unwrap().push(url.to_string());
        let route = self.routes.lock().unwrap().get(url).cloned().unwrap_or(Route::Status(404));

        match route {
            Route::Body(body) => Ok(Response {
                content_length: Some(body.len() as u64),
                body:           Box::pin(stream::iter(vec![Ok::<_, FetchError>(Bytes::from_static(body))])),
            }),
            Route::Status(status) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Route::Broken => Ok(Response {
                content_length: None,
                body:           Box::pin(stream::iter(vec![
                    Ok(Bytes::from_static(b"par")),
                    Err(FetchError::Network("connection reset".into())),
                ])),
            }),
            Route::Stall => Ok(Response {
                content_length: None,
                body:           Box::pin(stream::pending::<harbor_fetch::Result<Bytes>>()),
            }),
        }
    }
}

#[derive(Default)]
struct MockResolver {
    manifest:         Vec<FileSpec>,
    core:             Vec<FileSpec>,
    assets:           Vec<FileSpec>,
    broken:           bool,
    descriptor_loads: AtomicUsize,
    platforms:        Mutex<Vec<Platform>>,
}

impl MetadataResolver for MockResolver {
    type Descriptor = String;
    type Error = std::io::Error;

    async fn manifest_files(&self, _version: &str) -> Result<Vec<FileSpec>, Self::Error> {
        if self.broken {
            return Err(std::io::Error::other("version list unavailable"));
        }
        Ok(self.manifest.clone())
    }

    async fn load_descriptor(&self, version: &str) -> Result<String, Self::Error> {
        self.descriptor_loads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("descriptor-{version}"))
    }

    async fn core_files(&self, _descriptor: &String, platform: &Platform) -> Result<Vec<FileSpec>, Self::Error> {
        self.platforms.lock().unwrap().push(*platform);
        Ok(self.core.clone())
    }

    async fn asset_files(&self, _descriptor: &String) -> Result<Vec<FileSpec>, Self::Error> { Ok(self.assets.clone()) }
}

type TestOrchestrator = Orchestrator<MockClient, MockResolver>;

fn sha1_of(data: &[u8]) -> ContentHash {
    let hex: String = Sha1Hasher::digest(data).iter().map(|b| format!("{b:02x}")).collect();
    hex.parse().unwrap()
}

fn file(dir: &TempDir, name: &str, body: &[u8]) -> FileSpec {
    FileSpec::new(format!("https://cdn.example.net/{name}"), dir.path().join(name))
        .hash(sha1_of(body))
        .size(body.len() as u64)
}

fn config(limit: usize, retries: u32, base_ms: u64) -> ConfigHandle {
    ConfigHandle::new(EngineConfig {
        max_concurrent_downloads: limit,
        max_retry_count: retries,
        retry_delay_base_ms: base_ms,
        ..EngineConfig::default()
    })
}

fn orchestrator(client: MockClient, resolver: MockResolver, config: ConfigHandle) -> Arc<TestOrchestrator> {
    Arc::new(Orchestrator::new(client, resolver, config).unwrap())
}

fn drain(rx: &mut broadcast::Receiver<DownloadEvent>) -> Vec<DownloadEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn report_of(events: &[DownloadEvent]) -> Arc<SessionReport> {
    events
        .iter()
        .find_map(|e| match e {
            DownloadEvent::SessionCompleted(report) => Some(Arc::clone(report)),
            _ => None,
        })
        .expect("session report")
}

async fn wait_until(rx: &mut broadcast::Receiver<DownloadEvent>, mut done: impl FnMut(&DownloadEvent) -> bool) {
    loop {
        let event = rx.recv().await.unwrap();
        if done(&event) {
            return;
        }
    }
}

#[tokio::test]
async fn test_fresh_install_runs_phases_in_order() {
    let dir = tempdir().unwrap();
    let client = MockClient::default()
        .route("https://cdn.example.net/1.20.1.json", Route::Body(b"{}"))
        .route("https://cdn.example.net/client.jar", Route::Body(b"client"))
        .route("https://cdn.example.net/lwjgl.jar", Route::Body(b"lwjgl"))
        .route("https://cdn.example.net/ab12", Route::Body(b"sound"))
        .route("https://cdn.example.net/cd34", Route::Body(b"texture"));
    let resolver = MockResolver {
        manifest: vec![file(&dir, "1.20.1.json", b"{}")],
        core: vec![file(&dir, "client.jar", b"client"), file(&dir, "lwjgl.jar", b"lwjgl")],
        assets: vec![file(&dir, "ab12", b"sound"), file(&dir, "cd34", b"texture")],
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(4, 3, 10));
    let mut rx = orch.subscribe();

    let hooked = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&hooked);
    let options = SessionOptions::default().on_completed(move |d: &String| *sink.lock().unwrap() = Some(d.clone()));

    assert!(orch.start_session("1.20.1", options).await.unwrap());

    assert_eq!(std::fs::read(dir.path().join("client.jar")).unwrap(), b"client");
    assert_eq!(std::fs::read(dir.path().join("cd34")).unwrap(), b"texture");
    assert_eq!(orch.client().calls().len(), 5);
    assert_eq!(hooked.lock().unwrap().as_deref(), Some("descriptor-1.20.1"));
    assert!(orch.active_sessions().is_empty());

    let events = drain(&mut rx);
    let phases: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::PhaseStarted { phase, units, .. } => Some((*phase, *units)),
            _ => None,
        })
        .collect();
    assert_eq!(phases, vec![(Phase::Manifest, 1), (Phase::Core, 2), (Phase::Assets, 2)]);

    let report = report_of(&events);
    assert!(report.succeeded);
    assert_eq!(report.completed.len(), 5);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_files_already_on_disk_are_not_downloaded() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("client.jar"), b"client").unwrap();
    std::fs::write(dir.path().join("1.20.1.json"), b"{}").unwrap();

    let resolver = MockResolver {
        manifest: vec![file(&dir, "1.20.1.json", b"{}")],
        core: vec![file(&dir, "client.jar", b"client")],
        ..MockResolver::default()
    };
    let orch = orchestrator(MockClient::default(), resolver, config(4, 3, 10));
    let mut rx = orch.subscribe();

    assert!(orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert!(orch.client().calls().is_empty());
    assert_eq!(report_of(&drain(&mut rx)).completed.len(), 2);
}

#[tokio::test]
async fn test_stale_file_is_replaced() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("client.jar"), b"outdated").unwrap();

    let client = MockClient::default().route("https://cdn.example.net/client.jar", Route::Body(b"client"));
    let resolver = MockResolver {
        manifest: vec![file(&dir, "client.jar", b"client")],
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(4, 3, 10));

    assert!(orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(std::fs::read(dir.path().join("client.jar")).unwrap(), b"client");
}

#[tokio::test]
async fn test_missing_canonical_switches_to_fallback() {
    let dir = tempdir().unwrap();
    let client = MockClient::default()
        .route("https://cdn.example.net/lib.jar", Route::Status(404))
        .route("https://maven.example.org/lib.jar", Route::Body(b"library"));
    let resolver = MockResolver {
        core: vec![file(&dir, "lib.jar", b"library").fallback("https://maven.example.org/lib.jar")],
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(4, 3, 10));

    assert!(orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(
        orch.client().calls(),
        vec!["https://cdn.example.net/lib.jar", "https://maven.example.org/lib.jar"]
    );
    assert_eq!(std::fs::read(dir.path().join("lib.jar")).unwrap(), b"library");
}

#[tokio::test]
async fn test_missing_everywhere_fails_without_retrying() {
    let dir = tempdir().unwrap();
    let resolver = MockResolver {
        core: vec![file(&dir, "lib.jar", b"library").fallback("https://maven.example.org/lib.jar")],
        ..MockResolver::default()
    };
    let orch = orchestrator(MockClient::default(), resolver, config(4, 3, 10));
    let mut rx = orch.subscribe();

    assert!(!orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(orch.client().calls().len(), 2);

    let report = report_of(&drain(&mut rx));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].status, UnitStatus::Failed);
    assert!(report.failed[0].last_error.as_deref().unwrap().contains("maven.example.org"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_use_every_attempt_with_backoff() {
    let dir = tempdir().unwrap();
    let client = MockClient::default().route("https://cdn.example.net/big.bin", Route::Broken);
    let resolver = MockResolver {
        assets: vec![file(&dir, "big.bin", b"payload")],
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(4, 3, 1000));
    let mut rx = orch.subscribe();

    let started = tokio::time::Instant::now();
    assert!(!orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    let elapsed = started.elapsed();

    assert_eq!(orch.client().calls().len(), 3);
    assert!(elapsed >= Duration::from_secs(3), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "waited {elapsed:?}");

    let events = drain(&mut rx);
    let retrying = events
        .iter()
        .filter(|e| matches!(e, DownloadEvent::Unit(s) if s.status == UnitStatus::Retrying))
        .count();
    assert_eq!(retrying, 2);

    let failed = &report_of(&events).failed[0];
    assert_eq!(failed.attempts, 3);
    assert!(failed.last_error.as_deref().unwrap().contains("3 attempt"));
    assert!(!dir.path().join("big.bin").exists());
}

#[tokio::test]
async fn test_hash_mismatch_leaves_no_file_behind() {
    let dir = tempdir().unwrap();
    let client = MockClient::default().route("https://cdn.example.net/ab12", Route::Body(b"tampered"));
    let resolver = MockResolver {
        assets: vec![file(&dir, "ab12", b"original")],
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(4, 2, 0));

    assert!(!orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());

    let dest = dir.path().join("ab12");
    assert_eq!(orch.client().calls().len(), 2);
    assert!(!dest.exists());
    assert!(!staging_path(&dest).exists());
}

#[tokio::test]
async fn test_manifest_failure_skips_later_phases() {
    let dir = tempdir().unwrap();
    let resolver = MockResolver {
        manifest: vec![file(&dir, "1.20.1.json", b"{}")],
        core: vec![file(&dir, "client.jar", b"client")],
        ..MockResolver::default()
    };
    let orch = orchestrator(MockClient::default(), resolver, config(4, 3, 10));

    assert!(!orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(orch.client().calls().len(), 1);
    assert_eq!(orch.resolver().descriptor_loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_core_failure_does_not_block_assets() {
    let dir = tempdir().unwrap();
    let client = MockClient::default().route("https://cdn.example.net/ab12", Route::Body(b"sound"));
    let resolver = MockResolver {
        core: vec![file(&dir, "client.jar", b"client")],
        assets: vec![file(&dir, "ab12", b"sound")],
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(4, 1, 0));

    assert!(!orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert!(dir.path().join("ab12").exists());
}

#[tokio::test]
async fn test_resolver_errors_are_returned() {
    let resolver = MockResolver {
        broken: true,
        ..MockResolver::default()
    };
    let orch = orchestrator(MockClient::default(), resolver, config(4, 3, 10));

    let err = orch.start_session("1.20.1", SessionOptions::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::Metadata(_)));
    assert!(orch.active_sessions().is_empty());
}

#[tokio::test]
async fn test_platform_override_reaches_resolver() {
    let platform = Platform::new(harbor_session::Os::Windows, harbor_session::Arch::X86);
    let orch = orchestrator(MockClient::default(), MockResolver::default(), config(4, 3, 10));

    assert!(orch.start_session("1.20.1", SessionOptions::default().platform(platform)).await.unwrap());
    assert_eq!(*orch.resolver().platforms.lock().unwrap(), vec![platform]);
}

fn stalled_assets(dir: &TempDir, quick: usize, total: usize) -> (MockClient, Vec<FileSpec>) {
    let mut client = MockClient::default();
    let mut specs = Vec::new();
    for i in 0..total {
        let name = format!("asset-{i}");
        let route = if i < quick { Route::Body(b"quick") } else { Route::Stall };
        client = client.route(&format!("https://cdn.example.net/{name}"), route);
        specs.push(file(dir, &name, b"quick"));
    }
    (client, specs)
}

#[tokio::test]
async fn test_cancel_session_cancels_remaining_units() {
    let dir = tempdir().unwrap();
    let (client, assets) = stalled_assets(&dir, 2, 10);
    let resolver = MockResolver {
        assets,
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(10, 3, 10));
    let mut rx = orch.subscribe();

    let task = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.start_session("1.20.1", SessionOptions::default()).await })
    };

    let mut completed = 0;
    let mut downloading = std::collections::HashSet::new();
    wait_until(&mut rx, |e| {
        if let DownloadEvent::Unit(s) = e {
            match s.status {
                UnitStatus::Completed => completed += 1,
                UnitStatus::Downloading => {
                    downloading.insert(s.id);
                }
                _ => {}
            }
        }
        completed == 2 && downloading.len() == 10
    })
    .await;

    assert_eq!(orch.session_progress("1.20.1").status, AggregateStatus::Downloading);
    assert!(orch.cancel_session("1.20.1"));
    assert!(!task.await.unwrap().unwrap());

    let report = report_of(&drain(&mut rx));
    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.cancelled.len(), 8);
    assert!(!orch.cancel_session("1.20.1"));
}

#[tokio::test]
async fn test_queued_units_never_start_after_cancel() {
    let dir = tempdir().unwrap();
    let (client, assets) = stalled_assets(&dir, 0, 5);
    let resolver = MockResolver {
        assets,
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(1, 3, 10));
    let mut rx = orch.subscribe();

    let task = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.start_session("1.20.1", SessionOptions::default()).await })
    };
    wait_until(&mut rx, |e| matches!(e, DownloadEvent::Unit(s) if s.status == UnitStatus::Downloading)).await;
    while orch.gate().queued() < 4 {
        tokio::task::yield_now().await;
    }

    assert!(orch.cancel_all());
    assert!(!task.await.unwrap().unwrap());

    let events = drain(&mut rx);
    let started = events
        .iter()
        .filter(|e| matches!(e, DownloadEvent::Unit(s) if s.status == UnitStatus::Downloading))
        .count();
    assert_eq!(started, 0);
    assert_eq!(report_of(&events).cancelled.len(), 5);
    assert_eq!(orch.gate().active(), 0);
}

#[tokio::test]
async fn test_cancel_all_does_not_poison_later_sessions() {
    let dir = tempdir().unwrap();
    let client = MockClient::default().route("https://cdn.example.net/a", Route::Body(b"a"));
    let resolver = MockResolver {
        assets: vec![file(&dir, "a", b"a")],
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(2, 3, 10));

    assert!(!orch.cancel_all());
    assert!(orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_session_is_rejected() {
    let dir = tempdir().unwrap();
    let (client, assets) = stalled_assets(&dir, 0, 1);
    let resolver = MockResolver {
        assets,
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(2, 3, 10));
    let mut rx = orch.subscribe();

    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.start_session("1.20.1", SessionOptions::default()).await })
    };
    wait_until(&mut rx, |e| matches!(e, DownloadEvent::PhaseStarted { phase: Phase::Assets, .. })).await;

    let err = orch.start_session("1.20.1", SessionOptions::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyActive(v) if v == "1.20.1"));
    assert_eq!(orch.active_sessions(), vec!["1.20.1".to_string()]);

    orch.cancel_session("1.20.1");
    assert!(!first.await.unwrap().unwrap());
}

#[tokio::test]
async fn test_caller_token_cancels_session() {
    let dir = tempdir().unwrap();
    let (client, assets) = stalled_assets(&dir, 0, 3);
    let resolver = MockResolver {
        assets,
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(4, 3, 10));
    let mut rx = orch.subscribe();
    let token = CancellationToken::new();

    let task = {
        let orch = Arc::clone(&orch);
        let options = SessionOptions::default().cancel_token(token.clone());
        tokio::spawn(async move { orch.start_session("1.20.1", options).await })
    };
    wait_until(&mut rx, |e| matches!(e, DownloadEvent::Unit(s) if s.status == UnitStatus::Downloading)).await;

    token.cancel();
    assert!(!task.await.unwrap().unwrap());
    assert_eq!(report_of(&drain(&mut rx)).cancelled.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_session_timeout_cancels_session() {
    let dir = tempdir().unwrap();
    let (client, assets) = stalled_assets(&dir, 0, 2);
    let resolver = MockResolver {
        assets,
        ..MockResolver::default()
    };
    let orch = orchestrator(client, resolver, config(4, 3, 10));

    let started = tokio::time::Instant::now();
    let options = SessionOptions::default().timeout(Duration::from_secs(30));
    assert!(!orch.start_session("1.20.1", options).await.unwrap());
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test]
async fn test_mirror_rewrites_canonical_urls() {
    let dir = tempdir().unwrap();
    let client = MockClient::default().route("https://mirror.example.cn/client.jar", Route::Body(b"client"));
    let resolver = MockResolver {
        core: vec![file(&dir, "client.jar", b"client")],
        ..MockResolver::default()
    };
    let orch = Orchestrator::builder(client, resolver)
        .config(config(4, 3, 10))
        .rewriter(PrefixMirror::new().rule("https://cdn.example.net/", "https://mirror.example.cn/"))
        .build()
        .unwrap();

    assert!(orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(orch.client().calls(), vec!["https://mirror.example.cn/client.jar"]);
}

fn mirrored(client: MockClient, resolver: MockResolver) -> TestOrchestrator {
    Orchestrator::builder(client, resolver)
        .config(config(4, 3, 10))
        .rewriter(PrefixMirror::new().rule("https://cdn.example.net/", "https://mirror.example.cn/"))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_missing_on_mirror_falls_back_to_origin() {
    let dir = tempdir().unwrap();
    let client = MockClient::default()
        .route("https://mirror.example.cn/client.jar", Route::Status(404))
        .route("https://cdn.example.net/client.jar", Route::Body(b"client"));
    let resolver = MockResolver {
        core: vec![file(&dir, "client.jar", b"client").fallback("https://cdn.example.net/client.jar")],
        ..MockResolver::default()
    };
    let orch = mirrored(client, resolver);

    assert!(orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(
        orch.client().calls(),
        vec!["https://mirror.example.cn/client.jar", "https://cdn.example.net/client.jar"]
    );
    assert_eq!(std::fs::read(dir.path().join("client.jar")).unwrap(), b"client");
}

#[tokio::test]
async fn test_mirror_without_fallback_uses_canonical_as_origin() {
    let dir = tempdir().unwrap();
    let client = MockClient::default()
        .route("https://mirror.example.cn/lib.jar", Route::Status(403))
        .route("https://cdn.example.net/lib.jar", Route::Body(b"library"));
    let resolver = MockResolver {
        core: vec![file(&dir, "lib.jar", b"library")],
        ..MockResolver::default()
    };
    let orch = mirrored(client, resolver);

    assert!(orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(
        orch.client().calls(),
        vec!["https://mirror.example.cn/lib.jar", "https://cdn.example.net/lib.jar"]
    );
}

#[tokio::test]
async fn test_missing_on_mirror_and_origin_fails_after_two_calls() {
    let dir = tempdir().unwrap();
    let resolver = MockResolver {
        core: vec![file(&dir, "lib.jar", b"library")],
        ..MockResolver::default()
    };
    let orch = mirrored(MockClient::default(), resolver);

    assert!(!orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(
        orch.client().calls(),
        vec!["https://mirror.example.cn/lib.jar", "https://cdn.example.net/lib.jar"]
    );
}

#[tokio::test]
async fn test_missing_without_mirror_or_fallback_fails_after_one_call() {
    let dir = tempdir().unwrap();
    let resolver = MockResolver {
        core: vec![file(&dir, "lib.jar", b"library").fallback("https://cdn.example.net/lib.jar")],
        ..MockResolver::default()
    };
    let orch = orchestrator(MockClient::default(), resolver, config(4, 3, 10));

    assert!(!orch.start_session("1.20.1", SessionOptions::default()).await.unwrap());
    assert_eq!(orch.client().calls(), vec!["https://cdn.example.net/lib.jar"]);
}

#[tokio::test]
async fn test_config_updates_reach_the_gate() {
    let handle = config(4, 3, 10);
    let orch = orchestrator(MockClient::default(), MockResolver::default(), handle.clone());
    let mut limits = orch.gate().limit_changes();

    handle.update(|c| c.max_concurrent_downloads = 9).unwrap();
    limits.changed().await.unwrap();
    assert_eq!(*limits.borrow(), 9);
    assert_eq!(orch.gate().limit(), 9);
}

#[tokio::test]
async fn test_unknown_session_reports_default_progress() {
    let orch = orchestrator(MockClient::default(), MockResolver::default(), config(4, 3, 10));
    let progress = orch.session_progress("nope");

    assert_eq!(progress.status, AggregateStatus::None);
    assert_eq!(progress.total, 0);
    assert!(orch.session_units("nope").is_none());
}

#[tokio::test]
async fn test_dispose_is_idempotent_and_rejects_new_sessions() {
    let orch = orchestrator(MockClient::default(), MockResolver::default(), config(4, 3, 10));

    orch.dispose();
    orch.dispose();

    assert!(orch.is_disposed());
    assert!(orch.gate().is_disposed());
    let err = orch.start_session("1.20.1", SessionOptions::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::Disposed));
}
