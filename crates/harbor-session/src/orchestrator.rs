use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use harbor_fetch::{HttpClient, NoMirror, UrlRewriter};
use harbor_gate::{Gate, GateError};
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::config::{ConfigHandle, EngineConfig};
use crate::error::{Result, SessionError, TransferError};
use crate::event::{DownloadEvent, EventSink};
use crate::platform::Platform;
use crate::resolver::{FileSpec, MetadataResolver, Phase};
use crate::session::{AggregateProgress, Session, SessionOptions, SessionReport};
use crate::transfer::{RetryPolicy, Transfer};
use crate::unit::{DownloadUnit, UnitId, UnitSnapshot};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

type Sessions = Mutex<HashMap<String, Arc<Session>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

pub struct OrchestratorBuilder<C, M> {
    client:         C,
    resolver:       M,
    config:         ConfigHandle,
    rewriter:       Arc<dyn UrlRewriter>,
    event_capacity: usize,
}

impl<C: HttpClient + 'static, M: MetadataResolver> OrchestratorBuilder<C, M> {
    pub fn config(mut self, config: ConfigHandle) -> Self {
        self.config = config;
        self
    }

    /// Rewrite canonical URLs, e.g. onto a mirror. Fallback URLs are used
    /// verbatim.
    pub fn rewriter(mut self, rewriter: impl UrlRewriter + 'static) -> Self {
        self.rewriter = Arc::new(rewriter);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<Orchestrator<C, M>> {
        let config = self.config.current();
        config.validate()?;

        let gate = Gate::new(config.max_concurrent_downloads)?;
        let transfer = Transfer::new(self.client, self.rewriter);
        transfer.client().set_timeout(config.download_timeout());

        let shared = Arc::new(Shared {
            transfer,
            resolver: self.resolver,
            gate,
            config: self.config,
            scope: Mutex::new(CancellationToken::new()),
            sessions: Mutex::new(HashMap::new()),
            events: EventSink::new(self.event_capacity),
            next_unit: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        });
        let watcher = tokio::spawn(watch_config(Arc::downgrade(&shared), shared.config.subscribe()));

        debug!(limit = config.max_concurrent_downloads, "orchestrator ready");
        Ok(Orchestrator { shared, watcher })
    }
}

/// Installs game versions, one session per version id.
///
/// Sessions for different versions run concurrently and share a single
/// concurrency [`Gate`]. Dropping the orchestrator disposes it.
pub struct Orchestrator<C: HttpClient + 'static, M: MetadataResolver> {
    shared:  Arc<Shared<C, M>>,
    watcher: JoinHandle<()>,
}

struct Shared<C: HttpClient + 'static, M: MetadataResolver> {
    transfer:  Transfer<C>,
    resolver:  M,
    gate:      Gate,
    config:    ConfigHandle,
    /// Parent of every session token; replaced after `cancel_all`.
    scope:     Mutex<CancellationToken>,
    sessions:  Sessions,
    events:    EventSink,
    next_unit: AtomicU64,
    disposed:  AtomicBool,
}

impl<C: HttpClient + 'static, M: MetadataResolver> Orchestrator<C, M> {
    pub fn builder(client: C, resolver: M) -> OrchestratorBuilder<C, M> {
        OrchestratorBuilder {
            client,
            resolver,
            config: ConfigHandle::default(),
            rewriter: Arc::new(NoMirror),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn new(client: C, resolver: M, config: ConfigHandle) -> Result<Self> {
        Self::builder(client, resolver).config(config).build()
    }

    pub fn gate(&self) -> &Gate { &self.shared.gate }

    pub fn config(&self) -> &ConfigHandle { &self.shared.config }

    pub fn client(&self) -> &C { self.shared.transfer.client() }

    pub fn resolver(&self) -> &M { &self.shared.resolver }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> { self.shared.events.subscribe() }

    /// Install `version`: manifest, then core files, then assets.
    ///
    /// Returns `Ok(true)` only when every unit of every phase completed and
    /// the session was not cancelled. A failed manifest phase ends the
    /// session early since the later phases depend on it; failures in the
    /// core phase do not stop the asset phase.
    pub async fn start_session(&self, version: &str, mut options: SessionOptions<M::Descriptor>) -> Result<bool> {
        let session = self.shared.register(version)?;
        let span = info_span!("session", version);

        let timeout = options
            .timeout
            .unwrap_or_else(|| self.shared.config.current().session_timeout());
        let linker = tokio::spawn(
            link_cancellation(session.cancel_token().clone(), options.cancel.take(), timeout)
                .instrument(span.clone()),
        );
        let _registration = Registration {
            sessions: &self.shared.sessions,
            session: &session,
            linker,
        };

        self.shared.run_session(&session, options).instrument(span).await
    }

    /// Cancel the running session for `version`. Returns whether one existed.
    pub fn cancel_session(&self, version: &str) -> bool {
        let session = lock(&self.shared.sessions).get(version).cloned();
        match session {
            Some(session) => {
                info!(version, "cancelling session");
                session.cancel_token().cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running session. Sessions started afterwards are not
    /// affected. Returns whether any session was running.
    pub fn cancel_all(&self) -> bool {
        let active = !lock(&self.shared.sessions).is_empty();
        let mut scope = lock(&self.shared.scope);
        scope.cancel();
        if !self.shared.disposed.load(Ordering::Acquire) {
            *scope = CancellationToken::new();
        }
        info!(active, "cancelled all sessions");
        active
    }

    /// Rolled-up progress of a running session; the default for unknown
    /// versions.
    pub fn session_progress(&self, version: &str) -> AggregateProgress {
        self.shared.session(version).map(|s| s.progress()).unwrap_or_default()
    }

    pub fn session_units(&self, version: &str) -> Option<Vec<UnitSnapshot>> {
        self.shared.session(version).map(|s| s.snapshots())
    }

    pub fn active_sessions(&self) -> Vec<String> {
        let mut versions: Vec<_> = lock(&self.shared.sessions).keys().cloned().collect();
        versions.sort();
        versions
    }

    pub fn is_disposed(&self) -> bool { self.shared.disposed.load(Ordering::Acquire) }

    /// Cancel every session, then shut the gate. Idempotent.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        lock(&self.shared.scope).cancel();
        self.shared.gate.dispose();
        self.watcher.abort();
        info!("orchestrator disposed");
    }
}

impl<C: HttpClient + 'static, M: MetadataResolver> Drop for Orchestrator<C, M> {
    fn drop(&mut self) { self.dispose(); }
}

impl<C: HttpClient + 'static, M: MetadataResolver> Shared<C, M> {
    fn session(&self, version: &str) -> Option<Arc<Session>> { lock(&self.sessions).get(version).cloned() }

    fn register(&self, version: &str) -> Result<Arc<Session>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SessionError::Disposed);
        }

        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(version) {
            return Err(SessionError::AlreadyActive(version.to_string()));
        }
        let token = lock(&self.scope).child_token();
        let session = Arc::new(Session::new(version, token));
        sessions.insert(version.to_string(), Arc::clone(&session));
        Ok(session)
    }

    fn apply_config(&self, config: &EngineConfig) {
        if let Err(e) = self.gate.set_limit(config.max_concurrent_downloads) {
            warn!(error = %e, "cannot apply concurrency limit");
        }
        self.transfer.client().set_timeout(config.download_timeout());
        info!(
            limit = config.max_concurrent_downloads,
            timeout_secs = config.download_timeout_secs,
            retries = config.max_retry_count,
            "configuration applied"
        );
    }

    async fn run_session(
        self: &Arc<Self>,
        session: &Arc<Session>,
        options: SessionOptions<M::Descriptor>,
    ) -> Result<bool> {
        let platform = options.platform.unwrap_or_else(Platform::current);
        info!(%platform, "session started");

        let descriptor = match self.run_phases(session, platform).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(error = %e, "session aborted");
                self.finish(session);
                return Err(e);
            }
        };

        let report = self.finish(session);
        let succeeded = report.succeeded && descriptor.is_some();
        if succeeded {
            if let (Some(hook), Some(descriptor)) = (options.on_completed, descriptor.as_ref()) {
                hook(descriptor);
            }
        }
        Ok(succeeded)
    }

    /// Returns the descriptor once every phase has run, `None` if the session
    /// stopped early.
    async fn run_phases(self: &Arc<Self>, session: &Arc<Session>, platform: Platform) -> Result<Option<M::Descriptor>> {
        let version = session.version();
        let cancel = session.cancel_token();

        let Some(files) = resolve(cancel, self.resolver.manifest_files(version)).await? else {
            return Ok(None);
        };
        self.run_phase(session, Phase::Manifest, files).await;
        if session.is_cancelled() || session.has_failures() {
            return Ok(None);
        }

        let Some(descriptor) = resolve(cancel, self.resolver.load_descriptor(version)).await? else {
            return Ok(None);
        };

        let Some(files) = resolve(cancel, self.resolver.core_files(&descriptor, &platform)).await? else {
            return Ok(None);
        };
        self.run_phase(session, Phase::Core, files).await;
        if session.is_cancelled() {
            return Ok(None);
        }

        let Some(files) = resolve(cancel, self.resolver.asset_files(&descriptor)).await? else {
            return Ok(None);
        };
        self.run_phase(session, Phase::Assets, files).await;
        Ok(Some(descriptor))
    }

    /// Run every unit of a phase to a terminal status. One unit failing does
    /// not stop its siblings.
    async fn run_phase(self: &Arc<Self>, session: &Arc<Session>, phase: Phase, files: Vec<FileSpec>) {
        let version = session.version();
        let units: Vec<Arc<DownloadUnit>> = files
            .into_iter()
            .map(|spec| {
                let id = UnitId(self.next_unit.fetch_add(1, Ordering::Relaxed));
                Arc::new(DownloadUnit::new(id, version, phase, spec, self.events.clone()))
            })
            .collect();
        session.add_units(&units);

        self.events.emit(DownloadEvent::PhaseStarted {
            version: version.to_string(),
            phase,
            units: units.len(),
        });
        info!(%phase, units = units.len(), "phase started");

        let mut tasks = JoinSet::new();
        for unit in &units {
            let shared = Arc::clone(self);
            let unit = Arc::clone(unit);
            let cancel = session.cancel_token().clone();
            tasks.spawn(shared.run_unit(unit, cancel).instrument(Span::current()));
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(%phase, error = %e, "unit task ended abnormally");
            }
        }
        for unit in &units {
            if !unit.status().is_terminal() {
                unit.fail("transfer task ended unexpectedly".into());
            }
        }

        let progress = session.progress();
        info!(
            %phase,
            completed = progress.completed,
            failed = progress.failed,
            cancelled = progress.cancelled,
            "phase finished"
        );
    }

    async fn run_unit(self: Arc<Self>, unit: Arc<DownloadUnit>, cancel: CancellationToken) {
        let outcome = self
            .gate
            .execute(&cancel, || {
                let policy = RetryPolicy::from(&self.config.current());
                self.transfer.run(&unit, policy, &cancel)
            })
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(TransferError::Cancelled)) | Err(GateError::Cancelled | GateError::Disposed) => {
                unit.cancel();
            }
            Ok(Err(e)) => {
                warn!(unit = %unit.id(), error = %e, "unit failed");
                unit.fail(e.to_string());
            }
            Err(e @ GateError::InvalidLimit(_)) => {
                unit.fail(e.to_string());
            }
        }
    }

    fn finish(&self, session: &Session) -> Arc<SessionReport> {
        let report = Arc::new(session.report());
        if report.succeeded {
            info!(completed = report.completed.len(), elapsed = ?report.elapsed, "session completed");
        } else {
            warn!(
                completed = report.completed.len(),
                failed = report.failed.len(),
                cancelled = report.cancelled.len(),
                "session finished unsuccessfully"
            );
        }
        self.events.emit(DownloadEvent::SessionCompleted(Arc::clone(&report)));
        report
    }
}

/// Await a resolver call unless the session is cancelled first.
async fn resolve<T, E>(cancel: &CancellationToken, call: impl Future<Output = std::result::Result<T, E>>) -> Result<Option<T>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        res = call => res.map(Some).map_err(|e| SessionError::Metadata(Box::new(e))),
    }
}

/// Cancel `session` when the caller's token fires or the timeout elapses.
async fn link_cancellation(session: CancellationToken, external: Option<CancellationToken>, timeout: Duration) {
    let external = async move {
        match external {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = session.cancelled() => {}
        _ = external => {
            debug!("caller cancelled session");
            session.cancel();
        }
        _ = tokio::time::sleep(timeout) => {
            warn!(?timeout, "session timed out");
            session.cancel();
        }
    }
}

async fn watch_config<C: HttpClient + 'static, M: MetadataResolver>(
    shared: Weak<Shared<C, M>>,
    mut rx: watch::Receiver<EngineConfig>,
) {
    while rx.changed().await.is_ok() {
        let Some(shared) = shared.upgrade() else { break };
        let config = rx.borrow_and_update().clone();
        shared.apply_config(&config);
    }
}

/// Unregisters a session when `start_session` returns or is dropped.
struct Registration<'a> {
    sessions: &'a Sessions,
    session:  &'a Arc<Session>,
    linker:   JoinHandle<()>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.linker.abort();
        self.session.cancel_token().cancel();

        let mut sessions = lock(self.sessions);
        if sessions
            .get(self.session.version())
            .is_some_and(|s| Arc::ptr_eq(s, self.session))
        {
            sessions.remove(self.session.version());
        }
    }
}
