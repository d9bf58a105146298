use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use dashboard_logging::dashboard_debug;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::fetch::{ChannelProgressSink, ProgressSink, ResilientFetcher};
use crate::{
    AnalysisCache, AnalysisSource, EngineConfig, EngineEvent, FetchError, HttpAnalysisSource,
    RequestId, RetryPolicy,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build analysis client: {0}")]
    Client(#[from] FetchError),
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

enum EngineCommand {
    Fetch {
        request_id: RequestId,
        identifier: String,
    },
    Cancel {
        request_id: RequestId,
    },
}

type Inflight = Arc<Mutex<HashMap<RequestId, CancellationToken>>>;

/// Handle to the background analysis worker.
///
/// Commands are processed on a dedicated thread owning a tokio runtime; each
/// fetch runs as its own task with its own cancellation token. The worker
/// stops once the handle is dropped, after which [`EngineEvents`] reports
/// [`RecvTimeoutError::Disconnected`].
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    events: EngineEvents,
    cache: AnalysisCache,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let source = HttpAnalysisSource::new(&config)?;
        Self::with_source(Arc::new(source), config.retry)
    }

    pub fn with_source(
        source: Arc<dyn AnalysisSource>,
        policy: RetryPolicy,
    ) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Runtime::new()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let cache = AnalysisCache::new();
        let fetcher = Arc::new(ResilientFetcher::new(source, policy, cache.clone()));

        thread::spawn(move || {
            let inflight: Inflight = Arc::default();
            while let Ok(command) = cmd_rx.recv() {
                handle_command(&runtime, &fetcher, &inflight, &event_tx, command);
            }
            dashboard_debug!("Analysis engine stopped");
        });

        Ok(Self {
            cmd_tx,
            events: EngineEvents {
                rx: Arc::new(Mutex::new(event_rx)),
            },
            cache,
        })
    }

    pub fn fetch(&self, request_id: RequestId, identifier: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Fetch {
            request_id,
            identifier: identifier.into(),
        });
    }

    pub fn cancel(&self, request_id: RequestId) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { request_id });
    }

    /// Receiving side of the engine; does not keep the worker alive.
    pub fn events(&self) -> EngineEvents {
        self.events.clone()
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }
}

/// Events produced by an [`EngineHandle`].
#[derive(Clone)]
pub struct EngineEvents {
    rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineEvents {
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.lock().try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError> {
        self.lock().recv_timeout(timeout)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, mpsc::Receiver<EngineEvent>> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn handle_command(
    runtime: &tokio::runtime::Runtime,
    fetcher: &Arc<ResilientFetcher>,
    inflight: &Inflight,
    event_tx: &mpsc::Sender<EngineEvent>,
    command: EngineCommand,
) {
    match command {
        EngineCommand::Fetch {
            request_id,
            identifier,
        } => {
            let token = CancellationToken::new();
            inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(request_id, token.clone());

            let fetcher = fetcher.clone();
            let inflight = inflight.clone();
            let event_tx = event_tx.clone();
            runtime.spawn(async move {
                let sink = CancellableSink {
                    inner: ChannelProgressSink::new(event_tx.clone()),
                    token: token.clone(),
                };
                let result = fetcher.fetch(request_id, &identifier, &sink, &token).await;
                inflight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&request_id);

                if token.is_cancelled() || result.as_ref().is_err_and(FetchError::is_cancelled) {
                    dashboard_debug!("Dropping result of cancelled request {}", request_id);
                    return;
                }
                let _ = event_tx.send(EngineEvent::AnalysisCompleted {
                    request_id,
                    identifier,
                    result,
                });
            });
        }
        EngineCommand::Cancel { request_id } => {
            let token = inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            if let Some(token) = token {
                dashboard_debug!("Cancelling request {}", request_id);
                token.cancel();
            }
        }
    }
}

/// Drops status events once the request has been cancelled.
struct CancellableSink<S> {
    inner: S,
    token: CancellationToken,
}

impl<S: ProgressSink> ProgressSink for CancellableSink<S> {
    fn emit(&self, event: EngineEvent) {
        if !self.token.is_cancelled() {
            self.inner.emit(event);
        }
    }
}
