use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use dashboard_core::{Effect, Msg};
use dashboard_engine::{EngineEvent, EngineHandle};
use dashboard_logging::{dashboard_debug, dashboard_info, dashboard_warn};

const EVENT_POLL: Duration = Duration::from_millis(50);

/// Runs core effects against the engine and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, msg_tx: mpsc::Sender<Msg>) -> Self {
        let runner = Self { engine };
        runner.spawn_event_loop(msg_tx);
        runner
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchAnalysis {
                    request_id,
                    identifier,
                } => {
                    dashboard_info!("FetchAnalysis request_id={} id={}", request_id, identifier);
                    self.engine.fetch(request_id, identifier.as_str());
                }
                Effect::CancelFetch { request_id } => {
                    dashboard_info!("CancelFetch request_id={}", request_id);
                    self.engine.cancel(request_id);
                }
            }
        }
    }

    /// Forwards engine events until the engine stops or nobody listens.
    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let events = self.engine.events();
        thread::spawn(move || loop {
            match events.recv_timeout(EVENT_POLL) {
                Ok(event) => {
                    if msg_tx.send(map_event(event)).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    dashboard_debug!("Engine event stream closed");
                    break;
                }
            }
        });
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::AnalysisStatus {
            request_id,
            message,
        } => Msg::AnalysisStatus {
            request_id,
            message,
        },
        EngineEvent::AnalysisCompleted {
            request_id,
            identifier,
            result,
        } => match result {
            Ok(result) => Msg::AnalysisResolved { request_id, result },
            Err(err) => {
                dashboard_warn!(
                    "Analysis request {} for {} failed: {} ({})",
                    request_id,
                    identifier,
                    err.message,
                    err.kind
                );
                Msg::AnalysisFailed {
                    request_id,
                    message: err.message,
                }
            }
        },
    }
}
