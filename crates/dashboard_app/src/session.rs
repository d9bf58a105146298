//! Headless dashboard session: selection state, analysis effects and
//! rendered analysis panels.

use std::sync::{mpsc, Arc, Mutex, PoisonError, Weak};
use std::thread;

use dashboard_core::{update, AppState, AppViewModel, ItemId, Msg, PanelView, PlotView};
use dashboard_engine::{Embedder, EngineHandle, MarkupHost};
use dashboard_logging::dashboard_debug;

use crate::effects::EffectRunner;

pub const VISUAL_CONTAINER: &str = "visual-plot";
pub const AUDIO_CONTAINER: &str = "audio-plot";

#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
    runner: Arc<EffectRunner>,
}

struct SessionState {
    state: AppState,
    embedder: Embedder<MarkupHost>,
    rendered: Option<AppViewModel>,
}

impl Session {
    pub fn new(engine: EngineHandle) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
        let session = Self {
            inner: Arc::new(Mutex::new(SessionState {
                state: AppState::new(),
                embedder: Embedder::new(MarkupHost::new()),
                rendered: None,
            })),
            runner: Arc::new(EffectRunner::new(engine, msg_tx)),
        };

        // Weak references only: dropping the last session stops the engine,
        // which closes the message stream and ends this thread.
        let inner = Arc::downgrade(&session.inner);
        let runner = Arc::downgrade(&session.runner);
        thread::spawn(move || {
            while let Ok(msg) = msg_rx.recv() {
                let Some(session) = upgrade(&inner, &runner) else {
                    break;
                };
                session.dispatch(msg);
            }
            dashboard_debug!("Session message pump stopped");
        });
        session
    }

    /// Applies `msg` and runs the resulting effects in order.
    pub fn dispatch(&self, msg: Msg) {
        let mut inner = self.lock();
        let state = std::mem::take(&mut inner.state);
        let (state, effects) = update(state, msg);
        inner.state = state;
        self.runner.enqueue(effects);
    }

    pub fn select(&self, identifier: Option<ItemId>) {
        self.dispatch(Msg::SelectionChanged(identifier));
    }

    /// Current view model with plot fragments rendered through the embedder.
    ///
    /// Panels are only re-rendered when the state changed since the last call.
    pub fn view(&self) -> AppViewModel {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let mut view = inner.state.view();
        if !inner.state.consume_dirty() {
            if let Some(rendered) = &inner.rendered {
                return rendered.clone();
            }
        }

        dashboard_debug!("Rendering analysis panels for {:?}", view.selection);
        render_panel(&mut inner.embedder, VISUAL_CONTAINER, &mut view.visual);
        render_panel(&mut inner.embedder, AUDIO_CONTAINER, &mut view.audio);
        inner.rendered = Some(view.clone());
        view
    }

    /// Renders an arbitrary fragment into `container` and returns the settled markup.
    pub fn render_fragment(&self, container: &str, fragment: Option<&str>) -> String {
        self.lock().embedder.render_markup(container, fragment)
    }

    /// Renders `fragments` into `{prefix}-0`, `{prefix}-1`, ... and returns
    /// `(container, markup)` pairs. Containers of the group beyond the new
    /// length are released.
    pub fn render_fragments(
        &self,
        prefix: &str,
        fragments: &[Option<&str>],
    ) -> Vec<(String, String)> {
        let mut inner = self.lock();
        let rendered = fragments
            .iter()
            .enumerate()
            .map(|(index, fragment)| {
                let container = format!("{prefix}-{index}");
                let html = inner.embedder.render_markup(&container, *fragment);
                (container, html)
            })
            .collect();

        let stale: Vec<String> = inner
            .embedder
            .containers()
            .filter(|name| {
                name.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .and_then(|index| index.parse::<usize>().ok())
                    .is_some_and(|index| index >= fragments.len())
            })
            .map(str::to_string)
            .collect();
        for container in stale {
            inner.embedder.release(&container);
        }
        rendered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn upgrade(inner: &Weak<Mutex<SessionState>>, runner: &Weak<EffectRunner>) -> Option<Session> {
    Some(Session {
        inner: inner.upgrade()?,
        runner: runner.upgrade()?,
    })
}

fn render_panel(embedder: &mut Embedder<MarkupHost>, container: &str, panel: &mut PanelView) {
    let fragment = panel
        .plot()
        .and_then(PlotView::fragment)
        .map(str::to_string);
    let rendered = embedder.render_markup(container, fragment.as_deref());
    if let PanelView::Ready {
        plot: PlotView::Fragment { html },
        ..
    } = panel
    {
        *html = rendered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_engine::EngineConfig;
    use std::time::Duration;

    fn offline_engine() -> EngineHandle {
        EngineHandle::new(EngineConfig {
            analysis_endpoint: "http://127.0.0.1:9/analysis".into(),
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn shorter_group_releases_leftover_containers() {
        let session = Session::new(offline_engine());
        session.render_fragments("charts", &[Some("<p>a</p>"), Some("<p>b</p>"), None]);

        let rendered = session.render_fragments("charts", &[Some("<p>c</p>")]);

        assert_eq!(rendered, vec![("charts-0".to_string(), "<p>c</p>".to_string())]);
        let mut containers: Vec<String> =
            session.lock().embedder.containers().map(str::to_string).collect();
        containers.sort();
        assert_eq!(containers, vec!["charts-0".to_string()]);
    }

    #[test]
    fn dropping_the_session_stops_the_engine() {
        let engine = offline_engine();
        let events = engine.events();
        let session = Session::new(engine);
        session.view();

        drop(session);
        assert!(matches!(
            events.recv_timeout(Duration::from_secs(2)),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected)
        ));
    }
}
