use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
///
/// Results for anything but the current pending request are dropped, so a
/// superseded fetch never becomes visible.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::SelectionChanged(Some(identifier)) => state.select(identifier),
        Msg::SelectionChanged(None) => state.clear_selection(),
        Msg::AnalysisStatus {
            request_id,
            message,
        } => {
            state.apply_status(request_id, message);
            Vec::new()
        }
        Msg::AnalysisResolved { request_id, result } => {
            state.apply_resolved(request_id, result);
            Vec::new()
        }
        Msg::AnalysisFailed {
            request_id,
            message,
        } => {
            state.apply_failed(request_id, message);
            Vec::new()
        }
    };

    (state, effects)
}
