use std::fmt;
use std::sync::Arc;

use dashboard_logging::{dashboard_debug, dashboard_trace};
use serde::Serialize;

use crate::view_model::AppViewModel;
use crate::{AnalysisResult, Effect};

pub type RequestId = u64;

/// Identifier of a content item: the name of its dataset folder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Analysis lifecycle for the current selection.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AnalysisPhase {
    #[default]
    Empty,
    Pending {
        identifier: ItemId,
        request_id: RequestId,
        status: Option<String>,
    },
    Resolved {
        identifier: ItemId,
        result: Arc<AnalysisResult>,
    },
    Failed {
        identifier: ItemId,
        message: String,
    },
}

impl AnalysisPhase {
    pub fn identifier(&self) -> Option<&ItemId> {
        match self {
            AnalysisPhase::Empty => None,
            AnalysisPhase::Pending { identifier, .. }
            | AnalysisPhase::Resolved { identifier, .. }
            | AnalysisPhase::Failed { identifier, .. } => Some(identifier),
        }
    }

    fn pending_request(&self) -> Option<RequestId> {
        match self {
            AnalysisPhase::Pending { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    phase: AnalysisPhase,
    next_request_id: RequestId,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &AnalysisPhase {
        &self.phase
    }

    pub fn selection(&self) -> Option<&ItemId> {
        self.phase.identifier()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel::from_phase(&self.phase)
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn select(&mut self, identifier: ItemId) -> Vec<Effect> {
        if self.selection() == Some(&identifier) {
            return Vec::new();
        }

        let mut effects = self.cancel_pending();
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        dashboard_debug!("Selection -> {} (request {})", identifier, request_id);
        effects.push(Effect::FetchAnalysis {
            request_id,
            identifier: identifier.clone(),
        });
        self.phase = AnalysisPhase::Pending {
            identifier,
            request_id,
            status: None,
        };
        self.dirty = true;
        effects
    }

    pub(crate) fn clear_selection(&mut self) -> Vec<Effect> {
        if self.phase == AnalysisPhase::Empty {
            return Vec::new();
        }
        let effects = self.cancel_pending();
        self.phase = AnalysisPhase::Empty;
        self.dirty = true;
        effects
    }

    pub(crate) fn apply_status(&mut self, request_id: RequestId, message: String) {
        if !self.is_current(request_id) {
            return;
        }
        if let AnalysisPhase::Pending { status, .. } = &mut self.phase {
            *status = Some(message);
            self.dirty = true;
        }
    }

    pub(crate) fn apply_resolved(&mut self, request_id: RequestId, result: Arc<AnalysisResult>) {
        if !self.is_current(request_id) {
            return;
        }
        if let AnalysisPhase::Pending { identifier, .. } = &self.phase {
            self.phase = AnalysisPhase::Resolved {
                identifier: identifier.clone(),
                result,
            };
            self.dirty = true;
        }
    }

    pub(crate) fn apply_failed(&mut self, request_id: RequestId, message: String) {
        if !self.is_current(request_id) {
            return;
        }
        if let AnalysisPhase::Pending { identifier, .. } = &self.phase {
            self.phase = AnalysisPhase::Failed {
                identifier: identifier.clone(),
                message,
            };
            self.dirty = true;
        }
    }

    fn is_current(&self, request_id: RequestId) -> bool {
        let current = self.phase.pending_request() == Some(request_id);
        if !current {
            dashboard_trace!("Ignoring stale message for request {}", request_id);
        }
        current
    }

    fn cancel_pending(&self) -> Vec<Effect> {
        self.phase
            .pending_request()
            .map(|request_id| vec![Effect::CancelFetch { request_id }])
            .unwrap_or_default()
    }
}
