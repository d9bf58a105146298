use std::sync::Arc;

use crate::{AnalysisResult, ItemId, RequestId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked a content item, or cleared the selection with `None`.
    SelectionChanged(Option<ItemId>),
    /// Intermediate status for an in-flight analysis request.
    AnalysisStatus {
        request_id: RequestId,
        message: String,
    },
    /// Terminal success for an analysis request.
    AnalysisResolved {
        request_id: RequestId,
        result: Arc<AnalysisResult>,
    },
    /// Terminal failure for an analysis request.
    AnalysisFailed {
        request_id: RequestId,
        message: String,
    },
}
