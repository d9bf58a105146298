use crate::{ItemId, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchAnalysis {
        request_id: RequestId,
        identifier: ItemId,
    },
    CancelFetch {
        request_id: RequestId,
    },
}
