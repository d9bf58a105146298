//! Dashboard engine: fragment embedding, resilient analysis fetching and media helpers.
mod cache;
mod config;
mod embed;
mod engine;
mod fetch;
mod fragment;
mod markup_host;
mod media;
mod retry;
mod types;

pub use cache::AnalysisCache;
pub use config::{normalize_base_url, EngineConfig, DEFAULT_SERVICE_URL};
pub use embed::{ChainToken, Embedder, LoadTicket, ScriptElement, ScriptEvent, ScriptHost};
pub use engine::{EngineError, EngineEvents, EngineHandle};
pub use fetch::{
    AnalysisSource, ChannelProgressSink, HttpAnalysisSource, ProgressSink, ResilientFetcher,
    SourceReply,
};
pub use fragment::{parse_fragment, ParsedFragment, ScriptDescriptor};
pub use markup_host::MarkupHost;
pub use media::{parse_range, validate_item_id, video_path, ByteRange, MediaError, RangeError};
pub use retry::{error_message, AttemptOutcome, RetryOutcome, RetryPolicy, RetryState, TIMEOUT_MESSAGE};
pub use types::{EngineEvent, FailureKind, FetchError, RequestId};
