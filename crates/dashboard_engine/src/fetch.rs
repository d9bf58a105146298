use std::sync::Arc;
use std::time::Duration;

use dashboard_core::AnalysisResult;
use dashboard_logging::{dashboard_debug, dashboard_info, dashboard_warn};
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::retry::TIMEOUT_MESSAGE;
use crate::{
    AnalysisCache, AttemptOutcome, EngineConfig, EngineEvent, FailureKind, FetchError, RequestId,
    RetryOutcome, RetryPolicy, RetryState,
};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Raw reply of the analysis endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// One GET of the analysis result for `identifier`.
///
/// `cancel` fires when the attempt is abandoned (timeout or caller cancellation).
#[async_trait::async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn request(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<SourceReply, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpAnalysisSource {
    client: reqwest::Client,
    endpoint: Url,
    max_bytes: u64,
}

impl HttpAnalysisSource {
    pub fn new(config: &EngineConfig) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&config.analysis_endpoint)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.retry.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            max_bytes: config.max_bytes,
        })
    }

    fn url_for(&self, identifier: &str) -> Result<Url, FetchError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::new(FailureKind::InvalidUrl, "endpoint cannot be a base"))?
            .pop_if_empty()
            .push(identifier);
        Ok(url)
    }

    async fn get(&self, identifier: &str) -> Result<SourceReply, FetchError> {
        let url = self.url_for(identifier)?;
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(SourceReply { status, body })
    }
}

#[async_trait::async_trait]
impl AnalysisSource for HttpAnalysisSource {
    async fn request(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<SourceReply, FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::cancelled()),
            reply = self.get(identifier) => reply,
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

/// Fetches analysis results with bounded backoff retries and a shared result cache.
#[derive(Clone)]
pub struct ResilientFetcher {
    source: Arc<dyn AnalysisSource>,
    policy: RetryPolicy,
    cache: AnalysisCache,
}

impl ResilientFetcher {
    pub fn new(source: Arc<dyn AnalysisSource>, policy: RetryPolicy, cache: AnalysisCache) -> Self {
        Self {
            source,
            policy,
            cache,
        }
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Runs the retry loop for `identifier`.
    ///
    /// Intermediate status goes to `sink`; the return value is the terminal
    /// outcome. Once `cancel` fires nothing more is emitted and the result is a
    /// [`FailureKind::Cancelled`] error that callers must not surface.
    pub async fn fetch(
        &self,
        request_id: RequestId,
        identifier: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Arc<AnalysisResult>, FetchError> {
        if let Some(cached) = self.cache.get(identifier) {
            dashboard_debug!("Analysis cache hit for {}", identifier);
            return Ok(cached);
        }

        let mut state = RetryState::new(self.policy.max_attempts());
        for attempt in 0..self.policy.max_attempts() {
            state.begin(attempt);
            let Some(outcome) = self.run_attempt(identifier, cancel).await else {
                dashboard_debug!("Analysis request {} for {} cancelled", request_id, identifier);
                return Err(FetchError::cancelled());
            };

            let (retryable, failure) = match outcome {
                AttemptOutcome::Success(result) => {
                    state.finish(RetryOutcome::Succeeded);
                    dashboard_info!(
                        "Analysis for {} ready after {} attempt(s)",
                        identifier,
                        attempt + 1
                    );
                    return Ok(self.cache.insert(identifier, result));
                }
                AttemptOutcome::PermanentFailure { status, message } => {
                    let kind = match status {
                        Some(status) if !(200..300).contains(&status) => {
                            FailureKind::HttpStatus(status)
                        }
                        _ => FailureKind::InvalidPayload,
                    };
                    (false, FetchError::new(kind, message))
                }
                AttemptOutcome::TransientFailure { status, message } => {
                    (true, FetchError::new(FailureKind::HttpStatus(status), message))
                }
                AttemptOutcome::Timeout => (
                    self.policy.retries_timeouts(),
                    FetchError::new(FailureKind::Timeout, TIMEOUT_MESSAGE),
                ),
            };

            if !retryable || !state.has_attempts_left() {
                state.finish(RetryOutcome::Failed);
                dashboard_warn!(
                    "Analysis for {} failed on attempt {}/{}: {} ({})",
                    identifier,
                    attempt + 1,
                    state.max_attempts(),
                    failure.message,
                    failure.kind
                );
                return Err(failure);
            }

            let delay = self.policy.delay_for(attempt);
            let message = retry_message(attempt, state.max_attempts(), delay);
            state.record_status(message.clone());
            if cancel.is_cancelled() {
                return Err(FetchError::cancelled());
            }
            sink.emit(EngineEvent::AnalysisStatus {
                request_id,
                message,
            });

            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        // The final attempt always returns from inside the loop.
        Err(FetchError::new(FailureKind::Timeout, TIMEOUT_MESSAGE))
    }

    /// One request under a child token that also fires when the timeout elapses.
    /// `None` means the caller cancelled.
    async fn run_attempt(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Option<AttemptOutcome> {
        let attempt_token = cancel.child_token();
        let outcome = tokio::select! {
            biased;
            _ = attempt_token.cancelled() => None,
            _ = tokio::time::sleep(self.policy.request_timeout) => {
                attempt_token.cancel();
                Some(AttemptOutcome::Timeout)
            }
            reply = self.source.request(identifier, &attempt_token) => {
                Some(self.policy.classify(reply))
            }
        };
        if cancel.is_cancelled() {
            return None;
        }
        outcome
    }
}

fn retry_message(attempt: usize, max_attempts: usize, delay: Duration) -> String {
    format!(
        "Analysis is still being prepared (attempt {}/{}); retrying in {:.1}s...",
        attempt + 1,
        max_attempts,
        delay.as_secs_f64()
    )
}
