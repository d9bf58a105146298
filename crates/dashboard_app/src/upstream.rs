use std::time::Duration;

use dashboard_engine::normalize_base_url;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use url::Url;

const UPLOAD_PATH: &str = "video-analysis/full";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Request(err) if err.is_timeout())
    }
}

/// Client for the remote analysis and analytics service.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    upload_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(base_url: &str, upload_timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(Some(base_url)),
            upload_timeout,
        })
    }

    fn url(&self, path: &str) -> Result<Url, UpstreamError> {
        Ok(Url::parse(&format!("{}/{}", self.base_url, path))?)
    }

    /// `GET {base}/analytics/{name}` with the non-empty `params` appended.
    pub async fn analytics(
        &self,
        name: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Response, UpstreamError> {
        let mut url = self.url(&format!("analytics/{name}"))?;
        // The filter iterator must not live across the await below.
        {
            let mut forwarded = params.iter().filter(|(_, value)| !value.is_empty()).peekable();
            if forwarded.peek().is_some() {
                let mut query = url.query_pairs_mut();
                for (key, value) in forwarded {
                    query.append_pair(key, value);
                }
            }
        }
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        Ok(response)
    }

    /// Posts the video as multipart field `file` to the full analysis endpoint.
    pub async fn upload_video(
        &self,
        id: &str,
        video: Vec<u8>,
    ) -> Result<reqwest::Response, UpstreamError> {
        let part = Part::bytes(video)
            .file_name(format!("{id}.mp4"))
            .mime_str("video/mp4")?;
        let form = Form::new().part("file", part);
        let response = self
            .client
            .post(self.url(UPLOAD_PATH)?)
            .header(ACCEPT, "application/json")
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await?;
        Ok(response)
    }
}
