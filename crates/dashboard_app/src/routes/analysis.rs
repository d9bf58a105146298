use std::path::Path;

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashboard_engine::{video_path, MediaError};
use dashboard_logging::{dashboard_info, dashboard_warn};

use super::{text, AppContext};
use crate::upstream::UpstreamError;

/// Uploads the item's video to the analysis service and relays its JSON result.
pub(super) async fn analyze_video(
    State(ctx): State<AppContext>,
    UrlPath(id): UrlPath<String>,
) -> Response {
    let path = match video_path(&ctx.dataset_root, &id) {
        Ok(path) => path,
        Err(err) => return text(StatusCode::BAD_REQUEST, err.to_string()),
    };
    let Some(video) = read_video(&path).await else {
        return text(StatusCode::NOT_FOUND, MediaError::NotFound.to_string());
    };

    dashboard_info!("Uploading {} ({} bytes) for analysis", id, video.len());
    let response = match ctx.upstream.upload_video(&id, video).await {
        Ok(response) => response,
        Err(err) => return unreachable_service(&err),
    };

    if !response.status().is_success() {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        dashboard_warn!("Analysis service answered {} for {}", status, id);
        let message = if message.trim().is_empty() {
            "Analysis failed".to_string()
        } else {
            message
        };
        return text(StatusCode::BAD_GATEWAY, message);
    }

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => return unreachable_service(&UpstreamError::from(err)),
    };
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(analysis) => Json(analysis).into_response(),
        Err(err) => {
            dashboard_warn!("Analysis result for {} is not JSON: {}", id, err);
            text(StatusCode::BAD_GATEWAY, "Analysis failed")
        }
    }
}

async fn read_video(path: &Path) -> Option<Vec<u8>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    tokio::fs::read(path).await.ok()
}

fn unreachable_service(err: &UpstreamError) -> Response {
    if err.is_timeout() {
        dashboard_warn!("Analysis upload timed out: {}", err);
        return text(StatusCode::GATEWAY_TIMEOUT, "Analysis service timed out");
    }
    dashboard_warn!("Failed to reach analysis service: {}", err);
    text(StatusCode::BAD_GATEWAY, "Analysis service unavailable")
}
