use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use dashboard_engine::{parse_range, video_path, ByteRange, MediaError, RangeError};
use dashboard_logging::{dashboard_debug, dashboard_warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::{text, AppContext};

const VIDEO_MIME: &str = "video/mp4";

/// Streams `{dataset_root}/{id}/{id}.mp4`, honouring a single `bytes=` range.
pub(super) async fn stream_video(
    State(ctx): State<AppContext>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    let path = match video_path(&ctx.dataset_root, &id) {
        Ok(path) => path,
        Err(err) => return text(StatusCode::BAD_REQUEST, err.to_string()),
    };
    let Some((file, size)) = open_video(&path).await else {
        return text(StatusCode::NOT_FOUND, MediaError::NotFound.to_string());
    };

    let Some(range_header) = headers.get(RANGE) else {
        return full_body(file, size);
    };
    let range = match range_header
        .to_str()
        .map_err(|_| RangeError::Malformed)
        .and_then(|raw| parse_range(raw, size))
    {
        Ok(range) => range,
        Err(err) => {
            dashboard_debug!("Rejecting range {:?} for {}: {}", range_header, id, err);
            return text(StatusCode::RANGE_NOT_SATISFIABLE, err.to_string());
        }
    };
    partial_body(file, size, range).await
}

async fn open_video(path: &Path) -> Option<(File, u64)> {
    let file = File::open(path).await.ok()?;
    let metadata = file.metadata().await.ok()?;
    metadata.is_file().then(|| (file, metadata.len()))
}

fn full_body(file: File, size: u64) -> Response {
    (
        StatusCode::OK,
        [
            (ACCEPT_RANGES, "bytes".to_string()),
            (CONTENT_LENGTH, size.to_string()),
            (CONTENT_TYPE, VIDEO_MIME.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

async fn partial_body(mut file: File, size: u64, range: ByteRange) -> Response {
    if let Err(err) = file.seek(SeekFrom::Start(range.start)).await {
        dashboard_warn!("Failed to seek video to {}: {}", range.start, err);
        return text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read video");
    }
    (
        StatusCode::PARTIAL_CONTENT,
        [
            (CONTENT_RANGE, range.content_range(size)),
            (ACCEPT_RANGES, "bytes".to_string()),
            (CONTENT_LENGTH, range.length().to_string()),
            (CONTENT_TYPE, VIDEO_MIME.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file.take(range.length()))),
    )
        .into_response()
}
