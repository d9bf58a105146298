//! HTTP surface of the dashboard.

mod analysis;
mod analytics;
mod session;
mod videos;

use std::path::PathBuf;

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;

use crate::session::Session;
use crate::upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppContext {
    pub dataset_root: PathBuf,
    pub upstream: UpstreamClient,
    pub session: Session,
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/videos/{id}", get(videos::stream_video))
        .route("/api/analysis/{id}", get(analysis::analyze_video))
        .route("/api/analytics/piechart", get(analytics::piechart))
        .route("/api/analytics/visualizations", get(analytics::visualizations))
        .route("/api/analytics/table", get(analytics::table))
        .route("/api/session", get(session::current))
        .route("/api/session/selection/{id}", post(session::select))
        .route("/api/session/selection", delete(session::clear))
        .route("/api/session/analytics", get(session::analytics_sheet))
        .with_state(ctx)
}

fn text(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.into(),
    )
        .into_response()
}
