use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use dashboard_logging::dashboard_warn;

use super::{text, AppContext};

type QueryPairs = Query<Vec<(String, String)>>;

pub(super) async fn piechart(State(ctx): State<AppContext>, Query(params): QueryPairs) -> Response {
    forward(&ctx, "piechart", &params).await
}

pub(super) async fn visualizations(
    State(ctx): State<AppContext>,
    Query(params): QueryPairs,
) -> Response {
    forward(&ctx, "visualizations", &params).await
}

pub(super) async fn table(State(ctx): State<AppContext>, Query(params): QueryPairs) -> Response {
    forward(&ctx, "table", &params).await
}

/// Pass-through to `{service}/analytics/{name}`; the body is streamed, never parsed.
async fn forward(ctx: &AppContext, name: &str, params: &[(String, String)]) -> Response {
    let response = match ctx.upstream.analytics(name, params).await {
        Ok(response) => response,
        Err(err) => {
            dashboard_warn!("Failed to reach analytics {} service: {}", name, err);
            return text(
                axum::http::StatusCode::BAD_GATEWAY,
                format!("Analytics {name} service unavailable"),
            );
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Failed to load {name}"))
        } else {
            body
        };
        return text(status, message);
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    (
        status,
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        Body::from_stream(response.bytes_stream()),
    )
        .into_response()
}
