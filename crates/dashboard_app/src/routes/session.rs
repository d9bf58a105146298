use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashboard_core::{AnalyticsFilters, AppViewModel, ItemId};
use dashboard_engine::validate_item_id;
use dashboard_logging::dashboard_warn;

use super::{text, AppContext};
use crate::sheet::{failure_message, render_sheet, AnalyticsSheetView, UpstreamBody};

pub(super) async fn current(State(ctx): State<AppContext>) -> Json<AppViewModel> {
    Json(ctx.session.view())
}

pub(super) async fn select(
    State(ctx): State<AppContext>,
    UrlPath(id): UrlPath<String>,
) -> Response {
    if let Err(err) = validate_item_id(&id) {
        return text(StatusCode::BAD_REQUEST, err.to_string());
    }
    ctx.session.select(Some(ItemId::new(id)));
    Json(ctx.session.view()).into_response()
}

pub(super) async fn clear(State(ctx): State<AppContext>) -> Json<AppViewModel> {
    ctx.session.select(None);
    Json(ctx.session.view())
}

pub(super) async fn analytics_sheet(
    State(ctx): State<AppContext>,
    Query(filters): Query<AnalyticsFilters>,
) -> Json<AnalyticsSheetView> {
    let (piechart, visualizations) = tokio::join!(
        fetch_body(&ctx, "piechart", "pie chart", filters.piechart_query()),
        fetch_body(
            &ctx,
            "visualizations",
            "visualizations",
            filters.visualization_query()
        ),
    );
    Json(render_sheet(&ctx.session, &filters, piechart, visualizations))
}

async fn fetch_body(
    ctx: &AppContext,
    name: &str,
    what: &str,
    params: Vec<(String, String)>,
) -> UpstreamBody {
    let response = ctx.upstream.analytics(name, &params).await.map_err(|err| {
        dashboard_warn!("Failed to reach analytics {} service: {}", name, err);
        format!("Analytics {what} service unavailable")
    })?;
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|_| format!("Failed to load {what} ({status})"))?;
    if !(200..300).contains(&status) {
        return Err(failure_message(what, status, &String::from_utf8_lossy(&body)));
    }
    Ok(body.to_vec())
}
