//! Analytics sheet: pie chart and named visualizations for a set of filters.

use dashboard_core::{parse_piechart, plot_heading, AnalyticsFilters, MetricKind, VisualizationSet};
use serde::Serialize;

use crate::session::Session;

const PIECHART_CONTAINER: &str = "analytics-piechart";
const PLOT_CONTAINER_PREFIX: &str = "analytics-plot";
const UNREADABLE_MESSAGE: &str = "Analytics response could not be read.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub container: String,
    pub heading: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChartsView {
    Ready { charts: Vec<ChartView> },
    Empty { message: String },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSheetView {
    pub metric: &'static str,
    pub piechart: ChartsView,
    pub visualizations: ChartsView,
}

/// Raw outcome of one analytics request: a JSON body or a display message.
pub type UpstreamBody = Result<Vec<u8>, String>;

/// Message for a failed analytics request: the body text unless it is blank or HTML.
pub fn failure_message(what: &str, status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('<') {
        return trimmed.to_string();
    }
    format!("Failed to load {what} ({status})")
}

pub fn render_sheet(
    session: &Session,
    filters: &AnalyticsFilters,
    piechart: UpstreamBody,
    visualizations: UpstreamBody,
) -> AnalyticsSheetView {
    AnalyticsSheetView {
        metric: MetricKind::parse(filters.metric.as_deref()).as_str(),
        piechart: render_piechart(session, piechart),
        visualizations: render_visualizations(session, visualizations),
    }
}

fn render_piechart(session: &Session, body: UpstreamBody) -> ChartsView {
    let parsed = match body {
        Ok(bytes) => parse_piechart(&bytes),
        Err(message) => {
            session.render_fragment(PIECHART_CONTAINER, None);
            return ChartsView::Error { message };
        }
    };
    match parsed {
        Ok((heading, Some(html))) => ChartsView::Ready {
            charts: vec![ChartView {
                container: PIECHART_CONTAINER.to_string(),
                heading,
                html: session.render_fragment(PIECHART_CONTAINER, Some(&html)),
            }],
        },
        Ok((_, None)) => {
            session.render_fragment(PIECHART_CONTAINER, None);
            ChartsView::Empty {
                message: "No pie chart data for the selected filters.".to_string(),
            }
        }
        Err(_) => ChartsView::Error {
            message: UNREADABLE_MESSAGE.to_string(),
        },
    }
}

fn render_visualizations(session: &Session, body: UpstreamBody) -> ChartsView {
    let set = match body.map(|bytes| VisualizationSet::from_json(&bytes)) {
        Ok(Ok(set)) => set,
        Ok(Err(_)) => {
            return ChartsView::Error {
                message: UNREADABLE_MESSAGE.to_string(),
            }
        }
        Err(message) => return ChartsView::Error { message },
    };
    if set.plots.is_empty() {
        session.render_fragments(PLOT_CONTAINER_PREFIX, &[]);
        return ChartsView::Empty {
            message: "No visualizations for the selected filters.".to_string(),
        };
    }

    let fragments: Vec<Option<&str>> = set
        .plots
        .iter()
        .map(|(_, entry)| entry.html.as_deref())
        .collect();
    let rendered = session.render_fragments(PLOT_CONTAINER_PREFIX, &fragments);
    let charts = set
        .plots
        .iter()
        .zip(rendered)
        .map(|((key, entry), (container, html))| ChartView {
            container,
            heading: plot_heading(key, entry.title.as_deref()),
            html,
        })
        .collect();
    ChartsView::Ready { charts }
}
