use serde::Deserialize;

const DEFAULT_PIE_TITLE: &str = "Content distribution by topic";

/// Engagement metric used by the aggregate visualizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricKind {
    #[default]
    View,
    Like,
    Pc,
}

impl MetricKind {
    /// Unknown or missing values fall back to views.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("like") => MetricKind::Like,
            Some("pc") => MetricKind::Pc,
            _ => MetricKind::View,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::View => "view",
            MetricKind::Like => "like",
            MetricKind::Pc => "pc",
        }
    }
}

/// Filters of the analytics sheet, as received from a query string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AnalyticsFilters {
    #[serde(default)]
    pub post_created_from: Option<String>,
    #[serde(default)]
    pub post_created_to: Option<String>,
    #[serde(default)]
    pub metric: Option<String>,
}

impl AnalyticsFilters {
    pub fn piechart_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        self.push_date_range(&mut pairs);
        pairs
    }

    pub fn visualization_query(&self) -> Vec<(String, String)> {
        let metric = MetricKind::parse(self.metric.as_deref());
        let mut pairs = vec![("type".to_string(), metric.as_str().to_string())];
        self.push_date_range(&mut pairs);
        pairs
    }

    fn push_date_range(&self, pairs: &mut Vec<(String, String)>) {
        let bounds = [
            ("post_created_from", self.post_created_from.as_deref()),
            ("post_created_to", self.post_created_to.as_deref()),
        ];
        for (key, value) in bounds {
            let normalized = value.map(normalize_date_time).unwrap_or_default();
            if !normalized.is_empty() {
                pairs.push((key.to_string(), normalized));
            }
        }
    }
}

/// `datetime-local` inputs omit seconds (`YYYY-MM-DDTHH:MM`); the backend wants them.
pub fn normalize_date_time(value: &str) -> String {
    let value = value.trim();
    if value.len() == 16 {
        format!("{value}:00")
    } else {
        value.to_string()
    }
}

/// Heading for a plot card: the explicit title, else the key with underscores spaced out.
pub fn plot_heading(key: &str, title: Option<&str>) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => title.to_string(),
        None => key.replace('_', " "),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PlotEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

/// Named plots returned by the visualizations endpoint.
///
/// Entries without a key or without markup are dropped. Plots are ordered by key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisualizationSet {
    pub plots: Vec<(String, PlotEntry)>,
}

#[derive(Deserialize)]
struct VisualizationsPayload {
    #[serde(default)]
    plots: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct PieChartPayload {
    #[serde(default)]
    plot: Option<PlotEntry>,
}

impl VisualizationSet {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let payload: Option<VisualizationsPayload> = serde_json::from_slice(bytes)?;
        let plots = payload
            .and_then(|p| p.plots)
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, _)| !key.is_empty())
            .filter_map(|(key, value)| {
                let entry: PlotEntry = serde_json::from_value(value).ok()?;
                entry
                    .html
                    .as_deref()
                    .is_some_and(|html| !html.is_empty())
                    .then_some((key, entry))
            })
            .collect();
        Ok(Self { plots })
    }
}

/// Parse the piechart payload into `(title, html)`; `html` is `None` when no plot exists.
pub fn parse_piechart(bytes: &[u8]) -> Result<(String, Option<String>), serde_json::Error> {
    let payload: Option<PieChartPayload> = serde_json::from_slice(bytes)?;
    let plot = payload.and_then(|p| p.plot).unwrap_or_default();
    let title = plot
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_PIE_TITLE)
        .to_string();
    Ok((title, plot.html.filter(|html| !html.is_empty())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minute_precision_gets_seconds() {
        assert_eq!(normalize_date_time("2024-05-01T10:30"), "2024-05-01T10:30:00");
        assert_eq!(normalize_date_time("2024-05-01T10:30:15"), "2024-05-01T10:30:15");
        assert_eq!(normalize_date_time(""), "");
    }

    #[test]
    fn visualization_query_defaults_metric_and_skips_empty_bounds() {
        let filters = AnalyticsFilters {
            post_created_from: Some("2024-05-01T10:30".into()),
            post_created_to: Some("".into()),
            metric: Some("bogus".into()),
        };
        assert_eq!(
            filters.visualization_query(),
            vec![
                ("type".to_string(), "view".to_string()),
                ("post_created_from".to_string(), "2024-05-01T10:30:00".to_string()),
            ]
        );
        assert_eq!(filters.piechart_query().len(), 1);
    }

    #[test]
    fn headings_fall_back_to_key() {
        assert_eq!(plot_heading("views_by_topic", None), "views by topic");
        assert_eq!(plot_heading("views_by_topic", Some("  ")), "views by topic");
        assert_eq!(plot_heading("x", Some("Views")), "Views");
    }

    #[test]
    fn visualization_set_drops_entries_without_markup() {
        let body = br#"{"plots": {
            "b_plot": {"title": "B", "html": "<div>b</div>"},
            "a_plot": {"html": "<div>a</div>"},
            "empty": {"title": "E", "html": ""},
            "missing": null
        }}"#;
        let set = VisualizationSet::from_json(body).unwrap();
        let keys: Vec<_> = set.plots.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a_plot", "b_plot"]);
    }

    #[test]
    fn piechart_title_defaults() {
        let (title, html) = parse_piechart(br#"{"plot": {"html": "<div></div>"}}"#).unwrap();
        assert_eq!(title, DEFAULT_PIE_TITLE);
        assert_eq!(html.as_deref(), Some("<div></div>"));

        let (_, html) = parse_piechart(br#"{"plot": null}"#).unwrap();
        assert_eq!(html, None);
    }
}
