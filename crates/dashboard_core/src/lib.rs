//! Dashboard core: pure selection state machine, analysis data model and view-model helpers.
mod analysis;
mod analytics;
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use analysis::{AnalysisResult, AudioAnalysis, VisualAnalysis};
pub use analytics::{
    normalize_date_time, parse_piechart, plot_heading, AnalyticsFilters, MetricKind, PlotEntry,
    VisualizationSet,
};
pub use effect::Effect;
pub use msg::Msg;
pub use state::{AnalysisPhase, AppState, ItemId, RequestId};
pub use update::update;
pub use view_model::{format_decimal, format_with_commas, AppViewModel, MetricView, PanelView, PlotView};
