use serde::Serialize;

use crate::{AnalysisPhase, AnalysisResult, AudioAnalysis, ItemId, VisualAnalysis};

const VISUAL_LABEL: &str = "Visual analysis";
const AUDIO_LABEL: &str = "Audio analysis";
const BRIGHTNESS_PLOT_LABEL: &str = "Brightness plot";
const SPECTROGRAM_PLOT_LABEL: &str = "Spectrogram";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppViewModel {
    pub selection: Option<ItemId>,
    pub visual: PanelView,
    pub audio: PanelView,
}

/// What one analysis card shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelView {
    NoSelection { message: String },
    Loading { message: String },
    Error { message: String },
    Unavailable { message: String },
    Ready { metrics: Vec<MetricView>, plot: PlotView },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlotView {
    Fragment { html: String },
    Unavailable { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricView {
    pub label: String,
    pub value: String,
}

impl AppViewModel {
    pub(crate) fn from_phase(phase: &AnalysisPhase) -> Self {
        let visual = panel(phase, VISUAL_LABEL, |result| {
            result.visual.as_ref().map(visual_ready)
        });
        let audio = panel(phase, AUDIO_LABEL, |result| {
            result.audio.as_ref().map(audio_ready)
        });
        Self {
            selection: phase.identifier().cloned(),
            visual,
            audio,
        }
    }
}

impl PlotView {
    pub fn fragment(&self) -> Option<&str> {
        match self {
            PlotView::Fragment { html } => Some(html),
            PlotView::Unavailable { .. } => None,
        }
    }
}

impl PanelView {
    pub fn plot(&self) -> Option<&PlotView> {
        match self {
            PanelView::Ready { plot, .. } => Some(plot),
            _ => None,
        }
    }
}

fn panel(
    phase: &AnalysisPhase,
    label: &str,
    ready: impl Fn(&AnalysisResult) -> Option<PanelView>,
) -> PanelView {
    match phase {
        AnalysisPhase::Empty => PanelView::NoSelection {
            message: unavailable_message(label),
        },
        AnalysisPhase::Pending { status, .. } => PanelView::Loading {
            message: status
                .clone()
                .unwrap_or_else(|| format!("Loading {}...", label.to_lowercase())),
        },
        AnalysisPhase::Failed { message, .. } => PanelView::Error {
            message: message.clone(),
        },
        AnalysisPhase::Resolved { result, .. } => {
            ready(result).unwrap_or_else(|| PanelView::Unavailable {
                message: unavailable_message(label),
            })
        }
    }
}

fn visual_ready(visual: &VisualAnalysis) -> PanelView {
    PanelView::Ready {
        metrics: vec![
            metric("Average brightness", format_decimal(visual.average_brightness)),
            metric("Brightness std dev", format_decimal(visual.std_dev_brightness)),
            metric(
                "Scene cuts",
                format_with_commas(visual.scene_cut_count() as u64),
            ),
        ],
        plot: plot(visual.brightness_plot(), BRIGHTNESS_PLOT_LABEL),
    }
}

fn audio_ready(audio: &AudioAnalysis) -> PanelView {
    PanelView::Ready {
        metrics: vec![
            metric("Average pitch (Hz)", format_decimal(audio.average_pitch_hz)),
            metric("Pitch std dev (Hz)", format_decimal(audio.std_dev_pitch_hz)),
        ],
        plot: plot(audio.spectrogram_plot(), SPECTROGRAM_PLOT_LABEL),
    }
}

fn plot(fragment: Option<&str>, label: &str) -> PlotView {
    match fragment {
        Some(html) => PlotView::Fragment {
            html: html.to_string(),
        },
        None => PlotView::Unavailable {
            message: unavailable_message(label),
        },
    }
}

fn metric(label: &str, value: String) -> MetricView {
    MetricView {
        label: label.to_string(),
        value,
    }
}

fn unavailable_message(label: &str) -> String {
    format!("{label} is not available yet.")
}

/// Two fractional digits, or `-` when the value is missing or not a number.
pub fn format_decimal(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{v:.2}"),
        _ => "-".to_string(),
    }
}

pub fn format_with_commas(value: u64) -> String {
    let mut out = String::new();
    for (i, ch) in value.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
