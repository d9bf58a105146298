use std::sync::Arc;

use dashboard_core::{
    update, AnalysisResult, AppState, AudioAnalysis, Effect, ItemId, MetricView, Msg, PanelView,
    PlotView, VisualAnalysis,
};
use pretty_assertions::assert_eq;

fn resolved(result: AnalysisResult) -> AppState {
    let (state, effects) = update(AppState::new(), Msg::SelectionChanged(Some(ItemId::new("7"))));
    let request_id = match &effects[0] {
        Effect::FetchAnalysis { request_id, .. } => *request_id,
        other => panic!("unexpected effect {other:?}"),
    };
    let (state, _) = update(
        state,
        Msg::AnalysisResolved {
            request_id,
            result: Arc::new(result),
        },
    );
    state
}

#[test]
fn empty_selection_shows_placeholders() {
    let view = AppState::new().view();
    assert_eq!(view.selection, None);
    assert_eq!(
        view.visual,
        PanelView::NoSelection {
            message: "Visual analysis is not available yet.".into()
        }
    );
}

#[test]
fn pending_panels_show_latest_status() {
    let (state, _) = update(AppState::new(), Msg::SelectionChanged(Some(ItemId::new("7"))));
    assert_eq!(
        state.view().audio,
        PanelView::Loading {
            message: "Loading audio analysis...".into()
        }
    );

    let (state, _) = update(
        state,
        Msg::AnalysisStatus {
            request_id: 1,
            message: "still working".into(),
        },
    );
    assert_eq!(
        state.view().visual,
        PanelView::Loading {
            message: "still working".into()
        }
    );
}

#[test]
fn resolved_visual_panel_formats_metrics_and_keeps_fragment() {
    let state = resolved(AnalysisResult {
        visual: Some(VisualAnalysis {
            average_brightness: Some(120.456),
            std_dev_brightness: None,
            scene_cut_timestamps: Some(vec![0.5; 1200]),
            brightness_plot_html: Some("<div>plot</div>".into()),
            ..VisualAnalysis::default()
        }),
        ..AnalysisResult::default()
    });

    let view = state.view();
    assert_eq!(
        view.visual,
        PanelView::Ready {
            metrics: vec![
                MetricView {
                    label: "Average brightness".into(),
                    value: "120.46".into()
                },
                MetricView {
                    label: "Brightness std dev".into(),
                    value: "-".into()
                },
                MetricView {
                    label: "Scene cuts".into(),
                    value: "1,200".into()
                },
            ],
            plot: PlotView::Fragment {
                html: "<div>plot</div>".into()
            },
        }
    );
    assert_eq!(
        view.audio,
        PanelView::Unavailable {
            message: "Audio analysis is not available yet.".into()
        }
    );
}

#[test]
fn missing_fragment_degrades_to_placeholder() {
    let state = resolved(AnalysisResult {
        audio: Some(AudioAnalysis {
            average_pitch_hz: Some(200.0),
            ..AudioAnalysis::default()
        }),
        ..AnalysisResult::default()
    });

    let plot = state.view().audio.plot().cloned();
    assert_eq!(
        plot,
        Some(PlotView::Unavailable {
            message: "Spectrogram is not available yet.".into()
        })
    );
}

#[test]
fn view_model_serializes_with_state_tags() {
    let view = AppState::new().view();
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["visual"]["state"], "no_selection");
    assert_eq!(json["selection"], serde_json::Value::Null);
}
