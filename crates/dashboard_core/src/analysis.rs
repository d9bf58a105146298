use serde::de::{DeserializeOwned, Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Full analysis record returned by the analysis backend for one content item.
///
/// Every field is optional. A field carrying the wrong JSON type is treated as
/// absent instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_record", skip_serializing_if = "Option::is_none")]
    pub visual: Option<VisualAnalysis>,
    #[serde(default, deserialize_with = "lenient_record", skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioAnalysis>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub stats_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualAnalysis {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub average_brightness: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub std_dev_brightness: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub scene_cut_timestamps: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub brightness_plot_html: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub stats_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioAnalysis {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub average_pitch_hz: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub std_dev_pitch_hz: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub spectrogram_plot_html: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub stats_path: Option<String>,
}

impl AnalysisResult {
    /// Parse a backend payload. A JSON `null` body yields an empty result;
    /// anything other than an object or `null` is rejected.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Null => Ok(Self::default()),
            value @ Value::Object(_) => serde_json::from_value(value),
            other => Err(serde_json::Error::invalid_type(
                unexpected(&other),
                &"an analysis object",
            )),
        }
    }
}

impl VisualAnalysis {
    pub fn brightness_plot(&self) -> Option<&str> {
        non_blank(self.brightness_plot_html.as_deref())
    }

    pub fn scene_cut_count(&self) -> usize {
        self.scene_cut_timestamps.as_ref().map_or(0, Vec::len)
    }
}

impl AudioAnalysis {
    pub fn spectrogram_plot(&self) -> Option<&str> {
        non_blank(self.spectrogram_plot_html.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Like [`lenient`], but only a JSON object can become a record. serde would
/// otherwise map an array onto the fields by position.
fn lenient_record<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(Value::is_object)
        .and_then(|v| serde_json::from_value(v).ok()))
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}
