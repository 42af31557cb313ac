//! Typed analysis payloads.
//!
//! Both types are validated while deserializing: a payload that decodes is
//! usable, anything else is rejected at the gateway boundary.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

/// Label the model reports for a finding without abnormality.
pub const NORMAL_LABEL: &str = "Normal";

/// URL prefix under which the API serves heatmap images.
pub const HEATMAP_URL_PREFIX: &str = "/static/images/heatmaps/";

/// URL prefix under which the API serves segmentation masks.
pub const SEGMENTATION_URL_PREFIX: &str = "/static/images/segmentations/";

// =============================================================================
// Analysis Result
// =============================================================================

/// Outcome of one successful analysis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "AnalysisPayload")]
pub struct AnalysisResult {
    pub prediction_label: String,

    /// Model confidence in `[0, 1]`
    pub confidence: f64,

    pub heatmap_ref: Option<String>,

    /// Only meaningful when the label denotes an abnormal finding
    pub segmentation_ref: Option<String>,
}

impl AnalysisResult {
    /// True for any label other than [`NORMAL_LABEL`].
    pub fn is_abnormal(&self) -> bool {
        self.prediction_label != NORMAL_LABEL
    }
}

/// Wire shape of `POST /api/predictions/analyze`.
#[derive(Deserialize)]
struct AnalysisPayload {
    prediction: String,
    confidence: f64,
    #[serde(default)]
    heatmap_url: Option<String>,
    #[serde(default)]
    segmentation_url: Option<String>,
}

impl TryFrom<AnalysisPayload> for AnalysisResult {
    type Error = String;

    fn try_from(payload: AnalysisPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            prediction_label: check_label(payload.prediction)?,
            confidence: check_confidence(payload.confidence)?,
            heatmap_ref: non_empty(payload.heatmap_url),
            segmentation_ref: non_empty(payload.segmentation_url),
        })
    }
}

// =============================================================================
// Prediction Record
// =============================================================================

/// A historical prediction, as supplied by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RecordPayload")]
pub struct PredictionRecord {
    pub id: i64,
    pub prediction_label: String,
    pub confidence: f64,
    /// Creation time, UTC
    pub created_at: NaiveDateTime,
    pub heatmap_ref: Option<String>,
    pub segmentation_ref: Option<String>,
}

impl PredictionRecord {
    pub fn is_abnormal(&self) -> bool {
        self.prediction_label != NORMAL_LABEL
    }
}

/// Wire shape of a history entry. Server-side file paths are mapped onto
/// the URLs the API serves them under.
#[derive(Deserialize)]
struct RecordPayload {
    id: i64,
    prediction_result: String,
    confidence_score: f64,
    created_at: String,
    #[serde(default)]
    heatmap_path: Option<String>,
    #[serde(default)]
    segmentation_path: Option<String>,
}

impl TryFrom<RecordPayload> for PredictionRecord {
    type Error = String;

    fn try_from(payload: RecordPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            id: payload.id,
            prediction_label: check_label(payload.prediction_result)?,
            confidence: check_confidence(payload.confidence_score)?,
            created_at: parse_timestamp(&payload.created_at)?,
            heatmap_ref: non_empty(payload.heatmap_path)
                .map(|p| served_url(HEATMAP_URL_PREFIX, &p)),
            segmentation_ref: non_empty(payload.segmentation_path)
                .map(|p| served_url(SEGMENTATION_URL_PREFIX, &p)),
        })
    }
}

// =============================================================================
// Field checks
// =============================================================================

fn check_label(label: String) -> Result<String, String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err("prediction label is empty".to_string());
    }
    Ok(trimmed.to_string())
}

fn check_confidence(confidence: f64) -> Result<f64, String> {
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence {} outside [0, 1]", confidence));
    }
    Ok(confidence)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn served_url(prefix: &str, path: &str) -> String {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    format!("{}{}", prefix, name)
}

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one taken as UTC.
fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| format!("invalid timestamp '{}'", value))
}
