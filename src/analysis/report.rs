//! Presentation model of an analysis result.

use super::result::AnalysisResult;
use super::validator::ConfidenceBand;

const ABNORMAL_SUMMARY: &str = "The analysis indicates the presence of abnormalities that may \
    suggest a pathological condition. Please consult a healthcare professional for proper diagnosis.";

const NORMAL_SUMMARY: &str =
    "The analysis suggests no significant abnormalities. Regular check-ups are still recommended.";

/// Contents of one image panel of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    /// Image available at this reference
    Available(String),
    /// Expected but not produced by the server
    Unavailable,
    /// Segmentation is only generated for abnormal findings
    NotGeneratedForNormal,
}

impl Panel {
    pub fn uri(&self) -> Option<&str> {
        match self {
            Panel::Available(uri) => Some(uri),
            _ => None,
        }
    }

    /// Text shown in place of the image when there is none.
    pub fn placeholder(&self, what: &str) -> Option<String> {
        match self {
            Panel::Available(_) => None,
            Panel::Unavailable => Some(format!("{} not available for this image.", what)),
            Panel::NotGeneratedForNormal => Some(format!(
                "{} is not generated for normal results; it is only produced when abnormalities are detected.",
                what
            )),
        }
    }
}

/// Everything a renderer needs to show one result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultReport {
    pub label: String,
    pub abnormal: bool,
    pub confidence: f64,
    pub band: ConfidenceBand,
    /// Confidence as a rounded percentage
    pub percent: u8,
    pub heatmap: Panel,
    pub segmentation: Panel,
    pub summary: &'static str,
}

impl ResultReport {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let abnormal = result.is_abnormal();

        let heatmap = match &result.heatmap_ref {
            Some(uri) => Panel::Available(uri.clone()),
            None => Panel::Unavailable,
        };

        let segmentation = match (&result.segmentation_ref, abnormal) {
            (_, false) => Panel::NotGeneratedForNormal,
            (Some(uri), true) => Panel::Available(uri.clone()),
            (None, true) => Panel::Unavailable,
        };

        Self {
            label: result.prediction_label.clone(),
            abnormal,
            confidence: result.confidence,
            band: ConfidenceBand::from_confidence(result.confidence),
            percent: confidence_percent(result.confidence),
            heatmap,
            segmentation,
            summary: if abnormal {
                ABNORMAL_SUMMARY
            } else {
                NORMAL_SUMMARY
            },
        }
    }

    /// Chip text, e.g. `High (82%)`.
    pub fn confidence_label(&self) -> String {
        format!("{} ({}%)", self.band, self.percent)
    }
}

/// Round a `[0, 1]` confidence to a whole percentage.
pub fn confidence_percent(confidence: f64) -> u8 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}
