//! Single-image analysis workflow.
//!
//! # Components
//!
//! - [`UploadValidator`]: accept/reject policy for a selected file
//! - [`AnalysisController`]: attempt state machine with a stale-response guard
//! - [`AnalysisResult`] / [`PredictionRecord`]: payloads validated on decode
//! - [`ResultReport`]: what a renderer shows for a result
//! - [`preview`]: header-only format and size of a selected image

mod controller;
mod preview;
mod report;
mod result;
mod validator;

pub use controller::{
    AnalysisController, AttemptId, AttemptOutcome, AttemptSnapshot, WorkflowState, FILE_FIELD,
};
pub use preview::{preview, Preview};
pub use report::{confidence_percent, Panel, ResultReport};
pub use result::{
    AnalysisResult, PredictionRecord, HEATMAP_URL_PREFIX, NORMAL_LABEL, SEGMENTATION_URL_PREFIX,
};
pub use validator::{
    is_image_mime, mime_from_extension, read_capped, ConfidenceBand, FileSource,
    UploadCandidate, UploadValidator, HIGH_CONFIDENCE, MAX_UPLOAD_BYTES, MEDIUM_CONFIDENCE,
};
