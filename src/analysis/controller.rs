//! Analysis workflow state machine.
//!
//! ```text
//!            select_file
//!   Idle ───────────────▶ Validating ──reject──▶ Failed
//!                              │
//!                            accept
//!                              ▼
//!                          Submitting ──error───▶ Failed
//!                              │
//!                              ok
//!                              ▼
//!                          Succeeded
//! ```
//!
//! A new selection from any state starts a new attempt at `Validating`.
//! The attempt counter and the state live in one watched value, so checking
//! whether an attempt is still current and writing its result is a single
//! atomic update. A superseded attempt's late response changes nothing.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::FailureReason;
use crate::gateway::{endpoints, ApiRequest, FilePart, RequestGateway, Transport};

use super::result::AnalysisResult;
use super::validator::{UploadCandidate, UploadValidator};

/// Multipart field the API expects the image under.
pub const FILE_FIELD: &str = "file";

/// Identity of one run of the workflow.
pub type AttemptId = u64;

/// State of the current attempt.
#[derive(Debug, Clone, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded(AnalysisResult),
    Failed(FailureReason),
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded(_) | WorkflowState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Validating => "validating",
            WorkflowState::Submitting => "submitting",
            WorkflowState::Succeeded(_) => "succeeded",
            WorkflowState::Failed(_) => "failed",
        }
    }
}

/// Observable value: which attempt the state belongs to.
#[derive(Debug, Clone, Default)]
pub struct AttemptSnapshot {
    pub attempt: AttemptId,
    pub state: WorkflowState,
}

/// What a call to [`AnalysisController::select_file`] ended with.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// The attempt reached a terminal state
    Completed(WorkflowState),
    /// A newer selection (or a reset) took over before this attempt finished
    Superseded,
}

/// Drives one analysis attempt at a time through the [`RequestGateway`].
pub struct AnalysisController<T: Transport> {
    gateway: Arc<RequestGateway<T>>,
    validator: UploadValidator,
    current: watch::Sender<AttemptSnapshot>,
}

impl<T: Transport> AnalysisController<T> {
    pub fn new(gateway: Arc<RequestGateway<T>>) -> Self {
        let (current, _) = watch::channel(AttemptSnapshot::default());
        Self {
            gateway,
            validator: UploadValidator::default(),
            current,
        }
    }

    /// Current attempt and state.
    pub fn snapshot(&self) -> AttemptSnapshot {
        self.current.borrow().clone()
    }

    pub fn state(&self) -> WorkflowState {
        self.current.borrow().state.clone()
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<AttemptSnapshot> {
        self.current.subscribe()
    }

    /// Abandon the current attempt and return to `Idle`.
    pub fn reset(&self) {
        let attempt = self.begin(WorkflowState::Idle);
        debug!(attempt, "Workflow reset");
    }

    /// Run a new attempt for `candidate`, discarding any previous one.
    ///
    /// Validation always completes before submission. There is no retry:
    /// a failure stays until the next selection.
    pub async fn select_file(&self, candidate: UploadCandidate) -> AttemptOutcome {
        let attempt = self.begin(WorkflowState::Validating);
        debug!(
            attempt,
            file = %candidate.file_name,
            mime = %candidate.declared_mime,
            size = candidate.size_bytes,
            "File selected"
        );

        if let Err(e) = self.validator.validate(&candidate) {
            debug!(attempt, "Upload rejected: {}", e);
            return self.finish(attempt, WorkflowState::Failed(e.into()));
        }

        if !self.advance(attempt, WorkflowState::Submitting) {
            return AttemptOutcome::Superseded;
        }

        let contents = match candidate.contents(self.validator.max_bytes()).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(attempt, "Upload rejected on read: {}", e);
                return self.finish(attempt, WorkflowState::Failed(e.into()));
            }
        };

        let request = ApiRequest::post_multipart(
            endpoints::ANALYZE,
            FilePart {
                field: FILE_FIELD.to_string(),
                file_name: candidate.file_name,
                mime_type: candidate.declared_mime,
                contents,
            },
        );

        let terminal = match self.gateway.send_json::<AnalysisResult>(request).await {
            Ok(result) => {
                info!(
                    attempt,
                    prediction = %result.prediction_label,
                    confidence = result.confidence,
                    "Analysis succeeded"
                );
                WorkflowState::Succeeded(result)
            }
            Err(e) => {
                warn!(attempt, "Analysis failed: {}", e);
                WorkflowState::Failed(e.into())
            }
        };

        self.finish(attempt, terminal)
    }

    /// Start a new attempt with `state`, returning its id.
    fn begin(&self, state: WorkflowState) -> AttemptId {
        let mut attempt = 0;
        self.current.send_modify(|current| {
            current.attempt += 1;
            current.state = state;
            attempt = current.attempt;
        });
        attempt
    }

    /// Move `attempt` to `state` if it is still current.
    fn advance(&self, attempt: AttemptId, state: WorkflowState) -> bool {
        self.current.send_if_modified(|current| {
            if current.attempt != attempt {
                return false;
            }
            current.state = state;
            true
        })
    }

    fn finish(&self, attempt: AttemptId, state: WorkflowState) -> AttemptOutcome {
        let outcome = state.clone();
        if self.advance(attempt, state) {
            AttemptOutcome::Completed(outcome)
        } else {
            debug!(
                attempt,
                state = outcome.name(),
                "Discarding result of superseded attempt"
            );
            AttemptOutcome::Superseded
        }
    }
}
