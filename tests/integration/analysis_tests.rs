//! Analysis workflow integration tests.
//!
//! Tests verify:
//! - Client-side validation never reaches the network
//! - Successful submissions for abnormal and normal findings
//! - Each failure kind ends the attempt with its own message
//! - A newer selection supersedes a pending one

use std::sync::Arc;

use image::ImageFormat;

use medscan_client::error::{FailureReason, TransportError, ValidationError};
use medscan_client::gateway::RequestBody;
use medscan_client::{
    AttemptOutcome, ConfidenceBand, Panel, ResultReport, UploadCandidate, WorkflowState,
    MAX_UPLOAD_BYTES,
};

use super::test_utils::{
    analysis_json, detail_json, encode_image, jpeg_candidate, json_response, Harness,
};

const TWO_MB: usize = 2 * 1024 * 1024;

fn completed(outcome: AttemptOutcome) -> WorkflowState {
    match outcome {
        AttemptOutcome::Completed(state) => state,
        AttemptOutcome::Superseded => panic!("attempt was superseded"),
    }
}

fn failure(state: WorkflowState) -> FailureReason {
    match state {
        WorkflowState::Failed(reason) => reason,
        other => panic!("expected failure, got {:?}", other),
    }
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_non_image_rejected_before_submission() {
    let harness = Harness::logged_in("tok").await;
    let controller = harness.analysis();
    let mut states = controller.subscribe();

    let candidate = UploadCandidate::from_bytes("report.pdf", "application/pdf", vec![0u8; 1024]);
    let state = completed(controller.select_file(candidate).await);

    match failure(state) {
        FailureReason::Validation(ValidationError::UnsupportedType { mime }) => {
            assert_eq!(mime, "application/pdf")
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(states.has_changed().unwrap());
    assert_eq!(states.borrow_and_update().attempt, 1);
    assert_eq!(harness.transport.request_count().await, 0);
}

#[tokio::test]
async fn test_oversized_image_rejected() {
    let harness = Harness::logged_in("tok").await;
    let controller = harness.analysis();

    let candidate = jpeg_candidate("big.jpg", MAX_UPLOAD_BYTES as usize + 1);
    let reason = failure(completed(controller.select_file(candidate).await));

    assert!(matches!(
        reason,
        FailureReason::Validation(ValidationError::TooLarge { .. })
    ));
    assert!(reason.user_message().contains("Select a different file"));
    assert_eq!(harness.transport.request_count().await, 0);
}

#[tokio::test]
async fn test_oversized_non_image_is_unsupported_type() {
    let harness = Harness::logged_in("tok").await;
    let controller = harness.analysis();

    let candidate = UploadCandidate::from_bytes(
        "archive.zip",
        "application/zip",
        vec![0u8; MAX_UPLOAD_BYTES as usize + 1],
    );
    let reason = failure(completed(controller.select_file(candidate).await));

    assert!(matches!(
        reason,
        FailureReason::Validation(ValidationError::UnsupportedType { .. })
    ));
}

#[tokio::test]
async fn test_exactly_limit_is_submitted() {
    let harness = Harness::logged_in("tok").await;
    harness
        .transport
        .respond(200, analysis_json("Normal", 0.91, None))
        .await;
    let controller = harness.analysis();

    let candidate = jpeg_candidate("edge.jpg", MAX_UPLOAD_BYTES as usize);
    let state = completed(controller.select_file(candidate).await);

    assert!(matches!(state, WorkflowState::Succeeded(_)));
    assert_eq!(harness.transport.request_count().await, 1);
}

#[tokio::test]
async fn test_file_grown_after_selection_is_not_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chest.jpg");
    std::fs::write(&path, vec![0u8; 1024]).unwrap();

    let harness = Harness::logged_in("tok").await;
    let controller = harness.analysis();

    let candidate = UploadCandidate::from_path(&path, None).await.unwrap();
    assert_eq!(candidate.size_bytes, 1024);

    std::fs::write(&path, vec![0u8; MAX_UPLOAD_BYTES as usize + 1024]).unwrap();

    let reason = failure(completed(controller.select_file(candidate).await));
    match reason {
        FailureReason::Validation(ValidationError::TooLarge { size, limit }) => {
            assert_eq!(limit, MAX_UPLOAD_BYTES);
            assert!(size > MAX_UPLOAD_BYTES);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(harness.transport.request_count().await, 0);
}

// =============================================================================
// Successful Analysis
// =============================================================================

#[tokio::test]
async fn test_abnormal_result_end_to_end() {
    let harness = Harness::logged_in("tok").await;
    harness
        .transport
        .respond(
            200,
            analysis_json(
                "Pneumonia",
                0.82,
                Some("/static/images/segmentations/scan_seg.png"),
            ),
        )
        .await;
    let controller = harness.analysis();

    let state = completed(controller.select_file(jpeg_candidate("scan.jpg", TWO_MB)).await);
    let result = match state {
        WorkflowState::Succeeded(result) => result,
        other => panic!("unexpected {:?}", other),
    };

    let report = ResultReport::from_result(&result);
    assert_eq!(report.label, "Pneumonia");
    assert!(report.abnormal);
    assert_eq!(report.band, ConfidenceBand::High);
    assert_eq!(report.confidence_label(), "High (82%)");
    assert_eq!(
        report.segmentation,
        Panel::Available("/static/images/segmentations/scan_seg.png".to_string())
    );
    assert_eq!(
        report.heatmap.uri(),
        Some("/static/images/heatmaps/scan_heatmap.png")
    );

    let requests = harness.transport.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/api/predictions/analyze");
    assert_eq!(requests[0].bearer.as_deref(), Some("tok"));
    match &requests[0].body {
        RequestBody::Multipart(part) => {
            assert_eq!(part.field, "file");
            assert_eq!(part.file_name, "scan.jpg");
            assert_eq!(part.mime_type, "image/jpeg");
            assert_eq!(part.contents.len(), TWO_MB);
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[tokio::test]
async fn test_normal_result_has_no_segmentation() {
    let harness = Harness::logged_in("tok").await;
    harness
        .transport
        .respond(200, analysis_json("Normal", 0.95, None))
        .await;
    let controller = harness.analysis();

    let state = completed(controller.select_file(jpeg_candidate("scan.jpg", TWO_MB)).await);
    let result = match state {
        WorkflowState::Succeeded(result) => result,
        other => panic!("unexpected {:?}", other),
    };

    let report = ResultReport::from_result(&result);
    assert!(!report.abnormal);
    assert_eq!(report.band, ConfidenceBand::High);
    assert_eq!(report.segmentation, Panel::NotGeneratedForNormal);
    assert!(report
        .segmentation
        .placeholder("Segmentation")
        .unwrap()
        .contains("not generated for normal results"));
}

#[tokio::test]
async fn test_file_on_disk_is_submitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chest.png");
    std::fs::write(&path, encode_image(ImageFormat::Png)).unwrap();

    let harness = Harness::logged_in("tok").await;
    harness
        .transport
        .respond(200, analysis_json("Normal", 0.66, None))
        .await;
    let controller = harness.analysis();

    let candidate = UploadCandidate::from_path(&path, None).await.unwrap();
    assert_eq!(candidate.declared_mime, "image/png");
    assert_eq!(candidate.file_name, "chest.png");

    let state = completed(controller.select_file(candidate).await);
    assert!(matches!(state, WorkflowState::Succeeded(_)));

    let requests = harness.transport.requests().await;
    match &requests[0].body {
        RequestBody::Multipart(part) => {
            assert_eq!(part.mime_type, "image/png");
            assert!(medscan_client::analysis::preview(&part.contents).is_some());
        }
        other => panic!("unexpected body {:?}", other),
    }
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_server_rejection_keeps_detail() {
    let harness = Harness::logged_in("tok").await;
    harness
        .transport
        .respond(400, detail_json("Only JPG, JPEG, and PNG files are supported"))
        .await;
    let controller = harness.analysis();

    let reason = failure(completed(
        controller
            .select_file(UploadCandidate::from_bytes("x.gif", "image/gif", vec![1u8; 64]))
            .await,
    ));

    assert!(matches!(reason, FailureReason::Rejected { status: 400, .. }));
    assert!(reason
        .user_message()
        .starts_with("Only JPG, JPEG, and PNG files are supported"));
    assert!(harness.session.is_authenticated());
}

#[tokio::test]
async fn test_expired_session_during_analysis() {
    let harness = Harness::logged_in("tok").await;
    harness
        .transport
        .respond(401, detail_json("Could not validate credentials"))
        .await;
    let controller = harness.analysis();

    let reason = failure(completed(
        controller.select_file(jpeg_candidate("scan.jpg", 4096)).await,
    ));

    assert!(matches!(reason, FailureReason::SessionExpired));
    assert_eq!(
        reason.user_message(),
        "Your session has expired. Please log in again."
    );
    assert!(harness.session.get().is_empty());

    // Next selection fails fast without a request
    let reason = failure(completed(
        controller.select_file(jpeg_candidate("scan.jpg", 4096)).await,
    ));
    assert!(matches!(reason, FailureReason::SessionExpired));
    assert_eq!(harness.transport.request_count().await, 1);
}

#[tokio::test]
async fn test_unreachable_and_server_fault_messages() {
    let harness = Harness::logged_in("tok").await;
    harness
        .transport
        .fail(TransportError::Connection("connection refused".into()))
        .await;
    harness
        .transport
        .respond(500, detail_json("model failed to load"))
        .await;
    let controller = harness.analysis();

    let unreachable = failure(completed(
        controller.select_file(jpeg_candidate("a.jpg", 4096)).await,
    ));
    let server = failure(completed(
        controller.select_file(jpeg_candidate("b.jpg", 4096)).await,
    ));

    assert!(matches!(unreachable, FailureReason::Unreachable(_)));
    assert!(matches!(server, FailureReason::ServerFault { status: 500, .. }));
    assert_ne!(unreachable.user_message(), server.user_message());
    assert!(harness.session.is_authenticated());
}

#[tokio::test]
async fn test_malformed_result_is_server_fault() {
    let harness = Harness::logged_in("tok").await;
    harness
        .transport
        .respond(200, analysis_json("Pneumonia", 1.7, None))
        .await;
    let controller = harness.analysis();

    let reason = failure(completed(
        controller.select_file(jpeg_candidate("a.jpg", 4096)).await,
    ));
    assert!(matches!(reason, FailureReason::ServerFault { status: 200, .. }));
}

// =============================================================================
// Superseded Attempts
// =============================================================================

#[tokio::test]
async fn test_newer_selection_supersedes_pending_attempt() {
    let harness = Harness::logged_in("tok").await;
    let gate_a = harness.transport.gate().await;
    harness
        .transport
        .respond(200, analysis_json("Normal", 0.95, None))
        .await;

    let controller = Arc::new(harness.analysis());

    let attempt_a = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.select_file(jpeg_candidate("a.jpg", 4096)).await })
    };
    harness.transport.wait_for_requests(1).await;
    assert!(matches!(controller.state(), WorkflowState::Submitting));

    let outcome_b = controller.select_file(jpeg_candidate("b.jpg", 4096)).await;
    let result_b = match completed(outcome_b) {
        WorkflowState::Succeeded(result) => result,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(result_b.prediction_label, "Normal");

    // A's late response changes nothing
    gate_a
        .send(json_response(
            200,
            analysis_json("Pneumonia", 0.82, Some("/static/images/segmentations/a.png")),
        ))
        .unwrap();
    assert!(matches!(
        attempt_a.await.unwrap(),
        AttemptOutcome::Superseded
    ));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.attempt, 2);
    match snapshot.state {
        WorkflowState::Succeeded(result) => assert_eq!(result, result_b),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_late_failure_of_superseded_attempt_is_ignored() {
    let harness = Harness::logged_in("tok").await;
    let gate_a = harness.transport.gate().await;
    harness
        .transport
        .respond(200, analysis_json("Pneumonia", 0.64, None))
        .await;

    let controller = Arc::new(harness.analysis());
    let attempt_a = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.select_file(jpeg_candidate("a.jpg", 4096)).await })
    };
    harness.transport.wait_for_requests(1).await;

    completed(controller.select_file(jpeg_candidate("b.jpg", 4096)).await);

    gate_a
        .send(json_response(500, detail_json("boom")))
        .unwrap();
    assert!(matches!(
        attempt_a.await.unwrap(),
        AttemptOutcome::Superseded
    ));
    assert!(matches!(controller.state(), WorkflowState::Succeeded(_)));
}

#[tokio::test]
async fn test_reset_abandons_pending_attempt() {
    let harness = Harness::logged_in("tok").await;
    let gate = harness.transport.gate().await;

    let controller = Arc::new(harness.analysis());
    let attempt = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.select_file(jpeg_candidate("a.jpg", 4096)).await })
    };
    harness.transport.wait_for_requests(1).await;

    controller.reset();
    assert!(matches!(controller.state(), WorkflowState::Idle));

    gate.send(json_response(200, analysis_json("Normal", 0.9, None)))
        .unwrap();
    assert!(matches!(attempt.await.unwrap(), AttemptOutcome::Superseded));
    assert!(matches!(controller.state(), WorkflowState::Idle));
}
