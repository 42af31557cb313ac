//! HTTP transport integration tests.
//!
//! Runs the client against an in-process axum server that mimics the
//! analysis API, verifying the wire encodings (form login, JSON
//! registration, bearer header, multipart upload) and transport failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, Json, Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use medscan_client::error::{AuthError, GatewayError, TransportError};
use medscan_client::{
    AnalysisController, AttemptOutcome, AuthController, Credential, FileCredentialStorage,
    HistoryService, HttpTransport, RehydrateOutcome, RequestGateway, Session, SessionStore,
    WorkflowState,
};

use super::test_utils::{alice, jpeg_candidate};

// =============================================================================
// Mock API Server
// =============================================================================

#[derive(Debug, Clone)]
struct Account {
    id: i64,
    username: String,
    password: String,
}

#[derive(Debug, Clone)]
struct ReceivedUpload {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    len: usize,
}

#[derive(Default)]
struct MockApi {
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<String, String>>,
    uploads: Mutex<Vec<ReceivedUpload>>,
    history_delay: Option<Duration>,
}

impl MockApi {
    fn with_alice() -> Self {
        let api = Self::default();
        api.accounts.lock().unwrap().insert(
            "alice@example.com".to_string(),
            Account {
                id: 1,
                username: "alice".to_string(),
                password: "s3cret".to_string(),
            },
        );
        api
    }

    fn bearer_email(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = value.strip_prefix("Bearer ")?;
        self.tokens.lock().unwrap().get(token).cloned()
    }
}

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(State(api): State<Arc<MockApi>>, Form(form): Form<LoginForm>) -> Response {
    let valid = api
        .accounts
        .lock()
        .unwrap()
        .get(&form.username)
        .map(|account| account.password == form.password)
        .unwrap_or(false);

    if !valid {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect email or password");
    }

    let mut tokens = api.tokens.lock().unwrap();
    let token = format!("token-{}", tokens.len() + 1);
    tokens.insert(token.clone(), form.username);
    Json(json!({ "access_token": token, "token_type": "bearer" })).into_response()
}

#[derive(Deserialize)]
struct RegisterBody {
    email: String,
    username: String,
    password: String,
}

async fn register(State(api): State<Arc<MockApi>>, Json(body): Json<RegisterBody>) -> Response {
    let mut accounts = api.accounts.lock().unwrap();
    if accounts.contains_key(&body.email) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }

    let id = accounts.len() as i64 + 1;
    accounts.insert(
        body.email.clone(),
        Account {
            id,
            username: body.username.clone(),
            password: body.password,
        },
    );
    Json(json!({ "id": id, "username": body.username, "email": body.email })).into_response()
}

async fn me(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    let Some(email) = api.bearer_email(&headers) else {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    };
    let accounts = api.accounts.lock().unwrap();
    match accounts.get(&email) {
        Some(account) => Json(json!({
            "id": account.id,
            "username": account.username,
            "email": email,
        }))
        .into_response(),
        None => detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
    }
}

async fn analyze(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if api.bearer_email(&headers).is_none() {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }

    while let Ok(Some(field)) = multipart.next_field().await {
        let upload = ReceivedUpload {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            len: 0,
        };
        let Ok(data) = field.bytes().await else {
            return detail(StatusCode::BAD_REQUEST, "Malformed upload");
        };
        api.uploads.lock().unwrap().push(ReceivedUpload {
            len: data.len(),
            ..upload
        });
    }

    Json(json!({
        "prediction": "Pneumonia",
        "confidence": 0.82,
        "heatmap_url": "/static/images/heatmaps/upload_heatmap.png",
        "segmentation_url": "/static/images/segmentations/upload_segmentation.png",
    }))
    .into_response()
}

async fn history(State(api): State<Arc<MockApi>>) -> Response {
    if let Some(delay) = api.history_delay {
        tokio::time::sleep(delay).await;
    }
    Json(json!([])).into_response()
}

async fn spawn_api(api: Arc<MockApi>) -> String {
    let app = Router::new()
        .route("/api/login", post(login))
        .route("/api/register", post(register))
        .route("/api/users/me", get(me))
        .route("/api/predictions/analyze", post(analyze))
        .route("/api/predictions/history", get(history))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn client(
    base_url: &str,
    timeout: Duration,
    store: Arc<SessionStore>,
) -> Arc<RequestGateway<HttpTransport>> {
    let transport = HttpTransport::new(base_url, timeout).unwrap();
    Arc::new(RequestGateway::new(transport, store))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_login_persists_and_rehydrates_over_http() {
    let api = Arc::new(MockApi::with_alice());
    let base_url = spawn_api(api).await;
    let dir = tempfile::tempdir().unwrap();

    let storage = Arc::new(FileCredentialStorage::new(dir.path()));
    let store = Arc::new(SessionStore::open(storage).await);
    let auth = AuthController::new(client(&base_url, Duration::from_secs(5), store).await);

    let identity = auth.login("alice@example.com", "s3cret").await.unwrap();
    assert_eq!(identity, alice());

    let persisted = std::fs::read_to_string(dir.path().join("token")).unwrap();
    assert_eq!(persisted.trim(), "token-1");

    // Next run
    let storage = Arc::new(FileCredentialStorage::new(dir.path()));
    let store = Arc::new(SessionStore::open(storage).await);
    let auth = AuthController::new(client(&base_url, Duration::from_secs(5), store).await);

    match auth.rehydrate().await {
        RehydrateOutcome::Restored(identity) => assert_eq!(identity, alice()),
        other => panic!("unexpected {:?}", other),
    }
    assert!(auth.is_authenticated());
}

#[tokio::test]
async fn test_bad_password_over_http() {
    let base_url = spawn_api(Arc::new(MockApi::with_alice())).await;
    let store = Arc::new(SessionStore::in_memory());
    let auth = AuthController::new(client(&base_url, Duration::from_secs(5), store).await);

    let err = auth.login("alice@example.com", "nope").await.unwrap_err();

    assert!(matches!(err, AuthError::Credential { status: 401, .. }));
    assert_eq!(err.to_string(), "Incorrect email or password");
    assert!(!auth.is_authenticated());
}

#[tokio::test]
async fn test_register_over_http() {
    let base_url = spawn_api(Arc::new(MockApi::default())).await;
    let store = Arc::new(SessionStore::in_memory());
    let auth = AuthController::new(client(&base_url, Duration::from_secs(5), store).await);

    let identity = auth
        .register("carol@example.com", "carol", "pw")
        .await
        .unwrap();
    assert_eq!(identity.username, "carol");
    assert!(auth.is_authenticated());

    auth.logout().await;
    let err = auth
        .register("carol@example.com", "carol2", "pw")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Email already registered");
    assert!(!auth.is_authenticated());
}

#[tokio::test]
async fn test_multipart_upload_over_http() {
    let api = Arc::new(MockApi::with_alice());
    let base_url = spawn_api(api.clone()).await;
    let store = Arc::new(SessionStore::in_memory());
    let gateway = client(&base_url, Duration::from_secs(5), store).await;

    AuthController::new(gateway.clone())
        .login("alice@example.com", "s3cret")
        .await
        .unwrap();

    let analysis = AnalysisController::new(gateway);
    let outcome = analysis.select_file(jpeg_candidate("scan.jpg", 64 * 1024)).await;

    match outcome {
        AttemptOutcome::Completed(WorkflowState::Succeeded(result)) => {
            assert_eq!(result.prediction_label, "Pneumonia");
            assert_eq!(result.confidence, 0.82);
        }
        other => panic!("unexpected {:?}", other),
    }

    let uploads = api.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].field, "file");
    assert_eq!(uploads[0].file_name.as_deref(), Some("scan.jpg"));
    assert_eq!(uploads[0].content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(uploads[0].len, 64 * 1024);
}

#[tokio::test]
async fn test_unknown_token_clears_session_over_http() {
    let base_url = spawn_api(Arc::new(MockApi::with_alice())).await;
    let store = Arc::new(SessionStore::in_memory());
    store
        .set(Session::authenticated(Credential::new("forged"), alice()))
        .await;
    let gateway = client(&base_url, Duration::from_secs(5), store.clone()).await;

    let analysis = AnalysisController::new(gateway);
    let outcome = analysis.select_file(jpeg_candidate("scan.jpg", 4096)).await;

    assert!(matches!(
        outcome,
        AttemptOutcome::Completed(WorkflowState::Failed(
            medscan_client::FailureReason::SessionExpired
        ))
    ));
    assert!(store.get().is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = Arc::new(SessionStore::in_memory());
    store
        .set(Session::authenticated(Credential::new("tok"), alice()))
        .await;
    let gateway = client(&format!("http://{}", addr), Duration::from_secs(5), store.clone()).await;

    let err = HistoryService::new(gateway).history().await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Unreachable(TransportError::Connection(_))
    ));
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let api = MockApi {
        history_delay: Some(Duration::from_secs(2)),
        ..MockApi::default()
    };
    let base_url = spawn_api(Arc::new(api)).await;

    let store = Arc::new(SessionStore::in_memory());
    store
        .set(Session::authenticated(Credential::new("tok"), alice()))
        .await;
    let gateway = client(&base_url, Duration::from_millis(200), store.clone()).await;

    let err = HistoryService::new(gateway).history().await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Unreachable(TransportError::Timeout(_))
    ));
    assert!(store.is_authenticated());
}
