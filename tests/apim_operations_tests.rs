//! API Management backup operation tests
//!
//! Run `AzureApimOperations` against a local fake Resource Manager endpoint
//! to cover the backup POST, long-running operation polling and
//! subscription discovery.

use apim_backup::apim::{ApimOperations, AzureApimOperations, BackupRequest, PollSettings};
use apim_backup::auth::StaticTokenProvider;
use apim_backup::blob::StorageContext;
use apim_backup::ApimBackupError;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

const SUBSCRIPTION: &str = "sub-123";
const BACKUP_PATH: &str = "/subscriptions/sub-123/resourceGroups/rg-apim/providers/Microsoft.ApiManagement/service/contoso-apim/backup";

/// How the fake service answers the backup POST
#[derive(Clone, Copy)]
enum Acceptance {
    AsyncOperation,
    Location,
    NoOperationUrl,
    Immediate,
    Rejected,
}

struct FakeArm {
    base: String,
    acceptance: Acceptance,
    /// Returned in order; the last entry repeats
    statuses: Mutex<VecDeque<Value>>,
    /// Number of 202 answers on the location URL before a 200
    location_pending: usize,
    subscriptions: (StatusCode, Value),
    backup_bodies: Mutex<Vec<Value>>,
    authorizations: Mutex<Vec<String>>,
    polls: AtomicUsize,
}

impl FakeArm {
    fn new(acceptance: Acceptance) -> Self {
        Self {
            base: String::new(),
            acceptance,
            statuses: Mutex::new(VecDeque::new()),
            location_pending: 0,
            subscriptions: (
                StatusCode::OK,
                json!({"value": [{"subscriptionId": SUBSCRIPTION, "state": "Enabled"}]}),
            ),
            backup_bodies: Mutex::new(Vec::new()),
            authorizations: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }

    fn with_statuses(self, statuses: Vec<Value>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    async fn spawn(mut self) -> Arc<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        self.base = format!("http://{}", listener.local_addr().unwrap());
        let arm = Arc::new(self);

        let app = Router::new()
            .route("/subscriptions", get(list_subscriptions))
            .route(BACKUP_PATH, post(start_backup))
            .route("/operations/status", get(operation_status))
            .route("/operations/location", get(operation_location))
            .with_state(Arc::clone(&arm));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        arm
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

async fn list_subscriptions(State(arm): State<Arc<FakeArm>>) -> Response {
    (arm.subscriptions.0, Json(arm.subscriptions.1.clone())).into_response()
}

async fn start_backup(
    State(arm): State<Arc<FakeArm>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        arm.authorizations.lock().unwrap().push(value.to_string());
    }
    arm.backup_bodies.lock().unwrap().push(body);

    match arm.acceptance {
        Acceptance::AsyncOperation => (
            StatusCode::ACCEPTED,
            [("azure-asyncoperation", format!("{}/operations/status", arm.base))],
        )
            .into_response(),
        Acceptance::Location => (
            StatusCode::ACCEPTED,
            [(header::LOCATION, format!("{}/operations/location", arm.base))],
        )
            .into_response(),
        Acceptance::NoOperationUrl => StatusCode::ACCEPTED.into_response(),
        Acceptance::Immediate => StatusCode::OK.into_response(),
        Acceptance::Rejected => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {
                    "code": "InvalidParameters",
                    "message": "Storage account key is invalid."
                }
            })),
        )
            .into_response(),
    }
}

async fn operation_status(State(arm): State<Arc<FakeArm>>) -> Json<Value> {
    arm.polls.fetch_add(1, Ordering::SeqCst);
    let mut statuses = arm.statuses.lock().unwrap();
    let next = if statuses.len() > 1 {
        statuses.pop_front()
    } else {
        statuses.front().cloned()
    };
    Json(next.unwrap_or_else(|| json!({"status": "InProgress"})))
}

async fn operation_location(State(arm): State<Arc<FakeArm>>) -> StatusCode {
    let seen = arm.polls.fetch_add(1, Ordering::SeqCst);
    if seen < arm.location_pending {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    }
}

fn operations(arm: &FakeArm, subscription: Option<&str>, timeout: Duration) -> AzureApimOperations {
    AzureApimOperations::new(
        Arc::new(StaticTokenProvider::new("test-token").unwrap()),
        arm.base.clone(),
        subscription.map(str::to_string),
        PollSettings {
            interval: Duration::from_millis(10),
            timeout,
        },
    )
    .unwrap()
}

fn request() -> BackupRequest {
    BackupRequest {
        resource_group: "rg-apim".to_string(),
        service_name: "contoso-apim".to_string(),
        container_name: "apim-backups".to_string(),
        backup_name: "apim_202406011200.bak".to_string(),
    }
}

fn storage() -> StorageContext {
    StorageContext::new("backupsacct", "a2V5").unwrap()
}

const TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_immediate_success_sends_access_key_body() {
    let arm = FakeArm::new(Acceptance::Immediate).spawn().await;

    operations(&arm, Some(SUBSCRIPTION), TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap();

    let bodies = arm.backup_bodies.lock().unwrap();
    assert_eq!(
        bodies.as_slice(),
        [json!({
            "storageAccount": "backupsacct",
            "containerName": "apim-backups",
            "backupName": "apim_202406011200.bak",
            "accessType": "AccessKey",
            "accessKey": "a2V5"
        })]
    );
    assert_eq!(
        arm.authorizations.lock().unwrap().as_slice(),
        ["Bearer test-token".to_string()]
    );
    assert_eq!(arm.polls(), 0);
}

#[tokio::test]
async fn test_async_operation_polled_until_succeeded() {
    let arm = FakeArm::new(Acceptance::AsyncOperation)
        .with_statuses(vec![
            json!({"status": "InProgress"}),
            json!({"status": "Succeeded"}),
        ])
        .spawn()
        .await;

    operations(&arm, Some(SUBSCRIPTION), TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap();

    assert_eq!(arm.polls(), 2);
}

#[tokio::test]
async fn test_failed_operation_is_backup_error() {
    let arm = FakeArm::new(Acceptance::AsyncOperation)
        .with_statuses(vec![json!({
            "status": "Failed",
            "error": {"code": "BackupFailed", "message": "Container is not reachable"}
        })])
        .spawn()
        .await;

    let err = operations(&arm, Some(SUBSCRIPTION), TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap_err();

    match err {
        ApimBackupError::BackupError(message) => {
            assert_eq!(message, "BackupFailed: Container is not reachable")
        }
        other => panic!("expected backup error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_canceled_operation_is_backup_error() {
    let arm = FakeArm::new(Acceptance::AsyncOperation)
        .with_statuses(vec![json!({"status": "Canceled"})])
        .spawn()
        .await;

    let err = operations(&arm, Some(SUBSCRIPTION), TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap_err();

    assert!(matches!(err, ApimBackupError::BackupError(_)));
}

#[tokio::test]
async fn test_operation_that_never_finishes_times_out() {
    let arm = FakeArm::new(Acceptance::AsyncOperation)
        .with_statuses(vec![json!({"status": "InProgress"})])
        .spawn()
        .await;

    let err = operations(&arm, Some(SUBSCRIPTION), Duration::from_millis(1500))
        .backup(&request(), &storage())
        .await
        .unwrap_err();

    assert!(matches!(err, ApimBackupError::BackupTimeout { minutes: 0 }));
    assert!(arm.polls() >= 1);
}

#[tokio::test]
async fn test_accepted_without_operation_url_is_error() {
    let arm = FakeArm::new(Acceptance::NoOperationUrl).spawn().await;

    let err = operations(&arm, Some(SUBSCRIPTION), TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap_err();

    assert!(matches!(err, ApimBackupError::BackupError(_)));
    assert!(err.to_string().contains("no operation URL"));
}

#[tokio::test]
async fn test_location_polled_until_ok() {
    let mut arm = FakeArm::new(Acceptance::Location);
    arm.location_pending = 1;
    let arm = arm.spawn().await;

    operations(&arm, Some(SUBSCRIPTION), TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap();

    assert_eq!(arm.polls(), 2);
}

#[tokio::test]
async fn test_rejected_backup_reports_azure_error() {
    let arm = FakeArm::new(Acceptance::Rejected).spawn().await;

    let err = operations(&arm, Some(SUBSCRIPTION), TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Backup operation failed: HTTP 400 (InvalidParameters): Storage account key is invalid."
    );
}

#[tokio::test]
async fn test_subscription_discovered_when_not_configured() {
    let mut arm = FakeArm::new(Acceptance::Immediate);
    arm.subscriptions = (
        StatusCode::OK,
        json!({"value": [
            {"subscriptionId": "old-sub", "state": "Disabled"},
            {"subscriptionId": SUBSCRIPTION, "state": "Enabled"}
        ]}),
    );
    let arm = arm.spawn().await;

    operations(&arm, None, TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap();

    assert_eq!(arm.backup_bodies.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_forbidden_subscription_listing_is_authentication_error() {
    let mut arm = FakeArm::new(Acceptance::Immediate);
    arm.subscriptions = (
        StatusCode::FORBIDDEN,
        json!({"error": {"code": "AuthorizationFailed", "message": "No access."}}),
    );
    let arm = arm.spawn().await;

    let err = operations(&arm, None, TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap_err();

    assert!(matches!(err, ApimBackupError::AuthenticationError(_)));
    assert_eq!(err.category(), "authentication");
    assert!(arm.backup_bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_subscription_listing_is_configuration_error() {
    let mut arm = FakeArm::new(Acceptance::Immediate);
    arm.subscriptions = (StatusCode::OK, json!({"value": []}));
    let arm = arm.spawn().await;

    let err = operations(&arm, None, TIMEOUT)
        .backup(&request(), &storage())
        .await
        .unwrap_err();

    assert!(matches!(err, ApimBackupError::ConfigError(_)));
}
