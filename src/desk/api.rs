use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequest, Path, Query, Request, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{error, info};
use uuid::Uuid;

use desk_common::*;

use super::catalog;
use super::db::DbHandle;
use super::gitlab::{IssueChanges, IssueDraft, IssueTracker, Mirror, StateEvent, note_body};
use super::models::*;
use crate::errors::DeskError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub tracker: Arc<dyn IssueTracker>,
    /// Mirror status/title/description edits of linked tickets.
    pub mirror_updates: bool,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = ErrorBody {
            message,
            error: status.canonical_reason().unwrap_or("Error").to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::TicketNotFound { .. } => ApiError::NotFound(err.to_string()),
            DeskError::DuplicateService { .. } | DeskError::Validation(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => {
                error!(error = %other, "request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        DeskError::from(err).into()
    }
}

fn db_error(err: anyhow::Error) -> ApiError {
    DeskError::from_db(err).into()
}

/// JSON body extractor whose rejections (syntax, unknown or missing field,
/// out-of-set enum value) all become a 400 with the usual error body.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// A malformed id cannot name an existing ticket.
fn parse_ticket_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Ticket {} not found", raw)))
}

// ── Query types ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub service: Option<String>,
}

impl TicketQuery {
    /// Parse with the same rules as request bodies. Empty values are ignored.
    pub fn into_filter(self) -> Result<TicketFilter, ApiError> {
        fn parse<T: FromStr<Err = String>>(raw: Option<String>) -> Result<Option<T>, ApiError> {
            raw.filter(|v| !v.is_empty())
                .map(|v| T::from_str(&v).map_err(ApiError::BadRequest))
                .transpose()
        }
        Ok(TicketFilter {
            status: parse(self.status)?,
            priority: parse(self.priority)?,
            service: parse(self.service)?,
        })
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route(
            "/api/tickets/{id}",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        )
        .route("/api/tickets/{id}/comments", post(add_comment))
        .route("/api/services", get(list_services).post(create_service))
        .route("/api/services/initialize", post(initialize_services))
        .route("/api/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let tracker = if state.tracker.is_enabled() {
        "enabled"
    } else {
        "disabled"
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Service desk API is running".to_string(),
        database: "SQLite".to_string(),
        tracker: tracker.to_string(),
    })
}

async fn list_tickets(
    State(state): State<SharedState>,
    Query(query): Query<TicketQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter()?;
    let tickets = state
        .db
        .call(move |db| db.list_tickets(&filter))
        .await
        .map_err(db_error)?;
    let body: Vec<TicketResponse> = tickets.iter().map(TicketDetail::to_response).collect();
    Ok(Json(body))
}

async fn get_ticket(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_ticket_id(&id)?;
    let detail = state
        .db
        .call(move |db| db.get_ticket_detail(id))
        .await
        .map_err(db_error)?;
    match detail {
        Some(detail) => Ok(Json(detail.to_response())),
        None => Err(DeskError::TicketNotFound { id }.into()),
    }
}

async fn create_ticket(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<CreateTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let new = NewTicket::from_request(req);
    let ticket = state
        .db
        .call(move |db| db.create_ticket(&new))
        .await
        .map_err(db_error)?;
    info!(ticket_id = %ticket.id, priority = %ticket.priority, "ticket created");

    let draft = IssueDraft {
        title: ticket.title.clone(),
        description: ticket.description.clone(),
        labels: vec![ticket.service.as_str().to_string()],
    };
    let link = match state.tracker.create_issue(&draft).await {
        Mirror::Synced(issue) => {
            info!(ticket_id = %ticket.id, issue_id = issue.iid, "ticket mirrored to GitLab");
            Some(issue.link())
        }
        Mirror::Failed(_) => None,
    };

    let id = ticket.id;
    let stored_link = link.clone();
    let detail = state
        .db
        .call(move |db| {
            if let Some(link) = &stored_link {
                db.set_tracker_link(id, link)?;
            }
            db.get_ticket_detail(id)
        })
        .await
        .map_err(db_error)?
        .ok_or(DeskError::TicketNotFound { id })?;

    let body = CreatedTicketResponse {
        ticket: detail.to_response(),
        gitlab: link,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

async fn update_ticket(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_ticket_id(&id)?;
    req.validate()?;

    let changes = IssueChanges {
        state_event: req.status.and_then(StateEvent::for_status),
        title: req.title.clone(),
        description: req.description.clone(),
        labels: None,
    };
    let patch = TicketPatch::from_request(req, Utc::now());
    let detail = state
        .db
        .call(move |db| db.update_ticket(id, &patch))
        .await
        .map_err(db_error)?
        .ok_or(DeskError::TicketNotFound { id })?;
    info!(ticket_id = %id, status = %detail.ticket.status, "ticket updated");

    if state.mirror_updates && !changes.is_empty() {
        if let Some(link) = &detail.ticket.tracker {
            if let Mirror::Synced(issue) = state.tracker.update_issue(link.issue_id, &changes).await {
                info!(ticket_id = %id, issue_id = issue.iid, "ticket update mirrored to GitLab");
            }
        }
    }

    Ok(Json(detail.to_response()))
}

async fn delete_ticket(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_ticket_id(&id)?;
    let deleted = state
        .db
        .call(move |db| db.delete_ticket(id))
        .await
        .map_err(db_error)?;
    if !deleted {
        return Err(DeskError::TicketNotFound { id }.into());
    }
    info!(ticket_id = %id, "ticket deleted");
    Ok(Json(MessageResponse::new("Ticket deleted successfully")))
}

async fn add_comment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_ticket_id(&id)?;
    req.validate()?;
    let new = NewComment::from(req);
    let (comment, detail) = state
        .db
        .call(move |db| {
            let comment = db
                .add_comment(id, &new)?
                .ok_or(DeskError::TicketNotFound { id })?;
            let detail = db
                .get_ticket_detail(id)?
                .ok_or(DeskError::TicketNotFound { id })?;
            Ok((comment, detail))
        })
        .await
        .map_err(db_error)?;

    if let Some(link) = &detail.ticket.tracker {
        let body = note_body(&comment.author, &comment.content, comment.is_internal);
        if let Mirror::Synced(note) = state.tracker.add_note(link.issue_id, &body).await {
            info!(ticket_id = %id, issue_id = link.issue_id, note_id = note.id, "comment mirrored to GitLab");
        }
    }

    Ok(Json(detail.to_response()))
}

async fn list_services(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let services = state
        .db
        .call(|db| db.list_active_services())
        .await
        .map_err(db_error)?;
    let body: Vec<ServiceResponse> = services.iter().map(Service::to_response).collect();
    Ok(Json(body))
}

async fn create_service(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<CreateServiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let new = NewService::from(req);
    let service = state
        .db
        .call(move |db| {
            if db.service_name_exists(&new.name)? {
                return Err(DeskError::DuplicateService { name: new.name }.into());
            }
            db.create_service(&new)
        })
        .await
        .map_err(db_error)?;
    info!(service = %service.name, "service created");
    Ok((StatusCode::CREATED, Json(service.to_response())))
}

async fn initialize_services(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .db
        .call(|db| db.initialize_services(&catalog::default_services()))
        .await
        .map_err(db_error)?;
    let message = if created == 0 {
        "Services already initialized"
    } else {
        info!(created, "service catalog initialized");
        "Services initialized successfully"
    };
    Ok(Json(InitializeResponse {
        message: message.to_string(),
        created,
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::db::DeskDb;
    use crate::desk::gitlab::{GitLabIssue, GitLabNote, NoteAuthor};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Records every tracker call; `fail` makes every write fail.
    #[derive(Default)]
    struct FakeTracker {
        fail: bool,
        drafts: Mutex<Vec<IssueDraft>>,
        updates: Mutex<Vec<(i64, IssueChanges)>>,
        notes: Mutex<Vec<(i64, String)>>,
    }

    impl FakeTracker {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn issue(iid: i64, title: &str) -> GitLabIssue {
            GitLabIssue {
                iid,
                title: title.to_string(),
                description: None,
                state: "opened".to_string(),
                labels: vec![],
                web_url: format!("https://gitlab.com/acme/desk/-/issues/{}", iid),
                created_at: Utc::now(),
                updated_at: None,
                closed_at: None,
            }
        }
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn create_issue(&self, draft: &IssueDraft) -> Mirror<GitLabIssue> {
            self.drafts.lock().unwrap().push(draft.clone());
            if self.fail {
                return Mirror::Failed("connection refused".to_string());
            }
            Mirror::Synced(Self::issue(7, &draft.title))
        }

        async fn update_issue(&self, iid: i64, changes: &IssueChanges) -> Mirror<GitLabIssue> {
            self.updates.lock().unwrap().push((iid, changes.clone()));
            if self.fail {
                return Mirror::Failed("connection refused".to_string());
            }
            Mirror::Synced(Self::issue(iid, "updated"))
        }

        async fn add_note(&self, iid: i64, body: &str) -> Mirror<GitLabNote> {
            self.notes.lock().unwrap().push((iid, body.to_string()));
            if self.fail {
                return Mirror::Failed("connection refused".to_string());
            }
            Mirror::Synced(GitLabNote {
                id: 1,
                body: body.to_string(),
                author: NoteAuthor {
                    name: "desk".to_string(),
                    username: "desk".to_string(),
                },
                created_at: Utc::now(),
                system: false,
            })
        }

        async fn list_issues(&self) -> anyhow::Result<Vec<GitLabIssue>> {
            Ok(vec![])
        }

        async fn get_issue(&self, iid: i64) -> anyhow::Result<GitLabIssue> {
            Ok(Self::issue(iid, "fake"))
        }

        async fn list_notes(&self, _iid: i64) -> anyhow::Result<Vec<GitLabNote>> {
            Ok(vec![])
        }
    }

    fn app_with(tracker: Arc<FakeTracker>, mirror_updates: bool) -> Router {
        let db = DeskDb::new_in_memory().unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            tracker,
            mirror_updates,
        });
        api_router().with_state(state)
    }

    fn test_app() -> Router {
        app_with(Arc::new(FakeTracker::default()), false)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response.into_body()).await)
    }

    fn ticket_body(title: &str) -> serde_json::Value {
        serde_json::json!({
            "title": title,
            "description": "Saving fabric quantities returns a 500",
            "service": "Inventory",
            "category": "Incident",
            "priority": "P1",
            "affectedUser": {
                "name": "María González",
                "email": "maria.gonzalez@uniformes.com",
                "role": "Administrative Staff"
            }
        })
    }

    async fn create(app: &Router, body: serde_json::Value) -> serde_json::Value {
        let (status, json) = send(app, "POST", "/api/tickets", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json
    }

    // 1. Health check
    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let (status, json) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], "SQLite");
        assert_eq!(json["tracker"], "enabled");
    }

    // 2. Create applies defaults and mirrors the ticket
    #[tokio::test]
    async fn test_create_ticket_defaults_and_mirror() {
        let tracker = Arc::new(FakeTracker::default());
        let app = app_with(tracker.clone(), false);

        let json = create(&app, ticket_body("Inventory broken")).await;
        assert_eq!(json["status"], "Open");
        assert_eq!(json["escalationLevel"], "L1");
        assert_eq!(json["_id"], json["id"]);
        assert_eq!(json["affectedUser"]["name"], "María González");
        assert_eq!(json["gitlab"]["issueId"], 7);
        assert_eq!(json["gitlabIssueId"], 7);

        let drafts = tracker.drafts.lock().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].labels, vec!["Inventory"]);
    }

    // 3. Mirror failure still creates the ticket
    #[tokio::test]
    async fn test_create_ticket_mirror_failure_returns_201() {
        let app = app_with(Arc::new(FakeTracker::failing()), false);

        let json = create(&app, ticket_body("Tracker down")).await;
        assert!(json["gitlab"].is_null());
        assert!(json["gitlabIssueId"].is_null());

        let (status, list) = send(&app, "GET", "/api/tickets", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    // 4. Out-of-set values and unknown fields are rejected, nothing persisted
    #[tokio::test]
    async fn test_create_ticket_rejects_invalid_input() {
        let tracker = Arc::new(FakeTracker::default());
        let app = app_with(tracker.clone(), false);

        let mut bad_service = ticket_body("x");
        bad_service["service"] = serde_json::json!("Billing");
        let mut bad_role = ticket_body("x");
        bad_role["affectedUser"]["role"] = serde_json::json!("Intern");
        let mut bad_email = ticket_body("x");
        bad_email["affectedUser"]["email"] = serde_json::json!("nope");
        let mut unknown = ticket_body("x");
        unknown["severity"] = serde_json::json!("high");
        let mut bad_category = ticket_body("x");
        bad_category["category"] = serde_json::json!("Complaint");
        let mut bad_priority = ticket_body("x");
        bad_priority["priority"] = serde_json::json!("P5");
        let mut bad_status = ticket_body("x");
        bad_status["status"] = serde_json::json!("Pending");

        for body in [
            bad_service,
            bad_role,
            bad_email,
            unknown,
            bad_category,
            bad_priority,
            bad_status,
        ] {
            let (status, json) = send(&app, "POST", "/api/tickets", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "Bad Request");
            assert!(json["message"].as_str().is_some());
        }

        let (_, list) = send(&app, "GET", "/api/tickets", None).await;
        assert!(list.as_array().unwrap().is_empty());
        assert!(tracker.drafts.lock().unwrap().is_empty());
    }

    // 5. Malformed JSON is a 400 with the error body
    #[tokio::test]
    async fn test_malformed_json() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/tickets")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(json["error"], "Bad Request");
    }

    // 6. Spanish aliases normalize to English
    #[tokio::test]
    async fn test_spanish_aliases_are_normalized() {
        let app = test_app();
        let mut body = ticket_body("Alias");
        body["service"] = serde_json::json!("Inventario");
        body["category"] = serde_json::json!("Incidente");
        body["status"] = serde_json::json!("En Progreso");
        body["affectedUser"]["role"] = serde_json::json!("Cliente");
        let json = create(&app, body).await;
        assert_eq!(json["service"], "Inventory");
        assert_eq!(json["category"], "Incident");
        assert_eq!(json["status"], "In Progress");
        assert_eq!(json["affectedUserRole"], "Customer");
    }

    // 7. List filter and ordering
    #[tokio::test]
    async fn test_list_filter_by_status_newest_first() {
        let app = test_app();
        let first = create(&app, ticket_body("first")).await;
        let second = create(&app, ticket_body("second")).await;
        let mut waiting = ticket_body("waiting");
        waiting["status"] = serde_json::json!("Waiting");
        create(&app, waiting).await;

        let (status, list) = send(&app, "GET", "/api/tickets?status=Open", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&serde_json::Value> =
            list.as_array().unwrap().iter().map(|t| &t["id"]).collect();
        assert_eq!(ids, vec![&second["id"], &first["id"]]);

        let (_, list) = send(&app, "GET", "/api/tickets?status=Abierto&priority=P1", None).await;
        assert_eq!(list.as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "GET", "/api/tickets?status=Done", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, list) = send(&app, "GET", "/api/tickets?status=", None).await;
        assert_eq!(list.as_array().unwrap().len(), 3);
    }

    // 8. Get by id and not-found handling
    #[tokio::test]
    async fn test_get_ticket_and_not_found() {
        let app = test_app();
        let created = create(&app, ticket_body("fetch me")).await;
        let id = created["id"].as_str().unwrap();

        let (status, json) = send(&app, "GET", &format!("/api/tickets/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["title"], "fetch me");
        assert!(json.get("gitlab").is_none());

        let (status, json) =
            send(&app, "GET", &format!("/api/tickets/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Not Found");

        let (status, _) = send(&app, "GET", "/api/tickets/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // 9. Update stamps resolution and keeps it on reopen
    #[tokio::test]
    async fn test_update_resolution_stamp() {
        let app = test_app();
        let created = create(&app, ticket_body("resolve me")).await;
        let uri = format!("/api/tickets/{}", created["id"].as_str().unwrap());
        assert!(created["resolvedAt"].is_null());

        let (status, resolved) =
            send(&app, "PUT", &uri, Some(serde_json::json!({"status": "Cerrado"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolved["status"], "Closed");
        assert!(resolved["resolvedAt"].is_string());

        let (_, reopened) = send(
            &app,
            "PUT",
            &uri,
            Some(serde_json::json!({
                "status": "In Progress",
                "affectedUser": {"name": "Luis", "email": "luis@soporte.com", "role": "Management"}
            })),
        )
        .await;
        assert_eq!(reopened["status"], "In Progress");
        assert_eq!(reopened["resolvedAt"], resolved["resolvedAt"]);
        assert_eq!(reopened["affectedUserName"], "Luis");
        assert_eq!(reopened["affectedUser"]["role"], "Management");
        assert_eq!(reopened["title"], "resolve me");
    }

    // 9b. A null assignee clears it, an absent one leaves it
    #[tokio::test]
    async fn test_update_clears_assignee() {
        let app = test_app();
        let mut body = ticket_body("assigned");
        body["assignedTo"] = serde_json::json!("Carlos");
        let created = create(&app, body).await;
        assert_eq!(created["assignedTo"], "Carlos");
        let uri = format!("/api/tickets/{}", created["id"].as_str().unwrap());

        let (_, kept) =
            send(&app, "PUT", &uri, Some(serde_json::json!({"status": "In Progress"}))).await;
        assert_eq!(kept["assignedTo"], "Carlos");

        let (status, cleared) =
            send(&app, "PUT", &uri, Some(serde_json::json!({"assignedTo": null}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(cleared["assignedTo"].is_null());
        assert_eq!(cleared["status"], "In Progress");
    }

    // 10. Update of a missing ticket and invalid update body
    #[tokio::test]
    async fn test_update_errors() {
        let app = test_app();
        let uri = format!("/api/tickets/{}", Uuid::new_v4());
        let (status, _) =
            send(&app, "PUT", &uri, Some(serde_json::json!({"title": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let created = create(&app, ticket_body("t")).await;
        let uri = format!("/api/tickets/{}", created["id"].as_str().unwrap());
        let (status, _) =
            send(&app, "PUT", &uri, Some(serde_json::json!({"priority": "P7"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // 11. Updates are not mirrored unless enabled
    #[tokio::test]
    async fn test_update_mirroring_is_opt_in() {
        let tracker = Arc::new(FakeTracker::default());
        let app = app_with(tracker.clone(), false);
        let created = create(&app, ticket_body("quiet")).await;
        let uri = format!("/api/tickets/{}", created["id"].as_str().unwrap());
        send(&app, "PUT", &uri, Some(serde_json::json!({"status": "Closed"}))).await;
        assert!(tracker.updates.lock().unwrap().is_empty());

        let tracker = Arc::new(FakeTracker::default());
        let app = app_with(tracker.clone(), true);
        let created = create(&app, ticket_body("loud")).await;
        let uri = format!("/api/tickets/{}", created["id"].as_str().unwrap());
        send(&app, "PUT", &uri, Some(serde_json::json!({"status": "Closed"}))).await;
        send(&app, "PUT", &uri, Some(serde_json::json!({"status": "Waiting"}))).await;

        let updates = tracker.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, 7);
        assert_eq!(updates[0].1.state_event, Some(StateEvent::Close));
    }

    // 12. Comments: ordering, mirroring, missing ticket
    #[tokio::test]
    async fn test_add_comment_mirrors_note() {
        let tracker = Arc::new(FakeTracker::default());
        let app = app_with(tracker.clone(), false);
        let created = create(&app, ticket_body("discuss")).await;
        let uri = format!("/api/tickets/{}/comments", created["id"].as_str().unwrap());

        send(
            &app,
            "POST",
            &uri,
            Some(serde_json::json!({"author": "Carlos", "content": "first", "isInternal": true})),
        )
        .await;
        let (status, json) = send(
            &app,
            "POST",
            &uri,
            Some(serde_json::json!({"author": "Ana", "content": "second"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let comments = json["comments"].as_array().unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0]["content"], "first");
        assert_eq!(comments[0]["isInternal"], true);
        assert_eq!(comments[1]["content"], "second");

        let notes = tracker.notes.lock().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0], (7, "**Carlos** (Internal):\n\nfirst".to_string()));
        assert_eq!(notes[1], (7, "**Ana**:\n\nsecond".to_string()));
    }

    #[tokio::test]
    async fn test_add_comment_mirror_failure_and_missing_ticket() {
        let app = app_with(Arc::new(FakeTracker::failing()), false);
        let created = create(&app, ticket_body("unlinked")).await;
        let uri = format!("/api/tickets/{}/comments", created["id"].as_str().unwrap());
        let (status, json) = send(
            &app,
            "POST",
            &uri,
            Some(serde_json::json!({"author": "Ana", "content": "still saved"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["comments"].as_array().unwrap().len(), 1);

        let uri = format!("/api/tickets/{}/comments", Uuid::new_v4());
        let (status, _) = send(
            &app,
            "POST",
            &uri,
            Some(serde_json::json!({"author": "Ana", "content": "lost"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // 13. Delete removes the ticket and its comments
    #[tokio::test]
    async fn test_delete_ticket() {
        let app = test_app();
        let created = create(&app, ticket_body("doomed")).await;
        let id = created["id"].as_str().unwrap();
        send(
            &app,
            "POST",
            &format!("/api/tickets/{id}/comments"),
            Some(serde_json::json!({"author": "Ana", "content": "bye"})),
        )
        .await;

        let (status, json) = send(&app, "DELETE", &format!("/api/tickets/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Ticket deleted successfully");

        let (status, _) = send(&app, "GET", &format!("/api/tickets/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &format!("/api/tickets/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // 14. Service catalog initialization is idempotent
    #[tokio::test]
    async fn test_initialize_services_twice() {
        let app = test_app();
        let (status, first) = send(&app, "POST", "/api/services/initialize", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["created"], 7);

        let (_, second) = send(&app, "POST", "/api/services/initialize", None).await;
        assert_eq!(second["created"], 0);
        assert_eq!(second["message"], "Services already initialized");

        let (_, services) = send(&app, "GET", "/api/services", None).await;
        let services = services.as_array().unwrap();
        assert_eq!(services.len(), 7);
        assert_eq!(services[0]["name"], "Authentication");
        assert_eq!(services[0]["sla"]["responseTime"], 2);
        assert_eq!(services[0]["slaResolutionTime"], 4);
    }

    // 15. Create service and reject duplicates
    #[tokio::test]
    async fn test_create_service() {
        let app = test_app();
        let body = serde_json::json!({
            "name": "Billing",
            "description": "Invoices",
            "criticality": "High",
            "sla": {"responseTime": 4, "resolutionTime": 8}
        });
        let (status, json) = send(&app, "POST", "/api/services", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["active"], true);
        assert_eq!(json["slaResponseTime"], 4);

        let (status, json) = send(&app, "POST", "/api/services", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("Billing"));

        let (status, _) = send(
            &app,
            "POST",
            "/api/services",
            Some(serde_json::json!({"name": "NoSla", "description": "d", "criticality": "Low"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
