//! GitLab issue tracker client.
//!
//! Ticket writes are mirrored to GitLab on a best-effort basis: every write
//! operation resolves to a [`Mirror`] instead of an error, so a tracker outage
//! can never fail the local request. The read side backs the tracker-direct
//! client source and reports errors normally.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use desk_common::{TicketStatus, TrackerLink};

pub const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";
pub const DEFAULT_PROJECT_ID: &str = "75469260";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DISABLED_REASON: &str = "issue tracker is not configured";

/// Outcome of a best-effort write to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Mirror<T> {
    Synced(T),
    Failed(String),
}

impl<T> Mirror<T> {
    pub fn synced(self) -> Option<T> {
        match self {
            Mirror::Synced(value) => Some(value),
            Mirror::Failed(_) => None,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Mirror::Synced(_))
    }

    fn from_result(operation: &str, result: Result<T>) -> Self {
        match result {
            Ok(value) => Mirror::Synced(value),
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(operation, error = %reason, "GitLab mirror failed");
                Mirror::Failed(reason)
            }
        }
    }
}

/// A GitLab issue (subset of fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitLabIssue {
    pub iid: i64,
    pub title: String,
    pub description: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub web_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl GitLabIssue {
    pub fn link(&self) -> TrackerLink {
        TrackerLink {
            issue_id: self.iid,
            issue_url: self.web_url.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteAuthor {
    pub name: String,
    pub username: String,
}

/// A comment on a GitLab issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitLabNote {
    pub id: i64,
    pub body: String,
    pub author: NoteAuthor,
    pub created_at: DateTime<Utc>,
    /// GitLab's own activity notes ("changed the description", ...).
    #[serde(default)]
    pub system: bool,
}

/// Fields of a new issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    #[serde(serialize_with = "comma_separated")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateEvent {
    Close,
    Reopen,
}

impl StateEvent {
    /// Only Closed and Open move the issue; other statuses leave it alone.
    pub fn for_status(status: TicketStatus) -> Option<Self> {
        match status {
            TicketStatus::Closed => Some(StateEvent::Close),
            TicketStatus::Open => Some(StateEvent::Reopen),
            _ => None,
        }
    }
}

/// Partial issue update. `None` fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_event: Option<StateEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "comma_separated_opt"
    )]
    pub labels: Option<Vec<String>>,
}

impl IssueChanges {
    pub fn is_empty(&self) -> bool {
        self.state_event.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.labels.is_none()
    }
}

fn comma_separated<S: serde::Serializer>(labels: &[String], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&labels.join(","))
}

fn comma_separated_opt<S: serde::Serializer>(
    labels: &Option<Vec<String>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match labels {
        Some(labels) => comma_separated(labels, s),
        None => s.serialize_none(),
    }
}

const INTERNAL_MARKER: &str = " (Internal)";

/// Markdown body of the note mirroring a ticket comment.
pub fn note_body(author: &str, content: &str, is_internal: bool) -> String {
    let marker = if is_internal { INTERNAL_MARKER } else { "" };
    format!("**{}**{}:\n\n{}", author, marker, content)
}

/// Inverse of [`note_body`]: `(author, content, is_internal)`. Notes that
/// were not written by the desk yield `None`.
pub fn parse_note_body(body: &str) -> Option<(String, String, bool)> {
    let rest = body.strip_prefix("**")?;
    let (author, rest) = rest.split_once("**")?;
    let (is_internal, rest) = match rest.strip_prefix(INTERNAL_MARKER) {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let content = rest.strip_prefix(":\n\n")?;
    Some((author.to_string(), content.to_string(), is_internal))
}

// ── Tracker interface ────────────────────────────────────────────────

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Whether writes can reach a real tracker.
    fn is_enabled(&self) -> bool;

    async fn create_issue(&self, draft: &IssueDraft) -> Mirror<GitLabIssue>;

    async fn update_issue(&self, iid: i64, changes: &IssueChanges) -> Mirror<GitLabIssue>;

    async fn add_note(&self, iid: i64, body: &str) -> Mirror<GitLabNote>;

    async fn list_issues(&self) -> Result<Vec<GitLabIssue>>;

    async fn get_issue(&self, iid: i64) -> Result<GitLabIssue>;

    async fn list_notes(&self, iid: i64) -> Result<Vec<GitLabNote>>;
}

/// Stand-in used when no token is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTracker;

#[async_trait]
impl IssueTracker for DisabledTracker {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn create_issue(&self, _draft: &IssueDraft) -> Mirror<GitLabIssue> {
        debug!("skipping issue creation: {}", DISABLED_REASON);
        Mirror::Failed(DISABLED_REASON.to_string())
    }

    async fn update_issue(&self, iid: i64, _changes: &IssueChanges) -> Mirror<GitLabIssue> {
        debug!(iid, "skipping issue update: {}", DISABLED_REASON);
        Mirror::Failed(DISABLED_REASON.to_string())
    }

    async fn add_note(&self, iid: i64, _body: &str) -> Mirror<GitLabNote> {
        debug!(iid, "skipping note: {}", DISABLED_REASON);
        Mirror::Failed(DISABLED_REASON.to_string())
    }

    async fn list_issues(&self) -> Result<Vec<GitLabIssue>> {
        bail!("{}", DISABLED_REASON)
    }

    async fn get_issue(&self, _iid: i64) -> Result<GitLabIssue> {
        bail!("{}", DISABLED_REASON)
    }

    async fn list_notes(&self, _iid: i64) -> Result<Vec<GitLabNote>> {
        bail!("{}", DISABLED_REASON)
    }
}

/// REST client for one GitLab project.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    api_url: String,
    project_id: String,
    token: String,
}

impl GitLabClient {
    pub fn new(api_url: &str, project_id: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build GitLab HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            token: token.to_string(),
        })
    }

    fn issues_url(&self) -> String {
        // Path-style project ids ("group/project") must be URL-encoded.
        format!(
            "{}/projects/{}/issues",
            self.api_url,
            self.project_id.replace('/', "%2F")
        )
    }

    fn issue_url(&self, iid: i64) -> String {
        format!("{}/{}", self.issues_url(), iid)
    }

    fn notes_url(&self, iid: i64) -> String {
        format!("{}/notes", self.issue_url(iid))
    }

    async fn try_create_issue(&self, draft: &IssueDraft) -> Result<GitLabIssue> {
        let resp = self
            .http
            .post(self.issues_url())
            .header("PRIVATE-TOKEN", &self.token)
            .json(draft)
            .send()
            .await
            .context("Failed to send create-issue request to GitLab")?;
        let resp = check_status(resp).await?;
        resp.json().await.context("Failed to parse GitLab issue")
    }

    async fn try_update_issue(&self, iid: i64, changes: &IssueChanges) -> Result<GitLabIssue> {
        let resp = self
            .http
            .put(self.issue_url(iid))
            .header("PRIVATE-TOKEN", &self.token)
            .json(changes)
            .send()
            .await
            .context("Failed to send update-issue request to GitLab")?;
        let resp = check_status(resp).await?;
        resp.json().await.context("Failed to parse GitLab issue")
    }

    async fn try_add_note(&self, iid: i64, body: &str) -> Result<GitLabNote> {
        let resp = self
            .http
            .post(self.notes_url(iid))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .context("Failed to send note request to GitLab")?;
        let resp = check_status(resp).await?;
        resp.json().await.context("Failed to parse GitLab note")
    }
}

#[async_trait]
impl IssueTracker for GitLabClient {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn create_issue(&self, draft: &IssueDraft) -> Mirror<GitLabIssue> {
        Mirror::from_result("create_issue", self.try_create_issue(draft).await)
    }

    async fn update_issue(&self, iid: i64, changes: &IssueChanges) -> Mirror<GitLabIssue> {
        Mirror::from_result("update_issue", self.try_update_issue(iid, changes).await)
    }

    async fn add_note(&self, iid: i64, body: &str) -> Mirror<GitLabNote> {
        Mirror::from_result("add_note", self.try_add_note(iid, body).await)
    }

    async fn list_issues(&self) -> Result<Vec<GitLabIssue>> {
        let resp = self
            .http
            .get(self.issues_url())
            .header("PRIVATE-TOKEN", &self.token)
            .query(&[("per_page", "100")])
            .send()
            .await
            .context("Failed to list GitLab issues")?;
        let resp = check_status(resp).await?;
        resp.json().await.context("Failed to parse GitLab issues")
    }

    async fn get_issue(&self, iid: i64) -> Result<GitLabIssue> {
        let resp = self
            .http
            .get(self.issue_url(iid))
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch GitLab issue #{}", iid))?;
        let resp = check_status(resp).await?;
        resp.json().await.context("Failed to parse GitLab issue")
    }

    async fn list_notes(&self, iid: i64) -> Result<Vec<GitLabNote>> {
        let resp = self
            .http
            .get(self.notes_url(iid))
            .header("PRIVATE-TOKEN", &self.token)
            .query(&[("sort", "asc"), ("per_page", "100")])
            .send()
            .await
            .with_context(|| format!("Failed to list notes of GitLab issue #{}", iid))?;
        let resp = check_status(resp).await?;
        resp.json().await.context("Failed to parse GitLab notes")
    }
}

/// Turn a non-2xx response into an error carrying GitLab's `message`.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").or_else(|| v.get("error")).cloned())
        .map(|m| match m {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or(body);
    bail!("GitLab returned {}: {}", status, message)
}
