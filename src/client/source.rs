//! Where the client reads and writes tickets.
//!
//! Two back-ends implement [`TicketSource`]: the desk's own REST API and the
//! GitLab project directly. Both hand back [`DeskTicket`], so the store and
//! the views never know which one is in use.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use desk_common::{
    AffectedUser, BusinessService, Category, CommentResponse, CreateCommentRequest,
    CreateTicketRequest, EscalationLevel, Priority, TicketResponse, TicketStatus,
    UpdateTicketRequest,
};

/// A ticket as the client sees it. Fields the tracker cannot express are
/// optional.
#[derive(Debug, Clone, PartialEq)]
pub struct DeskTicket {
    /// Ticket id (API) or issue iid (tracker).
    pub key: String,
    pub title: String,
    pub description: String,
    pub service: Option<BusinessService>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: TicketStatus,
    pub affected_user: Option<AffectedUser>,
    pub assigned_to: Option<String>,
    pub escalation_level: Option<EscalationLevel>,
    pub labels: Vec<String>,
    pub comments: Vec<DeskComment>,
    pub tracker_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeskComment {
    pub author: String,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CommentResponse> for DeskComment {
    fn from(c: CommentResponse) -> Self {
        Self {
            author: c.author,
            content: c.content,
            is_internal: c.is_internal,
            created_at: c.created_at,
        }
    }
}

impl From<TicketResponse> for DeskTicket {
    fn from(t: TicketResponse) -> Self {
        Self {
            key: t.id.to_string(),
            title: t.title,
            description: t.description,
            service: Some(t.service),
            category: Some(t.category),
            priority: Some(t.priority),
            status: t.status,
            affected_user: Some(t.affected_user),
            assigned_to: t.assigned_to,
            escalation_level: Some(t.escalation_level),
            labels: vec![t.service.as_str().to_string()],
            comments: t.comments.into_iter().map(DeskComment::from).collect(),
            tracker_url: t.gitlab_issue_url,
            created_at: t.created_at,
            resolved_at: t.resolved_at,
        }
    }
}

/// Server-side narrowing of `list`. Sources that cannot filter remotely
/// apply [`ClientFilter::matches`] themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub service: Option<BusinessService>,
}

impl ClientFilter {
    pub fn matches(&self, ticket: &DeskTicket) -> bool {
        self.status.is_none_or(|s| ticket.status == s)
            && self.priority.is_none_or(|p| ticket.priority == Some(p))
            && self.service.is_none_or(|s| ticket.service == Some(s))
    }
}

#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Short name shown in views ("api", "tracker").
    fn name(&self) -> &'static str;

    async fn list(&self, filter: &ClientFilter) -> Result<Vec<DeskTicket>>;

    async fn get(&self, key: &str) -> Result<DeskTicket>;

    async fn create(&self, draft: &CreateTicketRequest) -> Result<DeskTicket>;

    async fn update(&self, key: &str, changes: &UpdateTicketRequest) -> Result<DeskTicket>;

    async fn add_comment(&self, key: &str, comment: &CreateCommentRequest) -> Result<DeskTicket>;

    /// Remove a ticket. Not every source can.
    async fn delete(&self, key: &str) -> Result<()>;
}
