use chrono::{DateTime, Utc};
use uuid::Uuid;

use desk_common::*;

/// A stored ticket. The affected user is a snapshot taken at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub service: BusinessService,
    pub category: Category,
    pub priority: Priority,
    pub status: TicketStatus,
    pub affected_user: AffectedUser,
    pub assigned_to: Option<String>,
    pub escalation_level: EscalationLevel,
    pub resolved_at: Option<DateTime<Utc>>,
    pub tracker: Option<TrackerLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author: String,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub criticality: Criticality,
    pub sla: Sla,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket together with its comments, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub comments: Vec<Comment>,
}

/// Fields of a ticket about to be inserted, defaults already applied.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub service: BusinessService,
    pub category: Category,
    pub priority: Priority,
    pub status: TicketStatus,
    pub affected_user: AffectedUser,
    pub assigned_to: Option<String>,
    pub escalation_level: EscalationLevel,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl NewTicket {
    pub fn from_request(req: CreateTicketRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            service: req.service,
            category: req.category,
            priority: req.priority,
            status: req.status.unwrap_or_default(),
            affected_user: req.affected_user,
            assigned_to: req.assigned_to,
            escalation_level: req.escalation_level.unwrap_or_default(),
            resolved_at: None,
        }
    }
}

/// Column-level changes for one ticket update.
#[derive(Debug, Clone, Default)]
pub struct TicketPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub service: Option<BusinessService>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: Option<TicketStatus>,
    pub affected_user_name: Option<String>,
    pub affected_user_email: Option<String>,
    pub affected_user_role: Option<UserRole>,
    /// `Some(None)` clears the assignee.
    pub assigned_to: Option<Option<String>>,
    pub escalation_level: Option<EscalationLevel>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TicketPatch {
    /// Flattens the affected user and stamps `resolved_at` when the new status
    /// is Resolved or Closed. Other statuses never clear an existing stamp.
    pub fn from_request(req: UpdateTicketRequest, now: DateTime<Utc>) -> Self {
        let resolved_at = req
            .status
            .filter(|status| status.stamps_resolution())
            .map(|_| now);
        let (affected_user_name, affected_user_email, affected_user_role) =
            match req.affected_user {
                Some(user) => (Some(user.name), Some(user.email), Some(user.role)),
                None => (None, None, None),
            };
        Self {
            title: req.title,
            description: req.description,
            service: req.service,
            category: req.category,
            priority: req.priority,
            status: req.status,
            affected_user_name,
            affected_user_email,
            affected_user_role,
            assigned_to: req.assigned_to,
            escalation_level: req.escalation_level,
            resolved_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub author: String,
    pub content: String,
    pub is_internal: bool,
}

impl From<CreateCommentRequest> for NewComment {
    fn from(req: CreateCommentRequest) -> Self {
        Self {
            author: req.author,
            content: req.content,
            is_internal: req.is_internal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: String,
    pub criticality: Criticality,
    pub sla: Sla,
    pub active: bool,
}

impl From<CreateServiceRequest> for NewService {
    fn from(req: CreateServiceRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            criticality: req.criticality,
            sla: req.sla,
            active: req.active.unwrap_or(true),
        }
    }
}

/// Equality filters for listing tickets, ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub service: Option<BusinessService>,
}

// ── Response shaping ──────────────────────────────────────────────────

impl Comment {
    pub fn to_response(&self) -> CommentResponse {
        CommentResponse {
            id: self.id,
            ticket_id: self.ticket_id,
            author: self.author.clone(),
            content: self.content.clone(),
            is_internal: self.is_internal,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TicketDetail {
    pub fn to_response(&self) -> TicketResponse {
        let t = &self.ticket;
        TicketResponse {
            legacy_id: t.id,
            id: t.id,
            title: t.title.clone(),
            description: t.description.clone(),
            service: t.service,
            category: t.category,
            priority: t.priority,
            status: t.status,
            affected_user_name: t.affected_user.name.clone(),
            affected_user_email: t.affected_user.email.clone(),
            affected_user_role: t.affected_user.role,
            affected_user: t.affected_user.clone(),
            assigned_to: t.assigned_to.clone(),
            escalation_level: t.escalation_level,
            resolved_at: t.resolved_at,
            gitlab_issue_id: t.tracker.as_ref().map(|link| link.issue_id),
            gitlab_issue_url: t.tracker.as_ref().map(|link| link.issue_url.clone()),
            created_at: t.created_at,
            updated_at: t.updated_at,
            comments: self.comments.iter().map(Comment::to_response).collect(),
        }
    }
}

impl Service {
    pub fn to_response(&self) -> ServiceResponse {
        ServiceResponse {
            legacy_id: self.id,
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            criticality: self.criticality,
            sla_response_time: self.sla.response_time,
            sla_resolution_time: self.sla.resolution_time,
            active: self.active,
            sla: self.sla,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
