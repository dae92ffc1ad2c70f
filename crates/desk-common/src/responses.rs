//! Response bodies of the REST API.
//!
//! The server builds these field by field from stored rows; the API-backed
//! client deserializes them. `_id` repeats `id` for older clients that read
//! that field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author: String,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    #[serde(rename = "_id")]
    pub legacy_id: Uuid,
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub service: BusinessService,
    pub category: Category,
    pub priority: Priority,
    pub status: TicketStatus,
    pub affected_user_name: String,
    pub affected_user_email: String,
    pub affected_user_role: UserRole,
    pub affected_user: AffectedUser,
    pub assigned_to: Option<String>,
    pub escalation_level: EscalationLevel,
    pub resolved_at: Option<DateTime<Utc>>,
    pub gitlab_issue_id: Option<i64>,
    pub gitlab_issue_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<CommentResponse>,
}

/// Body of `POST /api/tickets`: the stored ticket plus the outcome of the
/// tracker mirror (`null` when mirroring failed or is disabled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTicketResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    pub gitlab: Option<TrackerLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    #[serde(rename = "_id")]
    pub legacy_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub criticality: Criticality,
    pub sla_response_time: u32,
    pub sla_resolution_time: u32,
    pub active: bool,
    pub sla: Sla,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of `POST /api/services/initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub message: String,
    pub created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub database: String,
    pub tracker: String,
}

/// Error body shared by every 4xx/5xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: String,
}
