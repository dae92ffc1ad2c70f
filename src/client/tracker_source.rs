//! Tickets read straight from the GitLab project.
//!
//! Issues are the tickets and notes are their comments. GitLab has no field
//! for priority, service or category, so those travel as labels; the
//! affected user rides in a block appended to the issue description.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, info};

use desk_common::{
    AffectedUser, BusinessService, Category, CreateCommentRequest, CreateTicketRequest, Priority,
    TicketStatus, UpdateTicketRequest, UserRole,
};

use super::source::{ClientFilter, DeskComment, DeskTicket, TicketSource};
use crate::desk::gitlab::{
    GitLabIssue, GitLabNote, IssueChanges, IssueDraft, IssueTracker, Mirror, StateEvent,
    note_body, parse_note_body,
};
use crate::errors::DeskError;

const USER_BLOCK: &str = "\n\n---\n**Affected User:**\n";

pub struct TrackerSource {
    tracker: Arc<dyn IssueTracker>,
}

impl TrackerSource {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self { tracker }
    }
}

fn parse_iid(key: &str) -> Result<i64> {
    key.trim_start_matches('#')
        .parse()
        .map_err(|_| anyhow!("'{}' is not a GitLab issue number", key))
}

fn written<T>(mirror: Mirror<T>) -> Result<T> {
    match mirror {
        Mirror::Synced(value) => Ok(value),
        Mirror::Failed(reason) => Err(DeskError::Tracker(reason).into()),
    }
}

/// Issue description for a new ticket: the text, then the affected user,
/// category and priority.
pub fn compose_description(draft: &CreateTicketRequest) -> String {
    let user = &draft.affected_user;
    format!(
        "{}{}- **Name:** {}\n- **Email:** {}\n- **Role:** {}\n\n---\n**Category:** {}\n**Priority:** {}",
        draft.description,
        USER_BLOCK,
        user.name,
        user.email,
        user.role,
        draft.category,
        draft.priority,
    )
}

/// Split a composed description back into the text and the affected user.
/// Descriptions written elsewhere come back whole with no user.
pub fn split_description(description: &str) -> (String, Option<AffectedUser>) {
    let Some((text, block)) = description.split_once(USER_BLOCK) else {
        return (description.to_string(), None);
    };
    let field = |name: &str| {
        let prefix = format!("- **{}:** ", name);
        block
            .lines()
            .find_map(|line| line.strip_prefix(prefix.as_str()))
            .map(str::trim)
    };
    let user = match (field("Name"), field("Email"), field("Role")) {
        (Some(name), Some(email), Some(role)) => role.parse::<UserRole>().ok().map(|role| {
            AffectedUser {
                name: name.to_string(),
                email: email.to_string(),
                role,
            }
        }),
        _ => None,
    };
    (text.to_string(), user)
}

fn label_of<T: std::str::FromStr>(labels: &[String]) -> Option<T> {
    labels.iter().find_map(|l| l.parse().ok())
}

/// Replace every label that parses as `T` with `value`, keeping the rest.
fn swap_label<T: std::str::FromStr>(labels: &mut Vec<String>, value: &str) {
    labels.retain(|l| l.parse::<T>().is_err());
    labels.push(value.to_string());
}

fn to_comment(note: GitLabNote) -> DeskComment {
    match parse_note_body(&note.body) {
        Some((author, content, is_internal)) => DeskComment {
            author,
            content,
            is_internal,
            created_at: note.created_at,
        },
        None => DeskComment {
            author: note.author.name,
            content: note.body,
            is_internal: false,
            created_at: note.created_at,
        },
    }
}

fn to_ticket(issue: GitLabIssue, notes: Vec<GitLabNote>) -> DeskTicket {
    let status = if issue.is_closed() {
        TicketStatus::Closed
    } else {
        TicketStatus::Open
    };
    let (description, affected_user) =
        split_description(issue.description.as_deref().unwrap_or_default());
    DeskTicket {
        key: issue.iid.to_string(),
        title: issue.title,
        description,
        service: label_of::<BusinessService>(&issue.labels),
        category: label_of::<Category>(&issue.labels),
        priority: label_of::<Priority>(&issue.labels),
        status,
        affected_user,
        assigned_to: None,
        escalation_level: None,
        comments: notes
            .into_iter()
            .filter(|n| !n.system)
            .map(to_comment)
            .collect(),
        tracker_url: Some(issue.web_url),
        created_at: issue.created_at,
        resolved_at: issue.closed_at,
        labels: issue.labels,
    }
}

#[async_trait]
impl TicketSource for TrackerSource {
    fn name(&self) -> &'static str {
        "tracker"
    }

    async fn list(&self, filter: &ClientFilter) -> Result<Vec<DeskTicket>> {
        let issues = self.tracker.list_issues().await?;
        debug!(count = issues.len(), "fetched GitLab issues");
        Ok(issues
            .into_iter()
            .map(|issue| to_ticket(issue, Vec::new()))
            .filter(|t| filter.matches(t))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<DeskTicket> {
        let iid = parse_iid(key)?;
        let (issue, notes) = tokio::join!(self.tracker.get_issue(iid), self.tracker.list_notes(iid));
        Ok(to_ticket(issue?, notes?))
    }

    async fn create(&self, draft: &CreateTicketRequest) -> Result<DeskTicket> {
        draft.validate().map_err(DeskError::from)?;
        let issue_draft = IssueDraft {
            title: draft.title.clone(),
            description: compose_description(draft),
            labels: vec![
                draft.priority.to_string(),
                draft.service.to_string(),
                draft.category.to_string(),
            ],
        };
        let issue = written(self.tracker.create_issue(&issue_draft).await)?;
        info!(issue_id = issue.iid, "created GitLab issue");
        Ok(to_ticket(issue, Vec::new()))
    }

    async fn update(&self, key: &str, changes: &UpdateTicketRequest) -> Result<DeskTicket> {
        let iid = parse_iid(key)?;
        changes.validate().map_err(DeskError::from)?;
        if changes.assigned_to.is_some()
            || changes.escalation_level.is_some()
            || changes.affected_user.is_some()
        {
            return Err(DeskError::Tracker(
                "assignee, escalation and affected user cannot be stored on a GitLab issue"
                    .to_string(),
            )
            .into());
        }

        let mut issue_changes = IssueChanges {
            state_event: changes.status.and_then(StateEvent::for_status),
            title: changes.title.clone(),
            description: changes.description.clone(),
            labels: None,
        };
        if changes.priority.is_some() || changes.service.is_some() || changes.category.is_some() {
            let mut labels = self.tracker.get_issue(iid).await?.labels;
            if let Some(priority) = changes.priority {
                swap_label::<Priority>(&mut labels, priority.as_str());
            }
            if let Some(service) = changes.service {
                swap_label::<BusinessService>(&mut labels, service.as_str());
            }
            if let Some(category) = changes.category {
                swap_label::<Category>(&mut labels, category.as_str());
            }
            issue_changes.labels = Some(labels);
        }

        if issue_changes.is_empty() {
            return self.get(key).await;
        }
        let issue = written(self.tracker.update_issue(iid, &issue_changes).await)?;
        let notes = self.tracker.list_notes(iid).await?;
        Ok(to_ticket(issue, notes))
    }

    async fn add_comment(&self, key: &str, comment: &CreateCommentRequest) -> Result<DeskTicket> {
        let iid = parse_iid(key)?;
        comment.validate().map_err(DeskError::from)?;
        let body = note_body(&comment.author, &comment.content, comment.is_internal);
        written(self.tracker.add_note(iid, &body).await)?;
        self.get(key).await
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(DeskError::Tracker("GitLab issues cannot be deleted from the desk".to_string()).into())
    }
}
