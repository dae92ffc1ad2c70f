use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use desk_common::*;

use super::models::*;
use crate::errors::DeskError;

/// Async-safe handle to the service desk database.
///
/// Wraps `DeskDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<DeskDb>>,
}

impl DbHandle {
    pub fn new(db: DeskDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&DeskDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| DeskError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct DeskDb {
    conn: Connection,
}

const TICKET_COLUMNS: &str = "id, title, description, service, category, priority, status,
     affected_user_name, affected_user_email, affected_user_role, assigned_to,
     escalation_level, resolved_at, gitlab_issue_id, gitlab_issue_url, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, ticket_id, author, content, is_internal, created_at, updated_at";

const SERVICE_COLUMNS: &str = "id, name, description, criticality, sla_response_time,
     sla_resolution_time, active, created_at, updated_at";

impl DeskDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        let sql = format!(
            "
            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                description TEXT NOT NULL,
                service TEXT NOT NULL CHECK (service IN ({services})),
                category TEXT NOT NULL CHECK (category IN ({categories})),
                priority TEXT NOT NULL DEFAULT 'P3' CHECK (priority IN ({priorities})),
                status TEXT NOT NULL DEFAULT 'Open' CHECK (status IN ({statuses})),
                affected_user_name TEXT NOT NULL,
                affected_user_email TEXT NOT NULL,
                affected_user_role TEXT NOT NULL CHECK (affected_user_role IN ({roles})),
                assigned_to TEXT,
                escalation_level TEXT NOT NULL DEFAULT 'L1' CHECK (escalation_level IN ({levels})),
                resolved_at TEXT,
                gitlab_issue_id INTEGER,
                gitlab_issue_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY NOT NULL,
                ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                author TEXT NOT NULL,
                content TEXT NOT NULL,
                is_internal INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                criticality TEXT NOT NULL CHECK (criticality IN ({criticalities})),
                sla_response_time INTEGER NOT NULL,
                sla_resolution_time INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_tickets_priority ON tickets(priority);
            CREATE INDEX IF NOT EXISTS idx_tickets_service ON tickets(service);
            CREATE INDEX IF NOT EXISTS idx_tickets_created ON tickets(created_at);
            CREATE INDEX IF NOT EXISTS idx_tickets_gitlab_issue ON tickets(gitlab_issue_id);
            CREATE INDEX IF NOT EXISTS idx_comments_ticket ON comments(ticket_id);
            CREATE INDEX IF NOT EXISTS idx_comments_created ON comments(created_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_services_name ON services(name);
            ",
            services = sql_list(&BusinessService::ALL),
            categories = sql_list(&Category::ALL),
            priorities = sql_list(&Priority::ALL),
            statuses = sql_list(&TicketStatus::ALL),
            roles = sql_list(&UserRole::ALL),
            levels = sql_list(&EscalationLevel::ALL),
            criticalities = sql_list(&Criticality::ALL),
        );
        self.conn
            .execute_batch(&sql)
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Tickets ──────────────────────────────────────────────────────

    pub fn create_ticket(&self, new: &NewTicket) -> Result<Ticket> {
        let id = Uuid::new_v4();
        let now = timestamp(Utc::now());
        self.conn
            .execute(
                "INSERT INTO tickets (id, title, description, service, category, priority, status,
                     affected_user_name, affected_user_email, affected_user_role, assigned_to,
                     escalation_level, resolved_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
                params![
                    id.to_string(),
                    new.title,
                    new.description,
                    new.service.as_str(),
                    new.category.as_str(),
                    new.priority.as_str(),
                    new.status.as_str(),
                    new.affected_user.name,
                    new.affected_user.email,
                    new.affected_user.role.as_str(),
                    new.assigned_to,
                    new.escalation_level.as_str(),
                    new.resolved_at.map(timestamp),
                    now,
                ],
            )
            .context("Failed to insert ticket")?;
        self.get_ticket(id)?
            .context("Ticket not found after insert")
    }

    pub fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id.to_string()], TicketRow::read)
            .optional()
            .context("Failed to query ticket")?;
        row.map(TicketRow::into_ticket).transpose()
    }

    pub fn get_ticket_detail(&self, id: Uuid) -> Result<Option<TicketDetail>> {
        let Some(ticket) = self.get_ticket(id)? else {
            return Ok(None);
        };
        let comments = self.list_comments(id)?;
        Ok(Some(TicketDetail { ticket, comments }))
    }

    /// Tickets matching every set filter, newest first, each with its
    /// comments oldest first.
    pub fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketDetail>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(priority) = filter.priority {
            clauses.push("priority = ?");
            values.push(Value::Text(priority.as_str().to_string()));
        }
        if let Some(service) = filter.service {
            clauses.push("service = ?");
            values.push(Value::Text(service.as_str().to_string()));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets {where_clause} ORDER BY created_at DESC, rowid DESC"
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_tickets")?;
        let rows = stmt
            .query_map(params_from_iter(values), TicketRow::read)
            .context("Failed to query tickets")?;
        let mut tickets = Vec::new();
        for row in rows {
            let ticket = row.context("Failed to read ticket row")?.into_ticket()?;
            let comments = self.list_comments(ticket.id)?;
            tickets.push(TicketDetail { ticket, comments });
        }
        Ok(tickets)
    }

    /// Apply a partial update. Returns `None` when no ticket has this id.
    pub fn update_ticket(&self, id: Uuid, patch: &TicketPatch) -> Result<Option<TicketDetail>> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        let mut set = |column: &'static str, value: Value| {
            sets.push(column);
            values.push(value);
        };
        if let Some(title) = &patch.title {
            set("title = ?", Value::Text(title.clone()));
        }
        if let Some(description) = &patch.description {
            set("description = ?", Value::Text(description.clone()));
        }
        if let Some(service) = patch.service {
            set("service = ?", text(service));
        }
        if let Some(category) = patch.category {
            set("category = ?", text(category));
        }
        if let Some(priority) = patch.priority {
            set("priority = ?", text(priority));
        }
        if let Some(status) = patch.status {
            set("status = ?", text(status));
        }
        if let Some(name) = &patch.affected_user_name {
            set("affected_user_name = ?", Value::Text(name.clone()));
        }
        if let Some(email) = &patch.affected_user_email {
            set("affected_user_email = ?", Value::Text(email.clone()));
        }
        if let Some(role) = patch.affected_user_role {
            set("affected_user_role = ?", text(role));
        }
        if let Some(assignee) = &patch.assigned_to {
            let value = assignee.clone().map_or(Value::Null, Value::Text);
            set("assigned_to = ?", value);
        }
        if let Some(level) = patch.escalation_level {
            set("escalation_level = ?", text(level));
        }
        if let Some(resolved_at) = patch.resolved_at {
            set("resolved_at = ?", Value::Text(timestamp(resolved_at)));
        }
        set("updated_at = ?", Value::Text(timestamp(Utc::now())));
        values.push(Value::Text(id.to_string()));

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let changed = tx
            .execute(
                &format!("UPDATE tickets SET {} WHERE id = ?", sets.join(", ")),
                params_from_iter(values),
            )
            .context("Failed to update ticket")?;
        if changed == 0 {
            return Ok(None);
        }
        tx.commit().context("Failed to commit ticket update")?;
        self.get_ticket_detail(id)
    }

    /// Record the tracker issue mirroring this ticket.
    pub fn set_tracker_link(&self, id: Uuid, link: &TrackerLink) -> Result<Option<Ticket>> {
        let changed = self
            .conn
            .execute(
                "UPDATE tickets SET gitlab_issue_id = ?1, gitlab_issue_url = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![
                    link.issue_id,
                    link.issue_url,
                    timestamp(Utc::now()),
                    id.to_string()
                ],
            )
            .context("Failed to store tracker link")?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_ticket(id)
    }

    /// Delete a ticket and, through the cascade, its comments.
    pub fn delete_ticket(&self, id: Uuid) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM tickets WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete ticket")?;
        Ok(changed > 0)
    }

    pub fn count_tickets(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))
            .context("Failed to count tickets")
    }

    // ── Comments ─────────────────────────────────────────────────────

    /// Append a comment. Returns `None` when the ticket does not exist.
    pub fn add_comment(&self, ticket_id: Uuid, new: &NewComment) -> Result<Option<Comment>> {
        if self.get_ticket(ticket_id)?.is_none() {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        let now = timestamp(Utc::now());
        self.conn
            .execute(
                "INSERT INTO comments (id, ticket_id, author, content, is_internal, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    ticket_id.to_string(),
                    new.author,
                    new.content,
                    new.is_internal,
                    now
                ],
            )
            .context("Failed to insert comment")?;
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id.to_string()], CommentRow::read)
            .context("Comment not found after insert")?;
        Ok(Some(row.into_comment()?))
    }

    /// Comments of one ticket, oldest first.
    pub fn list_comments(&self, ticket_id: Uuid) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE ticket_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_comments")?;
        let rows = stmt
            .query_map(params![ticket_id.to_string()], CommentRow::read)
            .context("Failed to query comments")?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row.context("Failed to read comment row")?.into_comment()?);
        }
        Ok(comments)
    }

    // ── Services ─────────────────────────────────────────────────────

    /// Active services, ordered by name.
    pub fn list_active_services(&self) -> Result<Vec<Service>> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE active = 1 ORDER BY name");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_active_services")?;
        let rows = stmt
            .query_map([], ServiceRow::read)
            .context("Failed to query services")?;
        let mut services = Vec::new();
        for row in rows {
            services.push(row.context("Failed to read service row")?.into_service()?);
        }
        Ok(services)
    }

    pub fn service_name_exists(&self, name: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM services WHERE name = ?1)",
                params![name],
                |row| row.get(0),
            )
            .context("Failed to check service name")
    }

    pub fn create_service(&self, new: &NewService) -> Result<Service> {
        Self::insert_service(&self.conn, new)
    }

    pub fn count_services(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))
            .context("Failed to count services")
    }

    /// Insert `catalog` when the services table is empty. Returns how many
    /// rows were inserted; 0 means services already existed.
    pub fn initialize_services(&self, catalog: &[NewService]) -> Result<usize> {
        if self.count_services()? > 0 {
            return Ok(0);
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        for service in catalog {
            Self::insert_service(&tx, service)?;
        }
        tx.commit().context("Failed to commit service catalog")?;
        Ok(catalog.len())
    }

    fn insert_service(conn: &Connection, new: &NewService) -> Result<Service> {
        let id = Uuid::new_v4();
        let now = timestamp(Utc::now());
        conn.execute(
            "INSERT INTO services (id, name, description, criticality, sla_response_time,
                 sla_resolution_time, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id.to_string(),
                new.name,
                new.description,
                new.criticality.as_str(),
                new.sla.response_time,
                new.sla.resolution_time,
                new.active,
                now
            ],
        )
        .with_context(|| format!("Failed to insert service '{}'", new.name))?;
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1");
        conn.query_row(&sql, params![id.to_string()], ServiceRow::read)
            .context("Service not found after insert")?
            .into_service()
    }
}

/// `'A', 'B', ...` for a CHECK constraint.
fn sql_list<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn text<T: Display>(value: T) -> Value {
    Value::Text(value.to_string())
}

/// RFC 3339 with a fixed microsecond width so TEXT ordering is chronological.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp '{}'", s))?
        .with_timezone(&Utc))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("Invalid id '{}'", s))
}

fn parse_enum<T: FromStr<Err = String>>(s: &str, what: &str) -> Result<T> {
    T::from_str(s)
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("Failed to parse {}", what))
}

/// Intermediate row struct for reading tickets from SQLite before converting
/// the enum strings and timestamps into typed values.
struct TicketRow {
    id: String,
    title: String,
    description: String,
    service: String,
    category: String,
    priority: String,
    status: String,
    affected_user_name: String,
    affected_user_email: String,
    affected_user_role: String,
    assigned_to: Option<String>,
    escalation_level: String,
    resolved_at: Option<String>,
    gitlab_issue_id: Option<i64>,
    gitlab_issue_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TicketRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            service: row.get(3)?,
            category: row.get(4)?,
            priority: row.get(5)?,
            status: row.get(6)?,
            affected_user_name: row.get(7)?,
            affected_user_email: row.get(8)?,
            affected_user_role: row.get(9)?,
            assigned_to: row.get(10)?,
            escalation_level: row.get(11)?,
            resolved_at: row.get(12)?,
            gitlab_issue_id: row.get(13)?,
            gitlab_issue_url: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_ticket(self) -> Result<Ticket> {
        let tracker = match (self.gitlab_issue_id, self.gitlab_issue_url) {
            (Some(issue_id), Some(issue_url)) => Some(TrackerLink {
                issue_id,
                issue_url,
            }),
            _ => None,
        };
        Ok(Ticket {
            id: parse_uuid(&self.id)?,
            title: self.title,
            description: self.description,
            service: parse_enum(&self.service, "ticket service")?,
            category: parse_enum(&self.category, "ticket category")?,
            priority: parse_enum(&self.priority, "ticket priority")?,
            status: parse_enum(&self.status, "ticket status")?,
            affected_user: AffectedUser {
                name: self.affected_user_name,
                email: self.affected_user_email,
                role: parse_enum(&self.affected_user_role, "affected user role")?,
            },
            assigned_to: self.assigned_to,
            escalation_level: parse_enum(&self.escalation_level, "escalation level")?,
            resolved_at: self.resolved_at.as_deref().map(parse_timestamp).transpose()?,
            tracker,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct CommentRow {
    id: String,
    ticket_id: String,
    author: String,
    content: String,
    is_internal: bool,
    created_at: String,
    updated_at: String,
}

impl CommentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            author: row.get(2)?,
            content: row.get(3)?,
            is_internal: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_comment(self) -> Result<Comment> {
        Ok(Comment {
            id: parse_uuid(&self.id)?,
            ticket_id: parse_uuid(&self.ticket_id)?,
            author: self.author,
            content: self.content,
            is_internal: self.is_internal,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct ServiceRow {
    id: String,
    name: String,
    description: String,
    criticality: String,
    sla_response_time: u32,
    sla_resolution_time: u32,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl ServiceRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            criticality: row.get(3)?,
            sla_response_time: row.get(4)?,
            sla_resolution_time: row.get(5)?,
            active: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_service(self) -> Result<Service> {
        Ok(Service {
            id: parse_uuid(&self.id)?,
            name: self.name,
            description: self.description,
            criticality: parse_enum(&self.criticality, "service criticality")?,
            sla: Sla {
                response_time: self.sla_response_time,
                resolution_time: self.sla_resolution_time,
            },
            active: self.active,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
