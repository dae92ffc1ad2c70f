//! Service desk back-end.
//!
//! ## Overview
//!
//! Tickets, their comments and the business-service catalog live in SQLite.
//! Every ticket is mirrored as an issue in a GitLab project on a best-effort
//! basis: a tracker failure is logged and reported as a `null` link, never as
//! a failed request.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │  (desk)  │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                │                       │
//!                       │         │ DbHandle       │ IssueTracker          │
//!                       │         v                v                       │
//!                       │  db.rs (SQLite)    gitlab.rs (GitLab REST)       │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                              |
//! |-----------|-------------------------------------------------------------|
//! | `models`  | Stored records (`Ticket`, `Comment`, `Service`) and inputs  |
//! | `catalog` | Default service catalog and demo tickets                    |
//!
//! ## Typical Request Flow (create ticket)
//!
//! 1. `POST /api/tickets` → `api::create_ticket()`; the body is rejected with
//!    a 400 unless it matches `CreateTicketRequest` exactly.
//! 2. The ticket is inserted with status `Open` and escalation `L1` unless
//!    given.
//! 3. `IssueTracker::create_issue()` posts title, description and the
//!    service as label. On success the issue id and URL are stored on the
//!    ticket.
//! 4. The response is the stored ticket plus `gitlab: {issueId, issueUrl}`
//!    or `gitlab: null`.

pub mod api;
pub mod catalog;
pub mod db;
pub mod gitlab;
pub mod models;
pub mod server;
