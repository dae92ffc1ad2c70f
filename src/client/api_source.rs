use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::debug;

use desk_common::{
    CreateCommentRequest, CreateTicketRequest, CreatedTicketResponse, ErrorBody, TicketResponse,
    UpdateTicketRequest,
};

use super::source::{ClientFilter, DeskTicket, TicketSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tickets served by the desk's REST API.
#[derive(Debug, Clone)]
pub struct ApiSource {
    http: reqwest::Client,
    base_url: String,
}

impl ApiSource {
    /// `base_url` includes the `/api` prefix, e.g. `http://localhost:5000/api`.
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build API HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn ticket_url(&self, key: &str) -> String {
        self.url(&format!("/tickets/{}", key))
    }
}

/// Turn a non-2xx response into an error carrying the server's `message`.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    bail!("{} ({})", message, status)
}

#[async_trait]
impl TicketSource for ApiSource {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn list(&self, filter: &ClientFilter) -> Result<Vec<DeskTicket>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(status) = filter.status {
            query.push(("status", status.as_str()));
        }
        if let Some(priority) = filter.priority {
            query.push(("priority", priority.as_str()));
        }
        if let Some(service) = filter.service {
            query.push(("service", service.as_str()));
        }
        debug!(?query, "listing tickets");

        let resp = self
            .http
            .get(self.url("/tickets"))
            .query(&query)
            .send()
            .await
            .context("Failed to reach the service desk API")?;
        let tickets: Vec<TicketResponse> = check_status(resp)
            .await?
            .json()
            .await
            .context("Failed to parse ticket list")?;
        Ok(tickets.into_iter().map(DeskTicket::from).collect())
    }

    async fn get(&self, key: &str) -> Result<DeskTicket> {
        let resp = self
            .http
            .get(self.ticket_url(key))
            .send()
            .await
            .context("Failed to reach the service desk API")?;
        let ticket: TicketResponse = check_status(resp)
            .await?
            .json()
            .await
            .context("Failed to parse ticket")?;
        Ok(ticket.into())
    }

    async fn create(&self, draft: &CreateTicketRequest) -> Result<DeskTicket> {
        let resp = self
            .http
            .post(self.url("/tickets"))
            .json(draft)
            .send()
            .await
            .context("Failed to reach the service desk API")?;
        let created: CreatedTicketResponse = check_status(resp)
            .await?
            .json()
            .await
            .context("Failed to parse created ticket")?;
        let mut ticket = DeskTicket::from(created.ticket);
        if ticket.tracker_url.is_none() {
            ticket.tracker_url = created.gitlab.map(|link| link.issue_url);
        }
        Ok(ticket)
    }

    async fn update(&self, key: &str, changes: &UpdateTicketRequest) -> Result<DeskTicket> {
        let resp = self
            .http
            .put(self.ticket_url(key))
            .json(changes)
            .send()
            .await
            .context("Failed to reach the service desk API")?;
        let ticket: TicketResponse = check_status(resp)
            .await?
            .json()
            .await
            .context("Failed to parse ticket")?;
        Ok(ticket.into())
    }

    async fn add_comment(&self, key: &str, comment: &CreateCommentRequest) -> Result<DeskTicket> {
        let resp = self
            .http
            .post(format!("{}/comments", self.ticket_url(key)))
            .json(comment)
            .send()
            .await
            .context("Failed to reach the service desk API")?;
        let ticket: TicketResponse = check_status(resp)
            .await?
            .json()
            .await
            .context("Failed to parse ticket")?;
        Ok(ticket.into())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.ticket_url(key))
            .send()
            .await
            .context("Failed to reach the service desk API")?;
        check_status(resp).await?;
        Ok(())
    }
}
