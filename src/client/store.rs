use anyhow::Result;
use tracing::warn;

use desk_common::{CreateCommentRequest, CreateTicketRequest, UpdateTicketRequest};

use super::source::{ClientFilter, DeskTicket, TicketSource};

/// The client's ticket collection and its loading/error flags.
///
/// Every operation is one round-trip to the source. A failure sets `error`
/// and is also returned so the caller can report it.
pub struct TicketStore {
    source: Box<dyn TicketSource>,
    pub tickets: Vec<DeskTicket>,
    pub loading: bool,
    pub error: Option<String>,
}

impl TicketStore {
    pub fn new(source: Box<dyn TicketSource>) -> Self {
        Self {
            source,
            tickets: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        self.loading = false;
        match &result {
            Ok(_) => self.error = None,
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(source = self.source.name(), error = %message, "ticket operation failed");
                self.error = Some(message);
            }
        }
        result
    }

    fn replace(&mut self, ticket: DeskTicket) {
        match self.tickets.iter_mut().find(|t| t.key == ticket.key) {
            Some(slot) => *slot = ticket,
            None => self.tickets.insert(0, ticket),
        }
    }

    pub fn find(&self, key: &str) -> Option<&DeskTicket> {
        self.tickets.iter().find(|t| t.key == key)
    }

    pub async fn fetch_all(&mut self, filter: &ClientFilter) -> Result<&[DeskTicket]> {
        self.loading = true;
        let result = self.source.list(filter).await;
        let tickets = self.settle(result)?;
        self.tickets = tickets;
        Ok(&self.tickets)
    }

    /// Load one ticket with its comments into the collection.
    pub async fn fetch_one(&mut self, key: &str) -> Result<DeskTicket> {
        self.loading = true;
        let result = self.source.get(key).await;
        let ticket = self.settle(result)?;
        self.replace(ticket.clone());
        Ok(ticket)
    }

    /// New tickets go to the front.
    pub async fn create(&mut self, draft: &CreateTicketRequest) -> Result<DeskTicket> {
        self.loading = true;
        let result = self.source.create(draft).await;
        let ticket = self.settle(result)?;
        self.tickets.insert(0, ticket.clone());
        Ok(ticket)
    }

    pub async fn update(&mut self, key: &str, changes: &UpdateTicketRequest) -> Result<DeskTicket> {
        self.loading = true;
        let result = self.source.update(key, changes).await;
        let ticket = self.settle(result)?;
        self.replace(ticket.clone());
        Ok(ticket)
    }

    pub async fn add_comment(
        &mut self,
        key: &str,
        comment: &CreateCommentRequest,
    ) -> Result<DeskTicket> {
        self.loading = true;
        let result = self.source.add_comment(key, comment).await;
        let ticket = self.settle(result)?;
        self.replace(ticket.clone());
        Ok(ticket)
    }

    pub async fn delete(&mut self, key: &str) -> Result<()> {
        self.loading = true;
        let result = self.source.delete(key).await;
        self.settle(result)?;
        self.tickets.retain(|t| t.key != key);
        Ok(())
    }
}
