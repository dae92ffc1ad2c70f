//! Ticket client commands: `desk tickets`.

use std::sync::Arc;

use anyhow::{Result, bail};
use console::style;

use desk_common::{
    AffectedUser, CreateCommentRequest, CreateTicketRequest, UpdateTicketRequest,
};
use servicedesk::client::views::{self, BoardFilter};
use servicedesk::client::{ApiSource, ClientFilter, TicketSource, TicketStore, TrackerSource};
use servicedesk::config::DeskConfig;
use servicedesk::desk::server::build_tracker;

use super::super::{SourceKind, TicketCommands};

const DEFAULT_WIDTH: usize = 80;

fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| w as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

fn open_source(config: &DeskConfig, kind: SourceKind) -> Result<Box<dyn TicketSource>> {
    match kind {
        SourceKind::Api => Ok(Box::new(ApiSource::new(&config.client.api_url)?)),
        SourceKind::Tracker => {
            if !config.tracker.is_configured() {
                bail!("The tracker source needs a GitLab token (GITLAB_TOKEN or tracker.token)");
            }
            let tracker = build_tracker(&config.tracker)?;
            Ok(Box::new(TrackerSource::new(Arc::clone(&tracker))))
        }
    }
}

pub async fn cmd_tickets(config: &DeskConfig, kind: SourceKind, command: TicketCommands) -> Result<()> {
    let mut store = TicketStore::new(open_source(config, kind)?);

    match command {
        TicketCommands::Dashboard => {
            store.fetch_all(&ClientFilter::default()).await?;
            print!("{}", views::dashboard(&store.tickets, store.source_name()));
        }
        TicketCommands::Board {
            priority,
            label,
            status,
            service,
        } => {
            let filter = ClientFilter {
                status,
                priority: None,
                service,
            };
            store.fetch_all(&filter).await?;
            print!(
                "{}",
                views::board(&store.tickets, &BoardFilter { priority, label })
            );
        }
        TicketCommands::Stats => {
            store.fetch_all(&ClientFilter::default()).await?;
            print!("{}", views::statistics(&store.tickets));
        }
        TicketCommands::Show { key, internal } => {
            let ticket = store.fetch_one(&key).await?;
            print!("{}", views::detail(&ticket, internal, terminal_width()));
        }
        TicketCommands::Create {
            title,
            description,
            service,
            category,
            priority,
            user_name,
            user_email,
            user_role,
            assign,
            escalation,
        } => {
            let draft = CreateTicketRequest {
                title,
                description,
                service,
                category,
                priority: priority.unwrap_or_default(),
                status: None,
                affected_user: AffectedUser {
                    name: user_name,
                    email: user_email,
                    role: user_role,
                },
                assigned_to: assign,
                escalation_level: escalation,
            };
            let ticket = store.create(&draft).await?;
            println!(
                "{} Created ticket {}",
                style("✓").green(),
                style(&ticket.key).bold()
            );
            match &ticket.tracker_url {
                Some(url) => println!("  GitLab: {}", url),
                None if kind == SourceKind::Api => {
                    println!("  {}", style("Not mirrored to GitLab").dim())
                }
                None => {}
            }
        }
        TicketCommands::Update {
            key,
            title,
            description,
            service,
            category,
            priority,
            status,
            assign,
            unassign,
            escalation,
        } => {
            let assigned_to = if unassign { Some(None) } else { assign.map(Some) };
            let changes = UpdateTicketRequest {
                title,
                description,
                service,
                category,
                priority,
                status,
                affected_user: None,
                assigned_to,
                escalation_level: escalation,
            };
            if changes.is_empty() {
                bail!("Nothing to update: pass at least one field");
            }
            let ticket = store.update(&key, &changes).await?;
            println!(
                "{} Updated ticket {} ({})",
                style("✓").green(),
                style(&ticket.key).bold(),
                ticket.status
            );
        }
        TicketCommands::Comment {
            key,
            author,
            content,
            internal,
        } => {
            let comment = CreateCommentRequest {
                author,
                content,
                is_internal: internal,
            };
            let ticket = store.add_comment(&key, &comment).await?;
            println!(
                "{} Comment added to {} ({} comments)",
                style("✓").green(),
                style(&ticket.key).bold(),
                ticket.comments.len()
            );
        }
        TicketCommands::Delete { key } => {
            store.delete(&key).await?;
            println!("{} Ticket {} deleted", style("✓").green(), key);
        }
    }
    Ok(())
}
