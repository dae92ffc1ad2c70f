//! Built-in data: the default service catalog and the sample tickets used to
//! populate a demo database.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use desk_common::*;

use super::db::DeskDb;
use super::models::{NewComment, NewService, NewTicket};

/// The seven business services every deployment starts with.
pub fn default_services() -> Vec<NewService> {
    [
        (
            BusinessService::Authentication,
            "Authentication and access system",
            Criticality::Critical,
            2,
            4,
        ),
        (
            BusinessService::Catalog,
            "Product catalog",
            Criticality::Medium,
            8,
            24,
        ),
        (
            BusinessService::OrderCreation,
            "Order creation system",
            Criticality::Critical,
            2,
            4,
        ),
        (
            BusinessService::Inventory,
            "Inventory management",
            Criticality::Critical,
            2,
            4,
        ),
        (
            BusinessService::Tracking,
            "Production and order tracking",
            Criticality::High,
            4,
            8,
        ),
        (
            BusinessService::UxUi,
            "User interface and experience",
            Criticality::Medium,
            8,
            24,
        ),
        (
            BusinessService::OrderViewing,
            "Order viewing and follow-up",
            Criticality::High,
            4,
            8,
        ),
    ]
    .into_iter()
    .map(
        |(service, description, criticality, response_time, resolution_time)| NewService {
            name: service.as_str().to_string(),
            description: description.to_string(),
            criticality,
            sla: Sla {
                response_time,
                resolution_time,
            },
            active: true,
        },
    )
    .collect()
}

/// A demo ticket and the comments appended to it after creation.
pub struct SampleTicket {
    pub ticket: NewTicket,
    pub comments: Vec<NewComment>,
}

struct Sample {
    title: &'static str,
    description: &'static str,
    service: BusinessService,
    category: Category,
    priority: Priority,
    status: TicketStatus,
    user: (&'static str, &'static str, UserRole),
    assigned_to: &'static str,
    escalation_level: EscalationLevel,
    resolved_hours_ago: Option<i64>,
    comment: Option<(&'static str, &'static str, bool)>,
}

const SAMPLES: [Sample; 6] = [
    Sample {
        title: "Fabric inventory update fails",
        description: "The system does not allow updating fabric quantities in inventory. \
                      Saving the changes returns a 500 error.",
        service: BusinessService::Inventory,
        category: Category::Incident,
        priority: Priority::P1,
        status: TicketStatus::Open,
        user: (
            "María González",
            "maria.gonzalez@uniformes.com",
            UserRole::AdministrativeStaff,
        ),
        assigned_to: "Technical Support L2",
        escalation_level: EscalationLevel::L2,
        resolved_hours_ago: None,
        comment: None,
    },
    Sample {
        title: "Customer cannot see the tracking of their order",
        description: "The customer reports that their portal does not show the current \
                      state of order #12345.",
        service: BusinessService::Tracking,
        category: Category::Incident,
        priority: Priority::P2,
        status: TicketStatus::InProgress,
        user: ("Juan Pérez", "juan.perez@cliente.com", UserRole::Customer),
        assigned_to: "Carlos Méndez",
        escalation_level: EscalationLevel::L1,
        resolved_hours_ago: None,
        comment: Some((
            "Carlos Méndez",
            "Investigating. Looks like a data synchronization error.",
            true,
        )),
    },
    Sample {
        title: "Request for a new product type in the catalog",
        description: "The customer asks to add polo shirts to the available product catalog.",
        service: BusinessService::Catalog,
        category: Category::ServiceRequest,
        priority: Priority::P3,
        status: TicketStatus::Waiting,
        user: (
            "Ana Martínez",
            "ana.martinez@ventas.com",
            UserRole::SalesStaff,
        ),
        assigned_to: "Product Team",
        escalation_level: EscalationLevel::L2,
        resolved_hours_ago: None,
        comment: None,
    },
    Sample {
        title: "Improve the viewing interface",
        description: "Users report that the interface is confusing in some modules.",
        service: BusinessService::UxUi,
        category: Category::Incident,
        priority: Priority::P2,
        status: TicketStatus::Resolved,
        user: (
            "Luis Ramírez",
            "luis.ramirez@soporte.com",
            UserRole::AdministrativeStaff,
        ),
        assigned_to: "Development Team",
        escalation_level: EscalationLevel::L2,
        resolved_hours_ago: Some(24),
        comment: Some((
            "Development Team",
            "Database queries were optimized and a cache was added.",
            false,
        )),
    },
    Sample {
        title: "Question about the corporate order process",
        description: "How does ordering work for companies with more than 500 uniforms?",
        service: BusinessService::OrderCreation,
        category: Category::Inquiry,
        priority: Priority::P4,
        status: TicketStatus::Closed,
        user: (
            "Roberto Castillo",
            "roberto.castillo@empresa.com",
            UserRole::Customer,
        ),
        assigned_to: "Support L1",
        escalation_level: EscalationLevel::L1,
        resolved_hours_ago: Some(48),
        comment: Some((
            "Support L1",
            "Sent the corporate ordering documentation to the customer.",
            false,
        )),
    },
    Sample {
        title: "Authentication error in the internal system",
        description: "Production workers cannot sign in to the system since this morning.",
        service: BusinessService::Authentication,
        category: Category::Incident,
        priority: Priority::P1,
        status: TicketStatus::InProgress,
        user: (
            "Sandra López",
            "sandra.lopez@produccion.com",
            UserRole::ProductionStaff,
        ),
        assigned_to: "Infrastructure Team",
        escalation_level: EscalationLevel::L3,
        resolved_hours_ago: None,
        comment: Some((
            "Infrastructure Team",
            "Found a problem on the authentication server. Applying a fix.",
            true,
        )),
    },
];

/// The six demo tickets, with resolution times relative to `now`.
pub fn sample_tickets(now: DateTime<Utc>) -> Vec<SampleTicket> {
    SAMPLES
        .iter()
        .map(|s| SampleTicket {
            ticket: NewTicket {
                title: s.title.to_string(),
                description: s.description.to_string(),
                service: s.service,
                category: s.category,
                priority: s.priority,
                status: s.status,
                affected_user: AffectedUser {
                    name: s.user.0.to_string(),
                    email: s.user.1.to_string(),
                    role: s.user.2,
                },
                assigned_to: Some(s.assigned_to.to_string()),
                escalation_level: s.escalation_level,
                resolved_at: s.resolved_hours_ago.map(|h| now - Duration::hours(h)),
            },
            comments: s
                .comment
                .iter()
                .map(|(author, content, is_internal)| NewComment {
                    author: author.to_string(),
                    content: content.to_string(),
                    is_internal: *is_internal,
                })
                .collect(),
        })
        .collect()
}

/// Insert the demo tickets when the tickets table is empty. Returns the
/// number of tickets inserted.
pub fn seed_samples(db: &DeskDb) -> Result<usize> {
    if db.count_tickets()? > 0 {
        info!("tickets already present, skipping samples");
        return Ok(0);
    }
    let samples = sample_tickets(Utc::now());
    for sample in &samples {
        let ticket = db.create_ticket(&sample.ticket)?;
        for comment in &sample.comments {
            db.add_comment(ticket.id, comment)?;
        }
    }
    Ok(samples.len())
}
