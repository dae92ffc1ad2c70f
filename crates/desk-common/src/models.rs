//! Enumerated ticket and service fields.
//!
//! Every enumeration has one canonical English wire value and, where the
//! Spanish-language deployments used one, a Spanish alias that is accepted on input and
//! normalized on write. Serde goes through `FromStr`, so a JSON body and a
//! query-string filter reject exactly the same values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Business services a ticket can be filed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BusinessService {
    Authentication,
    Catalog,
    OrderCreation,
    Inventory,
    Tracking,
    UxUi,
    OrderViewing,
}

impl BusinessService {
    pub const ALL: [Self; 7] = [
        Self::Authentication,
        Self::Catalog,
        Self::OrderCreation,
        Self::Inventory,
        Self::Tracking,
        Self::UxUi,
        Self::OrderViewing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication",
            Self::Catalog => "Catalog",
            Self::OrderCreation => "Order Creation",
            Self::Inventory => "Inventory",
            Self::Tracking => "Tracking",
            Self::UxUi => "UX/UI",
            Self::OrderViewing => "Order Viewing",
        }
    }
}

impl FromStr for BusinessService {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Authentication" | "Autenticación" => Ok(Self::Authentication),
            "Catalog" | "Catálogo" => Ok(Self::Catalog),
            "Order Creation" | "Creación de pedidos" => Ok(Self::OrderCreation),
            "Inventory" | "Inventario" => Ok(Self::Inventory),
            "Tracking" => Ok(Self::Tracking),
            "UX/UI" => Ok(Self::UxUi),
            "Order Viewing" | "Visualización de pedidos" => Ok(Self::OrderViewing),
            _ => Err(format!("Invalid service: {}", s)),
        }
    }
}

/// Kind of request a ticket represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Incident,
    ServiceRequest,
    Inquiry,
    Change,
}

impl Category {
    pub const ALL: [Self; 4] = [
        Self::Incident,
        Self::ServiceRequest,
        Self::Inquiry,
        Self::Change,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incident => "Incident",
            Self::ServiceRequest => "Service Request",
            Self::Inquiry => "Inquiry",
            Self::Change => "Change",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Incident" | "Incidente" => Ok(Self::Incident),
            "Service Request" | "Solicitud de Servicio" => Ok(Self::ServiceRequest),
            "Inquiry" | "Consulta" => Ok(Self::Inquiry),
            "Change" | "Cambio" => Ok(Self::Change),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }
}

/// Ticket priority, P1 most urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
    P1,
    P2,
    #[default]
    P3,
    P4,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::P1, Self::P2, Self::P3, Self::P4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
        }
    }

    /// Human label shown next to the code in views.
    pub fn label(&self) -> &'static str {
        match self {
            Self::P1 => "Critical",
            Self::P2 => "High",
            Self::P3 => "Medium",
            Self::P4 => "Low",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            "P4" => Ok(Self::P4),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Waiting,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [Self; 5] = [
        Self::Open,
        Self::InProgress,
        Self::Waiting,
        Self::Resolved,
        Self::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Waiting => "Waiting",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }

    /// Entering one of these statuses stamps the resolution timestamp.
    pub fn stamps_resolution(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Statuses counted as "open" on the dashboard.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress | Self::Waiting)
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" | "Abierto" => Ok(Self::Open),
            "In Progress" | "En Progreso" => Ok(Self::InProgress),
            "Waiting" | "En Espera" => Ok(Self::Waiting),
            "Resolved" | "Resuelto" => Ok(Self::Resolved),
            "Closed" | "Cerrado" => Ok(Self::Closed),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// Role of the user affected by a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UserRole {
    Customer,
    AdministrativeStaff,
    ProductionStaff,
    SalesStaff,
    Management,
}

impl UserRole {
    pub const ALL: [Self; 5] = [
        Self::Customer,
        Self::AdministrativeStaff,
        Self::ProductionStaff,
        Self::SalesStaff,
        Self::Management,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::AdministrativeStaff => "Administrative Staff",
            Self::ProductionStaff => "Production Staff",
            Self::SalesStaff => "Sales Staff",
            Self::Management => "Management",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Customer" | "Cliente" => Ok(Self::Customer),
            "Administrative Staff" | "Personal Administrativo" => Ok(Self::AdministrativeStaff),
            "Production Staff" | "Personal de Producción" => Ok(Self::ProductionStaff),
            "Sales Staff" | "Personal de Ventas" => Ok(Self::SalesStaff),
            "Management" | "Gerencia" => Ok(Self::Management),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Support tier, L1 lowest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum EscalationLevel {
    #[default]
    L1,
    L2,
    L3,
    L4,
}

impl EscalationLevel {
    pub const ALL: [Self; 4] = [Self::L1, Self::L2, Self::L3, Self::L4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
        }
    }
}

impl FromStr for EscalationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L1" => Ok(Self::L1),
            "L2" => Ok(Self::L2),
            "L3" => Ok(Self::L3),
            "L4" => Ok(Self::L4),
            _ => Err(format!("Invalid escalation level: {}", s)),
        }
    }
}

/// Business criticality of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Criticality {
    Critical,
    High,
    Medium,
    Low,
}

impl Criticality {
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl FromStr for Criticality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Critical" | "Crítica" => Ok(Self::Critical),
            "High" | "Alta" => Ok(Self::High),
            "Medium" | "Media" => Ok(Self::Medium),
            "Low" | "Baja" => Ok(Self::Low),
            _ => Err(format!("Invalid criticality: {}", s)),
        }
    }
}

// String conversions shared by every enum above: serde (try_from/into),
// Display, and the column codecs in the database layer all go through these.
macro_rules! string_conversions {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl TryFrom<String> for $ty {
                type Error = String;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.as_str().to_string()
                }
            }
        )*
    };
}

string_conversions!(
    BusinessService,
    Category,
    Priority,
    TicketStatus,
    UserRole,
    EscalationLevel,
    Criticality,
);

/// Snapshot of the person a ticket is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AffectedUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

/// Service-level targets, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Sla {
    pub response_time: u32,
    pub resolution_time: u32,
}

/// Reference to the issue mirroring a ticket in the external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerLink {
    pub issue_id: i64,
    pub issue_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in TicketStatus::ALL {
            let parsed: TicketStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("Pending".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_spanish_aliases_normalize() {
        assert_eq!("Cerrado".parse::<TicketStatus>().unwrap(), TicketStatus::Closed);
        assert_eq!("En Espera".parse::<TicketStatus>().unwrap(), TicketStatus::Waiting);
        assert_eq!(
            "Creación de pedidos".parse::<BusinessService>().unwrap(),
            BusinessService::OrderCreation
        );
        assert_eq!(
            "Solicitud de Servicio".parse::<Category>().unwrap(),
            Category::ServiceRequest
        );
        assert_eq!("Gerencia".parse::<UserRole>().unwrap(), UserRole::Management);
        assert_eq!("Crítica".parse::<Criticality>().unwrap(), Criticality::Critical);

        // Normalized on the way out.
        let json = serde_json::to_string(&"Abierto".parse::<TicketStatus>().unwrap()).unwrap();
        assert_eq!(json, "\"Open\"");
    }

    #[test]
    fn test_values_are_case_sensitive() {
        assert!("open".parse::<TicketStatus>().is_err());
        assert!("p1".parse::<Priority>().is_err());
        assert!("inventory".parse::<BusinessService>().is_err());
    }

    #[test]
    fn test_serde_rejects_unknown_value() {
        let err = serde_json::from_str::<Priority>("\"P5\"").unwrap_err();
        assert!(err.to_string().contains("Invalid priority: P5"));

        let err = serde_json::from_str::<EscalationLevel>("\"L0\"").unwrap_err();
        assert!(err.to_string().contains("Invalid escalation level"));

        let err = serde_json::from_str::<Category>("\"Complaint\"").unwrap_err();
        assert!(err.to_string().contains("Invalid category: Complaint"));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Priority::default(), Priority::P3);
        assert_eq!(TicketStatus::default(), TicketStatus::Open);
        assert_eq!(EscalationLevel::default(), EscalationLevel::L1);
    }

    #[test]
    fn test_resolution_statuses() {
        let stamping: Vec<_> = TicketStatus::ALL
            .into_iter()
            .filter(|s| s.stamps_resolution())
            .collect();
        assert_eq!(stamping, vec![TicketStatus::Resolved, TicketStatus::Closed]);
        assert!(TicketStatus::Waiting.is_active());
        assert!(!TicketStatus::Closed.is_active());
    }

    #[test]
    fn test_sla_uses_camel_case() {
        let sla: Sla = serde_json::from_str(r#"{"responseTime": 2, "resolutionTime": 4}"#).unwrap();
        assert_eq!(sla.response_time, 2);
        assert_eq!(sla.resolution_time, 4);
        assert!(serde_json::from_str::<Sla>(r#"{"responseTime": -1, "resolutionTime": 4}"#).is_err());
    }

    #[test]
    fn test_affected_user_rejects_unknown_fields() {
        let result = serde_json::from_str::<AffectedUser>(
            r#"{"name": "Ana", "email": "ana@example.com", "role": "Customer", "phone": "1"}"#,
        );
        assert!(result.is_err());
    }
}
