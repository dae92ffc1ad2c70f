//! Service desk client: data sources, the ticket store and terminal views.
//!
//! ```text
//! views  <──  TicketStore  ──>  Box<dyn TicketSource>
//!                                 ├─ ApiSource      (desk REST API)
//!                                 └─ TrackerSource  (GitLab issues)
//! ```

pub mod api_source;
pub mod source;
pub mod store;
pub mod tracker_source;
pub mod views;

pub use api_source::ApiSource;
pub use source::{ClientFilter, DeskComment, DeskTicket, TicketSource};
pub use store::TicketStore;
pub use tracker_source::TrackerSource;
