//! Domain types and JSON contract shared by the service desk server and its
//! clients.

pub mod models;
pub mod requests;
pub mod responses;

pub use models::*;
pub use requests::*;
pub use responses::*;
