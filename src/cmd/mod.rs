//! CLI command implementations.
//!
//! | Module    | Commands handled        |
//! |-----------|-------------------------|
//! | `serve`   | `Serve`                 |
//! | `db`      | `InitDb`, `Seed`        |
//! | `tickets` | `Tickets`               |
//! | `config`  | `Config`                |

pub mod config;
pub mod db;
pub mod serve;
pub mod tickets;

pub use config::cmd_config;
pub use db::{cmd_init_db, cmd_seed};
pub use serve::cmd_serve;
pub use tickets::cmd_tickets;
