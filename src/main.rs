use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::warn;

use desk_common::{BusinessService, Category, EscalationLevel, Priority, TicketStatus, UserRole};
use servicedesk::config::DeskConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "desk")]
#[command(version, about = "IT service desk: ticket API, GitLab mirror and terminal client")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to .desk/desk.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the REST API
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (CORS permissive for a local front-end)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and exit
    InitDb {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Seed the service catalog
    Seed {
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Also insert sample tickets when the database has none
        #[arg(long)]
        samples: bool,
    },
    /// Browse and edit tickets
    Tickets {
        /// Where tickets come from
        #[arg(long, value_enum, default_value = "api")]
        source: SourceKind,

        #[command(subcommand)]
        command: TicketCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// The desk REST API (client.api_url)
    Api,
    /// The GitLab project directly
    Tracker,
}

#[derive(Subcommand, Clone)]
pub enum TicketCommands {
    /// Totals and the most recent tickets
    Dashboard,
    /// Tickets grouped by status
    Board {
        #[arg(long)]
        priority: Option<Priority>,
        /// Any label, service or category name
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        status: Option<TicketStatus>,
        #[arg(long)]
        service: Option<BusinessService>,
    },
    /// Counts per category, service and priority
    Stats,
    /// One ticket with its comments
    Show {
        key: String,
        /// Include internal comments
        #[arg(long)]
        internal: bool,
    },
    /// Open a new ticket
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        service: BusinessService,
        #[arg(long)]
        category: Category,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        user_name: String,
        #[arg(long)]
        user_email: String,
        #[arg(long, default_value = "Customer")]
        user_role: UserRole,
        #[arg(long)]
        assign: Option<String>,
        #[arg(long)]
        escalation: Option<EscalationLevel>,
    },
    /// Change ticket fields
    Update {
        key: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        service: Option<BusinessService>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<TicketStatus>,
        #[arg(long, conflicts_with = "unassign")]
        assign: Option<String>,
        /// Clear the assignee
        #[arg(long)]
        unassign: bool,
        #[arg(long)]
        escalation: Option<EscalationLevel>,
    },
    /// Add a comment
    Comment {
        key: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        content: String,
        /// Visible to staff only
        #[arg(long)]
        internal: bool,
    },
    /// Delete a ticket (API source only)
    Delete { key: String },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default .desk/desk.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    servicedesk::telemetry::init_tracing(cli.verbose)?;

    let config = DeskConfig::resolve(cli.config.as_deref())?;
    for warning in config.validate() {
        warn!("{}", warning);
    }
    let db_path = |flag: &Option<PathBuf>| {
        flag.clone()
            .unwrap_or_else(|| config.server.db_path.clone())
    };

    match cli.command {
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(&config, port, db_path, dev).await?;
        }
        Commands::InitDb { db_path: ref flag } => cmd::cmd_init_db(&db_path(flag))?,
        Commands::Seed {
            db_path: ref flag,
            samples,
        } => cmd::cmd_seed(&db_path(flag), samples)?,
        Commands::Tickets { source, command } => {
            cmd::cmd_tickets(&config, source, command).await?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(&config, cli.config.as_deref(), command)?;
        }
    }

    Ok(())
}
