//! API server command: `desk serve`.

use std::path::PathBuf;

use anyhow::Result;

use servicedesk::config::DeskConfig;
use servicedesk::desk::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    config: &DeskConfig,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    let mut server = ServerConfig::from_sections(&config.server, &config.tracker);
    if let Some(port) = port {
        server.port = port;
    }
    if let Some(db_path) = db_path {
        server.db_path = db_path;
    }
    // Dev mode lets a local front-end on another port call the API.
    server.cors_permissive |= dev;

    start_server(server).await
}
