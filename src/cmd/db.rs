//! Database setup commands: `desk init-db` and `desk seed`.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use tracing::info;

use servicedesk::desk::catalog::{default_services, seed_samples};
use servicedesk::desk::db::DeskDb;

fn open(db_path: &Path) -> Result<DeskDb> {
    DeskDb::new(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}

pub fn cmd_init_db(db_path: &Path) -> Result<()> {
    open(db_path)?;
    println!(
        "{} Database initialized at {}",
        style("✓").green(),
        db_path.display()
    );
    Ok(())
}

pub fn cmd_seed(db_path: &Path, samples: bool) -> Result<()> {
    let db = open(db_path)?;

    let created = db.initialize_services(&default_services())?;
    if created == 0 {
        println!("Services already initialized");
    } else {
        info!(created, "seeded service catalog");
        println!("{} Created {} services", style("✓").green(), created);
    }

    if samples {
        let inserted = seed_samples(&db)?;
        if inserted == 0 {
            println!("Tickets already present, sample tickets skipped");
        } else {
            println!(
                "{} Created {} sample tickets",
                style("✓").green(),
                inserted
            );
        }
    }
    Ok(())
}
