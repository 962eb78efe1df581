//! `solverbot migrate` — Create the storage schema.
//!
//! Opening a store runs its migrations, so this only opens and reports.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let url = config.memory.resolved_database_url();

    println!("Migrating {} storage...", config.memory.backend);
    solverbot_memory::open(&config.memory.backend, &url).await?;
    println!("   Schema is up to date");

    Ok(())
}
