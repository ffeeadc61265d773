use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, info, trace};

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");
    debug!("Database URL: {}", database_url);

    let db: DatabaseConnection = Database::connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{database_url}'"))?;
    info!("Successfully connected to database");

    info!("Running database migrations");
    Migrator::up(&db, None)
        .await
        .context("Failed to run database migrations")?;

    info!("Database initialization completed successfully!");
    Ok(())
}
