use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth::{
    config,
    db::{self, DbConfig},
    migrator::Migrator,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Parser)]
#[command(name = "hearth-migrate", about = "Manage the hearth database schema", version)]
struct Cli {
    /// Database URL; defaults to the configured `database_url`
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up {
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app_config = config::load_config().context("failed to load application config")?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    let url = cli
        .database_url
        .unwrap_or_else(|| app_config.database_url().to_string());
    info!("Starting database migration");

    let db = db::establish_connection_with_config(&DbConfig::single(url))
        .await
        .context("failed to connect to database")?;

    match cli.command.unwrap_or(Command::Up { steps: None }) {
        Command::Up { steps } => {
            Migrator::up(&db, steps).await.context("migration failed")?;
            info!("Migration completed successfully");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps))
                .await
                .context("rollback failed")?;
            info!(steps, "Rollback completed successfully");
        }
        Command::Status => {
            for migration in Migrator::get_applied_migrations(&db).await? {
                println!("applied  {}", migration.name());
            }
            for migration in Migrator::get_pending_migrations(&db).await? {
                println!("pending  {}", migration.name());
            }
        }
        Command::Fresh => {
            Migrator::fresh(&db).await.context("fresh migration failed")?;
            info!("Database recreated");
        }
    }

    db::close_pool(db).await?;
    Ok(())
}
