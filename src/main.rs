use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use hearth::{
    config::{self, AppConfig},
    db::{self, DbConfig, DbPool},
    events::{self, EventSender},
    scanner::{ScanMode, ScanOutcome},
    services::{
        chores::CreateChoreInput,
        inventory::{AssignOutcome, DeleteOutcome},
        locations::CreateLocationOutcome,
    },
    view::{InventoryRow, LocationFilter},
    Household,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Scan(args) => handle_scan_session(&context, args).await?,
        Commands::Add { barcode } => handle_add(&context, &barcode, cli.json).await?,
        Commands::Remove { barcode } => handle_remove(&context, &barcode, cli.json).await?,
        Commands::List(args) => handle_list(&context, args, cli.json).await?,
        Commands::Show { barcode } => handle_show(&context, &barcode, cli.json).await?,
        Commands::Delete { barcode } => handle_delete(&context, &barcode, cli.json).await?,
        Commands::Assign(args) => handle_assign(&context, args, cli.json).await?,
        Commands::Locations(command) => handle_locations_command(&context, command, cli.json).await?,
        Commands::Chores(command) => handle_chores_command(&context, command, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "hearth", about = "Household pantry inventory and chores", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read barcodes from stdin, one per line ("+" adds, "-" removes, "q" quits)
    Scan(ScanArgs),
    /// Register one unit of a barcode
    Add { barcode: String },
    /// Take one unit of a barcode out
    Remove { barcode: String },
    /// List pantry items
    List(ListArgs),
    /// Show catalog details for a stocked barcode
    Show { barcode: String },
    /// Delete an item regardless of its quantity
    Delete { barcode: String },
    /// Bind an item to a storage location
    Assign(AssignArgs),
    #[command(subcommand)]
    Locations(LocationsCommands),
    #[command(subcommand)]
    Chores(ChoresCommands),
}

#[derive(Args)]
struct ScanArgs {
    #[arg(long, default_value_t = ScanMode::Add, help = "Starting mode: add or remove")]
    mode: ScanMode,
    #[arg(long, help = "Only show items stored at this location id")]
    location: Option<i32>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, help = "Only show items stored at this location id")]
    location: Option<i32>,
}

#[derive(Args)]
struct AssignArgs {
    barcode: String,
    #[arg(long, conflicts_with = "clear", required_unless_present = "clear")]
    location: Option<i32>,
    #[arg(long, action = ArgAction::SetTrue, help = "Remove the item's location")]
    clear: bool,
}

#[derive(Subcommand)]
enum LocationsCommands {
    List,
    Add { name: String },
    Delete { id: i32 },
}

#[derive(Subcommand)]
enum ChoresCommands {
    List,
    Add {
        description: String,
        #[arg(long, default_value = "weekly")]
        frequency: String,
        #[arg(long)]
        person: Option<i32>,
    },
    Delete { id: i32 },
}

struct CliContext {
    household: Household,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        if config.auto_migrate {
            db::run_migrations(&db_pool)
                .await
                .context("failed to migrate database")?;
        }
        let db = Arc::new(db_pool);
        let catalog_db = Self::catalog_pool(&config, &db).await?;

        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);
        tokio::spawn(events::process_events(event_rx));

        Ok(Self {
            household: Household::with_db_catalog(db, catalog_db, &config, Some(event_sender)),
        })
    }

    async fn catalog_pool(config: &AppConfig, db: &Arc<DbPool>) -> Result<Arc<DbPool>> {
        if !config.has_separate_catalog() {
            return Ok(db.clone());
        }
        let pool = db::establish_connection_with_config(&DbConfig {
            url: config.catalog_database_url().to_string(),
            ..DbConfig::from(config)
        })
        .await
        .context("failed to connect to catalog database")?;
        Ok(Arc::new(pool))
    }
}

async fn handle_scan_session(context: &CliContext, args: ScanArgs) -> Result<()> {
    let mut processor = context.household.scan_processor();
    processor.set_mode(args.mode);
    processor.set_filter(LocationFilter::from(args.location));
    processor.activate();

    render_rows(&processor.refresh().await?);
    println!("{}", processor.mode().banner());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "q" | "quit" => break,
            "+" => {
                processor.set_mode(ScanMode::Add);
                println!("{}", processor.mode().banner());
            }
            "-" => {
                processor.set_mode(ScanMode::Remove);
                println!("{}", processor.mode().banner());
            }
            input => {
                processor.feed(input)?;
                match processor.submit().await {
                    Ok(Some(report)) => {
                        println!("{}", report.notice());
                        if let Some(rows) = &report.rows {
                            render_rows(rows);
                        }
                    }
                    Ok(None) => {}
                    // A failed scan leaves the store untouched; keep the session open.
                    Err(e) => {
                        warn!(error = %e, "scan failed");
                        eprintln!("{}", e.user_message());
                    }
                }
            }
        }
    }

    processor.deactivate();
    Ok(())
}

async fn handle_add(context: &CliContext, barcode: &str, json: bool) -> Result<()> {
    let outcome = context
        .household
        .inventory
        .add_scan(barcode)
        .await
        .context("failed to add item")?;

    if json {
        return print_json(&outcome);
    }
    println!("{}", ScanOutcome::Add(outcome).notice(barcode.trim()));
    Ok(())
}

async fn handle_remove(context: &CliContext, barcode: &str, json: bool) -> Result<()> {
    let outcome = context
        .household
        .inventory
        .remove_scan(barcode)
        .await
        .context("failed to remove item")?;

    if json {
        return print_json(&outcome);
    }
    println!("{}", ScanOutcome::Remove(outcome).notice(barcode.trim()));
    Ok(())
}

async fn handle_list(context: &CliContext, args: ListArgs, json: bool) -> Result<()> {
    let filter = LocationFilter::from(args.location);
    let rows = context
        .household
        .inventory
        .list_items(filter)
        .await
        .context("failed to list items")?;

    if json {
        return print_json(&rows);
    }

    let location_name = match filter.location_id() {
        Some(id) => context.household.locations.get(id).await?.map(|l| l.name),
        None => None,
    };
    println!("Filter: {}", filter.label(location_name.as_deref()));
    render_rows(&rows);
    Ok(())
}

#[derive(Serialize)]
struct ItemDetails {
    item: hearth::entities::PantryItemModel,
    location: Option<String>,
    catalog: Option<hearth::services::CatalogEntry>,
}

async fn handle_show(context: &CliContext, barcode: &str, json: bool) -> Result<()> {
    let household = &context.household;
    let item = household
        .inventory
        .get_item(barcode)
        .await?
        .ok_or_else(|| anyhow!("item {barcode} is not in the pantry"))?;

    let location = match item.location_id {
        Some(id) => household.locations.get(id).await?.map(|l| l.name),
        None => None,
    };
    let catalog = match household.inventory.resolver().details(&item.barcode).await {
        Ok(entry) => Some(entry),
        Err(hearth::ServiceError::NotFound(_)) => None,
        Err(e) => return Err(e).context("failed to load catalog details"),
    };

    if json {
        return print_json(&ItemDetails {
            item,
            location,
            catalog,
        });
    }

    println!("{} (x{})", item.name, item.quantity);
    println!("Barcode: {}", item.barcode);
    println!("Location: {}", location.as_deref().unwrap_or("-"));
    match catalog {
        Some(entry) => {
            println!("Categories: {}", entry.category_summary());
            println!("Nutrition (per 100 g):");
            for row in entry.nutrition.rows() {
                let value = row.display_value();
                if row.value.is_some() {
                    println!("  {}: {} {}", row.label, value, row.unit);
                } else {
                    println!("  {}: {}", row.label, value);
                }
            }
        }
        None => println!("(Detailed info not found in database)"),
    }
    Ok(())
}

async fn handle_delete(context: &CliContext, barcode: &str, json: bool) -> Result<()> {
    let outcome = context
        .household
        .inventory
        .delete_item(barcode)
        .await
        .context("failed to delete item")?;

    if json {
        return print_json(&outcome);
    }
    match outcome {
        DeleteOutcome::Deleted => println!("Deleted {barcode}"),
        DeleteOutcome::NotPresent => println!("Item with barcode {barcode} is not in the pantry."),
    }
    Ok(())
}

async fn handle_assign(context: &CliContext, args: AssignArgs, json: bool) -> Result<()> {
    let location_id = if args.clear { None } else { args.location };
    let outcome = context
        .household
        .inventory
        .assign_location(&args.barcode, location_id)
        .await
        .context("failed to assign location")?;

    if json {
        return print_json(&outcome);
    }
    match outcome {
        AssignOutcome::Updated => println!("Updated {}", args.barcode),
        AssignOutcome::NotPresent => {
            println!("Item with barcode {} is not in the pantry.", args.barcode)
        }
    }
    Ok(())
}

async fn handle_locations_command(
    context: &CliContext,
    command: LocationsCommands,
    json: bool,
) -> Result<()> {
    let locations = &context.household.locations;
    match command {
        LocationsCommands::List => {
            let all = locations.list().await.context("failed to list locations")?;
            if json {
                return print_json(&all);
            }
            for location in all {
                println!("{:>4}  {}", location.id, location.name);
            }
        }
        LocationsCommands::Add { name } => {
            let outcome = locations
                .create(&name)
                .await
                .context("failed to create location")?;
            if json {
                return print_json(&outcome);
            }
            match outcome {
                CreateLocationOutcome::Created(l) => println!("Created location {} ({})", l.name, l.id),
                CreateLocationOutcome::AlreadyExists(l) => {
                    println!("That storage location already exists: {} ({})", l.name, l.id)
                }
            }
        }
        LocationsCommands::Delete { id } => {
            let deleted = locations
                .delete(id)
                .await
                .context("failed to delete location")?;
            if json {
                return print_json(&serde_json::json!({ "deleted": deleted }));
            }
            if deleted {
                println!("Deleted location {id}");
            } else {
                println!("No location with id {id}");
            }
        }
    }
    Ok(())
}

async fn handle_chores_command(
    context: &CliContext,
    command: ChoresCommands,
    json: bool,
) -> Result<()> {
    let chores = &context.household.chores;
    match command {
        ChoresCommands::List => {
            let all = chores.list().await.context("failed to list chores")?;
            if json {
                return print_json(&all);
            }
            for chore in all {
                println!(
                    "{:>3}. {} ({}) [id {}]",
                    chore.display_order, chore.description, chore.frequency, chore.chore_id
                );
            }
        }
        ChoresCommands::Add {
            description,
            frequency,
            person,
        } => {
            let created = chores
                .create(CreateChoreInput {
                    description,
                    person_id: person,
                    frequency,
                })
                .await
                .context("failed to create chore")?;
            if json {
                return print_json(&created);
            }
            println!("Created chore {} at position {}", created.chore_id, created.display_order);
        }
        ChoresCommands::Delete { id } => {
            let deleted = chores.delete(id).await.context("failed to delete chore")?;
            if json {
                return print_json(&serde_json::json!({ "deleted": deleted }));
            }
            if deleted {
                println!("Deleted chore {id}");
            } else {
                println!("No chore with id {id}");
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_rows(rows: &[InventoryRow]) {
    if rows.is_empty() {
        println!("(pantry is empty)");
        return;
    }
    println!("{:<40} {:<16} {:>5} {:>4}", "Food", "Location", "Age", "Qty");
    for row in rows {
        println!(
            "{:<40} {:<16} {:>5} {:>4}",
            row.name,
            row.location_label(),
            row.age.to_string(),
            row.quantity
        );
    }
}
