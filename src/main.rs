use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod calendar;
mod csv_source;
mod db;
mod error;
mod models;
mod pivot;
mod report;
mod source;
mod view;

use models::{CalendarMonth, Role, ViewerContext};
use source::{AggregationResolver, CountSource, PrecomputedSource, RawRecordSource};
use view::{PivotDisplay, ViewController};

#[derive(Parser)]
#[command(name = "counselor-contact-pivot")]
#[command(about = "Counselor contact pivot for the Group Scholar academic year", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Show contacts per counselor, month and type
    Pivot {
        #[arg(long, value_enum, default_value_t = Role::Admin)]
        role: Role,
        /// Required when role is counselor
        #[arg(long, required_if_eq("role", "counselor"))]
        counselor_id: Option<Uuid>,
        /// Date used to pick the academic year (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Counselor row to expand into per-type counts
        #[arg(long)]
        expand: Option<Uuid>,
        /// Month to highlight, as YYYY-MM
        #[arg(long)]
        month: Option<CalendarMonth>,
        /// Read raw contact records from CSV instead of Postgres
        #[arg(long)]
        records_csv: Option<PathBuf>,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect().await?).await?;
            println!("Seed data inserted.");
        }
        Commands::Pivot {
            role,
            counselor_id,
            as_of,
            expand,
            month,
            records_csv,
        } => {
            let viewer = match role {
                Role::Admin => ViewerContext::admin(),
                Role::Counselor => ViewerContext::counselor(
                    counselor_id.context("--counselor-id is required for the counselor role")?,
                ),
            };
            let window = calendar::generate_window(as_of.unwrap_or_else(|| Utc::now().date_naive()));
            let month = month.map(|month| window.require_month(month)).transpose()?;

            let source: Box<dyn CountSource> = match records_csv {
                Some(path) => {
                    log::info!("reading contact records from {}", path.display());
                    Box::new(RawRecordSource::new(Arc::new(csv_source::CsvRecordProvider::new(path))))
                }
                None => {
                    let store = Arc::new(db::PgContactStore::new(connect().await?));
                    Box::new(AggregationResolver::new(
                        PrecomputedSource::new(store.clone()),
                        RawRecordSource::new(store),
                    ))
                }
            };

            let mut controller = ViewController::default();
            let ticket = controller.change_viewer(viewer);
            let result = source.fetch_cells(&window, ticket.scope()).await;
            controller.complete_fetch(ticket, result);

            if let Some(counselor_id) = expand {
                controller.toggle_expanded(counselor_id);
            }
            controller.select_month(month);

            match controller.display() {
                PivotDisplay::Ready(_) => {
                    print!("{}", report::render_pivot(&controller, &window));
                }
                PivotDisplay::Failed(err) => {
                    anyhow::bail!(report::render_failure(err));
                }
                PivotDisplay::Idle | PivotDisplay::Loading => {
                    anyhow::bail!("contact pivot fetch did not complete");
                }
            }
        }
    }

    Ok(())
}
