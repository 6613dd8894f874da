use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use foodgram_sdk::{
    actions::PgStore,
    error::Error,
    form::{IngredientRecord, TagRecord},
    loader::{load_ingredients, load_tags, read_records},
    Config,
};

#[derive(Parser)]
#[command(name = "load_data")]
#[command(about = "Import ingredient and tag reference data; safe to rerun", long_about = None)]
struct Cli {
    /// JSON array of {name, measurement_unit}
    #[arg(long, default_value = "data/ingredients.json")]
    ingredients: PathBuf,
    /// JSON array of {name, color, slug}
    #[arg(long)]
    tags: Option<PathBuf>,
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::init()?;
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| Error::Validation(String::from("DATABASE_URL must be set")))?;
    let store = PgStore::connect(database_url, config.database_max_connections).await?;
    store.migrate().await?;

    let records: Vec<IngredientRecord> = read_records(&cli.ingredients)?;
    let report = load_ingredients(&store, records).await?;
    println!(
        "Ingredients: {} created, {} already present",
        report.created, report.existing
    );

    if let Some(path) = &cli.tags {
        let records: Vec<TagRecord> = read_records(path)?;
        let report = load_tags(&store, records).await?;
        println!(
            "Tags: {} created, {} already present",
            report.created, report.existing
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
