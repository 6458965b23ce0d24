use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use medminder::config::default_database_path;
use medminder::domain::{validate_name, validate_quantity, validate_rate};
use medminder::{Prescription, PrescriptionStore, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "rxm", about = "Track prescription supply from the command line", version)]
struct Cli {
    /// Path to database (default: <config dir>/medminder/db.sqlite3)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all prescriptions, or show one in detail
    Ls { name: Option<String> },
    /// Add a new prescription
    Add {
        name: String,
        #[arg(allow_hyphen_values = true)]
        quantity: f64,
        #[arg(allow_hyphen_values = true)]
        rate: f64,
    },
    /// Remove a prescription
    Rm { name: String },
    /// Update the quantity on hand or the daily rate
    Up {
        name: String,
        #[arg(value_enum)]
        field: Field,
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Field {
    Quantity,
    Rate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let db_path = match cli.db {
        Some(path) => path,
        None => default_database_path(&std::env::vars().collect())
            .context("Failed to resolve config directory")?,
    };

    let store = PrescriptionStore::open(&db_path, Arc::new(SystemClock))
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let result = run(&store, cli.command).await;
    store.close().await;
    result
}

async fn run(store: &PrescriptionStore, command: Command) -> Result<()> {
    match command {
        Command::Ls { name: None } => {
            let now = store.now();
            for prescription in store.read_all().await? {
                println!("{}", summary_line(&prescription, now));
            }
        }
        Command::Ls { name: Some(name) } => {
            let prescription = store.read(&name).await?;
            print!("{}", detail_block(&prescription, store.now()));
        }
        Command::Add {
            name,
            quantity,
            rate,
        } => {
            validate_name(&name)?;
            validate_quantity(quantity)?;
            validate_rate(rate)?;
            store.create(&name, quantity, rate).await?;
        }
        Command::Rm { name } => store.delete(&name).await?,
        Command::Up { name, field, value } => match field {
            Field::Quantity => {
                validate_quantity(value)?;
                store.update_quantity(&name, value).await?;
            }
            Field::Rate => {
                validate_rate(value)?;
                store.update_rate(&name, value).await?;
            }
        },
    }
    Ok(())
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => "never".to_string(),
    }
}

fn summary_line(p: &Prescription, now: DateTime<Utc>) -> String {
    format!(
        "{} - {:.2} - {}",
        p.name,
        p.expected_count(now),
        format_date(p.refill_date())
    )
}

fn detail_block(p: &Prescription, now: DateTime<Utc>) -> String {
    format!(
        "Name:     {}\nExpected: {:.2}\nRefill:   {}\nUpdated:  {:.2} on {}\n",
        p.name,
        p.expected_count(now),
        format_date(p.refill_date()),
        p.quantity,
        p.updated.format("%Y-%m-%d"),
    )
}
