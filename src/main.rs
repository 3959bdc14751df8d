use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cost_manager::{
    import_csv, load_csv, CostEntry, CostEntryInput, CostManager, CostError, StorageConfig,
};

/// Exit status for input the store refused to accept.
const EXIT_INVALID_INPUT: u8 = 2;

#[derive(Parser)]
#[command(name = "cost-manager")]
#[command(about = "Record personal costs and filter them by month and year")]
struct Cli {
    /// Database file (defaults to ./cost-manager.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Use a throwaway in-memory database
    #[arg(long, global = true)]
    memory: bool,

    /// JSON storage config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new cost
    Add {
        /// Description of the cost
        #[arg(long)]
        name: String,
        #[arg(long)]
        amount: f64,
        /// Month (1-12)
        #[arg(long)]
        month: u32,
        /// Year (1900-2022)
        #[arg(long)]
        year: i32,
        /// Living, Car, or Lifestyle
        #[arg(long)]
        category: String,
    },

    /// List costs, optionally for one month
    List {
        #[arg(long, requires = "year")]
        month: Option<u32>,
        #[arg(long, requires = "month")]
        year: Option<i32>,
    },

    /// Import costs from a CSV file (costName,amount,month,year,category)
    Import { csv: PathBuf },

    /// Show stores and indexes
    Schema,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig::default(),
    };
    if let Some(path) = &cli.db {
        config = config.at_path(path);
    }
    if cli.memory {
        config = config.in_memory();
    }

    let manager = CostManager::open(&config)?;
    if manager.database().is_in_memory() && !cli.memory {
        eprintln!("⚠️  Storage unavailable, using an in-memory database (nothing will be saved)");
    }

    match cli.command {
        Commands::Add {
            name,
            amount,
            month,
            year,
            category,
        } => {
            let input = CostEntryInput::new(&name, amount, month, year, &category);
            match run_add(&manager, input) {
                Err(CostError::Validation(errors)) => {
                    eprintln!("❌ Please fill all the fields:");
                    for e in &errors {
                        eprintln!("   {}", e);
                    }
                    return Ok(ExitCode::from(EXIT_INVALID_INPUT));
                }
                other => other?,
            }
        }
        Commands::List { month, year } => run_list(&manager, month.zip(year))?,
        Commands::Import { csv } => run_import(&manager, &csv)?,
        Commands::Schema => run_schema(&manager)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn run_add(manager: &CostManager, input: CostEntryInput) -> Result<(), CostError> {
    let entry = manager.append_cost(&input)?;
    println!("✓ Cost added (id {})", entry.id);
    print_entries(&[entry]);
    Ok(())
}

fn run_list(manager: &CostManager, period: Option<(u32, i32)>) -> Result<()> {
    let entries = match period {
        Some((month, year)) => {
            println!("📅 Costs for {:02}/{}", month, year);
            manager.list_costs_by_period(month, year)?
        }
        None => {
            println!("📊 All costs");
            manager.list_costs()?
        }
    };

    print_entries(&entries);
    let total: f64 = entries.iter().map(|e| e.amount).sum();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{} entries, total {:.2}$", entries.len(), total);
    Ok(())
}

fn run_import(manager: &CostManager, csv: &Path) -> Result<()> {
    println!("📂 Loading CSV...");
    let batch = load_csv(csv)?;
    println!("✓ Loaded {} rows", batch.rows.len() + batch.rejected.len());

    println!("\n💾 Inserting costs...");
    let report = import_csv(manager.database(), batch)?;
    println!("✓ Inserted: {} costs", report.inserted.len());

    if !report.rejected.is_empty() {
        println!("✗ Rejected: {} rows", report.rejected.len());
        for row in &report.rejected {
            println!("   line {}: {}", row.line, row.error);
        }
    }

    println!("\n🔍 Database contains {} costs", manager.count_costs()?);
    Ok(())
}

fn run_schema(manager: &CostManager) -> Result<()> {
    let db = manager.database();
    let info = db.schema_info()?;

    println!("🗄️  {} (version {})", db.name(), info.version);
    for store in &info.stores {
        println!("   store: {}", store);
    }
    for index in &info.indexes {
        println!(
            "   index: {} ({}){}",
            index.name,
            index.columns.join(", "),
            if index.unique { " unique" } else { "" }
        );
    }
    Ok(())
}

fn print_entries(entries: &[CostEntry]) {
    for e in entries {
        println!(
            "  #{:<4} {:<24} {:>10.2}$  {}  {}",
            e.id,
            e.cost_name,
            e.amount,
            e.period(),
            e.category.label()
        );
    }
}
