use std::{io::stdout, path::PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use storefront::database::Store;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// SQLite file shared with the storefront server.
    #[arg(long, default_value = "aureliana.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tables, the launch collection and the built-in accounts.
    Seed,

    /// Print current stock levels.
    Stock {
        /// Only items at or below their low stock threshold.
        #[arg(long)]
        low: bool,
    },

    /// Add units to an item by product code.
    Restock { product_code: String, quantity: i64 },

    /// Print the newest stock movements.
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let store = Store::open(&args.db)
        .with_context(|| format!("Failed to open {}", args.db.display()))?;
    let mut out = stdout().lock();

    match args.command {
        Command::Seed => admin::seed(&store, &mut out).map(|_| ()),
        Command::Stock { low } => admin::print_stock(&store, low, &mut out),
        Command::Restock {
            product_code,
            quantity,
        } => admin::restock_code(&store, &product_code, quantity, &mut out).map(|_| ()),
        Command::Audit { limit } => admin::print_audit(&store, limit, &mut out),
    }
}
