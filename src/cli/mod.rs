pub mod banks;
pub mod categorize;
pub mod export;
pub mod import;
pub mod ingest;
pub mod init;
pub mod rules;
pub mod status;
pub mod tags;
pub mod transactions;

use clap::{Parser, Subcommand};

use crate::db::open_data_dir;
use crate::error::{Result, TallyError};
use crate::export::ExportFormat;
use crate::settings::Settings;
use crate::store::SqliteStore;

/// Open the store for the configured data directory. The database must
/// already exist; `init` is what creates it.
pub(crate) fn open_store(settings: &Settings) -> Result<SqliteStore> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(TallyError::NotFound(format!(
            "{} (run `mailtally init` first)",
            db_path.display()
        )));
    }
    Ok(SqliteStore::new(open_data_dir(&settings.data_path())?))
}

#[derive(Parser)]
#[command(
    name = "mailtally",
    version,
    about = "Turn bank notification emails into a categorized transaction ledger."
)]
pub struct Cli {
    /// Show debug logging (RUST_LOG overrides this).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory, database and default bank registry.
    Init {
        /// Path for mailtally data (default: ~/Documents/mailtally)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// List the configured bank profiles.
    Banks,
    /// Ingest an .eml file or a directory of them.
    Ingest {
        /// .eml file or directory to scan recursively
        path: String,
        /// Print the extracted records as JSON without storing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Import transactions from a JSON file (the `export` format, or records
    /// grouped under month keys).
    Import {
        path: String,
    },
    /// Manage keyword rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Re-apply active keyword rules to every stored transaction.
    Categorize,
    /// Browse stored transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Manage tags.
    Tags {
        #[command(subcommand)]
        command: TagsCommands,
    },
    /// Export stored transactions with their tags.
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show the data directory, registry and table counts.
    Status,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a keyword rule, or replace the rule for an existing keyword.
    Add {
        /// Text to look for in the description (case-insensitive)
        keyword: String,
        /// Category to assign
        #[arg(long)]
        category: Option<String>,
        /// Tag to add (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List keyword rules.
    List,
    /// Deactivate a rule by ID.
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// Most recent transactions.
    List {
        /// Only this bank identifier
        #[arg(long)]
        bank: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Largest transactions by amount.
    Top {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Record a transaction by hand.
    Add {
        /// Amount such as 12.50 or 30,07$
        #[arg(long)]
        amount: String,
        #[arg(long)]
        description: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// HH:MM:SS
        #[arg(long)]
        time: Option<String>,
        #[arg(long, default_value = crate::import::MANUAL_BANK)]
        bank: String,
        #[arg(long = "card-type", default_value = "")]
        card_type: String,
        /// Category (default: decided by the active rules)
        #[arg(long)]
        category: Option<String>,
        /// Tag to add (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Free-form note stored with the transaction
        #[arg(long)]
        note: Option<String>,
    },
    /// Change the category of one transaction.
    SetCategory {
        id: i64,
        category: String,
    },
    /// Delete a transaction by ID.
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum TagsCommands {
    /// List tags with usage counts.
    List,
    /// Attach a tag to one or more transactions.
    Assign {
        tag: String,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Delete a tag and remove it from every transaction.
    Delete {
        name: String,
    },
}
