mod categorizer;
mod classifier;
mod cli;
mod db;
mod dedup;
mod error;
mod export;
mod extractor;
mod fmt;
mod html;
mod import;
mod mail;
mod models;
mod pipeline;
mod registry;
mod settings;
mod store;

use clap::Parser;
use tracing_subscriber::{prelude::*, EnvFilter};

use cli::{Cli, Commands, RulesCommands, TagsCommands, TransactionsCommands};
use import::{AmountField, ImportRecord};

fn main() {
    let cli = Cli::parse();

    // RUST_LOG > --verbose > warn
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Banks => cli::banks::run(),
        Commands::Ingest { path, dry_run } => cli::ingest::run(&path, dry_run),
        Commands::Import { path } => cli::import::run(&path),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                keyword,
                category,
                tags,
            } => cli::rules::add(&keyword, category.as_deref(), &tags),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Delete { id } => cli::rules::delete(id),
        },
        Commands::Categorize => cli::categorize::run(),
        Commands::Transactions { command } => match command {
            TransactionsCommands::List { bank, limit } => cli::transactions::list(bank.as_deref(), limit),
            TransactionsCommands::Top { limit } => cli::transactions::top(limit),
            TransactionsCommands::Add {
                amount,
                description,
                date,
                time,
                bank,
                card_type,
                category,
                tags,
                note,
            } => cli::transactions::add(ImportRecord {
                amount: Some(AmountField::Text(amount)),
                description: Some(description),
                card_type,
                date: Some(date),
                time,
                bank,
                full_email: note.unwrap_or_default(),
                category,
                tags,
            }),
            TransactionsCommands::SetCategory { id, category } => cli::transactions::set_category(id, &category),
            TransactionsCommands::Delete { id } => cli::transactions::delete(id),
        },
        Commands::Tags { command } => match command {
            TagsCommands::List => cli::tags::list(),
            TagsCommands::Assign { tag, ids } => cli::tags::assign(&tag, &ids),
            TagsCommands::Delete { name } => cli::tags::delete(&name),
        },
        Commands::Export { format, output } => cli::export::run(format, output.as_deref()),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
