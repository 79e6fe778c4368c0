use std::path::PathBuf;

use colored::Colorize;

use crate::cli::open_store;
use crate::error::Result;
use crate::pipeline::ingest_path;
use crate::settings::load_settings;

pub fn run(path: &str, dry_run: bool) -> Result<()> {
    let settings = load_settings();
    let registry = settings.load_registry()?;
    let mut store = open_store(&settings)?;

    let result = ingest_path(&mut store, &registry, &PathBuf::from(path), dry_run)?;

    if dry_run {
        println!("{}", serde_json::to_string_pretty(&result.records)?);
        return Ok(());
    }

    if result.files == 0 {
        println!("No .eml files found in {path}");
        return Ok(());
    }
    if result.already_imported == result.files {
        println!("All {} file(s) have already been imported.", result.files);
        return Ok(());
    }

    println!(
        "{} stored, {} duplicates, {} not transactions, {} already imported",
        result.inserted.to_string().green(),
        result.duplicates,
        result.not_transactions,
        result.already_imported
    );
    if result.invalid > 0 {
        println!("{} dropped (missing amount or date)", result.invalid.to_string().yellow());
    }
    if result.failed > 0 {
        println!("{} failed (run with --verbose for details)", result.failed.to_string().red());
    }
    Ok(())
}
