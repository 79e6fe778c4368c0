use std::path::Path;

use colored::Colorize;

use crate::cli::open_store;
use crate::error::Result;
use crate::import::import_file;
use crate::settings::load_settings;

pub fn run(path: &str) -> Result<()> {
    let mut store = open_store(&load_settings())?;
    let result = import_file(&mut store, Path::new(path))?;

    println!(
        "{} stored, {} duplicates out of {} record(s)",
        result.inserted.to_string().green(),
        result.duplicates,
        result.records
    );
    if result.invalid > 0 {
        println!("{} dropped (missing amount or date)", result.invalid.to_string().yellow());
    }
    Ok(())
}
