use crate::categorizer::recategorize_all;
use crate::cli::open_store;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let mut store = open_store(&load_settings())?;
    let result = recategorize_all(&mut store)?;
    println!("{} updated, {} unchanged", result.updated, result.unchanged);
    Ok(())
}
