use std::fs::File;
use std::io::BufWriter;

use crate::cli::open_store;
use crate::error::Result;
use crate::export::{write, ExportFormat};
use crate::settings::load_settings;

pub fn run(format: ExportFormat, output: Option<&str>) -> Result<()> {
    let store = open_store(&load_settings())?;
    let txns = store.all_transactions()?;

    match output {
        Some(path) => {
            write(format, &txns, BufWriter::new(File::create(path)?))?;
            eprintln!("Exported {} transaction(s) to {path}", txns.len());
        }
        None => write(format, &txns, std::io::stdout().lock())?,
    }
    Ok(())
}
