use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::error::Result;
use crate::settings::load_settings;

pub fn list() -> Result<()> {
    let store = open_store(&load_settings())?;
    let mut table = Table::new();
    table.set_header(vec!["Tag", "Transactions"]);
    for (name, count) in store.tag_counts()? {
        table.add_row(vec![Cell::new(name), Cell::new(count)]);
    }
    println!("Tags\n{table}");
    Ok(())
}

pub fn assign(tag: &str, ids: &[i64]) -> Result<()> {
    let mut store = open_store(&load_settings())?;
    let added = store.assign_tag(tag, ids)?;
    println!("Tagged {added} transaction(s) with '{}'", tag.trim());
    Ok(())
}

pub fn delete(name: &str) -> Result<()> {
    let mut store = open_store(&load_settings())?;
    let unlinked = store.delete_tag(name)?;
    println!("Deleted tag '{}' from {unlinked} transaction(s)", name.trim());
    Ok(())
}
