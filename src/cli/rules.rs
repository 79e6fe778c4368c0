use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::error::Result;
use crate::settings::load_settings;

pub fn add(keyword: &str, category: Option<&str>, tags: &[String]) -> Result<()> {
    let mut store = open_store(&load_settings())?;
    let id = store.upsert_rule(keyword, category, tags)?;

    let mut targets = Vec::new();
    if let Some(category) = category {
        targets.push(format!("category {category}"));
    }
    if !tags.is_empty() {
        targets.push(format!("tags {}", tags.join(", ")));
    }
    println!("Rule {id}: '{keyword}' \u{2192} {}", targets.join("; "));
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store(&load_settings())?;
    let rules = store.list_rules()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Keyword", "Category", "Tags", "Active"]);
    for rule in rules {
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(rule.keyword),
            Cell::new(rule.category.unwrap_or_default()),
            Cell::new(rule.tags.join(", ")),
            Cell::new(if rule.is_active { "yes" } else { "no" }),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let mut store = open_store(&load_settings())?;
    let rule = store.deactivate_rule(id)?;
    println!("Deleted rule {id}: '{}'", rule.keyword);
    Ok(())
}
