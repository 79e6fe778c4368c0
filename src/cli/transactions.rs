use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::error::{Result, TallyError};
use crate::fmt::{money, truncate};
use crate::import::ImportRecord;
use crate::models::{StoredTransaction, UNCATEGORIZED};
use crate::settings::load_settings;
use crate::store::{InsertOutcome, TransactionStore};

fn render(title: &str, txns: &[StoredTransaction]) {
    if txns.is_empty() {
        println!("{title}: none");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Time", "Amount", "Description", "Bank", "Category", "Tags"]);
    for t in txns {
        let category = if t.category == UNCATEGORIZED {
            Cell::new(t.category.yellow())
        } else {
            Cell::new(&t.category)
        };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.date),
            Cell::new(t.time.as_deref().unwrap_or("")),
            Cell::new(money(t.amount)),
            Cell::new(truncate(&t.description, 40)),
            Cell::new(&t.bank),
            category,
            Cell::new(t.tags.join(", ")),
        ]);
    }
    println!("{title}\n{table}");
}

pub fn list(bank: Option<&str>, limit: usize) -> Result<()> {
    let store = open_store(&load_settings())?;
    let txns = store.list_transactions(bank, limit)?;
    let title = match bank {
        Some(bank) => format!("Transactions ({bank})"),
        None => "Transactions".to_string(),
    };
    render(&title, &txns);
    Ok(())
}

pub fn top(limit: usize) -> Result<()> {
    let store = open_store(&load_settings())?;
    let txns = store.top_transactions(limit)?;
    let total: f64 = txns.iter().map(|t| t.amount).sum();
    render(&format!("Top {limit} by amount"), &txns);
    if !txns.is_empty() {
        println!("{} {}", "Total:".bold(), money(total));
    }
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let mut store = open_store(&load_settings())?;
    store.delete_transaction(id)?;
    println!("Deleted transaction {id}");
    Ok(())
}

pub fn add(record: ImportRecord) -> Result<()> {
    let mut store = open_store(&load_settings())?;
    let rules = store.active_rules()?;
    let txn = record.into_transaction(&rules);
    match store.insert(&txn)? {
        InsertOutcome::Inserted(id) => {
            println!("Added transaction {id} ({})", txn.category);
            Ok(())
        }
        InsertOutcome::DuplicateRejected => Err(TallyError::Other(
            "an identical transaction is already stored".into(),
        )),
    }
}

pub fn set_category(id: i64, category: &str) -> Result<()> {
    let mut store = open_store(&load_settings())?;
    store.set_category(id, category)?;
    println!("Transaction {id} \u{2192} {}", category.trim());
    Ok(())
}
