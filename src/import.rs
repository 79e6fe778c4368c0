use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::categorizer::categorize;
use crate::error::Result;
use crate::extractor::normalize_amount;
use crate::models::{ExtractedTransaction, KeywordRule, UNCATEGORIZED};
use crate::pipeline::{store_transaction, StoreOutcome};
use crate::store::TransactionStore;

pub const MANUAL_BANK: &str = "manual";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(f64),
    Text(String),
}

/// A transaction that did not come out of a mailbox: a JSON record (the
/// `export` format or a dry-run record) or a manual entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportRecord {
    pub amount: Option<AmountField>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "card type")]
    pub card_type: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default = "default_bank")]
    pub bank: String,
    #[serde(default)]
    pub full_email: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_bank() -> String {
    MANUAL_BANK.to_string()
}

/// Either a flat array of records or records grouped under month keys.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Flat(Vec<ImportRecord>),
    ByMonth(BTreeMap<String, Vec<ImportRecord>>),
}

impl ImportRecord {
    /// Build the transaction handed to the store. An explicit category is
    /// kept; otherwise the active rules decide category and extra tags.
    pub fn into_transaction(self, rules: &[KeywordRule]) -> ExtractedTransaction {
        let amount = self.amount.map(|a| match a {
            AmountField::Number(n) => format!("{n:.2}"),
            AmountField::Text(s) => normalize_amount(&s).unwrap_or(s),
        });
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        let explicit = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && c.as_str() != UNCATEGORIZED);

        let (category, tags) = match explicit {
            Some(category) => (category, tags),
            None => categorize(description.as_deref().unwrap_or_default(), UNCATEGORIZED, &tags, rules),
        };

        ExtractedTransaction {
            amount,
            description,
            card_type: self.card_type,
            date: self.date.filter(|d| !d.trim().is_empty()),
            time: self.time.filter(|t| !t.trim().is_empty()),
            bank: self.bank,
            full_email: self.full_email,
            category,
            tags,
            duplicate: false,
        }
    }
}

pub fn parse_records(bytes: &[u8]) -> Result<Vec<ImportRecord>> {
    let records = match serde_json::from_slice::<ImportFile>(bytes)? {
        ImportFile::Flat(records) => records,
        ImportFile::ByMonth(months) => months.into_values().flatten().collect(),
    };
    Ok(records)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub records: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

/// Store every record through the transaction store. Exact duplicates and
/// records that fail validation are counted, not fatal.
pub fn import_records<S: TransactionStore + ?Sized>(
    store: &mut S,
    records: Vec<ImportRecord>,
) -> Result<ImportResult> {
    let rules = store.active_rules()?;
    let mut result = ImportResult {
        records: records.len(),
        ..Default::default()
    };
    for record in records {
        let txn = record.into_transaction(&rules);
        match store_transaction(store, &txn)? {
            StoreOutcome::Inserted(_) => result.inserted += 1,
            StoreOutcome::SkippedDuplicate | StoreOutcome::DuplicateRejected => result.duplicates += 1,
            StoreOutcome::Invalid => result.invalid += 1,
        }
    }
    info!(
        records = result.records,
        inserted = result.inserted,
        duplicates = result.duplicates,
        "json import finished"
    );
    Ok(result)
}

pub fn import_file<S: TransactionStore + ?Sized>(store: &mut S, path: &Path) -> Result<ImportResult> {
    let bytes = std::fs::read(path)?;
    import_records(store, parse_records(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::write_json;
    use crate::store::tests::test_store;

    #[test]
    fn test_parse_flat_and_grouped() {
        let flat = br#"[{"amount": 74, "description": "UBER EATS", "card type": "Credit Card",
            "date": "2025-02-13", "time": "10:40:00", "bank": "MBNA", "full_email": "Achat uber eats"}]"#;
        let records = parse_records(flat).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].card_type, "Credit Card");
        assert_eq!(records[0].amount, Some(AmountField::Number(74.0)));

        let grouped = br#"{"2025-01": [{"amount": "30,07$", "date": "2025-01-03"}],
            "2025-02": [{"amount": "3.62", "date": "2025-02-04"}, {"amount": "1.00", "date": "2025-02-05"}]}"#;
        let records = parse_records(grouped).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].bank, MANUAL_BANK);

        assert!(parse_records(b"{\"not\": \"records\"}").is_err());
    }

    #[test]
    fn test_into_transaction_normalizes_and_categorizes() {
        let record = ImportRecord {
            amount: Some(AmountField::Text("30,07$".into())),
            description: Some(" UBER EATS TORONTO ".into()),
            card_type: "credit card".into(),
            date: Some("2025-02-04".into()),
            time: Some(String::new()),
            bank: MANUAL_BANK.into(),
            full_email: String::new(),
            category: None,
            tags: vec!["Work".into(), " ".into()],
        };
        let rules = [KeywordRule::category("uber", "Transport"), KeywordRule::tag("uber", "Rides")];

        let txn = record.clone().into_transaction(&rules);
        assert_eq!(txn.amount.as_deref(), Some("30.07"));
        assert_eq!(txn.description.as_deref(), Some("UBER EATS TORONTO"));
        assert_eq!(txn.time, None);
        assert_eq!(txn.category, "Transport");
        assert_eq!(txn.tags, vec!["Work", "Rides"]);

        let explicit = ImportRecord {
            category: Some("Food".into()),
            ..record
        };
        let txn = explicit.into_transaction(&rules);
        assert_eq!(txn.category, "Food");
        assert_eq!(txn.tags, vec!["Work"]);
    }

    #[test]
    fn test_export_then_import_rejects_exact_duplicates() {
        let (_dir, mut store) = test_store();
        let records = parse_records(
            br#"[{"amount": 3.62, "description": "COUCHE-TARD # 1319", "card_type": "credit card",
                 "date": "2025-02-04", "time": "19:10:00", "bank": "capital_one_credit",
                 "category": "Convenience", "tags": ["Snacks"]},
                {"amount": 9.99, "description": "no date"}]"#,
        )
        .unwrap();
        let result = import_records(&mut store, records).unwrap();
        assert_eq!(
            result,
            ImportResult {
                records: 2,
                inserted: 1,
                duplicates: 0,
                invalid: 1
            }
        );

        let stored = store.all_transactions().unwrap();
        assert_eq!(stored[0].category, "Convenience");
        assert_eq!(stored[0].tags, vec!["Snacks"]);

        let mut exported = Vec::new();
        write_json(&stored, &mut exported).unwrap();
        let again = import_records(&mut store, parse_records(&exported).unwrap()).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 1);
        assert_eq!(store.all_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_import_file_missing() {
        let (dir, mut store) = test_store();
        assert!(import_file(&mut store, &dir.path().join("nope.json")).is_err());
    }
}
