use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::categorizer::categorize;
use crate::classifier::classify;
use crate::dedup::is_duplicate;
use crate::error::{Result, TallyError};
use crate::extractor::{extract, message_text};
use crate::mail::{collect_eml_files, parse_eml, parse_received};
use crate::models::{ExtractedTransaction, KeywordRule, RawMessage, UNCATEGORIZED};
use crate::registry::BankRegistry;
use crate::store::{InsertOutcome, SqliteStore, TransactionStore};

/// Run one message through classify, extract, dedup and categorize.
/// Returns `None` when the message is not a transaction notice.
pub fn process_message<S: TransactionStore + ?Sized>(
    msg: &RawMessage,
    registry: &BankRegistry,
    store: &S,
    rules: &[KeywordRule],
) -> Option<ExtractedTransaction> {
    let text = message_text(msg);
    let classification = classify(&msg.sender, &msg.subject, Some(&text), registry);
    if !classification.is_transaction {
        debug!(message_id = %msg.message_id, sender = %msg.sender, "not a transaction notice");
        return None;
    }
    let bank = registry.get(classification.bank_id.as_deref()?)?;
    debug!(
        message_id = %msg.message_id,
        bank = %bank.id,
        keyword = classification.matched_keyword.as_deref().unwrap_or_default(),
        "transaction notice"
    );

    let extraction = extract(bank, &text);
    let (date, time) = parse_received(&msg.received);
    if date.is_none() {
        warn!(message_id = %msg.message_id, received = %msg.received, "unparseable Date header");
    }

    let duplicate = match (extraction.amount.as_deref(), date.as_deref()) {
        (Some(amount), Some(date)) => is_duplicate(store, amount, date),
        _ => false,
    };

    let (category, tags) = categorize(
        extraction.description.as_deref().unwrap_or_default(),
        UNCATEGORIZED,
        &[],
        rules,
    );

    Some(ExtractedTransaction {
        amount: extraction.amount,
        description: extraction.description,
        card_type: extraction.card_type,
        date,
        time,
        bank: bank.id.clone(),
        full_email: text,
        category,
        tags,
        duplicate,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted(i64),
    /// Flagged by the ±1 day window before reaching the store.
    SkippedDuplicate,
    /// Rejected by the store's exact-match check.
    DuplicateRejected,
    Invalid,
}

impl StoreOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StoreOutcome::Inserted(_) => "inserted",
            StoreOutcome::SkippedDuplicate | StoreOutcome::DuplicateRejected => "duplicate",
            StoreOutcome::Invalid => "invalid",
        }
    }
}

/// Hand a finished transaction to the store. Validation failures are logged
/// and reported as [`StoreOutcome::Invalid`]; storage errors propagate.
pub fn store_transaction<S: TransactionStore + ?Sized>(
    store: &mut S,
    txn: &ExtractedTransaction,
) -> Result<StoreOutcome> {
    if txn.duplicate {
        info!(bank = %txn.bank, amount = ?txn.amount, date = ?txn.date, "skipping likely duplicate");
        return Ok(StoreOutcome::SkippedDuplicate);
    }
    match store.insert(txn) {
        Ok(InsertOutcome::Inserted(id)) => {
            info!(id, bank = %txn.bank, amount = ?txn.amount, "stored transaction");
            Ok(StoreOutcome::Inserted(id))
        }
        Ok(InsertOutcome::DuplicateRejected) => {
            info!(bank = %txn.bank, amount = ?txn.amount, date = ?txn.date, "store rejected duplicate");
            Ok(StoreOutcome::DuplicateRejected)
        }
        Err(TallyError::Validation(msg)) => {
            warn!(bank = %txn.bank, amount = ?txn.amount, date = ?txn.date, "dropped: {msg}");
            Ok(StoreOutcome::Invalid)
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Default)]
pub struct IngestResult {
    pub files: usize,
    pub already_imported: usize,
    pub not_transactions: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub failed: usize,
    /// Every extracted transaction, in file order.
    pub records: Vec<ExtractedTransaction>,
}

fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Ingest one `.eml` file or every `.eml` below a directory.
///
/// Files whose checksum is already in the import ledger are skipped. With
/// `dry_run` nothing is written and the ledger is ignored. A file that cannot
/// be read, parsed or stored is logged and counted; the batch carries on.
pub fn ingest_path(
    store: &mut SqliteStore,
    registry: &BankRegistry,
    input: &Path,
    dry_run: bool,
) -> Result<IngestResult> {
    let files = collect_eml_files(input)?;
    let rules = store.active_rules()?;
    let mut result = IngestResult {
        files: files.len(),
        ..Default::default()
    };

    for path in &files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot read message");
                result.failed += 1;
                continue;
            }
        };
        let checksum = compute_checksum(&bytes);
        if !dry_run && store.checksum_imported(&checksum)? {
            debug!(file = %path.display(), "already imported");
            result.already_imported += 1;
            continue;
        }
        let msg = match parse_eml(&bytes, &filename) {
            Ok(m) => m,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot parse message");
                result.failed += 1;
                continue;
            }
        };

        let Some(txn) = process_message(&msg, registry, &*store, &rules) else {
            result.not_transactions += 1;
            if !dry_run {
                store.record_import(&filename, &checksum, Some(&msg.message_id), "not_transaction")?;
            }
            continue;
        };

        if dry_run {
            result.records.push(txn);
            continue;
        }

        let outcome = match store_transaction(store, &txn) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot store transaction");
                result.failed += 1;
                result.records.push(txn);
                continue;
            }
        };
        match outcome {
            StoreOutcome::Inserted(_) => result.inserted += 1,
            StoreOutcome::SkippedDuplicate | StoreOutcome::DuplicateRejected => result.duplicates += 1,
            StoreOutcome::Invalid => result.invalid += 1,
        }
        store.record_import(&filename, &checksum, Some(&msg.message_id), outcome.label())?;
        result.records.push(txn);
    }

    info!(
        files = result.files,
        inserted = result.inserted,
        duplicates = result.duplicates,
        "ingest finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::test_store;

    fn registry() -> BankRegistry {
        BankRegistry::builtin().unwrap()
    }

    fn capital_one(body: &str) -> RawMessage {
        RawMessage {
            message_id: "m1".into(),
            sender: "notifications@capitalone.com".into(),
            subject: "A transaction was charged to your account".into(),
            body_text: Some(body.into()),
            body_html: None,
            received: "Sun, 04 Feb 2025 19:10:00 +0000".into(),
        }
    }

    const CAPITAL_ONE_EML: &str = "From: Capital One <notifications@capitalone.com>\r\n\
Subject: A transaction was charged to your account\r\n\
Date: Tue, 04 Feb 2025 19:10:00 +0000\r\n\
Message-ID: <c1@capitalone.com>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
COUCHE-TARD # 1319 $3.62\r\n";

    #[test]
    fn test_end_to_end_capital_one() {
        let (_dir, store) = test_store();
        let txn = process_message(&capital_one("COUCHE-TARD # 1319 $3.62"), &registry(), &store, &[]).unwrap();
        assert_eq!(txn.bank, "capital_one_credit");
        assert_eq!(txn.amount.as_deref(), Some("3.62"));
        assert_eq!(txn.description.as_deref(), Some("COUCHE-TARD # 1319"));
        assert_eq!(txn.card_type, "credit card");
        assert_eq!(txn.date.as_deref(), Some("2025-02-04"));
        assert_eq!(txn.time.as_deref(), Some("19:10:00"));
        assert_eq!(txn.category, UNCATEGORIZED);
        assert!(!txn.duplicate);
        assert!(txn.full_email.contains("COUCHE-TARD"));
    }

    #[test]
    fn test_english_cibc_credit_notice_is_stored() {
        let (_dir, mut store) = test_store();
        let msg = RawMessage {
            message_id: "m2".into(),
            sender: "cibc.alerts@cibc.com".into(),
            subject: "Purchase alert".into(),
            body_text: Some("You made a purchase of $45.10 at Costco Wholesale with your card".into()),
            body_html: None,
            received: "Tue, 04 Feb 2025 12:00:00 -0500".into(),
        };
        let txn = process_message(&msg, &registry(), &store, &[]).unwrap();
        assert_eq!(txn.bank, "cibc_credit");
        assert_eq!(txn.amount.as_deref(), Some("45.10"));
        assert_eq!(txn.description.as_deref(), Some("Costco Wholesale"));
        assert!(matches!(store_transaction(&mut store, &txn).unwrap(), StoreOutcome::Inserted(_)));
    }

    #[test]
    fn test_rules_applied_during_processing() {
        let (_dir, store) = test_store();
        let rules = [
            KeywordRule::category("couche-tard", "Convenience"),
            KeywordRule::tag("couche", "Snacks"),
        ];
        let txn = process_message(&capital_one("COUCHE-TARD # 1319 $3.62"), &registry(), &store, &rules).unwrap();
        assert_eq!(txn.category, "Convenience");
        assert_eq!(txn.tags, vec!["Snacks"]);
    }

    #[test]
    fn test_excluded_message_is_dropped() {
        let (_dir, store) = test_store();
        let mut msg = capital_one("Thank you for your payment of $50.");
        msg.subject = "Payment posted to your account".into();
        assert!(process_message(&msg, &registry(), &store, &[]).is_none());
    }

    #[test]
    fn test_duplicate_flag_and_store_outcomes() {
        let (_dir, mut store) = test_store();
        let reg = registry();
        let msg = capital_one("COUCHE-TARD # 1319 $3.62");

        let first = process_message(&msg, &reg, &store, &[]).unwrap();
        assert!(matches!(store_transaction(&mut store, &first).unwrap(), StoreOutcome::Inserted(_)));

        let mut next_day = msg.clone();
        next_day.received = "Wed, 05 Feb 2025 08:00:00 +0000".into();
        let second = process_message(&next_day, &reg, &store, &[]).unwrap();
        assert!(second.duplicate);
        assert_eq!(store_transaction(&mut store, &second).unwrap(), StoreOutcome::SkippedDuplicate);
    }

    #[test]
    fn test_missing_date_is_invalid() {
        let (_dir, mut store) = test_store();
        let mut msg = capital_one("COUCHE-TARD # 1319 $3.62");
        msg.received = "garbage".into();
        let txn = process_message(&msg, &registry(), &store, &[]).unwrap();
        assert!(txn.date.is_none());
        assert_eq!(store_transaction(&mut store, &txn).unwrap(), StoreOutcome::Invalid);
    }

    #[test]
    fn test_ingest_directory_with_ledger() {
        let (_dir, mut store) = test_store();
        let mail_dir = tempfile::tempdir().unwrap();
        std::fs::write(mail_dir.path().join("a.eml"), CAPITAL_ONE_EML).unwrap();
        std::fs::write(
            mail_dir.path().join("b.eml"),
            "From: friend@example.com\r\nSubject: lunch?\r\n\r\nsee you\r\n",
        )
        .unwrap();

        let reg = registry();
        let result = ingest_path(&mut store, &reg, mail_dir.path(), false).unwrap();
        assert_eq!(result.files, 2);
        assert_eq!(result.inserted, 1);
        assert_eq!(result.not_transactions, 1);
        assert_eq!(result.records.len(), 1);

        let again = ingest_path(&mut store, &reg, mail_dir.path(), false).unwrap();
        assert_eq!(again.already_imported, 2);
        assert_eq!(again.inserted, 0);
        assert_eq!(store.all_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_ingest_dry_run_writes_nothing() {
        let (_dir, mut store) = test_store();
        let mail_dir = tempfile::tempdir().unwrap();
        let path = mail_dir.path().join("a.eml");
        std::fs::write(&path, CAPITAL_ONE_EML).unwrap();

        let result = ingest_path(&mut store, &registry(), &path, true).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].amount.as_deref(), Some("3.62"));
        assert!(store.all_transactions().unwrap().is_empty());
        assert!(!store.checksum_imported(&compute_checksum(CAPITAL_ONE_EML.as_bytes())).unwrap());
    }
}
