use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Result, TallyError};
use crate::models::{split_tags, ExtractedTransaction, KeywordRule, StoredRule, StoredTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    DuplicateRejected,
}

/// Write-once contract for finalized transactions, plus the two reads the
/// pipeline needs before writing.
pub trait TransactionStore {
    fn insert(&mut self, txn: &ExtractedTransaction) -> Result<InsertOutcome>;

    /// Whether any stored transaction has `amount` (to the cent) dated within
    /// `start..=end` (`YYYY-MM-DD`).
    fn has_amount_between(&self, amount: f64, start: &str, end: &str) -> Result<bool>;

    /// Active keyword rules in evaluation order.
    fn active_rules(&self) -> Result<Vec<KeywordRule>>;
}

/// Validated, typed view of the fields the `transactions` table requires.
struct NewRow<'a> {
    amount: f64,
    date: &'a str,
}

fn validate(txn: &ExtractedTransaction) -> Result<NewRow<'_>> {
    let raw_amount = txn
        .amount
        .as_deref()
        .ok_or_else(|| TallyError::Validation("missing amount".into()))?;
    let amount: f64 = raw_amount
        .parse()
        .map_err(|_| TallyError::Validation(format!("amount is not a number: {raw_amount:?}")))?;
    if !amount.is_finite() {
        return Err(TallyError::Validation(format!("amount is not finite: {raw_amount:?}")));
    }
    let date = txn
        .date
        .as_deref()
        .ok_or_else(|| TallyError::Validation("missing date".into()))?;
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(TallyError::Validation(format!("date is not YYYY-MM-DD: {date:?}")));
    }
    Ok(NewRow { amount, date })
}

fn link_tag(conn: &Connection, txn_id: i64, tag: &str) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO tags (tag_name) VALUES (?1)", [tag])?;
    conn.execute(
        "INSERT OR IGNORE INTO transaction_tags (transaction_id, tag_id) \
         SELECT ?1, id FROM tags WHERE tag_name = ?2",
        params![txn_id, tag],
    )?;
    Ok(())
}

fn tags_for(conn: &Connection, txn_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.tag_name FROM transaction_tags tt JOIN tags t ON t.id = tt.tag_id \
         WHERE tt.transaction_id = ?1 ORDER BY tt.rowid",
    )?;
    let tags = stmt
        .query_map([txn_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(tags)
}

const TXN_COLUMNS: &str = "id, amount, description, card_type, date, time, bank, category, created_at";

fn txn_from_row(row: &Row) -> rusqlite::Result<StoredTransaction> {
    Ok(StoredTransaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        description: row.get(2)?,
        card_type: row.get(3)?,
        date: row.get(4)?,
        time: row.get(5)?,
        bank: row.get(6)?,
        category: row.get(7)?,
        tags: Vec::new(),
        created_at: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
    })
}

fn rule_from_row(row: &Row) -> rusqlite::Result<StoredRule> {
    let tags: Option<String> = row.get(3)?;
    Ok(StoredRule {
        id: row.get(0)?,
        keyword: row.get(1)?,
        category: row.get(2)?,
        tags: split_tags(tags.as_deref()),
        is_active: row.get::<_, i64>(4)? != 0,
    })
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    fn query_transactions(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<StoredTransaction>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt
            .query_map(params, txn_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for txn in &mut rows {
            txn.tags = tags_for(&self.conn, txn.id)?;
        }
        Ok(rows)
    }

    /// Most recent first, optionally restricted to one bank.
    pub fn list_transactions(&self, bank: Option<&str>, limit: usize) -> Result<Vec<StoredTransaction>> {
        let limit = limit as i64;
        match bank {
            Some(bank) => self.query_transactions(
                &format!(
                    "SELECT {TXN_COLUMNS} FROM transactions WHERE bank = ?1 \
                     ORDER BY date DESC, time DESC, id DESC LIMIT ?2"
                ),
                &[&bank, &limit],
            ),
            None => self.query_transactions(
                &format!(
                    "SELECT {TXN_COLUMNS} FROM transactions \
                     ORDER BY date DESC, time DESC, id DESC LIMIT ?1"
                ),
                &[&limit],
            ),
        }
    }

    /// Largest amounts first.
    pub fn top_transactions(&self, limit: usize) -> Result<Vec<StoredTransaction>> {
        self.query_transactions(
            &format!("SELECT {TXN_COLUMNS} FROM transactions ORDER BY amount DESC, id ASC LIMIT ?1"),
            &[&(limit as i64)],
        )
    }

    /// Every stored transaction in insertion order.
    pub fn all_transactions(&self) -> Result<Vec<StoredTransaction>> {
        self.query_transactions(&format!("SELECT {TXN_COLUMNS} FROM transactions ORDER BY id"), &[])
    }

    pub fn delete_transaction(&mut self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(TallyError::NotFound(format!("transaction {id}")));
        }
        info!(id, "deleted transaction");
        Ok(())
    }

    /// Overwrite the category and add `tags` to a stored transaction.
    pub fn update_classification(&mut self, id: i64, category: &str, tags: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("UPDATE transactions SET category = ?1 WHERE id = ?2", params![category, id])?;
        for tag in tags {
            link_tag(&tx, id, tag)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace the category of one stored transaction.
    pub fn set_category(&mut self, id: i64, category: &str) -> Result<()> {
        let category = category.trim();
        if category.is_empty() {
            return Err(TallyError::Other("category cannot be empty".into()));
        }
        let updated = self
            .conn
            .execute("UPDATE transactions SET category = ?1 WHERE id = ?2", params![category, id])?;
        if updated == 0 {
            return Err(TallyError::NotFound(format!("transaction {id}")));
        }
        info!(id, category, "set category");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// Delete a tag and unlink it from every transaction. Returns how many
    /// transactions carried it.
    pub fn delete_tag(&mut self, tag: &str) -> Result<usize> {
        let tag = tag.trim();
        let tx = self.conn.transaction()?;
        let tag_id: i64 = tx
            .query_row("SELECT id FROM tags WHERE tag_name = ?1", [tag], |r| r.get(0))
            .optional()?
            .ok_or_else(|| TallyError::NotFound(format!("tag '{tag}'")))?;
        let unlinked = tx.execute("DELETE FROM transaction_tags WHERE tag_id = ?1", [tag_id])?;
        tx.execute("DELETE FROM tags WHERE id = ?1", [tag_id])?;
        tx.commit()?;
        info!(tag, unlinked, "deleted tag");
        Ok(unlinked)
    }

    /// Tag names with the number of transactions carrying each.
    pub fn tag_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.tag_name, count(tt.transaction_id) FROM tags t \
             LEFT JOIN transaction_tags tt ON tt.tag_id = t.id \
             GROUP BY t.id ORDER BY t.tag_name",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Attach `tag` to every listed transaction, creating the tag on first
    /// use. Returns how many links were new. Unknown ids are an error and
    /// nothing is written.
    pub fn assign_tag(&mut self, tag: &str, ids: &[i64]) -> Result<usize> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(TallyError::Other("tag name cannot be empty".into()));
        }
        let tx = self.conn.transaction()?;
        let mut added = 0;
        for id in ids {
            let exists = tx
                .prepare_cached("SELECT 1 FROM transactions WHERE id = ?1")?
                .exists([*id])?;
            if !exists {
                return Err(TallyError::NotFound(format!("transaction {id}")));
            }
            let before = tags_for(&tx, *id)?.len();
            link_tag(&tx, *id, tag)?;
            if tags_for(&tx, *id)?.len() > before {
                added += 1;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // Keyword rules
    // -----------------------------------------------------------------------

    /// Create a rule, or replace the category and tags of an existing rule
    /// with the same keyword and reactivate it.
    pub fn upsert_rule(&mut self, keyword: &str, category: Option<&str>, tags: &[String]) -> Result<i64> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(TallyError::Other("rule keyword cannot be empty".into()));
        }
        if category.is_none() && tags.is_empty() {
            return Err(TallyError::Other("a rule needs a category or at least one tag".into()));
        }
        let tags: Vec<&str> = tags.iter().map(|t| t.trim()).collect();
        if let Some(bad) = tags.iter().find(|t| t.is_empty() || t.contains(',')) {
            return Err(TallyError::Other(format!(
                "invalid rule tag {bad:?}: tags cannot be empty or contain ','"
            )));
        }
        let joined = tags.join(",");
        let tags_col = if joined.is_empty() { None } else { Some(joined) };
        let id = self.conn.query_row(
            "INSERT INTO keyword_rules (keyword, category, tags, is_active) VALUES (?1, ?2, ?3, 1) \
             ON CONFLICT(keyword) DO UPDATE SET category = excluded.category, tags = excluded.tags, is_active = 1 \
             RETURNING id",
            params![keyword, category, tags_col],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_rules(&self) -> Result<Vec<StoredRule>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, keyword, category, tags, is_active FROM keyword_rules ORDER BY id")?;
        let rules = stmt
            .query_map([], rule_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// Deactivate a rule; returns it as it was before the change.
    pub fn deactivate_rule(&mut self, id: i64) -> Result<StoredRule> {
        let rule = self
            .conn
            .query_row(
                "SELECT id, keyword, category, tags, is_active FROM keyword_rules WHERE id = ?1",
                [id],
                rule_from_row,
            )
            .optional()?
            .ok_or_else(|| TallyError::NotFound(format!("rule {id}")))?;
        if !rule.is_active {
            return Err(TallyError::Other(format!("Rule {id} is already inactive")));
        }
        self.conn.execute("UPDATE keyword_rules SET is_active = 0 WHERE id = ?1", [id])?;
        Ok(rule)
    }

    // -----------------------------------------------------------------------
    // Import ledger
    // -----------------------------------------------------------------------

    pub fn checksum_imported(&self, checksum: &str) -> Result<bool> {
        let exists = self
            .conn
            .prepare_cached("SELECT 1 FROM imports WHERE checksum = ?1")?
            .exists([checksum])?;
        Ok(exists)
    }

    pub fn record_import(&mut self, filename: &str, checksum: &str, message_id: Option<&str>, outcome: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO imports (filename, checksum, message_id, outcome) VALUES (?1, ?2, ?3, ?4)",
            params![filename, checksum, message_id, outcome],
        )?;
        Ok(())
    }
}

impl TransactionStore for SqliteStore {
    fn insert(&mut self, txn: &ExtractedTransaction) -> Result<InsertOutcome> {
        let row = validate(txn)?;
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM transactions \
                 WHERE round(amount, 2) = round(?1, 2) AND date = ?2 AND time IS ?3 AND bank = ?4",
                params![row.amount, row.date, txn.time, txn.bank],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(existing) = existing {
            debug!(existing, bank = %txn.bank, date = row.date, "exact duplicate rejected");
            return Ok(InsertOutcome::DuplicateRejected);
        }

        tx.execute(
            "INSERT INTO transactions (amount, description, card_type, date, time, bank, full_email, category) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.amount,
                txn.description.as_deref().unwrap_or_default(),
                txn.card_type,
                row.date,
                txn.time,
                txn.bank,
                txn.full_email,
                txn.category,
            ],
        )?;
        let id = tx.last_insert_rowid();
        for tag in &txn.tags {
            link_tag(&tx, id, tag)?;
        }
        tx.commit()?;
        Ok(InsertOutcome::Inserted(id))
    }

    fn has_amount_between(&self, amount: f64, start: &str, end: &str) -> Result<bool> {
        let found = self
            .conn
            .prepare_cached(
                "SELECT 1 FROM transactions \
                 WHERE round(amount, 2) = round(?1, 2) AND date BETWEEN ?2 AND ?3",
            )?
            .exists(params![amount, start, end])?;
        Ok(found)
    }

    fn active_rules(&self) -> Result<Vec<KeywordRule>> {
        Ok(self
            .list_rules()?
            .into_iter()
            .filter(|r| r.is_active)
            .flat_map(|r| r.expand())
            .collect())
    }
}
