use tracing::debug;

use crate::error::Result;
use crate::models::{KeywordRule, RuleTarget};
use crate::store::{SqliteStore, TransactionStore};

/// Apply keyword rules to a description.
///
/// Every active rule whose keyword occurs in the description (ignoring case)
/// fires in order: category rules overwrite, so the last match wins; tag
/// rules accumulate without repeats, keeping first-seen order. Tags compare
/// case-sensitively.
pub fn categorize(
    description: &str,
    initial_category: &str,
    initial_tags: &[String],
    rules: &[KeywordRule],
) -> (String, Vec<String>) {
    let desc_lower = description.to_lowercase();
    let mut category = initial_category.to_string();
    let mut tags: Vec<String> = Vec::with_capacity(initial_tags.len());
    for tag in initial_tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    for rule in rules.iter().filter(|r| r.is_active) {
        let keyword = rule.keyword.to_lowercase();
        if keyword.is_empty() || !desc_lower.contains(&keyword) {
            continue;
        }
        match rule.target {
            RuleTarget::Category => category = rule.value.clone(),
            RuleTarget::Tag => {
                if !tags.contains(&rule.value) {
                    tags.push(rule.value.clone());
                }
            }
        }
    }

    (category, tags)
}

pub struct CategorizeResult {
    pub updated: usize,
    pub unchanged: usize,
}

/// Re-run the active rules over every stored transaction.
pub fn recategorize_all(store: &mut SqliteStore) -> Result<CategorizeResult> {
    let rules = store.active_rules()?;
    let mut updated = 0usize;
    let mut unchanged = 0usize;

    for txn in store.all_transactions()? {
        let (category, tags) = categorize(&txn.description, &txn.category, &txn.tags, &rules);
        let new_tags: Vec<String> = tags.into_iter().filter(|t| !txn.tags.contains(t)).collect();
        if category == txn.category && new_tags.is_empty() {
            unchanged += 1;
            continue;
        }
        debug!(id = txn.id, %category, ?new_tags, "recategorized");
        store.update_classification(txn.id, &category, &new_tags)?;
        updated += 1;
    }

    Ok(CategorizeResult { updated, unchanged })
}
