use tracing::debug;

use crate::registry::BankRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub is_transaction: bool,
    pub bank_id: Option<String>,
    pub matched_keyword: Option<String>,
}

impl Classification {
    fn rejected() -> Self {
        Self::default()
    }
}

/// Decide whether a message is a transaction notice and for which bank.
///
/// Keywords are plain case-insensitive substrings: `"achat"` also matches
/// inside `"achats"`. Exclusion keywords are checked first and veto the
/// message even when an inclusion keyword is present.
pub fn classify(
    sender: &str,
    subject: &str,
    body: Option<&str>,
    registry: &BankRegistry,
) -> Classification {
    let Some(bank) = registry.find_by_sender(sender) else {
        debug!(sender, "no bank profile for sender");
        return Classification::rejected();
    };

    let subject_lower = subject.to_lowercase();
    let body_lower = body.unwrap_or_default().to_lowercase();
    let hit = |keyword: &str| {
        let kw = keyword.to_lowercase();
        !kw.is_empty() && (subject_lower.contains(&kw) || body_lower.contains(&kw))
    };

    if let Some(excluded) = bank.exclude_keywords.iter().find(|k| hit(k)) {
        debug!(bank = %bank.id, keyword = %excluded, "message vetoed by exclusion keyword");
        return Classification::rejected();
    }

    match bank.keywords.iter().find(|k| hit(k)) {
        Some(keyword) => Classification {
            is_transaction: true,
            bank_id: Some(bank.id.clone()),
            matched_keyword: Some(keyword.clone()),
        },
        None => {
            debug!(bank = %bank.id, "no transaction keyword in message");
            Classification::rejected()
        }
    }
}
