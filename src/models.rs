use serde::Serialize;

pub const UNCATEGORIZED: &str = "Uncategorized";

/// A notification as it came out of the mailbox. Never modified after parsing.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    /// RFC-2822 `Date` header, kept verbatim.
    pub received: String,
}

/// One transaction pulled out of a notification, ready for the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedTransaction {
    pub amount: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "card type")]
    pub card_type: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub bank: String,
    pub full_email: String,
    pub category: String,
    pub tags: Vec<String>,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Category,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub keyword: String,
    pub target: RuleTarget,
    pub value: String,
    pub is_active: bool,
}

impl KeywordRule {
    pub fn category(keyword: &str, value: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            target: RuleTarget::Category,
            value: value.to_string(),
            is_active: true,
        }
    }

    pub fn tag(keyword: &str, value: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            target: RuleTarget::Tag,
            value: value.to_string(),
            is_active: true,
        }
    }
}

/// A persisted transaction row with its tags joined in.
#[derive(Debug, Clone, Serialize)]
pub struct StoredTransaction {
    pub id: i64,
    pub amount: f64,
    pub description: String,
    pub card_type: String,
    pub date: String,
    pub time: Option<String>,
    pub bank: String,
    pub category: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

/// A `keyword_rules` row. One row carries an optional category and any
/// number of tags for the same keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRule {
    pub id: i64,
    pub keyword: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_active: bool,
}

impl StoredRule {
    /// The evaluation-order rules for this row: the category rule first,
    /// then one tag rule per tag.
    pub fn expand(&self) -> Vec<KeywordRule> {
        let mut rules = Vec::with_capacity(self.tags.len() + 1);
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            rules.push(KeywordRule::category(&self.keyword, category));
        }
        for tag in &self.tags {
            rules.push(KeywordRule::tag(&self.keyword, tag));
        }
        for rule in &mut rules {
            rule.is_active = self.is_active;
        }
        rules
    }
}

/// Split the comma-joined `keyword_rules.tags` column.
pub fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
