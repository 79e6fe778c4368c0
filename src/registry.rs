//! Bank profiles: who sends the notifications, which words mark a real
//! transaction, and how to pull fields out of the text.
//!
//! Profiles are plain data read from `banks.toml`. Adding a bank means adding
//! a `[[bank]]` table; no code changes.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, TallyError};

/// The registry shipped with the binary and written out by `init`.
pub const DEFAULT_REGISTRY: &str = include_str!("../banks.toml");

/// Amount as banks write it: `$3.62`, `30,07$`, `1 234,56 $`, `$1,234.56`.
pub const AMOUNT_PATTERN: &str = r"\$?\s?\d+(?:[ ,.]\d{3})*[.,]\d{2}\s?\$?";

const DEFAULT_CARD_TYPE: &str = "credit card";

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "bank")]
    banks: Vec<BankEntry>,
}

#[derive(Debug, Deserialize)]
struct BankEntry {
    id: String,
    sender: String,
    #[serde(default = "default_card_type")]
    card_type: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    exclude_keywords: Vec<String>,
    regex: PatternSet,
}

fn default_card_type() -> String {
    DEFAULT_CARD_TYPE.to_string()
}

#[derive(Debug, Deserialize)]
struct PatternSet {
    amount: OneOrMany<PatternSpec>,
    description: OneOrMany<PatternSpec>,
    #[serde(default)]
    merchant: Option<OneOrMany<PatternSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(v) => v,
        }
    }
}

/// One pattern entry as written in the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    Regex(String),
    Labeled { label: String },
    Between { before: String, after: String },
}

// ---------------------------------------------------------------------------
// Compiled profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Amount,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Hand-written expression; the value is group `value`, else group 1.
    Regex,
    /// `Label : value` terminated by a line break.
    Labeled,
    /// Free text between two marker phrases.
    Between,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Regex => "regex",
            PatternKind::Labeled => "label",
            PatternKind::Between => "between",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub field: Field,
    pub kind: PatternKind,
    pub regex: Regex,
}

impl ExtractionRule {
    pub fn compile(field: Field, spec: &PatternSpec) -> Result<Self> {
        let (kind, source) = match spec {
            PatternSpec::Regex(raw) => (PatternKind::Regex, raw.clone()),
            PatternSpec::Labeled { label } => (
                PatternKind::Labeled,
                format!(r"(?i){}[ \t]*:[ \t]*(?P<value>.*?)\r?\n", marker_pattern(label)),
            ),
            PatternSpec::Between { before, after } => (
                PatternKind::Between,
                format!(
                    "(?i){}(?P<value>.+?){}",
                    marker_pattern(before),
                    marker_pattern(after)
                ),
            ),
        };
        let regex = Regex::new(&source)
            .map_err(|e| TallyError::Config(format!("invalid pattern {source:?}: {e}")))?;
        Ok(Self { field, kind, regex })
    }

    /// The raw captured value, or `None` when the pattern does not match or
    /// captures only whitespace.
    pub fn capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        let caps = self.regex.captures(text)?;
        let m = caps
            .name("value")
            .or_else(|| caps.get(1))
            .or_else(|| caps.get(0))?;
        let value = m.as_str();
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// Turn a literal marker phrase into a pattern: regex metacharacters are
/// escaped, spaces match any whitespace run, apostrophes match the typographic
/// one too, and `{amount}` expands to [`AMOUNT_PATTERN`].
fn marker_pattern(marker: &str) -> String {
    marker
        .split("{amount}")
        .map(|piece| {
            regex::escape(piece)
                .replace(' ', r"\s+")
                .replace('\'', "['\u{2019}]")
        })
        .collect::<Vec<_>>()
        .join(&format!("(?:{AMOUNT_PATTERN})"))
}

#[derive(Debug, Clone)]
pub struct BankProfile {
    pub id: String,
    pub sender: String,
    pub card_type: String,
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub rules: Vec<ExtractionRule>,
}

impl BankProfile {
    fn compile(entry: BankEntry) -> Result<Self> {
        let id = entry.id.trim().to_string();
        if id.is_empty() {
            return Err(TallyError::Config("bank entry with empty id".into()));
        }
        let sender = normalize_address(&entry.sender);
        if sender.is_empty() {
            return Err(TallyError::Config(format!("bank {id}: empty sender")));
        }

        let PatternSet {
            amount,
            description,
            merchant,
        } = entry.regex;
        let mut specs: Vec<(Field, PatternSpec)> = Vec::new();
        specs.extend(amount.into_vec().into_iter().map(|s| (Field::Amount, s)));
        specs.extend(description.into_vec().into_iter().map(|s| (Field::Description, s)));
        if let Some(merchant) = merchant {
            specs.extend(merchant.into_vec().into_iter().map(|s| (Field::Description, s)));
        }

        let mut rules = Vec::with_capacity(specs.len());
        for (field, spec) in &specs {
            let rule = ExtractionRule::compile(*field, spec).map_err(|e| match e {
                TallyError::Config(msg) => TallyError::Config(format!("bank {id}: {msg}")),
                other => other,
            })?;
            rules.push(rule);
        }
        for field in [Field::Amount, Field::Description] {
            if !rules.iter().any(|r| r.field == field) {
                return Err(TallyError::Config(format!(
                    "bank {id}: no {field:?} pattern configured"
                )));
            }
        }

        Ok(Self {
            id,
            sender,
            card_type: entry.card_type,
            keywords: entry.keywords,
            exclude_keywords: entry.exclude_keywords,
            rules,
        })
    }

    /// Rules for one field in priority order.
    pub fn rules_for(&self, field: Field) -> impl Iterator<Item = &ExtractionRule> {
        self.rules.iter().filter(move |r| r.field == field)
    }
}

/// Lowercased bare address; accepts `Name <addr@host>` too.
pub fn normalize_address(raw: &str) -> String {
    let raw = raw.trim();
    let bare = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw,
    };
    bare.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct BankRegistry {
    banks: Vec<BankProfile>,
}

impl BankRegistry {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(content)
            .map_err(|e| TallyError::Config(format!("malformed bank registry: {e}")))?;
        if file.banks.is_empty() {
            return Err(TallyError::Config("bank registry defines no banks".into()));
        }

        let mut banks: Vec<BankProfile> = Vec::with_capacity(file.banks.len());
        let mut ids = HashSet::new();
        let mut senders = HashSet::new();
        for entry in file.banks {
            let profile = BankProfile::compile(entry)?;
            if !ids.insert(profile.id.clone()) {
                return Err(TallyError::Config(format!("duplicate bank id: {}", profile.id)));
            }
            if !senders.insert(profile.sender.clone()) {
                warn!(
                    bank = %profile.id,
                    sender = %profile.sender,
                    "sender already claimed by an earlier bank; this profile will never match"
                );
            }
            debug!(bank = %profile.id, rules = profile.rules.len(), "loaded bank profile");
            banks.push(profile);
        }
        Ok(Self { banks })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TallyError::Config(format!("cannot read bank registry {}: {e}", path.display()))
        })?;
        let registry = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), banks = registry.banks.len(), "bank registry loaded");
        Ok(registry)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(DEFAULT_REGISTRY)
    }

    pub fn banks(&self) -> &[BankProfile] {
        &self.banks
    }

    pub fn get(&self, id: &str) -> Option<&BankProfile> {
        self.banks.iter().find(|b| b.id == id)
    }

    /// First profile, in configuration order, claiming this sender.
    pub fn find_by_sender(&self, sender: &str) -> Option<&BankProfile> {
        let wanted = normalize_address(sender);
        self.banks.iter().find(|b| b.sender == wanted)
    }
}
