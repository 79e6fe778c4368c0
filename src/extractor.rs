use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::html::{html_to_text, tidy};
use crate::models::RawMessage;
use crate::registry::{BankProfile, Field};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub amount: Option<String>,
    pub description: Option<String>,
    pub card_type: String,
}

fn amount_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[-+]?\d[\d \u{a0},.]*").expect("invalid amount token regex")
    })
}

/// Text the patterns run against: the stripped HTML body when there is one,
/// otherwise the plain body. Always newline-terminated so line-anchored
/// labels match on the last line.
pub fn message_text(msg: &RawMessage) -> String {
    let html = msg.body_html.as_deref().filter(|h| !h.trim().is_empty());
    let text = match (html, msg.body_text.as_deref()) {
        (Some(html), _) => html_to_text(html),
        (None, Some(plain)) => plain.replace("\r\n", "\n"),
        (None, None) => String::new(),
    };
    if text.is_empty() || text.ends_with('\n') {
        text
    } else {
        format!("{text}\n")
    }
}

/// Apply a bank's patterns to message text. Fields are independent: a
/// missing amount never prevents the description from being read.
pub fn extract(bank: &BankProfile, text: &str) -> Extraction {
    let amount = bank
        .rules_for(Field::Amount)
        .find_map(|rule| rule.capture(text).and_then(normalize_amount));
    let description = bank
        .rules_for(Field::Description)
        .find_map(|rule| rule.capture(text).and_then(clean_description));

    if amount.is_none() {
        debug!(bank = %bank.id, "no amount pattern matched");
    }
    if description.is_none() {
        debug!(bank = %bank.id, "no description pattern matched");
    }

    Extraction {
        amount,
        description,
        card_type: bank.card_type.clone(),
    }
}

/// Normalize a captured amount to a dot-separated decimal string.
///
/// `30,07$` -> `30.07`, `1 234,56` -> `1234.56`, `$1,234.56` -> `1234.56`,
/// `12.5` -> `12.50`. A separator followed by exactly three digits with no
/// other separator after it is read as a thousands separator.
pub fn normalize_amount(raw: &str) -> Option<String> {
    let token = amount_token_re().find(raw)?.as_str();
    let (negative, token) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.trim_start_matches('+')),
    };
    let compact: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let compact = compact.trim_end_matches([',', '.']);
    if compact.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match compact.rfind([',', '.']) {
        Some(idx) => {
            let frac = &compact[idx + 1..];
            if frac.len() == 3 {
                (compact, "")
            } else {
                (&compact[..idx], frac)
            }
        }
        None => (compact, ""),
    };
    let int_digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    if int_digits.is_empty() {
        return None;
    }
    let int_digits = match int_digits.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };

    let sign = if negative { "-" } else { "" };
    match frac_part.len() {
        0 => Some(format!("{sign}{int_digits}")),
        1 => Some(format!("{sign}{int_digits}.{frac_part}0")),
        _ => Some(format!("{sign}{int_digits}.{}", &frac_part[..2])),
    }
}

/// Trim and collapse internal whitespace; original casing is kept.
pub fn clean_description(raw: &str) -> Option<String> {
    let cleaned = tidy(raw).lines().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BankRegistry;

    fn run(bank_id: &str, text: &str) -> Extraction {
        let reg = BankRegistry::builtin().unwrap();
        let bank = reg.get(bank_id).unwrap();
        extract(bank, &format!("{text}\n"))
    }

    #[test]
    fn test_normalize_amount() {
        assert_eq!(normalize_amount("30,07$").as_deref(), Some("30.07"));
        assert_eq!(normalize_amount("$3.62").as_deref(), Some("3.62"));
        assert_eq!(normalize_amount("1 234,56 $").as_deref(), Some("1234.56"));
        assert_eq!(normalize_amount("1\u{a0}234,56").as_deref(), Some("1234.56"));
        assert_eq!(normalize_amount("$1,234.56").as_deref(), Some("1234.56"));
        assert_eq!(normalize_amount("1.234,56").as_deref(), Some("1234.56"));
        assert_eq!(normalize_amount("1,234").as_deref(), Some("1234"));
        assert_eq!(normalize_amount("12.5").as_deref(), Some("12.50"));
        assert_eq!(normalize_amount("-8,00").as_deref(), Some("-8.00"));
        assert_eq!(normalize_amount("007.10").as_deref(), Some("7.10"));
        assert_eq!(normalize_amount("no digits"), None);
    }

    #[test]
    fn test_cibc_credit_french_sample() {
        let got = run(
            "cibc_credit",
            "Vous avez récemment effectué un achat de 30,07$ MAXI #8634 avec votre CIBC Dividend Visa Infinite Card...",
        );
        assert_eq!(got.amount.as_deref(), Some("30.07"));
        assert_eq!(got.description.as_deref(), Some("MAXI #8634"));
        assert_eq!(got.card_type, "credit card");
    }

    #[test]
    fn test_cibc_credit_english_notice() {
        let got = run("cibc_credit", "You made a purchase of $45.10 at Costco Wholesale with your card");
        assert_eq!(got.description.as_deref(), Some("Costco Wholesale"));
        assert_eq!(got.amount.as_deref(), Some("45.10"));
    }

    #[test]
    fn test_cibc_debit_labeled_fields() {
        let got = run("cibc_debit", "Montant de l'achat : 25,99$\nLieu de l'achat : MixedCaseStore");
        assert_eq!(got.amount.as_deref(), Some("25.99"));
        assert_eq!(got.description.as_deref(), Some("MixedCaseStore"));
        assert_eq!(got.card_type, "debit card");
    }

    #[test]
    fn test_capital_one_line_pattern() {
        let got = run("capital_one_credit", "COUCHE-TARD # 1319 $3.62");
        assert_eq!(got.amount.as_deref(), Some("3.62"));
        assert_eq!(got.description.as_deref(), Some("COUCHE-TARD # 1319"));
        let got = run("capital_one_credit", "MixedCaseVendor $10.00");
        assert_eq!(got.description.as_deref(), Some("MixedCaseVendor"));
    }

    #[test]
    fn test_capital_one_line_pattern_skips_greeting() {
        let got = run("capital_one_credit", "Hi Jane, a purchase was made: COUCHE-TARD # 1319 $3.62");
        assert_eq!(got.amount.as_deref(), Some("3.62"));
        assert_eq!(got.description.as_deref(), Some("COUCHE-TARD # 1319"));

        let got = run("capital_one_credit", "Amount: $3.62\nCOUCHE-TARD # 1319 $3.62");
        assert_eq!(got.description.as_deref(), Some("COUCHE-TARD # 1319"));
    }

    #[test]
    fn test_capital_one_full_template_prefers_marker_pattern() {
        let text = "As requested, we're notifying you that on February 4, 2025, at COUCHE-TARD # 1319, \
                    a pending authorization or purchase in the amount of $3.62 was placed or charged.";
        let got = run("capital_one_credit", text);
        assert_eq!(got.amount.as_deref(), Some("3.62"));
        assert_eq!(got.description.as_deref(), Some("COUCHE-TARD # 1319"));
    }

    #[test]
    fn test_mbna_and_neo() {
        let got = run("mbna_credit", "You made a purchase of $9.99 from MixedCaseVendor");
        assert_eq!(got.amount.as_deref(), Some("9.99"));
        assert_eq!(got.description.as_deref(), Some("MixedCaseVendor"));

        let got = run("neo_credit", "You earned cashback on your purchase of $12.34 at Starbucks");
        assert_eq!(got.amount.as_deref(), Some("12.34"));
        assert_eq!(got.description.as_deref(), Some("Starbucks"));

        let got = run("neo_credit", "You made a purchase of $5.55 at MixedCaseStore. Thanks!");
        assert_eq!(got.description.as_deref(), Some("MixedCaseStore"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let got = run("mbna_credit", "Nothing useful here");
        assert_eq!(got.amount, None);
        assert_eq!(got.description, None);
        assert_eq!(got.card_type, "credit card");
    }

    #[test]
    fn test_message_text_prefers_html() {
        let msg = RawMessage {
            body_text: Some("plain".into()),
            body_html: Some("<p>COUCHE-TARD # 1319 $3.62</p>".into()),
            ..Default::default()
        };
        assert_eq!(message_text(&msg), "COUCHE-TARD # 1319 $3.62\n");

        let msg = RawMessage {
            body_text: Some("line one\r\nline two".into()),
            body_html: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(message_text(&msg), "line one\nline two\n");
        assert_eq!(message_text(&RawMessage::default()), "");
    }

    #[test]
    fn test_clean_description() {
        assert_eq!(clean_description("  MAXI \n #8634 ").as_deref(), Some("MAXI #8634"));
        assert_eq!(clean_description(" \t "), None);
    }
}
