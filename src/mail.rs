use std::path::{Path, PathBuf};

use chrono::DateTime;
use mailparse::{parse_mail, DispositionType, MailHeaderMap, ParsedMail};
use walkdir::WalkDir;

use crate::error::{Result, TallyError};
use crate::models::RawMessage;
use crate::registry::normalize_address;

// ---------------------------------------------------------------------------
// .eml discovery
// ---------------------------------------------------------------------------

fn is_eml(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("eml"))
        .unwrap_or(false)
}

/// A single `.eml` file, or every `.eml` under a directory in sorted order.
pub fn collect_eml_files(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        return Err(TallyError::NotFound(input.display().to_string()));
    }
    if input.is_file() {
        if !is_eml(input) {
            return Err(TallyError::Other(format!(
                "not an .eml file: {}",
                input.display()
            )));
        }
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_eml(p))
        .collect();
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn first_body(mail: &ParsedMail, mimetype: &str) -> Option<String> {
    if mail.get_content_disposition().disposition == DispositionType::Attachment {
        return None;
    }
    if mail.subparts.is_empty() && mail.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        return mail.get_body().ok();
    }
    mail.subparts.iter().find_map(|part| first_body(part, mimetype))
}

/// Build a [`RawMessage`] from raw RFC-822 bytes. `fallback_id` is used when
/// the message has no `Message-ID` header.
pub fn parse_eml(bytes: &[u8], fallback_id: &str) -> Result<RawMessage> {
    let mail = parse_mail(bytes)?;
    let headers = &mail.headers;

    let message_id = headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback_id.to_string());

    Ok(RawMessage {
        message_id,
        sender: normalize_address(&headers.get_first_value("From").unwrap_or_default()),
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        body_text: first_body(&mail, "text/plain"),
        body_html: first_body(&mail, "text/html"),
        received: headers.get_first_value("Date").unwrap_or_default(),
    })
}

/// Split an RFC-2822 `Date` header into (`YYYY-MM-DD`, `HH:MM:SS`) in the
/// sender's own offset. The weekday is ignored because bank mailers often get
/// it wrong; a trailing `(UTC)` style comment is dropped. Anything unparseable
/// yields `(None, None)`.
pub fn parse_received(raw: &str) -> (Option<String>, Option<String>) {
    let mut s = raw.trim();
    if let Some(idx) = s.find(',') {
        if s[..idx].trim().chars().all(|c| c.is_ascii_alphabetic()) {
            s = s[idx + 1..].trim_start();
        }
    }
    if s.ends_with(')') {
        if let Some(idx) = s.rfind('(') {
            s = s[..idx].trim_end();
        }
    }

    match DateTime::parse_from_rfc2822(s) {
        Ok(dt) => (
            Some(dt.format("%Y-%m-%d").to_string()),
            Some(dt.format("%H:%M:%S").to_string()),
        ),
        Err(_) => (None, None),
    }
}
