//! Password list grammar.
//!
//! One secret per line. Lines before [`VIEWONLY_MARKER`] grant full
//! control, lines after it are view-only. `#` lines and lines containing
//! [`COMMENT_MARKER`] are comments, [`EMPTY_MARKER`] is the empty password,
//! [`SKIP_MARKER`] is a placeholder, and blank lines are ignored. Secrets are
//! bytes: only a trailing `\r` is stripped, other whitespace is kept.

use crate::{CredentialError, CredentialSlot, Secret, SlotSource, Tier};

/// Separates full-control secrets from view-only secrets.
pub const VIEWONLY_MARKER: &[u8] = b"__BEGIN_VIEWONLY__";
/// A line holding the empty password.
pub const EMPTY_MARKER: &[u8] = b"__EMPTY__";
/// A placeholder line that holds no secret.
pub const SKIP_MARKER: &[u8] = b"__SKIP__";
/// Any line containing this is a comment.
pub const COMMENT_MARKER: &[u8] = b"__COMM__";

/// Parse a password list into ordered slots.
///
/// Full slots come first in file order, the first one being the primary;
/// view-only slots follow.
pub fn parse(text: &[u8], source: SlotSource) -> Result<Vec<CredentialSlot>, CredentialError> {
    let mut full = Vec::new();
    let mut view_only = Vec::new();
    let mut marker_line = None;

    for (idx, raw) in text.split(|&b| b == b'\n').enumerate() {
        let line = raw.strip_suffix(b"\r").unwrap_or(raw);
        let lineno = idx + 1;

        if line.is_empty() || line.starts_with(b"#") || contains(line, COMMENT_MARKER) {
            continue;
        }
        if line == SKIP_MARKER {
            continue;
        }
        if line == VIEWONLY_MARKER {
            if let Some(first) = marker_line {
                return Err(CredentialError::malformed(
                    lineno,
                    &format!("view-only marker repeated (first on line {first})"),
                ));
            }
            marker_line = Some(lineno);
            continue;
        }

        let secret = if line == EMPTY_MARKER {
            Secret::new(Vec::new())
        } else {
            Secret::new(line)
        };
        let tier = if marker_line.is_some() {
            Tier::ViewOnly
        } else {
            Tier::Full
        };
        let slot = CredentialSlot::new(tier, secret, source);
        match tier {
            Tier::Full => full.push(slot),
            Tier::ViewOnly => view_only.push(slot),
        }
    }

    if full.is_empty() && view_only.is_empty() {
        return Err(CredentialError::EmptyCredentials);
    }
    if full.is_empty() {
        return Err(CredentialError::MalformedSpec {
            reason: "view-only passwords given without a full-access password".to_owned(),
        });
    }

    full.extend(view_only);
    Ok(full)
}

/// Build an inline password list from separate full and view-only lists.
pub fn inline(full: &[String], view_only: &[String]) -> String {
    let mut text = String::new();
    for secret in full {
        push_secret(&mut text, secret);
    }
    if !view_only.is_empty() {
        text.push_str("__BEGIN_VIEWONLY__\n");
        for secret in view_only {
            push_secret(&mut text, secret);
        }
    }
    text
}

fn push_secret(text: &mut String, secret: &str) {
    if secret.is_empty() {
        text.push_str("__EMPTY__");
    } else {
        text.push_str(secret);
    }
    text.push('\n');
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
