//! Payment reconciliation matching.
//!
//! Two filters narrow the shared ledger down to a member's payments: receipt names
//! scope rows to a campaign's payee, and name similarity narrows those to rows that
//! plausibly belong to a member. Neither decides payment on its own; a member is
//! paid only when a candidate row carries the member's memo id.

use crate::entities::member;
use crate::ledger::SheetEntry;
use chrono::{DateTime, Utc};

/// Tokens shorter than this never count as shared name evidence.
const MIN_SIGNIFICANT_LEN: usize = 3;

/// Removes `@` and `-`, collapses whitespace and lowercases.
///
/// Idempotent: `clean_name(&clean_name(x)) == clean_name(x)`.
#[must_use]
pub fn clean_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '@' | '-'))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn compact(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

fn significant_tokens(name: &str) -> Vec<&str> {
    name.split_whitespace()
        .filter(|t| t.chars().count() >= MIN_SIGNIFICANT_LEN)
        .collect()
}

/// True if a ledger recipient name refers to one of the campaign's receipt names.
///
/// Accepts an exact match (also with spaces removed), containment in either
/// direction, two or more shared significant tokens, or a single significant token
/// contained in the other name's tokens.
#[must_use]
pub fn matches_receipt(name: &str, receipt_names: &[String]) -> bool {
    let name = clean_name(name);
    if name.is_empty() {
        return false;
    }

    receipt_names
        .iter()
        .map(|r| clean_name(r))
        .filter(|r| !r.is_empty())
        .any(|receipt| names_match(&name, &receipt))
}

fn names_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }

    let (compact_a, compact_b) = (compact(a), compact(b));
    if compact_a == compact_b || compact_a.contains(&compact_b) || compact_b.contains(&compact_a) {
        return true;
    }

    let tokens_a = significant_tokens(a);
    let tokens_b = significant_tokens(b);
    let shared = tokens_a.iter().filter(|t| tokens_b.contains(t)).count();
    if shared >= 2 {
        return true;
    }

    (tokens_a.len() == 1 && tokens_b.contains(&tokens_a[0]))
        || (tokens_b.len() == 1 && tokens_a.contains(&tokens_b[0]))
}

/// Scores how strongly `candidate` looks like the member's name.
///
/// One point each for the first and last name appearing in the candidate (as a
/// token, or inside the spaceless form for names longer than two characters), and
/// one more when the whole name appears.
#[must_use]
pub fn score_name_similarity(member: &member::Model, candidate: &str) -> usize {
    let candidate = clean_name(candidate);
    if candidate.is_empty() {
        return 0;
    }
    let candidate_compact = compact(&candidate);
    let candidate_tokens: Vec<&str> = candidate.split_whitespace().collect();

    let part_score = |part: &str| -> usize {
        let part = clean_name(part);
        if part.is_empty() {
            return 0;
        }
        let part_compact = compact(&part);
        let found = candidate_tokens.contains(&part.as_str())
            || (part_compact.chars().count() >= MIN_SIGNIFICANT_LEN
                && candidate_compact.contains(&part_compact));
        usize::from(found)
    };

    let full = compact(&clean_name(&member.full_name()));
    let full_bonus = usize::from(!full.is_empty() && candidate_compact.contains(&full));

    part_score(&member.first_name) + part_score(&member.last_name) + full_bonus
}

/// Ledger rows whose sender (or recipient) name resembles the member.
#[must_use]
pub fn candidate_rows<'a>(member: &member::Model, rows: &'a [SheetEntry]) -> Vec<&'a SheetEntry> {
    rows.iter()
        .filter(|row| {
            score_name_similarity(member, &row.sender_name) > 0
                || score_name_similarity(member, &row.recipient_name) > 0
        })
        .collect()
}

/// A member is paid when a name-matched row carries exactly their memo id.
#[must_use]
pub fn is_member_paid(member: &member::Model, rows: &[SheetEntry]) -> bool {
    let memo_id = member.memo_id.trim();
    if memo_id.is_empty() {
        return false;
    }

    candidate_rows(member, rows)
        .iter()
        .any(|row| row.member_id.trim() == memo_id)
}

/// Rows created inside `[from, to]` whose recipient matches a receipt name.
#[must_use]
pub fn filter_for_campaign(
    rows: &[SheetEntry],
    receipt_names: &[String],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<SheetEntry> {
    rows.iter()
        .filter(|row| row.created_at >= from && row.created_at <= to)
        .filter(|row| matches_receipt(&row.recipient_name, receipt_names))
        .cloned()
        .collect()
}
