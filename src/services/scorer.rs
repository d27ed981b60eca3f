//! Query-to-name match scoring.
//!
//! Tiers are tried in order and the first hit wins:
//!
//! | Kind      | Score                                   |
//! |-----------|-----------------------------------------|
//! | Exact     | 1000                                    |
//! | Prefix    | 850 − min(200, extra chars)             |
//! | Substring | 700 − min(300, 4 × match index)         |
//! | Fuzzy     | 400 + run bonuses − gap and length cost |
//!
//! Comparison is case-insensitive using simple per-char lowercase
//! folding, so results never depend on the process locale. Lengths and
//! positions are counted in chars.

use crate::types::MatchKind;
use serde::Serialize;

pub const EXACT_SCORE: i32 = 1000;
pub const PREFIX_BASE: i32 = 850;
pub const PREFIX_MAX_PENALTY: i32 = 200;
pub const SUBSTRING_BASE: i32 = 700;
pub const SUBSTRING_MAX_PENALTY: i32 = 300;
pub const SUBSTRING_POSITION_WEIGHT: i32 = 4;
pub const FUZZY_BASE: i32 = 400;
pub const FUZZY_RUN_BONUS: i32 = 15;
pub const FUZZY_MAX_GAP_PENALTY: i32 = 30;
pub const FUZZY_MAX_LENGTH_PENALTY: i32 = 100;

/// Score and match kind for one (query, candidate) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchScore {
    pub score: i32,
    pub kind: MatchKind,
}

impl MatchScore {
    pub const NONE: Self = Self {
        score: 0,
        kind: MatchKind::None,
    };

    /// Whether callers should keep this candidate.
    #[must_use]
    pub const fn is_match(self) -> bool {
        self.score > 0
    }
}

/// Scores `query` against `candidate`.
///
/// Blank inputs score `(0, None)`. A fuzzy score that drops to zero or
/// below is returned with kind `None`.
#[must_use]
pub fn score(query: &str, candidate: &str) -> MatchScore {
    if query.trim().is_empty() || candidate.trim().is_empty() {
        return MatchScore::NONE;
    }

    let query_len = char_len(query);
    let candidate_len = char_len(candidate);

    if query_len == candidate_len && starts_with_folded(candidate, query) {
        return MatchScore {
            score: EXACT_SCORE,
            kind: MatchKind::Exact,
        };
    }

    if query_len < candidate_len && starts_with_folded(candidate, query) {
        let extra = saturating_i32(candidate_len - query_len);
        return MatchScore {
            score: PREFIX_BASE - extra.min(PREFIX_MAX_PENALTY),
            kind: MatchKind::Prefix,
        };
    }

    if let Some(index) = find_folded(candidate, query, query_len, candidate_len) {
        let penalty = saturating_i32(index).saturating_mul(SUBSTRING_POSITION_WEIGHT);
        return MatchScore {
            score: SUBSTRING_BASE - penalty.min(SUBSTRING_MAX_PENALTY),
            kind: MatchKind::Substring,
        };
    }

    match fuzzy_score(query, candidate, candidate_len) {
        Some(score) if score > 0 => MatchScore {
            score,
            kind: MatchKind::Fuzzy,
        },
        Some(score) => MatchScore {
            score,
            kind: MatchKind::None,
        },
        None => MatchScore::NONE,
    }
}

/// Subsequence scoring. `None` when some query char has no match.
fn fuzzy_score(query: &str, candidate: &str, candidate_len: usize) -> Option<i32> {
    let mut score = FUZZY_BASE;
    // Position of the previous match; -1 so a match at 0 counts as adjacent.
    let mut last: i64 = -1;
    let mut run: i32 = 0;
    let mut remaining = candidate.chars().map(fold).enumerate();

    for q in query.chars().map(fold) {
        let (index, _) = remaining.find(|&(_, c)| c == q)?;
        let index = index as i64;

        if index == last + 1 {
            run += 1;
            score += FUZZY_RUN_BONUS * run;
        } else {
            run = 0;
            let gap = i32::try_from(index - last).unwrap_or(i32::MAX);
            score -= gap.min(FUZZY_MAX_GAP_PENALTY);
        }
        last = index;
    }

    score -= saturating_i32(candidate_len / 2).min(FUZZY_MAX_LENGTH_PENALTY);
    Some(score)
}

/// Earliest char index where `needle` occurs in `haystack`, folded.
fn find_folded(haystack: &str, needle: &str, needle_len: usize, haystack_len: usize) -> Option<usize> {
    if needle_len > haystack_len {
        return None;
    }
    haystack
        .char_indices()
        .take(haystack_len - needle_len + 1)
        .enumerate()
        .find(|&(_, (byte, _))| starts_with_folded(&haystack[byte..], needle))
        .map(|(index, _)| index)
}

fn starts_with_folded(haystack: &str, prefix: &str) -> bool {
    let mut hay = haystack.chars().map(fold);
    prefix.chars().map(fold).all(|p| hay.next() == Some(p))
}

/// Single-char lowercase mapping, independent of locale.
#[inline]
pub(crate) fn fold(c: char) -> char {
    if c.is_ascii() {
        c.to_ascii_lowercase()
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[inline]
fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
