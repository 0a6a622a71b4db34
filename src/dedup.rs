//! Cross-provider duplicate detection for the public feed.
//!
//! Studios often list the same class on Eventbrite and Acuity. Two listings
//! are the same occurrence when they come from different providers, start at
//! most ten minutes apart, are in the same city and have overlapping titles.

use chrono::Duration;

use crate::models::{NormalizedEvent, Source};

const TITLE_PREFIX_CHARS: usize = 15;
/// Shortest shared leading phrase that still counts as the same title.
const MIN_SHARED_PREFIX_CHARS: usize = 10;
const MAX_START_GAP_MINUTES: i64 = 10;

fn prefix(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Length in chars of the common leading text of `a` and `b`, cut back to
/// the last point where both titles are at a word boundary.
fn shared_word_prefix(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let common = a.iter().zip(&b).take_while(|(x, y)| x == y).count();

    let boundary = |chars: &[char], at: usize| at == chars.len() || !chars[at].is_alphanumeric();
    (1..=common)
        .rev()
        .find(|&len| boundary(&a, len) && boundary(&b, len))
        .map(|len| a[..len].iter().collect::<String>().trim_end().chars().count())
        .unwrap_or(0)
}

pub fn titles_overlap(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&prefix(&b, TITLE_PREFIX_CHARS))
        || b.contains(&prefix(&a, TITLE_PREFIX_CHARS))
        || shared_word_prefix(&a, &b) >= MIN_SHARED_PREFIX_CHARS
}

/// Symmetric; events from the same provider are never duplicates.
pub fn are_duplicates(a: &NormalizedEvent, b: &NormalizedEvent) -> bool {
    if a.source == b.source || a.city != b.city {
        return false;
    }
    let gap = (a.start_date - b.start_date).abs();
    gap <= Duration::minutes(MAX_START_GAP_MINUTES) && titles_overlap(&a.title, &b.title)
}

/// Keeps the first listing of every occurrence, Eventbrite ahead of Acuity.
/// Relative order inside each provider is preserved.
pub fn deduplicate(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut ordered = events;
    ordered.sort_by_key(|event| match event.source {
        Source::Eventbrite => 0,
        Source::Acuity => 1,
    });

    let mut kept: Vec<NormalizedEvent> = Vec::with_capacity(ordered.len());
    for event in ordered {
        if kept.iter().any(|existing| are_duplicates(existing, &event)) {
            tracing::debug!(id = %event.id, "dropping duplicate listing");
            continue;
        }
        kept.push(event);
    }
    kept
}
