//! Plain-text rendering of the staff digest.

use std::fmt::Write as _;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::config::DigestConfig;
use crate::models::{DigestCity, DigestItem, Source};

pub const EMPTY_BODY: &str = "No events or classes scheduled for today.\n\nColorCocktailFactory.com";
const SITE_FOOTER: &str = "ColorCocktailFactory.com";
const FULL_FLAG: &str = "🔴 FULL";
const LOW_ENROLLMENT_FLAG: &str = "⚠️ LOW ENROLLMENT";

/// `CCF Today — Chicago + Eugene — Sunday, Mar 1`
pub fn format_digest_subject(items: &[DigestItem], date: NaiveDate) -> String {
    let mut cities: Vec<&str> = Vec::new();
    for item in items {
        if item.city == DigestCity::Unknown {
            continue;
        }
        let name = item.city.as_str();
        if !cities.contains(&name) {
            cities.push(name);
        }
    }
    let cities = if cities.is_empty() {
        "All Locations".to_string()
    } else {
        cities.join(" + ")
    };
    format!("CCF Today — {cities} — {}", date.format("%A, %b %-d"))
}

pub fn format_digest_body(items: &[DigestItem], config: &DigestConfig) -> String {
    if items.is_empty() {
        return EMPTY_BODY.to_string();
    }

    let sections: [(&str, Vec<&DigestItem>); 3] = [
        ("CHICAGO", items.iter().filter(|i| i.city == DigestCity::Chicago).collect()),
        ("EUGENE", items.iter().filter(|i| i.city == DigestCity::Eugene).collect()),
        (
            "EVENTBRITE EXCLUSIVES",
            items.iter().filter(|i| i.source == Source::Eventbrite).collect(),
        ),
    ];

    let mut body = String::new();
    for (heading, section) in sections.iter().filter(|(_, s)| !s.is_empty()) {
        body.push_str(heading);
        body.push('\n');
        for item in section {
            body.push_str(&format_line(item, config));
            body.push('\n');
        }
        body.push('\n');
    }

    let total: u32 = items.iter().map(|item| item.registered).sum();
    let _ = write!(body, "\nTotal registrations today: {total}\n");
    body.push_str("\n—\n");
    body.push_str(SITE_FOOTER);
    body.push('\n');
    body
}

fn format_time(item: &DigestItem, tz: Tz) -> String {
    item.start.with_timezone(&tz).format("%-I:%M %p").to_string()
}

fn seats(item: &DigestItem) -> Option<String> {
    match (item.remaining, item.capacity) {
        (Some(0), _) => None,
        (Some(left), _) => Some(format!("{left} seats left")),
        (None, Some(capacity)) => Some(format!("capacity {capacity}")),
        (None, None) => None,
    }
}

pub fn flags(item: &DigestItem, config: &DigestConfig) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if item.remaining == Some(0) {
        flags.push(FULL_FLAG);
    }
    if item.registered < config.low_enrollment_threshold {
        flags.push(LOW_ENROLLMENT_FLAG);
    }
    flags
}

fn format_line(item: &DigestItem, config: &DigestConfig) -> String {
    let mut line = format!(
        "• {} — {} — {} registered",
        format_time(item, config.timezone),
        item.title,
        item.registered
    );
    if let Some(seats) = seats(item) {
        let _ = write!(line, " ({seats})");
    }
    let flags = flags(item, config);
    if !flags.is_empty() {
        line.push(' ');
        line.push_str(&flags.join(" "));
    }
    line
}
