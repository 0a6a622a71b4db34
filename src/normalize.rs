//! Provider records -> `NormalizedEvent` / `AcuitySeries`.
//!
//! Everything here is pure apart from `last_updated`, which callers pass in,
//! so the same raw input always yields the same id, slug, city and category.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::category::{classify, series_category};
use crate::models::{
    AcuitySeries, AcuityTimeSlot, City, EventStatus, NormalizedEvent, Source,
};
use crate::providers::acuity::{OpenSlot, RawAppointmentType, TypeAvailability};
use crate::providers::eventbrite::RawEventbriteEvent;

pub const DEFAULT_VENUE_NAME: &str = "Color Cocktail Factory";
pub const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_COUNTRY: &str = "US";
const DEFAULT_DURATION_MINUTES: i64 = 120;
const SLUG_TITLE_LEN: usize = 50;

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// Provider timestamps come as RFC 3339 (`...Z`, `...-06:00`) or, from
/// Acuity, with a colon-less offset (`2026-03-01T13:00:00-0600`).
pub fn parse_provider_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}

/// Lowercase, non-alphanumeric runs collapsed to `-`, cut to `max_len`.
pub fn slugify(text: &str, max_len: usize) -> String {
    let lowered = text.to_lowercase();
    let dashed = NON_SLUG_RE.replace_all(&lowered, "-");
    let truncated: String = dashed.chars().take(max_len).collect();
    truncated.trim_matches('-').to_string()
}

/// Studio city named anywhere in `text`.
pub fn infer_city(text: &str) -> Option<City> {
    let lower = text.to_lowercase();
    if lower.contains("chicago") || lower.contains("pilsen") {
        Some(City::Chicago)
    } else if lower.contains("eugene") {
        Some(City::Eugene)
    } else {
        None
    }
}

/// Resolves the studio for an Acuity appointment type, which carries no
/// venue of its own: explicit mapping, then names, then the default.
#[derive(Debug, Clone)]
pub struct AcuityCityMap {
    mapping: HashMap<u64, City>,
    default_city: City,
}

impl AcuityCityMap {
    pub fn new(mapping: HashMap<u64, City>, default_city: City) -> Self {
        Self {
            mapping,
            default_city,
        }
    }

    pub fn resolve(&self, appointment_type: &RawAppointmentType) -> City {
        if let Some(city) = self.mapping.get(&appointment_type.id) {
            return *city;
        }
        let named = [
            Some(appointment_type.name.as_str()),
            appointment_type.calendar.as_deref(),
            appointment_type.location.as_deref(),
        ];
        if let Some(city) = named.into_iter().flatten().find_map(infer_city) {
            return city;
        }
        tracing::warn!(
            type_id = appointment_type.id,
            name = %appointment_type.name,
            city = %self.default_city,
            "acuity type has no city mapping, using default"
        );
        self.default_city
    }

    /// Lookup for digest bookings: mapping, then calendar, then type name.
    /// There is no default here; unmatched bookings have no city.
    pub fn resolve_booking(&self, type_id: u64, calendar: Option<&str>, type_name: Option<&str>) -> Option<City> {
        if let Some(city) = self.mapping.get(&type_id) {
            return Some(*city);
        }
        let city = [calendar, type_name].into_iter().flatten().find_map(infer_city);
        if city.is_none() {
            tracing::warn!(type_id, calendar, type_name, "acuity booking has no city");
        }
        city
    }
}

impl Default for AcuityCityMap {
    fn default() -> Self {
        Self::new(HashMap::new(), City::Chicago)
    }
}

fn eventbrite_city(raw: &RawEventbriteEvent) -> City {
    if raw.online_event {
        return City::Virtual;
    }
    let venue_name = raw.venue.as_ref().and_then(|v| v.name.as_deref());
    let address_city = raw.address().and_then(|a| a.city.as_deref());
    [venue_name, address_city]
        .into_iter()
        .flatten()
        .find_map(infer_city)
        .unwrap_or(City::Other)
}

/// One Eventbrite event, or `None` when it has no title or start.
pub fn normalize_eventbrite(raw: &RawEventbriteEvent, now: DateTime<Utc>) -> Option<NormalizedEvent> {
    let title = raw.title()?.to_string();
    let start = raw
        .start
        .as_ref()
        .and_then(|t| t.utc.as_deref())
        .and_then(parse_provider_time)?
        .with_timezone(&Utc);
    let end = raw
        .end
        .as_ref()
        .and_then(|t| t.utc.as_deref())
        .and_then(parse_provider_time)
        .map(|end| end.with_timezone(&Utc))
        .unwrap_or_else(|| start + Duration::minutes(DEFAULT_DURATION_MINUTES));

    let address = raw.address();
    let field = |value: Option<&String>| value.cloned().unwrap_or_default();

    let description = raw
        .description
        .as_ref()
        .and_then(|d| d.text.clone())
        .filter(|text| !text.trim().is_empty())
        .or_else(|| raw.summary.clone())
        .unwrap_or_default();

    let status = match raw.status.as_deref() {
        None | Some("live") => EventStatus::Scheduled,
        Some(_) => EventStatus::Cancelled,
    };

    Some(NormalizedEvent {
        id: format!("eventbrite-{}", raw.id),
        source: Source::Eventbrite,
        description,
        start_date: start,
        end_date: end,
        city: eventbrite_city(raw),
        venue_name: raw
            .venue
            .as_ref()
            .and_then(|v| v.name.clone())
            .unwrap_or_else(|| DEFAULT_VENUE_NAME.to_string()),
        street_address: field(address.and_then(|a| a.address_1.as_ref())),
        address_locality: field(address.and_then(|a| a.city.as_ref())),
        address_region: field(address.and_then(|a| a.region.as_ref())),
        postal_code: field(address.and_then(|a| a.postal_code.as_ref())),
        address_country: address
            .and_then(|a| a.country.clone())
            .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        image_url: raw.logo.as_ref().and_then(|logo| logo.url.clone()),
        price: raw.is_free.then_some(0.0),
        currency: raw
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        booking_url: raw
            .url
            .clone()
            .unwrap_or_else(|| format!("https://www.eventbrite.com/e/{}", raw.id)),
        category: classify(&title).to_string(),
        status,
        slug: format!("eventbrite-{}-{}", raw.id, slugify(&title, SLUG_TITLE_LEN)),
        title,
        last_updated: now,
    })
}

/// One synthesized event per open Acuity slot.
pub fn normalize_acuity_slot(
    appointment_type: &RawAppointmentType,
    slot: &OpenSlot,
    city: City,
    booking_url: &str,
    now: DateTime<Utc>,
) -> NormalizedEvent {
    let title = appointment_type.name.trim().to_string();
    let start = slot.start.with_timezone(&Utc);
    let minutes = appointment_type
        .duration
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    let raw_time = slot.raw.time.clone().unwrap_or_else(|| slot.start.to_rfc3339());

    // Local wall clock of the studio, which is what the raw time carries.
    let slug = format!(
        "acuity-{}-{}-{}",
        appointment_type.id,
        slot.start.format("%Y-%m-%d-%H%M"),
        slugify(&title, SLUG_TITLE_LEN)
    );

    let studio = city.studio();
    NormalizedEvent {
        id: format!("acuity-{}-{}", appointment_type.id, raw_time),
        source: Source::Acuity,
        description: appointment_type
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Join us for {title} at {DEFAULT_VENUE_NAME}.")),
        start_date: start,
        end_date: start + Duration::minutes(minutes),
        city,
        venue_name: studio
            .map(|s| s.venue_name)
            .unwrap_or(DEFAULT_VENUE_NAME)
            .to_string(),
        street_address: studio.map(|s| s.street_address).unwrap_or_default().to_string(),
        address_locality: studio.map(|s| s.locality).unwrap_or_default().to_string(),
        address_region: studio.map(|s| s.region).unwrap_or_default().to_string(),
        postal_code: studio.map(|s| s.postal_code).unwrap_or_default().to_string(),
        address_country: DEFAULT_COUNTRY.to_string(),
        image_url: appointment_type.image.clone().filter(|url| !url.is_empty()),
        price: appointment_type.price.as_ref().and_then(|p| p.amount()),
        currency: DEFAULT_CURRENCY.to_string(),
        booking_url: booking_url.to_string(),
        category: classify(&title).to_string(),
        status: EventStatus::Scheduled,
        slug,
        title,
        last_updated: now,
    }
}

/// Public schedule of one appointment type. Slots arrive sorted.
pub fn acuity_series(availability: &TypeAvailability, booking_url: &str) -> AcuitySeries {
    let appointment_type = &availability.appointment_type;
    let title = appointment_type.name.trim().to_string();
    let times = availability
        .slots
        .iter()
        .map(|slot| AcuityTimeSlot {
            start: slot.start,
            start_iso: slot
                .raw
                .time
                .clone()
                .unwrap_or_else(|| slot.start.to_rfc3339()),
            booking_url: booking_url.to_string(),
            remaining_seats: slot.raw.remaining_seats(),
            capacity: slot.raw.capacity.or(appointment_type.class_size),
        })
        .collect();

    AcuitySeries {
        id: appointment_type.id.to_string(),
        category: series_category(&title).to_string(),
        title,
        location: appointment_type
            .location
            .clone()
            .filter(|l| !l.trim().is_empty()),
        booking_url: booking_url.to_string(),
        times,
    }
}
