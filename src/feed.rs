//! Public event listings: the combined feed, single event pages and the
//! Acuity-only schedule page.
//!
//! Provider failures never escape this module. A provider that errors is
//! reported in `unavailable` and contributes no events; a provider without
//! credentials is silently absent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::category::{SERIES_CATEGORY_ORDER, FALLBACK_SERIES_CATEGORY};
use crate::dedup::deduplicate;
use crate::models::{AcuitySeries, City, NormalizedEvent, Source};
use crate::normalize::{acuity_series as build_series, normalize_acuity_slot, normalize_eventbrite, AcuityCityMap};
use crate::providers::acuity::{AcuityClient, AvailabilityLimits};
use crate::providers::eventbrite::EventbriteClient;
use crate::providers::ProviderError;
use crate::schema::event_json_ld;

pub const UNAVAILABLE_MESSAGE: &str = "We're unable to load the schedule right now. Please try again shortly.";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFeed {
    pub events: Vec<NormalizedEvent>,
    /// Providers that failed for a reason other than missing credentials.
    pub unavailable: Vec<Source>,
}

impl EventFeed {
    pub fn is_degraded(&self) -> bool {
        !self.unavailable.is_empty()
    }

    pub fn in_city(mut self, city: City) -> Self {
        self.events.retain(|event| event.city == city);
        self
    }
}

pub async fn eventbrite_events(
    client: &EventbriteClient,
    now: DateTime<Utc>,
) -> Result<Vec<NormalizedEvent>, ProviderError> {
    let raw = client.list_live_events().await?;
    let total = raw.len();
    let events: Vec<_> = raw
        .iter()
        .filter_map(|event| normalize_eventbrite(event, now))
        .collect();
    if events.len() < total {
        tracing::debug!(dropped = total - events.len(), "eventbrite events without title or start");
    }
    Ok(events)
}

pub async fn acuity_events(
    client: &AcuityClient,
    cities: &AcuityCityMap,
    now: DateTime<Utc>,
    days_ahead: i64,
) -> Result<Vec<NormalizedEvent>, ProviderError> {
    let availability = client
        .availability(now, AvailabilityLimits::feed(days_ahead))
        .await?;

    let mut events = Vec::new();
    for entry in &availability {
        if entry.slots.is_empty() {
            continue;
        }
        let city = cities.resolve(&entry.appointment_type);
        let booking_url = client.booking_url(entry.appointment_type.id);
        events.extend(
            entry
                .slots
                .iter()
                .map(|slot| normalize_acuity_slot(&entry.appointment_type, slot, city, &booking_url, now)),
        );
    }
    Ok(events)
}

fn degrade(
    result: Result<Vec<NormalizedEvent>, ProviderError>,
    unavailable: &mut Vec<Source>,
) -> Vec<NormalizedEvent> {
    match result {
        Ok(events) => events,
        Err(err) if err.is_not_configured() => {
            tracing::warn!(provider = %err.provider(), "provider not configured, skipping");
            Vec::new()
        }
        Err(err) => {
            tracing::error!(provider = %err.provider(), status = ?err.status(), error = %err, "provider fetch failed");
            unavailable.push(err.provider());
            Vec::new()
        }
    }
}

/// Dedups, orders by start and drops anything not strictly after `now`.
pub fn assemble(
    eventbrite: Vec<NormalizedEvent>,
    acuity: Vec<NormalizedEvent>,
    now: DateTime<Utc>,
) -> Vec<NormalizedEvent> {
    let mut combined = eventbrite;
    combined.extend(acuity);
    let mut events = deduplicate(combined);
    events.sort_by_key(|event| event.start_date);
    events.retain(|event| event.start_date > now);
    events
}

/// Both providers fetched concurrently and merged into one upcoming list.
pub async fn event_feed(
    eventbrite: &EventbriteClient,
    acuity: &AcuityClient,
    cities: &AcuityCityMap,
    now: DateTime<Utc>,
    days_ahead: i64,
) -> EventFeed {
    let (eventbrite_result, acuity_result) = tokio::join!(
        eventbrite_events(eventbrite, now),
        acuity_events(acuity, cities, now, days_ahead)
    );

    let mut unavailable = Vec::new();
    let eventbrite_events = degrade(eventbrite_result, &mut unavailable);
    let acuity_events = degrade(acuity_result, &mut unavailable);
    let events = assemble(eventbrite_events, acuity_events, now);
    tracing::info!(event_count = events.len(), degraded = unavailable.len(), "event feed assembled");

    EventFeed { events, unavailable }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPage {
    Found {
        event: Box<NormalizedEvent>,
        json_ld: Value,
    },
    NotFound,
}

pub fn event_page(events: &[NormalizedEvent], slug: &str) -> EventPage {
    match events.iter().find(|event| event.slug == slug) {
        Some(event) => EventPage::Found {
            json_ld: event_json_ld(event),
            event: Box::new(event.clone()),
        },
        None => EventPage::NotFound,
    }
}

/// Public per-type schedules, types with no open slot left out, sorted by
/// their first slot.
pub async fn acuity_series(
    client: &AcuityClient,
    now: DateTime<Utc>,
    days_ahead: i64,
) -> Result<Vec<AcuitySeries>, ProviderError> {
    let availability = client
        .availability(now, AvailabilityLimits::series(days_ahead))
        .await?;
    let mut series: Vec<AcuitySeries> = availability
        .iter()
        .filter(|entry| !entry.slots.is_empty())
        .map(|entry| build_series(entry, &client.booking_url(entry.appointment_type.id)))
        .collect();
    series.sort_by_key(|s| s.times.first().map(|t| t.start));
    Ok(series)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub series: Vec<AcuitySeries>,
}

/// Groups in fixed category order; empty categories are omitted.
pub fn group_by_category(series: Vec<AcuitySeries>) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = SERIES_CATEGORY_ORDER
        .iter()
        .map(|category| CategoryGroup {
            category: category.to_string(),
            series: Vec::new(),
        })
        .collect();

    for item in series {
        let index = groups
            .iter()
            .position(|group| group.category == item.category)
            .or_else(|| {
                groups
                    .iter()
                    .position(|group| group.category == FALLBACK_SERIES_CATEGORY)
            });
        if let Some(index) = index {
            groups[index].series.push(item);
        }
    }

    groups.retain(|group| !group.series.is_empty());
    groups
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AcuityPage {
    NotConfigured,
    Unavailable { message: String },
    Empty,
    Listing { groups: Vec<CategoryGroup> },
}

pub async fn acuity_page(client: &AcuityClient, now: DateTime<Utc>, days_ahead: i64) -> AcuityPage {
    match acuity_series(client, now, days_ahead).await {
        Ok(series) if series.is_empty() => AcuityPage::Empty,
        Ok(series) => AcuityPage::Listing {
            groups: group_by_category(series),
        },
        Err(err) if err.is_not_configured() => {
            tracing::warn!("acuity credentials not configured");
            AcuityPage::NotConfigured
        }
        Err(err) => {
            tracing::error!(status = ?err.status(), error = %err, "acuity schedule unavailable");
            AcuityPage::Unavailable {
                message: UNAVAILABLE_MESSAGE.to_string(),
            }
        }
    }
}
