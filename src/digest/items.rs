//! Today's bookings per timeslot, read through the admin endpoints.
//!
//! No customer data leaves this module: appointments are reduced to a count
//! per (appointment type, start time) before anything else sees them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::schedule::DayWindow;
use crate::models::{DigestCity, DigestItem, Source};
use crate::normalize::{infer_city, parse_provider_time, AcuityCityMap};
use crate::providers::acuity::{AcuityClient, ADMIN_APPOINTMENTS_URL};
use crate::providers::eventbrite::{EventbriteClient, RawEventbriteEvent};
use crate::providers::ProviderError;

const EVENTBRITE_MANAGE_URL: &str = "https://www.eventbrite.com/myevent";

pub async fn acuity_digest_items(
    client: &AcuityClient,
    cities: &AcuityCityMap,
    window: &DayWindow,
) -> Result<Vec<DigestItem>, ProviderError> {
    let types: HashMap<u64, _> = client
        .appointment_types()
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();
    let appointments = client.appointments(window.start, window.end).await?;
    let admin_link = format!("{ADMIN_APPOINTMENTS_URL}?date={}", window.date.format("%Y-%m-%d"));

    let mut items: Vec<DigestItem> = Vec::new();
    let mut slots: HashMap<(u64, DateTime<Utc>), usize> = HashMap::new();
    for appointment in appointments.iter().filter(|a| !a.canceled) {
        let Some(type_id) = appointment.appointment_type_id else {
            continue;
        };
        let Some(appointment_type) = types.get(&type_id) else {
            tracing::debug!(type_id, "appointment for unknown type");
            continue;
        };
        let Some(start) = appointment
            .datetime
            .as_deref()
            .and_then(parse_provider_time)
            .map(|t| t.with_timezone(&Utc))
        else {
            continue;
        };

        if let Some(&index) = slots.get(&(type_id, start)) {
            items[index].registered += 1;
            continue;
        }

        let city = cities.resolve_booking(
            type_id,
            appointment.calendar.as_deref(),
            Some(appointment_type.name.as_str()),
        );
        let title = Some(appointment_type.name.trim())
            .filter(|name| !name.is_empty())
            .or(appointment.type_name.as_deref())
            .unwrap_or("Unknown Class")
            .to_string();

        slots.insert((type_id, start), items.len());
        items.push(DigestItem {
            city: city.map(DigestCity::from_city).unwrap_or(DigestCity::Unknown),
            title,
            start,
            registered: 1,
            capacity: appointment_type.class_size,
            remaining: None,
            source: Source::Acuity,
            admin_link: Some(admin_link.clone()),
        });
    }

    for item in &mut items {
        item.remaining = item.capacity.map(|capacity| capacity.saturating_sub(item.registered));
    }
    items.sort_by_key(|item| item.start);
    Ok(items)
}

fn eventbrite_digest_city(event: &RawEventbriteEvent) -> DigestCity {
    let venue_name = event.venue.as_ref().and_then(|v| v.name.as_deref());
    let address_city = event.address().and_then(|a| a.city.as_deref());
    [address_city, venue_name]
        .into_iter()
        .flatten()
        .find_map(infer_city)
        .map(DigestCity::from_city)
        .unwrap_or(DigestCity::Unknown)
}

pub async fn eventbrite_digest_items(
    client: &EventbriteClient,
    window: &DayWindow,
    tz: Tz,
) -> Result<Vec<DigestItem>, ProviderError> {
    let events = client.list_live_events().await?;

    let mut items = Vec::new();
    for event in &events {
        let Some(start) = event
            .start
            .as_ref()
            .and_then(|t| t.utc.as_deref())
            .and_then(parse_provider_time)
            .map(|t| t.with_timezone(&Utc))
        else {
            continue;
        };
        if start.with_timezone(&tz).date_naive() != window.date {
            continue;
        }

        let registered = match client.attendee_count(&event.id).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(event_id = %event.id, error = %err, "attendee count unavailable");
                0
            }
        };
        let capacity = event.capacity.filter(|c| *c > 0);

        items.push(DigestItem {
            city: eventbrite_digest_city(event),
            title: event.title().unwrap_or("Untitled Event").to_string(),
            start,
            registered,
            capacity,
            remaining: capacity.map(|c| c.saturating_sub(registered)),
            source: Source::Eventbrite,
            admin_link: Some(format!("{EVENTBRITE_MANAGE_URL}?eid={}", event.id)),
        });
    }

    items.sort_by_key(|item| item.start);
    Ok(items)
}
