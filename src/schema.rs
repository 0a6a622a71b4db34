//! schema.org `Event` markup for event pages.

use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

use crate::models::{City, EventStatus, NormalizedEvent};

pub const SITE_URL: &str = "https://colorcocktailfactory.com";
pub const DEFAULT_EVENT_IMAGE: &str = "https://colorcocktailfactory.com/images/og-default.jpg";
const ORGANIZER_NAME: &str = "Color Cocktail Factory";

fn status_url(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Scheduled => "https://schema.org/EventScheduled",
        EventStatus::Cancelled => "https://schema.org/EventCancelled",
    }
}

fn location(event: &NormalizedEvent) -> Value {
    if event.city == City::Virtual {
        return json!({
            "@type": "VirtualLocation",
            "url": event.booking_url,
        });
    }
    json!({
        "@type": "Place",
        "name": event.venue_name,
        "address": {
            "@type": "PostalAddress",
            "streetAddress": event.street_address,
            "addressLocality": event.address_locality,
            "addressRegion": event.address_region,
            "postalCode": event.postal_code,
            "addressCountry": event.address_country,
        }
    })
}

pub fn event_json_ld(event: &NormalizedEvent) -> Value {
    let attendance_mode = if event.city == City::Virtual {
        "https://schema.org/OnlineEventAttendanceMode"
    } else {
        "https://schema.org/OfflineEventAttendanceMode"
    };

    let mut offers = Map::new();
    offers.insert("@type".into(), json!("Offer"));
    offers.insert("url".into(), json!(event.booking_url));
    offers.insert("priceCurrency".into(), json!(event.currency));
    offers.insert("availability".into(), json!("https://schema.org/InStock"));
    if let Some(price) = event.price {
        offers.insert("price".into(), json!(price));
    }

    json!({
        "@context": "https://schema.org",
        "@type": "Event",
        "name": event.title,
        "description": event.description,
        "startDate": event.start_date.to_rfc3339_opts(SecondsFormat::Secs, true),
        "endDate": event.end_date.to_rfc3339_opts(SecondsFormat::Secs, true),
        "eventStatus": status_url(event.status),
        "eventAttendanceMode": attendance_mode,
        "location": location(event),
        "image": [event.image_url.as_deref().unwrap_or(DEFAULT_EVENT_IMAGE)],
        "organizer": {
            "@type": "Organization",
            "name": ORGANIZER_NAME,
            "url": SITE_URL,
        },
        "offers": Value::Object(offers),
        "url": format!("{SITE_URL}/events/{}", event.slug),
    })
}
