//! Eventbrite v3 client: live organization events and attendee counts.

use reqwest::Url;
use serde::Deserialize;

use super::{Auth, JsonFetcher, ProviderError};
use crate::config::EventbriteCredentials;
use crate::models::Source;

pub const EVENTBRITE_API_BASE: &str = "https://www.eventbriteapi.com/v3/";
pub const PAGE_SIZE: u32 = 50;
const MAX_PAGES: usize = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextField {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventbriteTime {
    pub utc: Option<String>,
    pub local: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAddress {
    pub address_1: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVenue {
    pub name: Option<String>,
    pub address: Option<RawAddress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLogo {
    pub url: Option<String>,
}

/// An event as returned by the list endpoint. Every field past `id` is
/// optional because the API omits or nulls them freely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEventbriteEvent {
    pub id: String,
    pub name: Option<TextField>,
    pub description: Option<TextField>,
    pub summary: Option<String>,
    pub start: Option<EventbriteTime>,
    pub end: Option<EventbriteTime>,
    pub url: Option<String>,
    pub venue: Option<RawVenue>,
    pub logo: Option<RawLogo>,
    #[serde(default)]
    pub is_free: bool,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub capacity: Option<u32>,
    #[serde(default)]
    pub online_event: bool,
}

impl RawEventbriteEvent {
    pub fn title(&self) -> Option<&str> {
        self.name
            .as_ref()
            .and_then(|name| name.text.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn address(&self) -> Option<&RawAddress> {
        self.venue.as_ref().and_then(|venue| venue.address.as_ref())
    }
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    object_count: Option<u32>,
    #[serde(default)]
    has_more_items: bool,
    continuation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    events: Vec<RawEventbriteEvent>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct AttendeesResponse {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Clone)]
pub struct EventbriteClient {
    credentials: Option<EventbriteCredentials>,
    base_url: Url,
    fetcher: JsonFetcher,
}

impl EventbriteClient {
    pub fn new(credentials: Option<EventbriteCredentials>, fetcher: JsonFetcher) -> Self {
        Self {
            credentials,
            base_url: Url::parse(EVENTBRITE_API_BASE).expect("valid eventbrite base url"),
            fetcher,
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn credentials(&self) -> Result<&EventbriteCredentials, ProviderError> {
        self.credentials.as_ref().ok_or(ProviderError::NotConfigured {
            provider: Source::Eventbrite,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|err| ProviderError::Transport {
                provider: Source::Eventbrite,
                message: format!("invalid endpoint {path}: {err}"),
            })
    }

    /// Live events ordered by start time, following continuation pages.
    pub async fn list_live_events(&self) -> Result<Vec<RawEventbriteEvent>, ProviderError> {
        let credentials = self.credentials()?;
        let auth = Auth::Bearer(credentials.token.clone());
        let path = match &credentials.org_id {
            Some(org_id) => format!("organizations/{org_id}/events/"),
            None => "users/me/events/".to_string(),
        };

        let mut events = Vec::new();
        let mut continuation: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut url = self.endpoint(&path)?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("status", "live")
                    .append_pair("order_by", "start_asc")
                    .append_pair("page_size", &PAGE_SIZE.to_string())
                    .append_pair("expand", "venue");
                if let Some(token) = &continuation {
                    query.append_pair("continuation", token);
                }
            }

            let page: EventListResponse = self.fetcher.get(Source::Eventbrite, url, &auth).await?;
            events.extend(page.events);

            let pagination = page.pagination.unwrap_or_default();
            match pagination.continuation {
                Some(token) if pagination.has_more_items => continuation = Some(token),
                _ => return Ok(events),
            }
        }

        tracing::warn!(pages = MAX_PAGES, "eventbrite pagination cap reached");
        Ok(events)
    }

    /// Number of attendees currently holding a ticket for `event_id`.
    pub async fn attendee_count(&self, event_id: &str) -> Result<u32, ProviderError> {
        let credentials = self.credentials()?;
        let auth = Auth::Bearer(credentials.token.clone());
        let mut url = self.endpoint(&format!("events/{event_id}/attendees/"))?;
        url.query_pairs_mut().append_pair("status", "attending");

        let response: AttendeesResponse = self.fetcher.get(Source::Eventbrite, url, &auth).await?;
        Ok(response
            .pagination
            .and_then(|pagination| pagination.object_count)
            .unwrap_or(0))
    }
}
