use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Eventbrite,
    Acuity,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Eventbrite => "eventbrite",
            Source::Acuity => "acuity",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum City {
    Chicago,
    Eugene,
    Virtual,
    Other,
}

impl City {
    pub fn as_str(&self) -> &'static str {
        match self {
            City::Chicago => "Chicago",
            City::Eugene => "Eugene",
            City::Virtual => "Virtual",
            City::Other => "Other",
        }
    }

    /// Street address of the studio in this city, if there is one.
    pub fn studio(&self) -> Option<&'static Studio> {
        match self {
            City::Chicago => Some(&CHICAGO_STUDIO),
            City::Eugene => Some(&EUGENE_STUDIO),
            City::Virtual | City::Other => None,
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "chicago" => Ok(City::Chicago),
            "eugene" => Ok(City::Eugene),
            "virtual" | "online" => Ok(City::Virtual),
            "other" => Ok(City::Other),
            other => Err(format!("unknown city: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Studio {
    pub venue_name: &'static str,
    pub street_address: &'static str,
    pub locality: &'static str,
    pub region: &'static str,
    pub postal_code: &'static str,
    pub country: &'static str,
}

pub const CHICAGO_STUDIO: Studio = Studio {
    venue_name: "Color Cocktail Factory - Pilsen",
    street_address: "1850 W 21st St",
    locality: "Chicago",
    region: "IL",
    postal_code: "60608",
    country: "US",
};

pub const EUGENE_STUDIO: Studio = Studio {
    venue_name: "Color Cocktail Factory - Eugene",
    street_address: "454 Willamette St",
    locality: "Eugene",
    region: "OR",
    postal_code: "97401",
    country: "US",
};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Cancelled,
}

/// One bookable occurrence, rebuilt from the providers on every fetch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String, // provider-prefixed: eventbrite-<id> | acuity-<type>-<time>
    pub source: Source,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub city: City,
    pub venue_name: String,
    pub street_address: String,
    pub address_locality: String,
    pub address_region: String,
    pub postal_code: String,
    pub address_country: String,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub booking_url: String,
    pub category: String,
    pub status: EventStatus,
    pub slug: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DigestCity {
    Chicago,
    Eugene,
    Unknown,
}

impl DigestCity {
    pub fn from_city(city: City) -> Self {
        match city {
            City::Chicago => DigestCity::Chicago,
            City::Eugene => DigestCity::Eugene,
            City::Virtual | City::Other => DigestCity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestCity::Chicago => "Chicago",
            DigestCity::Eugene => "Eugene",
            DigestCity::Unknown => "Unknown",
        }
    }
}

/// Per-timeslot booking aggregate for the staff digest.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DigestItem {
    pub city: DigestCity,
    pub title: String,
    #[serde(rename = "startISO")]
    pub start: DateTime<Utc>,
    pub registered: u32,
    pub capacity: Option<u32>,
    pub remaining: Option<u32>,
    pub source: Source,
    pub admin_link: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcuityTimeSlot {
    pub start: DateTime<FixedOffset>,
    #[serde(rename = "startISO")]
    pub start_iso: String,
    pub booking_url: String,
    pub remaining_seats: Option<u32>,
    pub capacity: Option<u32>,
}

/// Upcoming public slots of one appointment type. Never carries customer data.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcuitySeries {
    pub id: String,
    pub title: String,
    pub location: Option<String>,
    pub category: String,
    pub booking_url: String,
    pub times: Vec<AcuityTimeSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_city_names_case_insensitively() {
        assert_eq!("CHICAGO".parse::<City>(), Ok(City::Chicago));
        assert_eq!(" eugene ".parse::<City>(), Ok(City::Eugene));
        assert_eq!("online".parse::<City>(), Ok(City::Virtual));
        assert!("boise".parse::<City>().is_err());
    }

    #[test]
    fn only_physical_cities_have_studios() {
        assert_eq!(City::Chicago.studio().map(|s| s.region), Some("IL"));
        assert_eq!(City::Eugene.studio().map(|s| s.postal_code), Some("97401"));
        assert!(City::Virtual.studio().is_none());
        assert!(City::Other.studio().is_none());
    }

    #[test]
    fn digest_item_serializes_with_start_iso_key() {
        let item = DigestItem {
            city: DigestCity::Chicago,
            title: "Wheel Throwing".to_string(),
            start: "2026-03-01T19:00:00Z".parse().expect("timestamp"),
            registered: 4,
            capacity: None,
            remaining: None,
            source: Source::Acuity,
            admin_link: None,
        };
        let value = serde_json::to_value(&item).expect("serialize");
        assert_eq!(value["startISO"], "2026-03-01T19:00:00Z");
        assert_eq!(value["source"], "acuity");
        assert_eq!(value["city"], "Chicago");
    }
}
