use std::{collections::HashMap, fs, path::Path, path::PathBuf, time::Duration};

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::City;
use crate::utils;

pub const DEFAULT_TIMEZONE: &str = "America/Chicago";
pub const DEFAULT_SEND_TIMES: [&str; 3] = ["08:00", "13:30", "17:00"];
const DEFAULT_LOW_ENROLLMENT_THRESHOLD: u32 = 5;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_DAYS_AHEAD: i64 = 60;
const MAX_CACHE_TTL_SECONDS: u64 = 24 * 60 * 60;
const MAX_HTTP_TIMEOUT_SECONDS: u64 = 300;
const MAX_DAYS_AHEAD: i64 = 366;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("unknown timezone: {0}")]
    Timezone(String),
    #[error("send time must be HH:MM, got {0:?}")]
    SendTime(String),
    #[error("invalid value for {key}: {value:?}")]
    Value { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    #[default]
    Resend,
    Postmark,
    Sendgrid,
}

impl EmailProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resend => "resend",
            Self::Postmark => "postmark",
            Self::Sendgrid => "sendgrid",
        }
    }
}

impl std::fmt::Display for EmailProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmailProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "resend" => Ok(Self::Resend),
            "postmark" => Ok(Self::Postmark),
            "sendgrid" => Ok(Self::Sendgrid),
            other => Err(ConfigError::Value {
                key: "EMAIL_PROVIDER",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub acuity_user_id: Option<String>,
    pub acuity_api_key: Option<String>,
    pub acuity_default_city: City,
    /// Appointment type id -> studio city. Types not listed here fall back to
    /// name matching and then `acuity_default_city`.
    pub acuity_type_cities: HashMap<u64, City>,
    pub eventbrite_token: Option<String>,
    pub eventbrite_org_id: Option<String>,
    pub email_provider: EmailProviderKind,
    pub email_api_key: Option<String>,
    pub digest_to: String,
    pub digest_from: String,
    pub low_enrollment_threshold: u32,
    pub digest_timezone: String,
    pub digest_send_times: Vec<String>,
    pub cache_ttl_seconds: u64,
    pub http_timeout_seconds: u64,
    pub days_ahead: i64,
    pub database_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            acuity_user_id: None,
            acuity_api_key: None,
            acuity_default_city: City::Chicago,
            acuity_type_cities: HashMap::new(),
            eventbrite_token: None,
            eventbrite_org_id: None,
            email_provider: EmailProviderKind::default(),
            email_api_key: None,
            digest_to: "support@colorcocktailfactory.com".to_string(),
            digest_from: "info@colorcocktailfactory.com".to_string(),
            low_enrollment_threshold: DEFAULT_LOW_ENROLLMENT_THRESHOLD,
            digest_timezone: DEFAULT_TIMEZONE.to_string(),
            digest_send_times: DEFAULT_SEND_TIMES.iter().map(|t| t.to_string()).collect(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            http_timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECONDS,
            days_ahead: DEFAULT_DAYS_AHEAD,
            database_path: None,
        }
    }
}

/// Acuity login pair. Only constructed when both halves are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcuityCredentials {
    pub user_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventbriteCredentials {
    pub token: String,
    pub org_id: Option<String>,
}

/// Settings the digest formatter and trigger need.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestConfig {
    pub low_enrollment_threshold: u32,
    pub timezone: Tz,
    pub send_times: Vec<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            low_enrollment_threshold: DEFAULT_LOW_ENROLLMENT_THRESHOLD,
            timezone: chrono_tz::America::Chicago,
            send_times: DEFAULT_SEND_TIMES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Reads `config.json` from the data root (if any) and overlays the
    /// process environment on top of it.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = read_config(&utils::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(value) = get("ACUITY_USER_ID") {
            self.acuity_user_id = Some(value);
        }
        if let Some(value) = get("ACUITY_API_KEY") {
            self.acuity_api_key = Some(value);
        }
        if let Some(value) = get("ACUITY_DEFAULT_CITY") {
            self.acuity_default_city = value.parse().map_err(|_| ConfigError::Value {
                key: "ACUITY_DEFAULT_CITY",
                value,
            })?;
        }
        if let Some(value) = get("EVENTBRITE_TOKEN") {
            self.eventbrite_token = Some(value);
        }
        if let Some(value) = get("EVENTBRITE_ORG_ID") {
            self.eventbrite_org_id = Some(value);
        }
        if let Some(value) = get("EMAIL_PROVIDER") {
            self.email_provider = value.parse()?;
        }
        if let Some(value) = get("EMAIL_API_KEY") {
            self.email_api_key = Some(value);
        }
        if let Some(value) = get("DIGEST_TO") {
            self.digest_to = value;
        }
        if let Some(value) = get("DIGEST_FROM") {
            self.digest_from = value;
        }
        if let Some(value) = get("LOW_ENROLLMENT_THRESHOLD") {
            self.low_enrollment_threshold = parse_number("LOW_ENROLLMENT_THRESHOLD", value)?;
        }
        if let Some(value) = get("DIGEST_TIMEZONE") {
            self.digest_timezone = value;
        }
        if let Some(value) = get("DIGEST_SEND_TIMES") {
            self.digest_send_times = value
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(value) = get("EVENTS_CACHE_TTL_SECONDS") {
            self.cache_ttl_seconds = parse_number("EVENTS_CACHE_TTL_SECONDS", value)?;
        }
        if let Some(value) = get("HTTP_TIMEOUT_SECONDS") {
            self.http_timeout_seconds = parse_number("HTTP_TIMEOUT_SECONDS", value)?;
        }
        if let Some(value) = get("EVENTS_DAYS_AHEAD") {
            self.days_ahead = parse_number("EVENTS_DAYS_AHEAD", value)?;
        }
        if let Some(value) = get("DIGEST_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(value));
        }
        self.validate()
    }

    /// Bounds on the numeric settings; out-of-range values would overflow
    /// date arithmetic or the cache.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DAYS_AHEAD).contains(&self.days_ahead) {
            return Err(ConfigError::Value {
                key: "EVENTS_DAYS_AHEAD",
                value: self.days_ahead.to_string(),
            });
        }
        if self.cache_ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(ConfigError::Value {
                key: "EVENTS_CACHE_TTL_SECONDS",
                value: self.cache_ttl_seconds.to_string(),
            });
        }
        if self.http_timeout_seconds > MAX_HTTP_TIMEOUT_SECONDS {
            return Err(ConfigError::Value {
                key: "HTTP_TIMEOUT_SECONDS",
                value: self.http_timeout_seconds.to_string(),
            });
        }
        Ok(())
    }

    pub fn acuity_credentials(&self) -> Option<AcuityCredentials> {
        let user_id = non_empty(&self.acuity_user_id)?;
        let api_key = non_empty(&self.acuity_api_key)?;
        Some(AcuityCredentials { user_id, api_key })
    }

    pub fn eventbrite_credentials(&self) -> Option<EventbriteCredentials> {
        let token = non_empty(&self.eventbrite_token)?;
        Some(EventbriteCredentials {
            token,
            org_id: non_empty(&self.eventbrite_org_id),
        })
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.digest_timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Timezone(self.digest_timezone.clone()))
    }

    pub fn digest_config(&self) -> Result<DigestConfig, ConfigError> {
        let mut send_times = Vec::with_capacity(self.digest_send_times.len());
        for raw in &self.digest_send_times {
            send_times.push(normalize_send_time(raw)?);
        }
        Ok(DigestConfig {
            low_enrollment_threshold: self.low_enrollment_threshold,
            timezone: self.timezone()?,
            send_times,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds.max(1))
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(utils::database_path)
    }
}

/// Canonical `HH:MM` form of a send time; `8:00` becomes `08:00`.
pub fn normalize_send_time(raw: &str) -> Result<String, ConfigError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(|time| time.format("%H:%M").to_string())
        .map_err(|_| ConfigError::SendTime(raw.to_string()))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse::<T>()
        .map_err(|_| ConfigError::Value { key, value })
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let read_error = |message: String| ConfigError::Read {
        path: path.display().to_string(),
        message,
    };
    let contents = fs::read_to_string(path).map_err(|err| read_error(err.to_string()))?;
    serde_json::from_str(&contents).map_err(|err| read_error(err.to_string()))
}
