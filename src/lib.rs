pub mod category;
pub mod config;
pub mod db;
pub mod dedup;
pub mod digest;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod schema;
mod utils;

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use thiserror::Error;

use config::{AppConfig, ConfigError, DigestConfig};
use digest::{DigestJob, DigestOptions, DigestOutcome, Mailer};
use feed::{AcuityPage, EventFeed, EventPage};
use models::{AcuitySeries, City};
use normalize::AcuityCityMap;
use providers::acuity::AcuityClient;
use providers::eventbrite::EventbriteClient;
use providers::{build_client, JsonFetcher, ProviderError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to build http client: {0}")]
    Http(String),
}

/// Base URLs to use instead of the real provider APIs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub acuity: Url,
    pub eventbrite: Url,
    pub email: Url,
}

/// Shared context behind every public page and the digest trigger.
///
/// Public pages read through a TTL cache; the digest uses a second pair of
/// uncached clients so booking counts are live.
pub struct App {
    config: AppConfig,
    digest: DigestConfig,
    cities: AcuityCityMap,
    http: Client,
    eventbrite: EventbriteClient,
    acuity: AcuityClient,
    admin_eventbrite: EventbriteClient,
    admin_acuity: AcuityClient,
    email_endpoint: Option<Url>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        let digest = config.digest_config()?;
        let http = build_client(config.http_timeout()).map_err(|err| AppError::Http(err.to_string()))?;

        let cached = JsonFetcher::cached(http.clone(), config.cache_ttl());
        let live = JsonFetcher::new(http.clone());
        let acuity_credentials = config.acuity_credentials();
        let eventbrite_credentials = config.eventbrite_credentials();

        Ok(Self {
            cities: AcuityCityMap::new(config.acuity_type_cities.clone(), config.acuity_default_city),
            eventbrite: EventbriteClient::new(eventbrite_credentials.clone(), cached.clone()),
            acuity: AcuityClient::new(acuity_credentials.clone(), cached),
            admin_eventbrite: EventbriteClient::new(eventbrite_credentials, live.clone()),
            admin_acuity: AcuityClient::new(acuity_credentials, live),
            email_endpoint: None,
            digest,
            http,
            config,
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.eventbrite = self.eventbrite.with_base_url(endpoints.eventbrite.clone());
        self.admin_eventbrite = self.admin_eventbrite.with_base_url(endpoints.eventbrite);
        self.acuity = self.acuity.with_base_url(endpoints.acuity.clone());
        self.admin_acuity = self.admin_acuity.with_base_url(endpoints.acuity);
        self.email_endpoint = Some(endpoints.email);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn digest_config(&self) -> &DigestConfig {
        &self.digest
    }

    pub async fn event_feed(&self, now: DateTime<Utc>, city: Option<City>) -> EventFeed {
        let feed = feed::event_feed(
            &self.eventbrite,
            &self.acuity,
            &self.cities,
            now,
            self.config.days_ahead,
        )
        .await;
        match city {
            Some(city) => feed.in_city(city),
            None => feed,
        }
    }

    /// `/events/<slug>`: resolved against the full recomputed feed.
    pub async fn event_page(&self, now: DateTime<Utc>, slug: &str) -> EventPage {
        let feed = self.event_feed(now, None).await;
        feed::event_page(&feed.events, slug)
    }

    pub async fn acuity_series(&self, now: DateTime<Utc>) -> Result<Vec<AcuitySeries>, ProviderError> {
        feed::acuity_series(&self.acuity, now, self.config.days_ahead).await
    }

    pub async fn acuity_page(&self, now: DateTime<Utc>) -> AcuityPage {
        feed::acuity_page(&self.acuity, now, self.config.days_ahead).await
    }

    pub fn digest_job(&self) -> DigestJob {
        DigestJob {
            config: self.digest.clone(),
            acuity: self.admin_acuity.clone(),
            eventbrite: self.admin_eventbrite.clone(),
            cities: self.cities.clone(),
            mailer: Mailer {
                provider: self.config.email_provider,
                api_key: self.config.email_api_key.clone(),
                to: self.config.digest_to.clone(),
                from: self.config.digest_from.clone(),
                endpoint: self.email_endpoint.clone(),
            },
            http: self.http.clone(),
            database_path: Some(self.config.database_path()),
        }
    }

    pub async fn run_digest(&self, now: DateTime<Utc>, options: DigestOptions) -> DigestOutcome {
        self.digest_job().run(now, options).await
    }
}
