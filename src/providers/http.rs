use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use moka::future::Cache;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION},
    Client, Url,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ProviderError;
use crate::models::Source;

pub const USER_AGENT: &str = concat!("studio-events/", env!("CARGO_PKG_VERSION"));

const CACHE_MAX_ENTRIES: u64 = 1000;
const ERROR_BODY_LIMIT: usize = 500;

pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

#[derive(Clone)]
pub enum Auth {
    Basic { user: String, key: String },
    Bearer(String),
}

impl Auth {
    pub fn header_value(&self) -> String {
        match self {
            Auth::Basic { user, key } => {
                format!("Basic {}", STANDARD.encode(format!("{user}:{key}")))
            }
            Auth::Bearer(token) => format!("Bearer {token}"),
        }
    }
}

/// Authenticated JSON GETs with an optional per-URL TTL cache.
///
/// Only successful responses are cached; a provider error is retried on the
/// next call.
#[derive(Clone)]
pub struct JsonFetcher {
    client: Client,
    cache: Option<Cache<String, Value>>,
}

impl JsonFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: None,
        }
    }

    pub fn cached(client: Client, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(CACHE_MAX_ENTRIES)
            .build();
        Self {
            client,
            cache: Some(cache),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        provider: Source,
        url: Url,
        auth: &Auth,
    ) -> Result<T, ProviderError> {
        let value = self.get_value(provider, url, auth).await?;
        serde_json::from_value(value).map_err(|err| ProviderError::Decode {
            provider,
            message: err.to_string(),
        })
    }

    async fn get_value(&self, provider: Source, url: Url, auth: &Auth) -> Result<Value, ProviderError> {
        let key = url.to_string();
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                tracing::debug!(%provider, url = %key, "provider cache hit");
                return Ok(hit);
            }
        }

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, auth.header_value())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| ProviderError::Transport {
                provider,
                message: err.to_string(),
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::Transport {
                provider,
                message: err.to_string(),
            })?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                provider,
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|err| ProviderError::Decode {
            provider,
            message: err.to_string(),
        })?;

        if let Some(cache) = &self.cache {
            cache.insert(key, value.clone()).await;
        }
        Ok(value)
    }
}
