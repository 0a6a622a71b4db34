pub mod acuity;
pub mod eventbrite;
mod http;

use thiserror::Error;

use crate::models::Source;

pub use http::{build_client, Auth, JsonFetcher, USER_AGENT};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{provider} credentials are not configured")]
    NotConfigured { provider: Source },
    #[error("{provider} api error ({status}): {body}")]
    Status {
        provider: Source,
        status: u16,
        body: String,
    },
    #[error("{provider} request failed: {message}")]
    Transport { provider: Source, message: String },
    #[error("{provider} response could not be decoded: {message}")]
    Decode { provider: Source, message: String },
}

impl ProviderError {
    pub fn provider(&self) -> Source {
        match self {
            ProviderError::NotConfigured { provider }
            | ProviderError::Status { provider, .. }
            | ProviderError::Transport { provider, .. }
            | ProviderError::Decode { provider, .. } => *provider,
        }
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, ProviderError::NotConfigured { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
