use reqwest::{Client, Url};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::EmailProviderKind;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const POSTMARK_ENDPOINT: &str = "https://api.postmarkapp.com/email";
const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("EMAIL_API_KEY is not configured")]
    MissingApiKey,
    #[error("invalid email endpoint: {0}")]
    Endpoint(String),
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: EmailProviderKind,
        message: String,
    },
    #[error("{provider} api error: {status} {body}")]
    Rejected {
        provider: EmailProviderKind,
        status: u16,
        body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

pub struct EmailSender {
    client: Client,
    provider: EmailProviderKind,
    api_key: String,
    endpoint: Url,
}

fn default_endpoint(provider: EmailProviderKind) -> &'static str {
    match provider {
        EmailProviderKind::Resend => RESEND_ENDPOINT,
        EmailProviderKind::Postmark => POSTMARK_ENDPOINT,
        EmailProviderKind::Sendgrid => SENDGRID_ENDPOINT,
    }
}

impl EmailSender {
    pub fn new(client: Client, provider: EmailProviderKind, api_key: &str) -> Result<Self, EmailError> {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(EmailError::MissingApiKey);
        }
        let endpoint =
            Url::parse(default_endpoint(provider)).map_err(|err| EmailError::Endpoint(err.to_string()))?;
        Ok(Self {
            client,
            provider,
            api_key,
            endpoint,
        })
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn provider(&self) -> EmailProviderKind {
        self.provider
    }

    fn payload(&self, message: &EmailMessage) -> Value {
        match self.provider {
            EmailProviderKind::Resend => {
                let mut body = json!({
                    "from": message.from,
                    "to": message.to,
                    "subject": message.subject,
                    "text": message.text,
                });
                if let Some(html) = &message.html {
                    body["html"] = json!(html);
                }
                body
            }
            EmailProviderKind::Postmark => {
                let mut body = json!({
                    "From": message.from,
                    "To": message.to,
                    "Subject": message.subject,
                    "TextBody": message.text,
                });
                if let Some(html) = &message.html {
                    body["HtmlBody"] = json!(html);
                }
                body
            }
            EmailProviderKind::Sendgrid => {
                let mut content = vec![json!({"type": "text/plain", "value": message.text})];
                if let Some(html) = &message.html {
                    content.push(json!({"type": "text/html", "value": html}));
                }
                json!({
                    "personalizations": [{"to": [{"email": message.to}]}],
                    "from": {"email": message.from},
                    "subject": message.subject,
                    "content": content,
                })
            }
        }
    }

    /// One delivery attempt. Any non-2xx answer is a hard failure.
    pub async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let request = self.client.post(self.endpoint.clone()).json(&self.payload(message));
        let request = match self.provider {
            EmailProviderKind::Postmark => request
                .header("X-Postmark-Server-Token", &self.api_key)
                .header("Accept", "application/json"),
            EmailProviderKind::Resend | EmailProviderKind::Sendgrid => request.bearer_auth(&self.api_key),
        };

        let response = request.send().await.map_err(|err| EmailError::Transport {
            provider: self.provider,
            message: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                provider: self.provider,
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        tracing::debug!(provider = %self.provider, to = %message.to, "email accepted");
        Ok(())
    }
}
