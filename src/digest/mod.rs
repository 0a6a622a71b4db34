//! Staff booking digest: gate on send time, claim the send slot, gather
//! today's items from both providers, render and mail.

pub mod email;
pub mod format;
pub mod items;
pub mod schedule;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde_json::{json, Value};

use crate::config::{DigestConfig, EmailProviderKind};
use crate::db::{Store, StoreError};
use crate::models::DigestItem;
use crate::normalize::AcuityCityMap;
use crate::providers::acuity::AcuityClient;
use crate::providers::eventbrite::EventbriteClient;
use crate::providers::ProviderError;

use email::{EmailError, EmailMessage, EmailSender};
use format::{format_digest_body, format_digest_subject};
use items::{acuity_digest_items, eventbrite_digest_items};
use schedule::{day_window, dedup_key, should_send_now};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestOptions {
    /// Ignore the send-time gate.
    pub force: bool,
    /// Render only: no email and no idempotency claim.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DigestOutcome {
    Skipped,
    AlreadySent {
        dedup_key: String,
    },
    DryRun {
        dedup_key: String,
        subject: String,
        body: String,
        item_count: usize,
    },
    Sent {
        dedup_key: String,
        item_count: usize,
    },
    Failed {
        dedup_key: String,
        message: String,
    },
}

impl DigestOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            DigestOutcome::Failed { .. } => 500,
            _ => 200,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DigestOutcome::Failed { .. })
    }

    pub fn body(&self) -> Value {
        match self {
            DigestOutcome::Skipped => json!({"message": "Not a send time"}),
            DigestOutcome::AlreadySent { dedup_key } => json!({
                "message": "Digest already sent for this send time",
                "dedupKey": dedup_key,
            }),
            DigestOutcome::DryRun {
                dedup_key,
                subject,
                body,
                item_count,
            } => json!({
                "message": "Dry run, digest not sent",
                "dedupKey": dedup_key,
                "subject": subject,
                "body": body,
                "itemCount": item_count,
            }),
            DigestOutcome::Sent {
                dedup_key,
                item_count,
            } => json!({
                "message": "Digest sent successfully",
                "itemCount": item_count,
                "dedupKey": dedup_key,
            }),
            DigestOutcome::Failed { message, .. } => json!({
                "error": "Failed to send digest",
                "message": message,
            }),
        }
    }
}

/// Where and how the digest is mailed.
#[derive(Debug, Clone)]
pub struct Mailer {
    pub provider: EmailProviderKind,
    pub api_key: Option<String>,
    pub to: String,
    pub from: String,
    pub endpoint: Option<Url>,
}

impl Mailer {
    fn sender(&self, client: Client) -> Result<EmailSender, EmailError> {
        let api_key = self.api_key.as_deref().ok_or(EmailError::MissingApiKey)?;
        let sender = EmailSender::new(client, self.provider, api_key)?;
        Ok(match &self.endpoint {
            Some(endpoint) => sender.with_endpoint(endpoint.clone()),
            None => sender,
        })
    }
}

/// Everything one digest run needs. Provider clients here must not cache:
/// the digest reports live counts.
pub struct DigestJob {
    pub config: DigestConfig,
    pub acuity: AcuityClient,
    pub eventbrite: EventbriteClient,
    pub cities: AcuityCityMap,
    pub mailer: Mailer,
    pub http: Client,
    /// Idempotency store; `None` accepts at-least-once delivery.
    pub database_path: Option<PathBuf>,
}

async fn with_store<T, F>(path: PathBuf, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let store = Store::open(&path)?;
        op(&store)
    })
    .await
    .map_err(|err| StoreError::Task(err.to_string()))?
}

fn degrade(result: Result<Vec<DigestItem>, ProviderError>) -> Vec<DigestItem> {
    match result {
        Ok(items) => items,
        Err(err) if err.is_not_configured() => {
            tracing::warn!(provider = %err.provider(), "provider not configured, skipping digest items");
            Vec::new()
        }
        Err(err) => {
            tracing::error!(provider = %err.provider(), status = ?err.status(), error = %err, "digest fetch failed");
            Vec::new()
        }
    }
}

impl DigestJob {
    /// Acuity then Eventbrite, each degrading to empty on failure.
    pub async fn collect_items(&self, now: DateTime<Utc>) -> Vec<DigestItem> {
        let window = day_window(now, self.config.timezone);
        let acuity = degrade(acuity_digest_items(&self.acuity, &self.cities, &window).await);
        let eventbrite = degrade(eventbrite_digest_items(&self.eventbrite, &window, self.config.timezone).await);
        tracing::info!(
            item_count = acuity.len() + eventbrite.len(),
            acuity = acuity.len(),
            eventbrite = eventbrite.len(),
            "digest items collected"
        );
        let mut items = acuity;
        items.extend(eventbrite);
        items
    }

    async fn claim(&self, key: &str) -> Option<bool> {
        let path = self.database_path.clone()?;
        let key = key.to_string();
        match with_store(path, move |store| store.claim(&key)).await {
            Ok(claimed) => Some(claimed),
            Err(err) => {
                tracing::error!(error = %err, "idempotency store unavailable, sending without claim");
                None
            }
        }
    }

    async fn release(&self, key: &str) {
        let Some(path) = self.database_path.clone() else {
            return;
        };
        let key = key.to_string();
        if let Err(err) = with_store(path, move |store| store.release(&key)).await {
            tracing::error!(error = %err, "failed to release digest claim");
        }
    }

    async fn mark_sent(&self, key: &str, subject: &str, body: &str, item_count: usize) {
        let Some(path) = self.database_path.clone() else {
            return;
        };
        let (key, subject, body) = (key.to_string(), subject.to_string(), body.to_string());
        if let Err(err) =
            with_store(path, move |store| store.mark_sent(&key, &subject, &body, item_count)).await
        {
            tracing::error!(error = %err, "failed to record digest delivery");
        }
    }

    /// One trigger invocation. Never returns an error: failures become
    /// `DigestOutcome::Failed`.
    pub async fn run(&self, now: DateTime<Utc>, options: DigestOptions) -> DigestOutcome {
        if !options.force && !should_send_now(now, &self.config) {
            tracing::debug!("not a send time");
            return DigestOutcome::Skipped;
        }

        let key = dedup_key(now, self.config.timezone);
        tracing::info!(dedup_key = %key, "digest send time");

        let claimed = if options.dry_run {
            false
        } else {
            match self.claim(&key).await {
                Some(false) => {
                    tracing::info!(dedup_key = %key, "digest already sent for this slot");
                    return DigestOutcome::AlreadySent { dedup_key: key };
                }
                Some(true) => true,
                None => false,
            }
        };

        let items = self.collect_items(now).await;
        let window = day_window(now, self.config.timezone);
        let subject = format_digest_subject(&items, window.date);
        let body = format_digest_body(&items, &self.config);
        let item_count = items.len();

        if options.dry_run {
            return DigestOutcome::DryRun {
                dedup_key: key,
                subject,
                body,
                item_count,
            };
        }

        let message = EmailMessage {
            to: self.mailer.to.clone(),
            from: self.mailer.from.clone(),
            subject: subject.clone(),
            text: body.clone(),
            html: None,
        };
        let sent = match self.mailer.sender(self.http.clone()) {
            Ok(sender) => {
                tracing::info!(provider = %sender.provider(), to = %message.to, "sending digest");
                sender.send(&message).await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = sent {
            tracing::error!(dedup_key = %key, error = %err, "digest send failed");
            if claimed {
                self.release(&key).await;
            }
            return DigestOutcome::Failed {
                dedup_key: key,
                message: err.to_string(),
            };
        }

        self.mark_sent(&key, &subject, &body, item_count).await;
        tracing::info!(dedup_key = %key, item_count, "digest sent");
        DigestOutcome::Sent {
            dedup_key: key,
            item_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{AcuityCredentials, EventbriteCredentials};
    use crate::providers::{build_client, JsonFetcher};

    fn send_time() -> DateTime<Utc> {
        // 13:30 in Chicago.
        "2026-03-01T19:30:00Z".parse().expect("now")
    }

    fn temp_db(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "studio-events-digest-{tag}-{}-{}.sqlite",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    async fn providers(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/acuity/appointment-types"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 101, "name": "Wheel Throwing"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/acuity/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"appointmentTypeID": 101, "datetime": "2026-03-01T18:00:00-0600", "calendar": "Chicago"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/eventbrite/organizations/42/events/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    fn job(server: &MockServer, database_path: Option<PathBuf>, api_key: Option<&str>) -> DigestJob {
        let http = build_client(Duration::from_secs(5)).expect("client");
        let base = |prefix: &str| Url::parse(&format!("{}/{prefix}/", server.uri())).expect("url");
        DigestJob {
            config: DigestConfig::default(),
            acuity: AcuityClient::new(
                Some(AcuityCredentials {
                    user_id: "1".into(),
                    api_key: "k".into(),
                }),
                JsonFetcher::new(http.clone()),
            )
            .with_base_url(base("acuity")),
            eventbrite: EventbriteClient::new(
                Some(EventbriteCredentials {
                    token: "tok".into(),
                    org_id: Some("42".into()),
                }),
                JsonFetcher::new(http.clone()),
            )
            .with_base_url(base("eventbrite")),
            cities: AcuityCityMap::default(),
            mailer: Mailer {
                provider: EmailProviderKind::Resend,
                api_key: api_key.map(str::to_string),
                to: "support@colorcocktailfactory.com".into(),
                from: "info@colorcocktailfactory.com".into(),
                endpoint: Some(Url::parse(&format!("{}/email", server.uri())).expect("url")),
            },
            http,
            database_path,
        }
    }

    #[tokio::test]
    async fn outside_send_time_does_nothing() {
        let server = MockServer::start().await;
        let outcome = job(&server, None, Some("key"))
            .run("2026-03-01T19:31:00Z".parse().expect("now"), DigestOptions::default())
            .await;
        assert_eq!(outcome, DigestOutcome::Skipped);
        assert_eq!(outcome.status_code(), 200);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn sends_once_per_send_slot() {
        let server = MockServer::start().await;
        providers(&server).await;
        Mock::given(method("POST"))
            .and(path("/email"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let db = temp_db("once");
        let job = job(&server, Some(db.clone()), Some("key"));

        let first = job.run(send_time(), DigestOptions::default()).await;
        assert_eq!(
            first,
            DigestOutcome::Sent {
                dedup_key: "2026-03-01 13:30".into(),
                item_count: 1,
            }
        );
        let second = job.run(send_time(), DigestOptions::default()).await;
        assert_eq!(
            second,
            DigestOutcome::AlreadySent {
                dedup_key: "2026-03-01 13:30".into()
            }
        );
        let _ = std::fs::remove_file(db);
    }

    #[tokio::test]
    async fn failed_send_releases_claim_and_reports_500() {
        let server = MockServer::start().await;
        providers(&server).await;
        Mock::given(method("POST"))
            .and(path("/email"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(2)
            .mount(&server)
            .await;

        let db = temp_db("retry");
        let job = job(&server, Some(db.clone()), Some("key"));

        for _ in 0..2 {
            let outcome = job.run(send_time(), DigestOptions::default()).await;
            assert!(outcome.is_failure());
            assert_eq!(outcome.status_code(), 500);
            assert_eq!(outcome.body()["error"], "Failed to send digest");
        }
        let _ = std::fs::remove_file(db);
    }

    #[tokio::test]
    async fn missing_email_key_fails_without_provider_call() {
        let server = MockServer::start().await;
        providers(&server).await;
        let outcome = job(&server, None, None)
            .run(send_time(), DigestOptions::default())
            .await;
        match outcome {
            DigestOutcome::Failed { message, .. } => assert!(message.contains("EMAIL_API_KEY")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forced_dry_run_renders_without_sending() {
        let server = MockServer::start().await;
        providers(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = job(&server, None, Some("key"))
            .run(
                "2026-03-01T20:07:00Z".parse().expect("now"),
                DigestOptions {
                    force: true,
                    dry_run: true,
                },
            )
            .await;
        match outcome {
            DigestOutcome::DryRun {
                subject,
                body,
                item_count,
                dedup_key,
            } => {
                assert_eq!(item_count, 1);
                assert_eq!(dedup_key, "2026-03-01 14:07");
                assert_eq!(subject, "CCF Today — Chicago — Sunday, Mar 1");
                assert!(body.contains("• 6:00 PM — Wheel Throwing — 1 registered ⚠️ LOW ENROLLMENT"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
