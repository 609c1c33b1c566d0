//! Change-management notifier
//!
//! Reports milestone changes to the external change-management system over
//! HTTP. Transient failures (connection errors, 5xx, 429) are retried with
//! exponential backoff; other client errors fail immediately.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::defaults::{NOTIFY_MAX_RETRIES, NOTIFY_RETRY_DELAY_MS, NOTIFY_TIMEOUT_SECS};
use crate::core::global_config::GlobalConfig;
use crate::core::transition::{DisabledNotifier, MilestoneNotifier};
use crate::error::NotifyError;

/// Upper bound on a single backoff delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct MilestoneChange<'a> {
    milestone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

/// HTTP client for the change-management API
#[derive(Debug, Clone)]
pub struct EcmNotifier {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl EcmNotifier {
    /// Create a notifier with default timeout and retries
    pub fn new(base_url: &str) -> Result<Self, NotifyError> {
        Self::with_config(
            base_url,
            Duration::from_secs(NOTIFY_TIMEOUT_SECS),
            NOTIFY_MAX_RETRIES,
            Duration::from_millis(NOTIFY_RETRY_DELAY_MS),
        )
    }

    /// Create a notifier with explicit settings
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
        base_delay: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("radar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Client { error: e.to_string() })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            base_delay,
        })
    }

    fn endpoint(&self, reference: &str) -> String {
        format!("{}/records/{}/milestone", self.base_url, reference)
    }

    async fn send_once(&self, url: &str, body: &MilestoneChange<'_>) -> Result<(), backoff::Error<NotifyError>> {
        let response = self.client.put(url).json(body).send().await.map_err(|e| {
            backoff::Error::transient(NotifyError::Request {
                url: url.to_string(),
                error: e.to_string(),
            })
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error = NotifyError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        };
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(backoff::Error::transient(error))
        } else {
            Err(backoff::Error::permanent(error))
        }
    }
}

impl MilestoneNotifier for EcmNotifier {
    async fn notify_milestone_change(
        &self,
        reference: &str,
        milestone: &str,
        comment: Option<&str>,
    ) -> Result<(), NotifyError> {
        let url = self.endpoint(reference);
        let body = MilestoneChange { milestone, comment };
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_max_interval(MAX_RETRY_DELAY)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let (url_ref, body_ref, attempts_ref) = (&url, &body, &attempts);
        backoff::future::retry(policy, || async move {
            let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("Notifying {} (attempt {})", url_ref, attempt);
            match self.send_once(url_ref, body_ref).await {
                Err(backoff::Error::Transient { err, .. }) if attempt > self.max_retries => {
                    Err(backoff::Error::permanent(err))
                }
                other => other,
            }
        })
        .await?;

        info!("Reported milestone '{}' for record {}", milestone, reference);
        Ok(())
    }
}

/// Notifier selected from configuration
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    Ecm(EcmNotifier),
    Disabled(DisabledNotifier),
}

impl ConfiguredNotifier {
    /// Use the configured endpoint, or disable notifications when none is set
    pub fn from_config(config: &GlobalConfig) -> Result<Self, NotifyError> {
        match config.notifier_url() {
            Some(url) => Ok(Self::Ecm(EcmNotifier::with_config(
                url,
                Duration::from_secs(config.notifier_timeout_secs()),
                config.notifier_max_retries(),
                Duration::from_millis(NOTIFY_RETRY_DELAY_MS),
            )?)),
            None => Ok(Self::Disabled(DisabledNotifier)),
        }
    }
}

impl MilestoneNotifier for ConfiguredNotifier {
    async fn notify_milestone_change(
        &self,
        reference: &str,
        milestone: &str,
        comment: Option<&str>,
    ) -> Result<(), NotifyError> {
        match self {
            Self::Ecm(n) => n.notify_milestone_change(reference, milestone, comment).await,
            Self::Disabled(n) => n.notify_milestone_change(reference, milestone, comment).await,
        }
    }
}
