//! Best-effort side channels fired after a registration completes: the
//! confirmation email and the spreadsheet row. Neither is part of the
//! registration's correctness contract; failures are logged and reported in
//! the outcome, never propagated to the user-facing result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::chat::state::Member;

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationSummary {
    pub session_id: String,
    pub team_name: String,
    pub team_batch: String,
    pub members: Vec<Member>,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of one best-effort attempt, distinct from the main operation's
/// result so callers (and tests) can see that it was attempted without
/// requiring it to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffectOutcome {
    Delivered,
    Failed,
    Disabled,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(&self, summary: &RegistrationSummary) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn append_row(&self, summary: &RegistrationSummary) -> Result<()>;
}

/// Delivers the confirmation through an HTTP webhook (the email service sits
/// behind it).
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_confirmation(&self, summary: &RegistrationSummary) -> Result<()> {
        let response = self.client.post(&self.url).json(summary).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("notification webhook returned {}", response.status());
        }
        Ok(())
    }
}

/// Appends the registration to the organizers' sheet through a webhook.
pub struct WebhookLedger {
    client: Client,
    url: String,
}

impl WebhookLedger {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            url,
        }
    }
}

#[async_trait]
impl Ledger for WebhookLedger {
    async fn append_row(&self, summary: &RegistrationSummary) -> Result<()> {
        let response = self.client.post(&self.url).json(summary).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("ledger webhook returned {}", response.status());
        }
        Ok(())
    }
}

pub struct SideEffects {
    notifier: Option<Arc<dyn Notifier>>,
    ledger: Option<Arc<dyn Ledger>>,
    timeout: Duration,
}

impl SideEffects {
    pub fn new(
        notifier: Option<Arc<dyn Notifier>>,
        ledger: Option<Arc<dyn Ledger>>,
        timeout: Duration,
    ) -> Self {
        Self {
            notifier,
            ledger,
            timeout,
        }
    }

    /// Runs both side channels, bounded by the configured timeout so a
    /// hanging webhook can never stall the registration reply.
    pub async fn dispatch(&self, summary: &RegistrationSummary) -> (SideEffectOutcome, SideEffectOutcome) {
        let notification = match &self.notifier {
            None => SideEffectOutcome::Disabled,
            Some(notifier) => {
                match tokio::time::timeout(self.timeout, notifier.send_confirmation(summary)).await
                {
                    Ok(Ok(())) => {
                        info!(team = %summary.team_name, "confirmation notification delivered");
                        SideEffectOutcome::Delivered
                    }
                    Ok(Err(e)) => {
                        warn!(team = %summary.team_name, error = %e, "confirmation notification failed");
                        SideEffectOutcome::Failed
                    }
                    Err(_) => {
                        warn!(team = %summary.team_name, "confirmation notification timed out");
                        SideEffectOutcome::Failed
                    }
                }
            }
        };

        let ledger = match &self.ledger {
            None => SideEffectOutcome::Disabled,
            Some(ledger) => match tokio::time::timeout(self.timeout, ledger.append_row(summary)).await {
                Ok(Ok(())) => {
                    info!(team = %summary.team_name, "registration appended to ledger");
                    SideEffectOutcome::Delivered
                }
                Ok(Err(e)) => {
                    warn!(team = %summary.team_name, error = %e, "ledger append failed");
                    SideEffectOutcome::Failed
                }
                Err(_) => {
                    warn!(team = %summary.team_name, "ledger append timed out");
                    SideEffectOutcome::Failed
                }
            },
        };

        (notification, ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RegistrationSummary {
        RegistrationSummary {
            session_id: "s1".into(),
            team_name: "TeamRocket".into(),
            team_batch: "23".into(),
            members: vec![],
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failures_are_captured_not_propagated() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send_confirmation()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("smtp down")));
        let mut ledger = MockLedger::new();
        ledger.expect_append_row().times(1).returning(|_| Ok(()));

        let effects = SideEffects::new(
            Some(Arc::new(notifier)),
            Some(Arc::new(ledger)),
            Duration::from_secs(1),
        );
        let (n, l) = effects.dispatch(&summary()).await;
        assert_eq!(n, SideEffectOutcome::Failed);
        assert_eq!(l, SideEffectOutcome::Delivered);
    }

    #[tokio::test]
    async fn disabled_channels_are_reported() {
        let effects = SideEffects::new(None, None, Duration::from_secs(1));
        let (n, l) = effects.dispatch(&summary()).await;
        assert_eq!(n, SideEffectOutcome::Disabled);
        assert_eq!(l, SideEffectOutcome::Disabled);
    }
}
