// Run notifications - one email per run, success or failure

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::EmailSettings;
use crate::error::ScrapeError;

pub const SUCCESS_SUBJECT: &str = "MSE daily update succeeded";
pub const FAILURE_SUBJECT: &str = "MSE daily update failed";

/// What a run ended as, for the notification message
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success { trade_date: NaiveDate, rows: usize },
    Failure { trade_date: NaiveDate, error: String },
}

impl RunOutcome {
    pub fn subject(&self) -> &'static str {
        match self {
            RunOutcome::Success { .. } => SUCCESS_SUBJECT,
            RunOutcome::Failure { .. } => FAILURE_SUBJECT,
        }
    }

    pub fn body(&self) -> String {
        match self {
            RunOutcome::Success { trade_date, rows } => {
                format!(
                    "MSE daily update successful.\nTrade date: {}\nRows fetched: {}\n",
                    trade_date, rows
                )
            }
            RunOutcome::Failure { trade_date, error } => {
                format!(
                    "MSE scraper failed.\nTrade date: {}\nError: {}\n",
                    trade_date, error
                )
            }
        }
    }
}

/// Delivery channel for run outcomes.
///
/// The production implementation talks SMTP; tests substitute an in-memory
/// recorder.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, outcome: &RunOutcome) -> Result<()>;
}

/// SMTP notifier (STARTTLS submission with username/password auth)
pub struct EmailNotifier {
    settings: EmailSettings,
}

impl EmailNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, outcome: &RunOutcome) -> Result<Message> {
        let from = self
            .settings
            .user
            .parse()
            .map_err(|e| ScrapeError::Notification(format!("bad sender address: {}", e)))?;
        let to = self
            .settings
            .to
            .parse()
            .map_err(|e| ScrapeError::Notification(format!("bad recipient address: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(outcome.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(outcome.body())
            .map_err(|e| ScrapeError::Notification(format!("cannot build message: {}", e)))?;

        Ok(message)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, outcome: &RunOutcome) -> Result<()> {
        let message = self.build_message(outcome)?;

        let creds = Credentials::new(self.settings.user.clone(), self.settings.pass.clone());
        let transport: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.smtp_server)
                .map_err(|e| {
                    ScrapeError::Notification(format!(
                        "cannot connect to {}: {}",
                        self.settings.smtp_server, e
                    ))
                })?
                .port(self.settings.smtp_port)
                .credentials(creds)
                .build();

        transport
            .send(message)
            .await
            .map_err(|e| ScrapeError::Notification(format!("send failed: {}", e)))?;

        info!("Email sent: {}", outcome.subject());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn test_success_message_contains_row_count() {
        let outcome = RunOutcome::Success {
            trade_date: sample_date(),
            rows: 16,
        };

        assert_eq!(outcome.subject(), SUCCESS_SUBJECT);
        assert!(outcome.body().contains("Rows fetched: 16"));
        assert!(outcome.body().contains("2024-01-10"));
    }

    #[test]
    fn test_failure_message_contains_error_text() {
        let outcome = RunOutcome::Failure {
            trade_date: sample_date(),
            error: "fetch error: mainboard returned status 503".to_string(),
        };

        assert_eq!(outcome.subject(), FAILURE_SUBJECT);
        assert!(outcome.body().contains("status 503"));
    }

    #[test]
    fn test_build_message_rejects_bad_addresses() {
        let notifier = EmailNotifier::new(EmailSettings {
            smtp_server: "smtp.example.test".to_string(),
            smtp_port: 587,
            user: "not an address".to_string(),
            pass: "secret".to_string(),
            to: "alerts@example.test".to_string(),
        });

        let outcome = RunOutcome::Success {
            trade_date: sample_date(),
            rows: 1,
        };
        let err = notifier.build_message(&outcome).unwrap_err();
        assert!(err.to_string().contains("bad sender address"));
    }

    #[test]
    fn test_build_message_well_formed() {
        let notifier = EmailNotifier::new(EmailSettings {
            smtp_server: "smtp.example.test".to_string(),
            smtp_port: 587,
            user: "scraper@example.test".to_string(),
            pass: "secret".to_string(),
            to: "alerts@example.test".to_string(),
        });

        let outcome = RunOutcome::Failure {
            trade_date: sample_date(),
            error: "parse error: no table found".to_string(),
        };
        let message = notifier.build_message(&outcome).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains(FAILURE_SUBJECT));
        assert!(formatted.contains("no table found"));
    }
}
