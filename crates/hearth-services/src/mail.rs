//! Outgoing mail.
//!
//! Delivery goes through a [`MailSender`].  Mail that nobody waits for (the
//! contact page) is sent with [`dispatch_detached`], which never reports
//! failure to the caller.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait MailSender: Send + Sync {
    fn deliver(&self, mail: OutgoingMail) -> impl Future<Output = Result<()>> + Send;
}

/// Deliver on a background task.  Failures are logged and dropped.
pub fn dispatch_detached<M>(sender: Arc<M>, mail: OutgoingMail) -> JoinHandle<()>
where
    M: MailSender + 'static,
{
    tokio::spawn(async move {
        let to = mail.to.clone();
        match sender.deliver(mail).await {
            Ok(()) => tracing::debug!(%to, "mail delivered"),
            Err(e) => tracing::warn!(%to, error = %e, "mail delivery failed"),
        }
    })
}

/// A message left on the contact page: every submitted field, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub fields: Vec<(String, String)>,
}

impl ContactMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Subject `"from {site} contact page"`, one `key: value` line per field.
    pub fn into_mail(self, site_name: &str, recipient: &str) -> OutgoingMail {
        let body = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        OutgoingMail {
            to: recipient.to_string(),
            subject: format!("from {site_name} contact page"),
            body,
        }
    }
}

/// Writes mail to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl MailSender for LogMailer {
    async fn deliver(&self, mail: OutgoingMail) -> Result<()> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            lines = mail.body.lines().count(),
            "outgoing mail"
        );
        Ok(())
    }
}
