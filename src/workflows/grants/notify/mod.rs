mod queue;
pub mod templates;

pub use queue::{run_notification_worker, NotificationJob, QueuedNotifier};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::clock::Clock;
use super::domain::{
    Application, ApplicationStage, Client, Invite, Message, MessageChannel, MessageId,
};
use super::repository::{GrantRepository, RepositoryError};
use templates::{render_invitation, render_stage_update, InvitationEmail, StageUpdate};

/// Outbound side effects of pipeline and onboarding commands.
///
/// Callers treat every failure as non-fatal: the command that triggered the
/// notification has already committed.
pub trait Notifier: Send + Sync {
    fn application_stage(
        &self,
        application: &Application,
        stage: ApplicationStage,
    ) -> Result<(), NotifyError>;

    fn invitation(&self, invite: &Invite, client: &Client) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("notification queue rejected job: {0}")]
    Queue(String),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Plain-text e-mail handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery boundary (SMTP relay, provider API, ...).
pub trait MailTransport: Send + Sync {
    fn deliver(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// Transport that records outbound mail in the log instead of sending it.
#[derive(Debug, Clone)]
pub struct LogMailTransport {
    from_address: String,
}

impl LogMailTransport {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

impl MailTransport for LogMailTransport {
    fn deliver(&self, email: &OutboundEmail) -> Result<(), MailError> {
        info!(
            from = %self.from_address,
            to = %email.to,
            subject = %email.subject,
            "outbound email recorded"
        );
        Ok(())
    }
}

/// Sends stage updates to every member of the application's organization and
/// writes one `Message` per recipient whether or not delivery succeeded.
pub struct EmailNotifier<R: ?Sized, M: ?Sized> {
    repository: Arc<R>,
    transport: Arc<M>,
    clock: Arc<dyn Clock>,
    portal_url: String,
}

impl<R, M> EmailNotifier<R, M>
where
    R: GrantRepository + ?Sized,
    M: MailTransport + ?Sized,
{
    pub fn new(
        repository: Arc<R>,
        transport: Arc<M>,
        clock: Arc<dyn Clock>,
        portal_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            transport,
            clock,
            portal_url: portal_url.into(),
        }
    }

    fn try_deliver(&self, email: &OutboundEmail) -> bool {
        match self.transport.deliver(email) {
            Ok(()) => true,
            Err(err) => {
                warn!(to = %email.to, error = %err, "email delivery failed");
                false
            }
        }
    }

    pub fn accept_url(&self, token: &str) -> String {
        format!(
            "{}/accept-invite?token={token}",
            self.portal_url.trim_end_matches('/')
        )
    }
}

impl<R, M> Notifier for EmailNotifier<R, M>
where
    R: GrantRepository + ?Sized,
    M: MailTransport + ?Sized,
{
    fn application_stage(
        &self,
        application: &Application,
        stage: ApplicationStage,
    ) -> Result<(), NotifyError> {
        let Some(client) = self.repository.fetch_client(&application.client_id)? else {
            return Ok(());
        };
        let grant_name = self
            .repository
            .fetch_grant(&application.grant_id)?
            .map(|grant| grant.name)
            .unwrap_or_else(|| application.grant_id.to_string());

        let mut logged = 0usize;
        for user in self.repository.client_members(&client.id)? {
            if user.email.trim().is_empty() {
                continue;
            }

            let now = self.clock.now();
            let rendered = render_stage_update(&StageUpdate {
                recipient_name: user.name.as_deref(),
                organization: &client.name,
                grant_name: &grant_name,
                stage,
                at: now,
            });
            let email = OutboundEmail {
                to: user.email.clone(),
                subject: rendered.subject,
                body: rendered.body,
            };
            let delivered = self.try_deliver(&email);

            let stored = self.repository.insert_message(Message {
                id: MessageId::generate(),
                client_id: client.id.clone(),
                application_id: Some(application.id.clone()),
                channel: MessageChannel::Email,
                subject: email.subject,
                body: email.body,
                sent_to: email.to,
                sent_at: now,
                delivered,
                created_by: None,
            });
            match stored {
                Ok(_) => logged += 1,
                Err(err) => warn!(
                    application_id = %application.id,
                    to = %user.email,
                    error = %err,
                    "message log write failed"
                ),
            }
        }

        info!(
            application_id = %application.id,
            stage = stage.label(),
            recipients = logged,
            "stage notification dispatched"
        );
        Ok(())
    }

    fn invitation(&self, invite: &Invite, client: &Client) -> Result<(), NotifyError> {
        let accept_url = self.accept_url(&invite.token);
        let rendered = render_invitation(&InvitationEmail {
            recipient_name: invite.name.as_deref(),
            organization: &client.name,
            accept_url: &accept_url,
            expires_at: invite.expires_at,
        });
        let email = OutboundEmail {
            to: invite.email.clone(),
            subject: rendered.subject,
            body: rendered.body,
        };
        self.transport.deliver(&email)?;
        Ok(())
    }
}
