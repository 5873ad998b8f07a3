use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::super::domain::{Application, ApplicationStage, Client, Invite};
use super::{Notifier, NotifyError};

/// Work item carried from request handlers to the background worker.
#[derive(Debug, Clone)]
pub enum NotificationJob {
    StageUpdate {
        application: Application,
        stage: ApplicationStage,
    },
    Invitation {
        invite: Invite,
        client: Client,
    },
}

impl NotificationJob {
    fn dispatch<N: Notifier + ?Sized>(&self, notifier: &N) -> Result<(), NotifyError> {
        match self {
            NotificationJob::StageUpdate { application, stage } => {
                notifier.application_stage(application, *stage)
            }
            NotificationJob::Invitation { invite, client } => notifier.invitation(invite, client),
        }
    }
}

/// Notifier that enqueues for a background worker. When the queue is full or the
/// worker is gone, the job runs inline on `fallback` so no notification is lost.
#[derive(Clone)]
pub struct QueuedNotifier {
    tx: mpsc::Sender<NotificationJob>,
    fallback: Arc<dyn Notifier>,
}

impl QueuedNotifier {
    pub fn channel(
        capacity: usize,
        fallback: Arc<dyn Notifier>,
    ) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, fallback }, rx)
    }

    fn enqueue(&self, job: NotificationJob) -> Result<(), NotifyError> {
        let job = match self.tx.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!("notification queue full; dispatching inline");
                job
            }
            Err(TrySendError::Closed(job)) => {
                warn!("notification worker stopped; dispatching inline");
                job
            }
        };
        job.dispatch(self.fallback.as_ref())
    }
}

impl Notifier for QueuedNotifier {
    fn application_stage(
        &self,
        application: &Application,
        stage: ApplicationStage,
    ) -> Result<(), NotifyError> {
        self.enqueue(NotificationJob::StageUpdate {
            application: application.clone(),
            stage,
        })
    }

    fn invitation(&self, invite: &Invite, client: &Client) -> Result<(), NotifyError> {
        self.enqueue(NotificationJob::Invitation {
            invite: invite.clone(),
            client: client.clone(),
        })
    }
}

/// Drain queued jobs into `inner` until every sender is dropped.
///
/// Delivery and repository writes block, so each job runs on the blocking pool.
pub async fn run_notification_worker<N>(inner: Arc<N>, mut rx: mpsc::Receiver<NotificationJob>)
where
    N: Notifier + ?Sized + 'static,
{
    while let Some(job) = rx.recv().await {
        let notifier = Arc::clone(&inner);
        let outcome = tokio::task::spawn_blocking(move || job.dispatch(notifier.as_ref())).await;
        match outcome {
            Ok(Ok(())) => debug!("queued notification delivered"),
            Ok(Err(err)) => warn!(error = %err, "queued notification failed"),
            Err(err) => warn!(error = %err, "notification task aborted"),
        }
    }
    debug!("notification queue closed");
}
