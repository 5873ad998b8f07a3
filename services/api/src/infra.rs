use grant_pipeline::config::{AppConfig, BillingConfig, DispatchMode, MailConfig, StorageConfig};
use grant_pipeline::error::AppError;
use grant_pipeline::workflows::grants::{
    run_notification_worker, EmailNotifier, GrantPipelineService, GrantRepository,
    InMemoryGrantRepository, LogMailTransport, LookupCatalog, Notifier, QueuedNotifier,
    SqliteGrantRepository, SystemClock,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

pub(crate) type ApiService = GrantPipelineService<dyn GrantRepository, dyn Notifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) billing: Arc<BillingConfig>,
    pub(crate) service: Arc<ApiService>,
}

/// SQLite when a database path is configured, otherwise an in-memory store seeded
/// with the standard lookup tables.
pub(crate) fn open_repository(
    storage: &StorageConfig,
) -> Result<Arc<dyn GrantRepository>, AppError> {
    match &storage.database_path {
        Some(path) => {
            let repository = SqliteGrantRepository::open(path)?;
            let seeded = repository.seed_lookups(&LookupCatalog::standard())?;
            info!(path = %path.display(), seeded, "opened sqlite grant store");
            Ok(Arc::new(repository))
        }
        None => {
            info!("using in-memory grant store");
            Ok(Arc::new(InMemoryGrantRepository::seeded()))
        }
    }
}

/// Builds the stage/invite notifier. Queued dispatch also returns the worker task
/// draining the channel; the e-mail notifier doubles as the overflow path.
pub(crate) fn build_notifier(
    repository: Arc<dyn GrantRepository>,
    mail: &MailConfig,
) -> (Arc<dyn Notifier>, Option<JoinHandle<()>>) {
    let email = Arc::new(EmailNotifier::new(
        repository,
        Arc::new(LogMailTransport::new(mail.from_address.clone())),
        Arc::new(SystemClock),
        mail.portal_url.clone(),
    ));

    match mail.dispatch {
        DispatchMode::Inline => (email, None),
        DispatchMode::Queued => {
            let (queued, rx) = QueuedNotifier::channel(mail.queue_capacity, email.clone());
            let worker = tokio::spawn(run_notification_worker(email, rx));
            info!(capacity = mail.queue_capacity, "notification worker started");
            (Arc::new(queued), Some(worker))
        }
    }
}

pub(crate) fn build_service(
    config: &AppConfig,
) -> Result<(Arc<ApiService>, Option<JoinHandle<()>>), AppError> {
    let repository = open_repository(&config.storage)?;
    let (notifier, worker) = build_notifier(repository.clone(), &config.mail);
    let service = GrantPipelineService::new(repository, notifier, config.pipeline.clone());
    Ok((Arc::new(service), worker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_is_seeded() {
        let repository = open_repository(&StorageConfig::default()).expect("store opens");
        let lookups = repository.lookups().expect("lookups load");
        assert_eq!(lookups, LookupCatalog::standard());
    }
}
