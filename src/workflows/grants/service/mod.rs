mod catalog;
mod matches;
mod pipeline;
mod portal;
mod requests;

pub use catalog::{ClientQuery, GrantQuery};

use std::sync::Arc;

use tracing::warn;

use super::access::{authorize, AccessDenied, Actor, Operation, Ownership};
use super::clock::{Clock, SystemClock};
use super::domain::ClientId;
use super::invites::DEFAULT_INVITE_TTL_DAYS;
use super::notify::Notifier;
use super::repository::{GrantRepository, RepositoryError};
use super::scoring::{FitScorer, ScoringConfig};

/// Construction-time settings for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub scoring: ScoringConfig,
    pub invite_ttl_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            invite_ttl_days: DEFAULT_INVITE_TTL_DAYS,
        }
    }
}

/// Command facade over the grant catalog, match store and application pipeline.
///
/// Every command takes the acting user, checks it against the access policy, then
/// runs as one repository unit of work. Notifications fire after the write commits
/// and their failures are only logged.
pub struct GrantPipelineService<R: ?Sized, N: ?Sized> {
    repository: Arc<R>,
    notifier: Arc<N>,
    scorer: FitScorer,
    clock: Arc<dyn Clock>,
    invite_ttl_days: i64,
}

impl<R, N> GrantPipelineService<R, N>
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, config: PipelineConfig) -> Self {
        Self {
            repository,
            notifier,
            scorer: FitScorer::new(config.scoring),
            clock: Arc::new(SystemClock),
            invite_ttl_days: config.invite_ttl_days,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn scorer(&self) -> &FitScorer {
        &self.scorer
    }

    fn check(
        &self,
        actor: &Actor,
        operation: Operation,
        ownership: Ownership,
    ) -> Result<(), PipelineError> {
        authorize(actor, operation, ownership).map_err(|denied| self.forbidden(actor, denied))
    }

    fn forbidden(&self, actor: &Actor, denied: AccessDenied) -> PipelineError {
        warn!(
            user_id = %actor.user_id,
            role = actor.role.label(),
            reason = %denied,
            "forbidden request"
        );
        PipelineError::Forbidden(denied)
    }

    /// Relationship between a client-role actor and an organization. Staff roles
    /// never depend on membership.
    fn ownership(&self, actor: &Actor, client_id: &ClientId) -> Result<Ownership, PipelineError> {
        if actor.role.is_staff() {
            return Ok(Ownership::NotApplicable);
        }
        let memberships = self.repository.memberships(&actor.user_id)?;
        Ok(if memberships.contains(client_id) {
            Ownership::Member
        } else {
            Ownership::NonMember
        })
    }
}

/// Error raised by pipeline commands.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Forbidden(#[from] AccessDenied),
    #[error("{0}")]
    Validation(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl PipelineError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<RepositoryError> for PipelineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => PipelineError::Conflict(message),
            RepositoryError::NotFound { entity, id } => PipelineError::NotFound { entity, id },
            RepositoryError::Unavailable(message) => PipelineError::Unavailable(message),
        }
    }
}
