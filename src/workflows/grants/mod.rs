//! Grant matching and application pipeline for nonprofit grant coordinators.
//!
//! Staff catalog grants and client organizations, score how well each client fits
//! each open grant, save promising matches and move applications through a
//! seven-stage pipeline with an append-only event ledger. Stage changes into
//! `submitted`, `awarded` or `declined` notify the client's portal users.

pub mod access;
pub mod billing;
pub mod clock;
pub mod domain;
pub mod import;
pub mod invites;
pub mod lookups;
pub mod memory;
pub mod notify;
pub mod pipeline;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use access::{authorize, AccessDenied, Actor, Operation, Ownership, Role};
pub use billing::{BillingEvent, BillingOutcome, PriceCatalog, SubscriptionView, WebhookEnvelope};
pub use clock::{Clock, SystemClock};
pub use domain::{
    Application, ApplicationDraft, ApplicationEvent, ApplicationId, ApplicationPatch,
    ApplicationStage, Client, ClientDraft, ClientId, ClientPatch, ClientRole, ClientType,
    DeadlineType, EligibilityProfile, EventDraft, EventType, Grant, GrantDraft, GrantId,
    GrantMatch, GrantPatch, GrantStatus, Invite, InviteDraft, InviteId, ManagedServiceRequest,
    MatchDraft, MatchId, MatchPatch, MatchStatus, Membership, Message, MessageChannel,
    ServiceRequestDraft, ServiceRequestId, ServiceRequestPatch, ServiceRequestStatus, Signup,
    SignupDraft, Tag, TagCategory, TagId, User, UserDraft, UserId,
};
pub use import::{GrantCatalogImporter, GrantImport, GrantImportError, UnresolvedTag};
pub use invites::InviteInfo;
pub use lookups::LookupCatalog;
pub use memory::InMemoryGrantRepository;
pub use notify::{
    run_notification_worker, EmailNotifier, LogMailTransport, MailError, MailTransport,
    NotificationJob, Notifier, NotifyError, QueuedNotifier,
};
pub use pipeline::{PipelineCounts, StageTransition};
pub use repository::{
    ApplicationFilter, GrantRepository, MatchFilter, MessageFilter, RepositoryError,
};
pub use router::{grant_router, ApiError};
pub use scoring::{
    FitLevel, FitOutcome, FitReasons, FitScorer, IssuePolicy, MatchSuggestion, ScoringConfig,
};
pub use service::{ClientQuery, GrantPipelineService, GrantQuery, PipelineConfig, PipelineError};
pub use sqlite::SqliteGrantRepository;
