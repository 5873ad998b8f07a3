use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use serde::Deserialize;

use super::domain::{
    Application, ApplicationEvent, ApplicationId, ApplicationStage, Client, ClientId, Grant,
    GrantId, GrantMatch, GrantStatus, Invite, InviteId, ManagedServiceRequest, MatchId,
    MatchStatus, Membership, Message, ServiceRequestId, ServiceRequestStatus, Tag, TagCategory,
    User, UserId,
};
use super::lookups::LookupCatalog;

/// Filters for `list_matches`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatchFilter {
    pub client_id: Option<ClientId>,
    pub status: Option<MatchStatus>,
}

/// Filters for `list_applications`. `client_ids` restricts results to a set of
/// organizations (portal users).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApplicationFilter {
    pub client_id: Option<ClientId>,
    pub stage: Option<ApplicationStage>,
    pub assigned_to: Option<UserId>,
    #[serde(skip)]
    pub client_ids: Option<Vec<ClientId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MessageFilter {
    pub client_id: Option<ClientId>,
    pub application_id: Option<ApplicationId>,
}

/// Storage abstraction. Every method is one unit of work: compound writes
/// (`insert_application`, `update_application`) either fully apply or not at all.
///
/// Implementations own the integrity rules: one match per (client, grant) pair,
/// unique user e-mails, and cascading deletes of clients, grants and applications.
/// Deleting a client also removes its managed-service requests.
pub trait GrantRepository: Send + Sync {
    fn save_tag(&self, category: TagCategory, tag: Tag) -> Result<(), RepositoryError>;
    fn lookups(&self) -> Result<LookupCatalog, RepositoryError>;

    fn insert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    fn add_membership(&self, membership: Membership) -> Result<(), RepositoryError>;
    fn client_members(&self, client_id: &ClientId) -> Result<Vec<User>, RepositoryError>;
    fn memberships(&self, user_id: &UserId) -> Result<Vec<ClientId>, RepositoryError>;

    fn insert_grant(&self, grant: Grant) -> Result<Grant, RepositoryError>;
    fn update_grant(&self, grant: Grant) -> Result<(), RepositoryError>;
    fn fetch_grant(&self, id: &GrantId) -> Result<Option<Grant>, RepositoryError>;
    /// Ordered by deadline (unset last), then name.
    fn list_grants(&self, status: Option<GrantStatus>) -> Result<Vec<Grant>, RepositoryError>;
    fn delete_grant(&self, id: &GrantId) -> Result<(), RepositoryError>;

    fn insert_client(&self, client: Client) -> Result<Client, RepositoryError>;
    fn update_client(&self, client: Client) -> Result<(), RepositoryError>;
    fn fetch_client(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError>;
    fn fetch_client_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Client>, RepositoryError>;
    fn list_clients(&self) -> Result<Vec<Client>, RepositoryError>;
    fn delete_client(&self, id: &ClientId) -> Result<(), RepositoryError>;

    /// Fails with `Conflict` when a match already exists for the pair.
    fn insert_match(&self, record: GrantMatch) -> Result<GrantMatch, RepositoryError>;
    fn update_match(&self, record: GrantMatch) -> Result<(), RepositoryError>;
    fn fetch_match(&self, id: &MatchId) -> Result<Option<GrantMatch>, RepositoryError>;
    /// Ordered by fit score, best first.
    fn list_matches(&self, filter: &MatchFilter) -> Result<Vec<GrantMatch>, RepositoryError>;
    fn delete_match(&self, id: &MatchId) -> Result<(), RepositoryError>;

    /// Store a new application with its creation event, flipping `converts` to
    /// `converted` in the same unit of work.
    fn insert_application(
        &self,
        application: Application,
        event: ApplicationEvent,
        converts: Option<&MatchId>,
    ) -> Result<Application, RepositoryError>;
    /// Read the stored application, let `change` edit it, and persist the result
    /// together with the event `change` returns. The read and the write happen in
    /// one unit of work, so `change` always sees the committed stage.
    fn update_application(
        &self,
        id: &ApplicationId,
        change: &mut dyn FnMut(&mut Application) -> Option<ApplicationEvent>,
    ) -> Result<Application, RepositoryError>;
    fn fetch_application(&self, id: &ApplicationId)
        -> Result<Option<Application>, RepositoryError>;
    /// Ordered by internal deadline (unset last), then most recently updated.
    fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError>;
    fn delete_application(&self, id: &ApplicationId) -> Result<(), RepositoryError>;
    fn stage_counts(&self) -> Result<BTreeMap<ApplicationStage, u64>, RepositoryError>;

    fn append_event(&self, event: ApplicationEvent) -> Result<ApplicationEvent, RepositoryError>;
    /// Newest first.
    fn list_events(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationEvent>, RepositoryError>;

    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError>;
    /// Newest first.
    fn list_messages(&self, filter: &MessageFilter) -> Result<Vec<Message>, RepositoryError>;

    fn insert_invite(&self, invite: Invite) -> Result<Invite, RepositoryError>;
    fn update_invite(&self, invite: Invite) -> Result<(), RepositoryError>;
    fn fetch_invite(&self, id: &InviteId) -> Result<Option<Invite>, RepositoryError>;
    fn fetch_invite_by_token(&self, token: &str) -> Result<Option<Invite>, RepositoryError>;
    /// Newest first.
    fn list_invites(&self, client_id: &ClientId) -> Result<Vec<Invite>, RepositoryError>;
    fn delete_invite(&self, id: &InviteId) -> Result<(), RepositoryError>;
    /// Create the invited user, link it to the client and consume the invite in one
    /// unit of work.
    fn accept_invite(
        &self,
        invite: &Invite,
        user: User,
    ) -> Result<User, RepositoryError>;

    /// Create an organization, its first user and the `owner` membership in one unit
    /// of work. Fails with `Conflict` when the e-mail is taken.
    fn insert_signup(&self, client: Client, owner: User) -> Result<(), RepositoryError>;

    fn insert_service_request(
        &self,
        request: ManagedServiceRequest,
    ) -> Result<ManagedServiceRequest, RepositoryError>;
    /// Read-modify-write of one request in a single unit of work.
    fn update_service_request(
        &self,
        id: &ServiceRequestId,
        change: &mut dyn FnMut(&mut ManagedServiceRequest),
    ) -> Result<ManagedServiceRequest, RepositoryError>;
    fn fetch_service_request(
        &self,
        id: &ServiceRequestId,
    ) -> Result<Option<ManagedServiceRequest>, RepositoryError>;
    /// Newest first.
    fn list_service_requests(
        &self,
        status: Option<ServiceRequestStatus>,
    ) -> Result<Vec<ManagedServiceRequest>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Conflict(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub(crate) fn duplicate_match_message(client_id: &ClientId, grant_id: &GrantId) -> String {
    format!("match already exists for client {client_id} and grant {grant_id}")
}

pub(crate) fn duplicate_email_message(email: &str) -> String {
    format!("a user with email {email} already exists")
}

/// Earliest deadline first; records without one go last.
pub(crate) fn deadline_order(left: Option<NaiveDate>, right: Option<NaiveDate>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
