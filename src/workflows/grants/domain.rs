use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::access::Role;
use super::scoring::{FitLevel, FitReasons};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier for a cataloged grant opportunity.
    GrantId
);
string_id!(
    /// Identifier for a client organization.
    ClientId
);
string_id!(MatchId);
string_id!(ApplicationId);
string_id!(EventId);
string_id!(MessageId);
string_id!(UserId);
string_id!(InviteId);
string_id!(ServiceRequestId);
string_id!(
    /// Opaque lookup tag identifier (province code, cause slug, ...).
    TagId
);

/// The four eligibility dimensions shared by clients and grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Cause,
    ApplicantType,
    Province,
    EligibilityFlag,
}

impl TagCategory {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Cause,
            Self::ApplicantType,
            Self::Province,
            Self::EligibilityFlag,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cause => "cause",
            Self::ApplicantType => "applicant_type",
            Self::Province => "province",
            Self::EligibilityFlag => "eligibility_flag",
        }
    }

    pub const fn plural_label(self) -> &'static str {
        match self {
            Self::Cause => "causes",
            Self::ApplicantType => "applicant types",
            Self::Province => "provinces",
            Self::EligibilityFlag => "eligibility flags",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|category| category.label() == value.trim())
    }
}

/// Lookup table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Tag sets describing who a grant funds or what a client organization is.
///
/// Only membership matters. A grant with an empty set in a category places no
/// constraint on that category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityProfile {
    #[serde(default)]
    pub causes: BTreeSet<TagId>,
    #[serde(default)]
    pub applicant_types: BTreeSet<TagId>,
    #[serde(default)]
    pub provinces: BTreeSet<TagId>,
    #[serde(default)]
    pub eligibility_flags: BTreeSet<TagId>,
}

impl EligibilityProfile {
    pub fn tags(&self, category: TagCategory) -> &BTreeSet<TagId> {
        match category {
            TagCategory::Cause => &self.causes,
            TagCategory::ApplicantType => &self.applicant_types,
            TagCategory::Province => &self.provinces,
            TagCategory::EligibilityFlag => &self.eligibility_flags,
        }
    }

    pub fn tags_mut(&mut self, category: TagCategory) -> &mut BTreeSet<TagId> {
        match category {
            TagCategory::Cause => &mut self.causes,
            TagCategory::ApplicantType => &mut self.applicant_types,
            TagCategory::Province => &mut self.provinces,
            TagCategory::EligibilityFlag => &mut self.eligibility_flags,
        }
    }

    pub fn with(mut self, category: TagCategory, ids: &[&str]) -> Self {
        self.tags_mut(category)
            .extend(ids.iter().map(|id| TagId::from(*id)));
        self
    }

    pub fn is_empty(&self) -> bool {
        TagCategory::ordered()
            .into_iter()
            .all(|category| self.tags(category).is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Open,
    Closed,
    #[default]
    Unknown,
}

impl GrantStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineType {
    Fixed,
    #[default]
    Rolling,
    Multiple,
}

impl DeadlineType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Rolling => "rolling",
            Self::Multiple => "multiple",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Some(Self::Fixed),
            "rolling" => Some(Self::Rolling),
            "multiple" => Some(Self::Multiple),
            _ => None,
        }
    }
}

/// External funding opportunity. Amounts are whole units of `currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub name: String,
    pub funder: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub notes: Option<String>,
    pub status: GrantStatus,
    pub deadline_type: DeadlineType,
    pub deadline_at: Option<NaiveDate>,
    pub next_deadline_at: Option<NaiveDate>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub amount_min: Option<u64>,
    pub amount_max: Option<u64>,
    pub currency: String,
    pub eligibility: EligibilityProfile,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_CURRENCY: &str = "CAD";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Staff input for cataloging a grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantDraft {
    pub name: String,
    #[serde(default)]
    pub funder: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: GrantStatus,
    #[serde(default)]
    pub deadline_type: DeadlineType,
    #[serde(default)]
    pub deadline_at: Option<NaiveDate>,
    #[serde(default)]
    pub next_deadline_at: Option<NaiveDate>,
    #[serde(default)]
    pub amount_min: Option<u64>,
    #[serde(default)]
    pub amount_max: Option<u64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub eligibility: EligibilityProfile,
}

impl Default for GrantDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            funder: None,
            description: None,
            source_url: None,
            notes: None,
            status: GrantStatus::default(),
            deadline_type: DeadlineType::default(),
            deadline_at: None,
            next_deadline_at: None,
            amount_min: None,
            amount_max: None,
            currency: default_currency(),
            eligibility: EligibilityProfile::default(),
        }
    }
}

/// Partial grant update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantPatch {
    pub name: Option<String>,
    pub funder: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub notes: Option<String>,
    pub status: Option<GrantStatus>,
    pub deadline_type: Option<DeadlineType>,
    pub deadline_at: Option<NaiveDate>,
    pub next_deadline_at: Option<NaiveDate>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub amount_min: Option<u64>,
    pub amount_max: Option<u64>,
    pub currency: Option<String>,
    pub eligibility: Option<EligibilityProfile>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    #[default]
    Managed,
    SelfService,
}

impl ClientType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::SelfService => "self_service",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "managed" => Some(Self::Managed),
            "self_service" => Some(Self::SelfService),
            _ => None,
        }
    }
}

/// Nonprofit organization tracked by staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub entity_type: Option<String>,
    pub notes: Option<String>,
    pub client_type: ClientType,
    pub eligibility: EligibilityProfile,
    pub subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    /// Portal grant-database gate; written by billing webhooks or a staff override.
    pub grant_db_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientDraft {
    pub name: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub client_type: ClientType,
    #[serde(default)]
    pub eligibility: EligibilityProfile,
    #[serde(default)]
    pub grant_db_access: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub entity_type: Option<String>,
    pub notes: Option<String>,
    pub client_type: Option<ClientType>,
    pub eligibility: Option<EligibilityProfile>,
    /// Manual staff override of the subscription gate.
    pub grant_db_access: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    Owner,
    #[default]
    Viewer,
}

impl ClientRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "owner" => Some(Self::Owner),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// Link between a portal user and the organization they act for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub client_id: ClientId,
    pub user_id: UserId,
    pub client_role: ClientRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    New,
    Qualified,
    Rejected,
    Converted,
}

impl MatchStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Qualified => "qualified",
            Self::Rejected => "rejected",
            Self::Converted => "converted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "new" => Some(Self::New),
            "qualified" => Some(Self::Qualified),
            "rejected" => Some(Self::Rejected),
            "converted" => Some(Self::Converted),
            _ => None,
        }
    }
}

/// Saved recommendation. Score, level and reasons are a snapshot taken when staff
/// saved the suggestion and are never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantMatch {
    pub id: MatchId,
    pub client_id: ClientId,
    pub grant_id: GrantId,
    pub fit_score: u8,
    pub fit_level: FitLevel,
    pub reasons: FitReasons,
    pub notes: Option<String>,
    pub status: MatchStatus,
    pub owner: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDraft {
    pub client_id: ClientId,
    pub grant_id: GrantId,
    pub fit_score: u8,
    #[serde(default)]
    pub reasons: FitReasons,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub owner: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPatch {
    pub status: Option<MatchStatus>,
    pub notes: Option<String>,
    pub owner: Option<UserId>,
}

/// Ordered pipeline positions. Staff may move an application to any stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStage {
    #[default]
    Draft,
    InProgress,
    Submitted,
    Awarded,
    Declined,
    Reporting,
    Closed,
}

impl ApplicationStage {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Draft,
            Self::InProgress,
            Self::Submitted,
            Self::Awarded,
            Self::Declined,
            Self::Reporting,
            Self::Closed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::Awarded => "awarded",
            Self::Declined => "declined",
            Self::Reporting => "reporting",
            Self::Closed => "closed",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::InProgress => "In Progress",
            Self::Submitted => "Submitted",
            Self::Awarded => "Awarded",
            Self::Declined => "Declined",
            Self::Reporting => "Reporting",
            Self::Closed => "Closed",
        }
    }

    /// Stages whose entry sends the client organization an update.
    pub const fn notifies_client(self) -> bool {
        matches!(self, Self::Submitted | Self::Awarded | Self::Declined)
    }

    pub const fn is_decision(self) -> bool {
        matches!(self, Self::Awarded | Self::Declined)
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|stage| stage.label() == value.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub client_id: ClientId,
    pub grant_id: GrantId,
    pub match_id: Option<MatchId>,
    pub stage: ApplicationStage,
    pub internal_deadline: Option<NaiveDate>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decision_at: Option<DateTime<Utc>>,
    pub amount_requested: Option<u64>,
    pub amount_awarded: Option<u64>,
    pub assigned_to: Option<UserId>,
    pub cycle_year: Option<i32>,
    pub round_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub client_id: ClientId,
    pub grant_id: GrantId,
    #[serde(default)]
    pub match_id: Option<MatchId>,
    #[serde(default)]
    pub stage: ApplicationStage,
    #[serde(default)]
    pub internal_deadline: Option<NaiveDate>,
    #[serde(default)]
    pub amount_requested: Option<u64>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub cycle_year: Option<i32>,
    #[serde(default)]
    pub round_label: Option<String>,
}

/// Partial update. Absent fields are left alone; the clearable fields take an
/// explicit `null` as `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationPatch {
    pub stage: Option<ApplicationStage>,
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub internal_deadline: Option<Option<NaiveDate>>,
    pub amount_requested: Option<u64>,
    pub amount_awarded: Option<u64>,
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<UserId>>,
    pub cycle_year: Option<i32>,
    #[serde(deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub round_label: Option<Option<String>>,
}

impl ApplicationPatch {
    /// Copy the set fields onto `application`. The stage is left to the caller.
    pub fn apply_fields(&self, application: &mut Application) {
        if let Some(deadline) = self.internal_deadline {
            application.internal_deadline = deadline;
        }
        if let Some(amount) = self.amount_requested {
            application.amount_requested = Some(amount);
        }
        if let Some(amount) = self.amount_awarded {
            application.amount_awarded = Some(amount);
        }
        if let Some(assigned_to) = &self.assigned_to {
            application.assigned_to = assigned_to.clone();
        }
        if let Some(year) = self.cycle_year {
            application.cycle_year = Some(year);
        }
        if let Some(label) = &self.round_label {
            application.round_label = label.clone();
        }
    }
}

/// A present field always lands in the outer `Some`, so `null` reads as "clear".
fn clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusChange,
    Note,
    DocRequest,
    Submission,
    Decision,
}

impl EventType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::StatusChange => "status_change",
            Self::Note => "note",
            Self::DocRequest => "doc_request",
            Self::Submission => "submission",
            Self::Decision => "decision",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "status_change" => Some(Self::StatusChange),
            "note" => Some(Self::Note),
            "doc_request" => Some(Self::DocRequest),
            "submission" => Some(Self::Submission),
            "decision" => Some(Self::Decision),
            _ => None,
        }
    }
}

/// Append-only ledger entry for an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEvent {
    pub id: EventId,
    pub application_id: ApplicationId,
    pub event_type: EventType,
    pub from_stage: Option<ApplicationStage>,
    pub to_stage: Option<ApplicationStage>,
    pub note: Option<String>,
    pub actor: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub event_type: EventType,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageChannel {
    #[default]
    Email,
    Portal,
}

impl MessageChannel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Portal => "portal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "email" => Some(Self::Email),
            "portal" => Some(Self::Portal),
            _ => None,
        }
    }
}

/// Communication log entry, written whether or not delivery succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub client_id: ClientId,
    pub application_id: Option<ApplicationId>,
    pub channel: MessageChannel,
    pub subject: String,
    pub body: String,
    pub sent_to: String,
    pub sent_at: DateTime<Utc>,
    pub delivered: bool,
    pub created_by: Option<UserId>,
}

/// Pending portal invitation. The token is a bearer capability consumed on acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: InviteId,
    pub email: String,
    pub name: Option<String>,
    pub client_id: ClientId,
    pub client_role: ClientRole,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteDraft {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub client_id: ClientId,
    #[serde(default)]
    pub client_role: ClientRole,
}

/// Public sign-up form. Creates a self-service organization owned by the new user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupDraft {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub organization_name: String,
    #[serde(default)]
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signup {
    pub user: User,
    pub client: Client,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRequestStatus {
    #[default]
    Pending,
    Contacted,
    Converted,
    Closed,
}

impl ServiceRequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Contacted => "contacted",
            Self::Converted => "converted",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pending" => Some(Self::Pending),
            "contacted" => Some(Self::Contacted),
            "converted" => Some(Self::Converted),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// A self-service organization asking staff to take over as a managed client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedServiceRequest {
    pub id: ServiceRequestId,
    pub client_id: ClientId,
    pub message: String,
    pub contact_phone: Option<String>,
    pub status: ServiceRequestStatus,
    /// Staff-only working notes.
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequestDraft {
    pub message: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRequestPatch {
    pub status: Option<ServiceRequestStatus>,
    pub notes: Option<String>,
}
