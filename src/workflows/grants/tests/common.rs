use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::grants::access::{Actor, Role};
use crate::workflows::grants::clock::Clock;
use crate::workflows::grants::domain::{
    Application, ApplicationDraft, ApplicationId, ApplicationStage, Client, ClientDraft,
    ClientRole, EligibilityProfile, Grant, GrantDraft, GrantStatus, Invite, TagCategory, User,
    UserDraft,
};
use crate::workflows::grants::memory::InMemoryGrantRepository;
use crate::workflows::grants::notify::{
    EmailNotifier, MailError, MailTransport, Notifier, NotifyError, OutboundEmail,
};
use crate::workflows::grants::repository::GrantRepository;
use crate::workflows::grants::{grant_router, GrantPipelineService, PipelineConfig};

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    stages: Mutex<Vec<(ApplicationId, ApplicationStage)>>,
    invitations: Mutex<Vec<Invite>>,
}

impl RecordingNotifier {
    pub(super) fn stages(&self) -> Vec<(ApplicationId, ApplicationStage)> {
        self.stages.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn invitations(&self) -> Vec<Invite> {
        self.invitations
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn application_stage(
        &self,
        application: &Application,
        stage: ApplicationStage,
    ) -> Result<(), NotifyError> {
        self.stages
            .lock()
            .expect("notifier mutex poisoned")
            .push((application.id.clone(), stage));
        Ok(())
    }

    fn invitation(&self, invite: &Invite, _client: &Client) -> Result<(), NotifyError> {
        self.invitations
            .lock()
            .expect("notifier mutex poisoned")
            .push(invite.clone());
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn application_stage(
        &self,
        _application: &Application,
        _stage: ApplicationStage,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Queue("queue closed".into()))
    }

    fn invitation(&self, _invite: &Invite, _client: &Client) -> Result<(), NotifyError> {
        Err(NotifyError::Queue("queue closed".into()))
    }
}

#[derive(Default)]
pub(super) struct RecordingTransport {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingTransport {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("transport mutex poisoned").clone()
    }
}

impl MailTransport for RecordingTransport {
    fn deliver(&self, email: &OutboundEmail) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("transport mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

pub(super) struct FailingTransport;

impl MailTransport for FailingTransport {
    fn deliver(&self, _email: &OutboundEmail) -> Result<(), MailError> {
        Err(MailError::Transport("relay offline".into()))
    }
}

pub(super) type TestService = GrantPipelineService<InMemoryGrantRepository, RecordingNotifier>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) repository: Arc<InMemoryGrantRepository>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) clock: Arc<FixedClock>,
}

pub(super) fn build_service() -> Harness {
    let repository = Arc::new(InMemoryGrantRepository::seeded());
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(FixedClock::starting_at(start_time()));
    let service = GrantPipelineService::new(
        repository.clone(),
        notifier.clone(),
        PipelineConfig::default(),
    )
    .with_clock(clock.clone());

    Harness {
        service: Arc::new(service),
        repository,
        notifier,
        clock,
    }
}

pub(super) type EmailService<M> = GrantPipelineService<
    InMemoryGrantRepository,
    EmailNotifier<InMemoryGrantRepository, M>,
>;

/// Service wired to the real e-mail notifier over the given transport.
pub(super) fn email_service<M: MailTransport + 'static>(
    transport: Arc<M>,
) -> (EmailService<M>, Arc<InMemoryGrantRepository>) {
    let repository = Arc::new(InMemoryGrantRepository::seeded());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::starting_at(start_time()));
    let notifier = Arc::new(EmailNotifier::new(
        repository.clone(),
        transport,
        clock.clone(),
        "https://portal.example.org/",
    ));
    let service = GrantPipelineService::new(repository.clone(), notifier, PipelineConfig::default())
        .with_clock(clock);
    (service, repository)
}

pub(super) fn staff() -> Actor {
    Actor::new("staff-1", Role::Staff)
}

pub(super) fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub(super) fn portal_actor(user: &User) -> Actor {
    Actor {
        user_id: user.id.clone(),
        role: Role::Client,
    }
}

/// Requires health causes and registered charities; open to every province.
pub(super) fn health_grant_draft() -> GrantDraft {
    GrantDraft {
        name: "Community Health Fund".to_string(),
        funder: Some("Harbour Foundation".to_string()),
        status: GrantStatus::Open,
        amount_min: Some(5_000),
        amount_max: Some(25_000),
        eligibility: EligibilityProfile::default()
            .with(TagCategory::Cause, &["health-wellness"])
            .with(TagCategory::ApplicantType, &["registered-charity"]),
        ..GrantDraft::default()
    }
}

pub(super) fn health_charity_profile() -> EligibilityProfile {
    EligibilityProfile::default()
        .with(TagCategory::Cause, &["health-wellness", "education-literacy"])
        .with(TagCategory::ApplicantType, &["registered-charity"])
        .with(TagCategory::Province, &["ON"])
}

pub(super) fn education_charity_profile() -> EligibilityProfile {
    EligibilityProfile::default()
        .with(TagCategory::Cause, &["education-literacy"])
        .with(TagCategory::ApplicantType, &["registered-charity"])
}

pub(super) fn seed_grant<R, N>(service: &GrantPipelineService<R, N>, draft: GrantDraft) -> Grant
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    service
        .create_grant(&staff(), draft)
        .expect("grant is created")
}

pub(super) fn seed_client<R, N>(
    service: &GrantPipelineService<R, N>,
    name: &str,
    eligibility: EligibilityProfile,
) -> Client
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    service
        .create_client(
            &staff(),
            ClientDraft {
                name: name.to_string(),
                eligibility,
                ..ClientDraft::default()
            },
        )
        .expect("client is created")
}

/// Client-role user linked to `client` as a viewer.
pub(super) fn seed_portal_user<R, N>(
    service: &GrantPipelineService<R, N>,
    client: &Client,
    email: &str,
) -> User
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    let user = service
        .register_user(
            &staff(),
            UserDraft {
                email: email.to_string(),
                name: Some("Portal User".to_string()),
                role: Role::Client,
            },
        )
        .expect("user is registered");
    service
        .add_client_member(&staff(), &client.id, &user.id, ClientRole::Viewer)
        .expect("membership is stored");
    user
}

pub(super) fn application_draft(client: &Client, grant: &Grant) -> ApplicationDraft {
    ApplicationDraft {
        client_id: client.id.clone(),
        grant_id: grant.id.clone(),
        match_id: None,
        stage: ApplicationStage::Draft,
        internal_deadline: None,
        amount_requested: Some(10_000),
        assigned_to: None,
        cycle_year: Some(2025),
        round_label: None,
    }
}

pub(super) fn router_for(harness: &Harness) -> axum::Router {
    grant_router(harness.service.clone())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}
