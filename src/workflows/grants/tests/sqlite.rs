use super::common::*;

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::workflows::grants::domain::{
    ApplicationDraft, ApplicationPatch, ApplicationStage, ClientType, GrantMatch, InviteDraft,
    MatchDraft, MatchStatus, ServiceRequestDraft, ServiceRequestPatch, ServiceRequestStatus,
    SignupDraft, TagCategory,
};
use crate::workflows::grants::lookups::LookupCatalog;
use crate::workflows::grants::notify::EmailNotifier;
use crate::workflows::grants::repository::{ApplicationFilter, GrantRepository, MatchFilter};
use crate::workflows::grants::scoring::FitScorer;
use crate::workflows::grants::sqlite::SqliteGrantRepository;
use crate::workflows::grants::{GrantPipelineService, PipelineConfig, PipelineError};

type SqliteService = GrantPipelineService<SqliteGrantRepository, RecordingNotifier>;

fn sqlite_service() -> (SqliteService, Arc<SqliteGrantRepository>, Arc<FixedClock>) {
    let repository = Arc::new(SqliteGrantRepository::open_in_memory().expect("sqlite opens"));
    repository
        .seed_lookups(&LookupCatalog::standard())
        .expect("lookups seeded");
    let clock = Arc::new(FixedClock::starting_at(start_time()));
    let service = GrantPipelineService::new(
        repository.clone(),
        Arc::new(RecordingNotifier::default()),
        PipelineConfig::default(),
    )
    .with_clock(clock.clone());
    (service, repository, clock)
}

fn save_match(service: &SqliteService, draft: MatchDraft) -> Result<GrantMatch, PipelineError> {
    service.create_match(&staff(), draft)
}

#[test]
fn seeding_lookups_is_idempotent() {
    let repository = SqliteGrantRepository::open_in_memory().expect("sqlite opens");
    let catalog = LookupCatalog::standard();
    assert_eq!(
        repository.seed_lookups(&catalog).expect("seeded"),
        catalog.len()
    );
    assert_eq!(repository.seed_lookups(&catalog).expect("reseeded"), 0);
    assert_eq!(repository.lookups().expect("loaded"), catalog);
}

#[test]
fn grants_and_clients_round_trip() {
    let (service, _, _) = sqlite_service();
    let grant = seed_grant(&service, health_grant_draft());
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());

    assert_eq!(service.get_grant(&staff(), &grant.id).expect("grant"), grant);
    assert_eq!(
        service.get_client(&staff(), &client.id).expect("client"),
        client
    );

    let outcome = service
        .score_pair(&staff(), &client.id, &grant.id)
        .expect("scored");
    let expected = FitScorer::default().score(
        &client.eligibility,
        &grant.eligibility,
        &LookupCatalog::standard(),
    );
    assert_eq!(outcome, expected);
}

#[test]
fn duplicate_match_hits_unique_constraint() {
    let (service, _, _) = sqlite_service();
    let grant = seed_grant(&service, health_grant_draft());
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let draft = MatchDraft {
        client_id: client.id.clone(),
        grant_id: grant.id.clone(),
        fit_score: 100,
        reasons: Default::default(),
        notes: None,
        status: MatchStatus::New,
        owner: None,
    };

    let first = save_match(&service, draft.clone()).expect("first match");
    let err = save_match(
        &service,
        MatchDraft {
            fit_score: 10,
            ..draft
        },
    )
    .expect_err("duplicate pair");
    match err {
        PipelineError::Conflict(message) => {
            assert!(message.contains(grant.id.as_str()), "{message}");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(service.get_match(&staff(), &first.id).expect("first"), first);
}

#[test]
fn application_lifecycle_persists_timestamps_and_events() {
    let (service, _, clock) = sqlite_service();
    let grant = seed_grant(&service, health_grant_draft());
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let record = save_match(
        &service,
        MatchDraft {
            client_id: client.id.clone(),
            grant_id: grant.id.clone(),
            fit_score: 100,
            reasons: Default::default(),
            notes: None,
            status: MatchStatus::Qualified,
            owner: None,
        },
    )
    .expect("match saved");

    let application = service
        .create_application(
            &staff(),
            ApplicationDraft {
                match_id: Some(record.id.clone()),
                ..application_draft(&client, &grant)
            },
        )
        .expect("application created");
    assert_eq!(
        service.get_match(&staff(), &record.id).expect("match").status,
        MatchStatus::Converted
    );

    for (days, stage) in [
        (1, ApplicationStage::Submitted),
        (2, ApplicationStage::Declined),
        (3, ApplicationStage::Awarded),
    ] {
        clock.advance(Duration::days(1));
        let updated = service
            .update_application(
                &staff(),
                &application.id,
                ApplicationPatch {
                    stage: Some(stage),
                    ..ApplicationPatch::default()
                },
            )
            .expect("stage updated");
        assert_eq!(updated.updated_at, start_time() + Duration::days(days));
    }

    let stored = service
        .get_application(&staff(), &application.id)
        .expect("stored");
    assert_eq!(stored.stage, ApplicationStage::Awarded);
    assert_eq!(stored.submitted_at, Some(start_time() + Duration::days(1)));
    assert_eq!(stored.decision_at, Some(start_time() + Duration::days(3)));

    let events = service
        .list_events(&staff(), &application.id)
        .expect("events");
    let moves: Vec<_> = events
        .iter()
        .map(|event| (event.from_stage, event.to_stage))
        .collect();
    assert_eq!(
        moves,
        vec![
            (
                Some(ApplicationStage::Declined),
                Some(ApplicationStage::Awarded)
            ),
            (
                Some(ApplicationStage::Submitted),
                Some(ApplicationStage::Declined)
            ),
            (Some(ApplicationStage::Draft), Some(ApplicationStage::Submitted)),
            (None, Some(ApplicationStage::Draft)),
        ]
    );

    let counts = service.pipeline_counts(&staff()).expect("counts");
    assert_eq!(counts.len(), 7);
    assert_eq!(counts.count(ApplicationStage::Awarded), 1);
    assert_eq!(counts.total(), 1);
}

#[test]
fn deleting_a_client_cascades() {
    let (service, repository, _) = sqlite_service();
    let grant = seed_grant(&service, health_grant_draft());
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let keeper = seed_client(&service, "Northern Arts", education_charity_profile());
    seed_portal_user(&service, &client, "ada@harbour.example");
    save_match(
        &service,
        MatchDraft {
            client_id: client.id.clone(),
            grant_id: grant.id.clone(),
            fit_score: 100,
            reasons: Default::default(),
            notes: None,
            status: MatchStatus::New,
            owner: None,
        },
    )
    .expect("match saved");
    service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("doomed application");
    let kept = service
        .create_application(&staff(), application_draft(&keeper, &grant))
        .expect("kept application");

    service
        .delete_client(&staff(), &client.id)
        .expect("client deleted");

    assert!(repository
        .list_matches(&MatchFilter::default())
        .expect("matches")
        .is_empty());
    let remaining = repository
        .list_applications(&ApplicationFilter::default())
        .expect("applications");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, kept.id);
    assert!(repository
        .client_members(&client.id)
        .expect("members")
        .is_empty());
    assert!(matches!(
        service.delete_client(&staff(), &client.id),
        Err(PipelineError::NotFound { .. })
    ));
}

#[test]
fn stage_messages_outlive_deleted_applications() {
    let repository = Arc::new(SqliteGrantRepository::open_in_memory().expect("sqlite opens"));
    let transport = Arc::new(RecordingTransport::default());
    let clock = Arc::new(FixedClock::starting_at(start_time()));
    let notifier = Arc::new(EmailNotifier::new(
        repository.clone(),
        transport.clone(),
        clock.clone(),
        "https://portal.example.org",
    ));
    let service = GrantPipelineService::new(repository.clone(), notifier, PipelineConfig::default())
        .with_clock(clock);

    let grant = seed_grant(&service, health_grant_draft());
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    seed_portal_user(&service, &client, "ada@harbour.example");
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");
    service
        .update_application(
            &staff(),
            &application.id,
            ApplicationPatch {
                stage: Some(ApplicationStage::Submitted),
                ..ApplicationPatch::default()
            },
        )
        .expect("submitted");
    assert_eq!(transport.sent().len(), 1);

    service
        .delete_application(&staff(), &application.id)
        .expect("deleted");

    let messages = service
        .client_messages(&staff(), &client.id)
        .expect("messages");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].delivered);
    assert_eq!(messages[0].application_id, None);
}

#[test]
fn invites_are_consumed_on_accept() {
    let (service, repository, _) = sqlite_service();
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let invite = service
        .create_invite(
            &staff(),
            InviteDraft {
                email: "ada@harbour.example".to_string(),
                name: None,
                client_id: client.id.clone(),
                client_role: Default::default(),
            },
        )
        .expect("invite created");

    let user = service
        .accept_invite(&invite.token, Some("Ada".to_string()))
        .expect("accepted");

    assert_eq!(
        repository.memberships(&user.id).expect("memberships"),
        vec![client.id.clone()]
    );
    assert!(repository
        .fetch_invite_by_token(&invite.token)
        .expect("lookup")
        .is_none());
    assert!(matches!(
        service.create_invite(
            &staff(),
            InviteDraft {
                email: "ADA@harbour.example".to_string(),
                name: None,
                client_id: client.id.clone(),
                client_role: Default::default(),
            },
        ),
        Err(PipelineError::Conflict(_))
    ));
}

#[test]
fn custom_tags_are_stored() {
    let (service, _, _) = sqlite_service();
    let tag = service
        .add_lookup_tag(&staff(), TagCategory::Cause, "Ocean Literacy")
        .expect("tag added");
    assert_eq!(tag.id.as_str(), "ocean-literacy");
    let lookups = service.lookups().expect("lookups");
    assert_eq!(lookups.name_of(TagCategory::Cause, &tag.id), "Ocean Literacy");
}

#[test]
fn file_backed_store_survives_reopen() {
    let path = std::env::temp_dir().join(format!("grant-pipeline-{}.db", Uuid::new_v4()));
    let grant_id = {
        let repository = Arc::new(SqliteGrantRepository::open(&path).expect("sqlite opens"));
        let service = GrantPipelineService::new(
            repository,
            Arc::new(RecordingNotifier::default()),
            PipelineConfig::default(),
        );
        seed_grant(&service, health_grant_draft()).id
    };

    let reopened = SqliteGrantRepository::open(&path).expect("sqlite reopens");
    let grant = reopened
        .fetch_grant(&grant_id)
        .expect("lookup")
        .expect("grant persisted");
    assert_eq!(grant.name, "Community Health Fund");

    drop(reopened);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[test]
fn signup_is_all_or_nothing() {
    let (service, repository, _) = sqlite_service();
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    seed_portal_user(&service, &client, "ada@harbour.example");

    let draft = |email: &str| SignupDraft {
        email: email.to_string(),
        name: None,
        organization_name: "Harbour Food Bank".to_string(),
        entity_type: None,
    };
    assert!(matches!(
        service.signup(draft("ADA@harbour.example")),
        Err(PipelineError::Conflict(_))
    ));
    assert_eq!(repository.list_clients().expect("clients").len(), 1);

    let signup = service
        .signup(draft("grace@foodbank.example"))
        .expect("signed up");
    let stored = repository
        .fetch_client(&signup.client.id)
        .expect("lookup")
        .expect("client persisted");
    assert_eq!(stored.client_type, ClientType::SelfService);
    assert_eq!(
        repository.memberships(&signup.user.id).expect("memberships"),
        vec![signup.client.id.clone()]
    );
}

#[test]
fn service_requests_persist_and_cascade() {
    let (service, repository, clock) = sqlite_service();
    let signup = service
        .signup(SignupDraft {
            email: "grace@foodbank.example".to_string(),
            name: Some("Grace".to_string()),
            organization_name: "Harbour Food Bank".to_string(),
            entity_type: None,
        })
        .expect("signed up");
    let owner = portal_actor(&signup.user);

    let first = service
        .request_managed_service(
            &owner,
            &signup.client.id,
            ServiceRequestDraft {
                message: "Please take over our spring applications".to_string(),
                contact_phone: None,
            },
        )
        .expect("first request");
    clock.advance(Duration::days(1));
    let second = service
        .request_managed_service(
            &owner,
            &signup.client.id,
            ServiceRequestDraft {
                message: "Following up".to_string(),
                contact_phone: Some("555-0100".to_string()),
            },
        )
        .expect("second request");

    let listed = service
        .list_service_requests(&staff(), None)
        .expect("requests listed");
    let ids: Vec<_> = listed.iter().map(|request| request.id.clone()).collect();
    assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);

    let closed = service
        .update_service_request(
            &staff(),
            &first.id,
            ServiceRequestPatch {
                status: Some(ServiceRequestStatus::Closed),
                notes: Some("Duplicate of the follow-up".to_string()),
            },
        )
        .expect("request closed");
    assert_eq!(
        repository
            .fetch_service_request(&first.id)
            .expect("lookup")
            .expect("request persisted"),
        closed
    );
    assert_eq!(
        service
            .list_service_requests(&staff(), Some(ServiceRequestStatus::Pending))
            .expect("pending listed"),
        vec![second]
    );

    service
        .delete_client(&staff(), &signup.client.id)
        .expect("client deleted");
    assert!(repository
        .list_service_requests(None)
        .expect("requests listed")
        .is_empty());
}
