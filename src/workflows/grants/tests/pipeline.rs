use super::common::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::workflows::grants::access::{Actor, Role};
use crate::workflows::grants::clock::Clock;
use crate::workflows::grants::domain::{
    ApplicationPatch, ApplicationStage, EventDraft, EventType, UserId,
};
use crate::workflows::grants::memory::InMemoryGrantRepository;
use crate::workflows::grants::repository::ApplicationFilter;
use crate::workflows::grants::{GrantPipelineService, PipelineConfig, PipelineError};

fn move_to(stage: ApplicationStage) -> ApplicationPatch {
    ApplicationPatch {
        stage: Some(stage),
        ..ApplicationPatch::default()
    }
}

#[test]
fn creation_records_initial_status_change() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());

    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    assert_eq!(application.stage, ApplicationStage::Draft);
    assert_eq!(application.assigned_to, Some(staff().user_id));
    assert_eq!(application.submitted_at, None);

    let events = service
        .list_events(&staff(), &application.id)
        .expect("events listed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::StatusChange);
    assert_eq!(events[0].from_stage, None);
    assert_eq!(events[0].to_stage, Some(ApplicationStage::Draft));
    assert_eq!(events[0].actor, Some(staff().user_id));
    assert!(harness.notifier.stages().is_empty());
}

#[test]
fn created_directly_as_submitted_stamps_and_notifies() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());

    let mut draft = application_draft(&client, &grant);
    draft.stage = ApplicationStage::Submitted;
    let application = service
        .create_application(&staff(), draft)
        .expect("application created");

    assert_eq!(application.submitted_at, Some(start_time()));
    assert_eq!(
        harness.notifier.stages(),
        vec![(application.id.clone(), ApplicationStage::Submitted)]
    );
}

#[test]
fn submitting_twice_keeps_first_timestamp() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    harness.clock.advance(Duration::days(1));
    let first = service
        .update_application(&staff(), &application.id, move_to(ApplicationStage::Submitted))
        .expect("submitted");
    let first_submitted = start_time() + Duration::days(1);
    assert_eq!(first.submitted_at, Some(first_submitted));

    harness.clock.advance(Duration::days(1));
    service
        .update_application(&staff(), &application.id, move_to(ApplicationStage::InProgress))
        .expect("moved back");
    harness.clock.advance(Duration::days(1));
    let second = service
        .update_application(&staff(), &application.id, move_to(ApplicationStage::Submitted))
        .expect("resubmitted");
    assert_eq!(second.submitted_at, Some(first_submitted));

    let submissions: Vec<_> = service
        .list_events(&staff(), &application.id)
        .expect("events listed")
        .into_iter()
        .filter(|event| event.to_stage == Some(ApplicationStage::Submitted))
        .collect();
    assert_eq!(submissions.len(), 2);
    assert!(submissions
        .iter()
        .all(|event| event.event_type == EventType::StatusChange));
    assert_eq!(submissions[0].from_stage, Some(ApplicationStage::InProgress));
    assert_eq!(submissions[1].from_stage, Some(ApplicationStage::Draft));
}

#[test]
fn repeating_the_current_stage_records_nothing() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    service
        .update_application(&staff(), &application.id, move_to(ApplicationStage::Submitted))
        .expect("submitted");
    service
        .update_application(&staff(), &application.id, move_to(ApplicationStage::Submitted))
        .expect("submitted again");

    let events = service
        .list_events(&staff(), &application.id)
        .expect("events listed");
    assert_eq!(events.len(), 2);
    assert_eq!(harness.notifier.stages().len(), 1);
}

#[test]
fn decision_timestamp_is_overwritten() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    harness.clock.advance(Duration::days(3));
    let declined = service
        .update_application(&staff(), &application.id, move_to(ApplicationStage::Declined))
        .expect("declined");
    assert_eq!(declined.decision_at, Some(start_time() + Duration::days(3)));

    harness.clock.advance(Duration::days(4));
    let awarded = service
        .update_application(
            &staff(),
            &application.id,
            ApplicationPatch {
                stage: Some(ApplicationStage::Awarded),
                amount_awarded: Some(12_500),
                ..ApplicationPatch::default()
            },
        )
        .expect("awarded");
    assert_eq!(awarded.decision_at, Some(start_time() + Duration::days(7)));
    assert_eq!(awarded.amount_awarded, Some(12_500));

    let notified: Vec<ApplicationStage> = harness
        .notifier
        .stages()
        .into_iter()
        .map(|(_, stage)| stage)
        .collect();
    assert_eq!(
        notified,
        vec![ApplicationStage::Declined, ApplicationStage::Awarded]
    );
}

#[test]
fn any_stage_may_follow_any_other() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    for stage in [
        ApplicationStage::Closed,
        ApplicationStage::Draft,
        ApplicationStage::Reporting,
        ApplicationStage::InProgress,
    ] {
        let updated = service
            .update_application(&staff(), &application.id, move_to(stage))
            .expect("transition allowed");
        assert_eq!(updated.stage, stage);
    }
    assert!(harness.notifier.stages().is_empty());
}

#[test]
fn failed_notification_does_not_fail_the_update() {
    let repository = Arc::new(InMemoryGrantRepository::seeded());
    let service = GrantPipelineService::new(
        repository.clone(),
        Arc::new(FailingNotifier),
        PipelineConfig::default(),
    );
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    let updated = service
        .update_application(&staff(), &application.id, move_to(ApplicationStage::Awarded))
        .expect("stage change commits");
    assert_eq!(updated.stage, ApplicationStage::Awarded);

    let stored = service
        .get_application(&staff(), &application.id)
        .expect("stored");
    assert_eq!(stored.stage, ApplicationStage::Awarded);
}

#[test]
fn manual_events_are_listed_newest_first() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    harness.clock.advance(Duration::minutes(5));
    let note = service
        .add_event(
            &staff(),
            &application.id,
            EventDraft {
                event_type: EventType::Note,
                note: Some("Called program officer".to_string()),
            },
        )
        .expect("note added");
    harness.clock.advance(Duration::minutes(5));
    service
        .add_event(
            &staff(),
            &application.id,
            EventDraft {
                event_type: EventType::DocRequest,
                note: Some("Need audited financials".to_string()),
            },
        )
        .expect("doc request added");

    assert_eq!(note.actor, Some(staff().user_id));
    let events = service
        .list_events(&staff(), &application.id)
        .expect("events listed");
    let kinds: Vec<EventType> = events.iter().map(|event| event.event_type).collect();
    assert_eq!(
        kinds,
        vec![EventType::DocRequest, EventType::Note, EventType::StatusChange]
    );
}

#[test]
fn manual_status_change_events_are_rejected() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    let err = service
        .add_event(
            &staff(),
            &application.id,
            EventDraft {
                event_type: EventType::StatusChange,
                note: None,
            },
        )
        .expect_err("status changes come from stage updates");
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn events_for_missing_application_are_not_found() {
    let harness = build_service();
    let err = harness
        .service
        .add_event(
            &staff(),
            &"missing".into(),
            EventDraft {
                event_type: EventType::Note,
                note: None,
            },
        )
        .expect_err("application missing");
    assert!(matches!(
        err,
        PipelineError::NotFound {
            entity: "application",
            ..
        }
    ));
}

#[test]
fn pipeline_counts_include_every_stage() {
    let harness = build_service();
    let service = &harness.service;

    let empty = service.pipeline_counts(&staff()).expect("counts");
    assert_eq!(empty.len(), 7);
    assert_eq!(empty.total(), 0);
    let json = serde_json::to_value(&empty).expect("serializable");
    for stage in ApplicationStage::ordered() {
        assert_eq!(json[stage.label()], 0, "{}", stage.label());
    }

    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    let counts = service.pipeline_counts(&staff()).expect("counts");
    assert_eq!(counts.len(), 7);
    assert_eq!(counts.count(ApplicationStage::Draft), 1);
    assert_eq!(counts.total(), 1);
}

#[test]
fn client_users_only_see_their_organization() {
    let harness = build_service();
    let service = &harness.service;
    let mine = seed_client(service, "Harbour Clinic", health_charity_profile());
    let theirs = seed_client(service, "Northern Arts", education_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let own_application = service
        .create_application(&staff(), application_draft(&mine, &grant))
        .expect("own application");
    let other_application = service
        .create_application(&staff(), application_draft(&theirs, &grant))
        .expect("other application");

    let user = seed_portal_user(service, &mine, "ada@harbour.example");
    let actor = portal_actor(&user);

    let visible = service
        .list_applications(&actor, &ApplicationFilter::default())
        .expect("listed");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, own_application.id);

    let smuggled = service
        .list_applications(
            &actor,
            &ApplicationFilter {
                client_id: Some(theirs.id.clone()),
                ..ApplicationFilter::default()
            },
        )
        .expect("listed");
    assert!(smuggled.is_empty());

    assert!(service.get_application(&actor, &own_application.id).is_ok());
    assert!(matches!(
        service.get_application(&actor, &other_application.id),
        Err(PipelineError::Forbidden(_))
    ));
    assert!(matches!(
        service.list_events(&actor, &other_application.id),
        Err(PipelineError::Forbidden(_))
    ));
    assert!(matches!(
        service.update_application(
            &actor,
            &own_application.id,
            move_to(ApplicationStage::Submitted)
        ),
        Err(PipelineError::Forbidden(_))
    ));
}

#[test]
fn client_without_memberships_sees_nothing() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    let stranger = Actor::new("stranger", Role::Client);
    let visible = service
        .list_applications(&stranger, &ApplicationFilter::default())
        .expect("listed");
    assert!(visible.is_empty());
}

#[test]
fn deleting_an_application_removes_its_events() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    service
        .delete_application(&staff(), &application.id)
        .expect("deleted");

    assert!(matches!(
        service.list_events(&staff(), &application.id),
        Err(PipelineError::NotFound { .. })
    ));
    assert_eq!(
        service.pipeline_counts(&staff()).expect("counts").total(),
        0
    );
}

#[test]
fn list_applications_filters_by_stage() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let submitted = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("first");
    service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("second");
    service
        .update_application(&staff(), &submitted.id, move_to(ApplicationStage::Submitted))
        .expect("submitted");

    let filtered = service
        .list_applications(
            &staff(),
            &ApplicationFilter {
                stage: Some(ApplicationStage::Submitted),
                ..ApplicationFilter::default()
            },
        )
        .expect("listed");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, submitted.id);
}

/// Parks the first caller after `hold` until the test sends on the resume channel.
struct HeldClock {
    now: DateTime<Utc>,
    armed: AtomicBool,
    entered: Mutex<mpsc::Sender<()>>,
    resume: Mutex<mpsc::Receiver<()>>,
}

impl HeldClock {
    fn hold(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl Clock for HeldClock {
    fn now(&self) -> DateTime<Utc> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered
                .lock()
                .expect("clock mutex poisoned")
                .send(())
                .expect("test waiting");
            self.resume
                .lock()
                .expect("clock mutex poisoned")
                .recv()
                .expect("test resumes the clock");
        }
        self.now
    }
}

#[test]
fn concurrent_patch_keeps_a_committed_submission() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel();
    let clock = Arc::new(HeldClock {
        now: start_time(),
        armed: AtomicBool::new(false),
        entered: Mutex::new(entered_tx),
        resume: Mutex::new(resume_rx),
    });
    let service = Arc::new(
        GrantPipelineService::new(
            Arc::new(InMemoryGrantRepository::seeded()),
            Arc::new(RecordingNotifier::default()),
            PipelineConfig::default(),
        )
        .with_clock(clock.clone()),
    );
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&service, health_grant_draft());
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    clock.hold();
    let amount_update = {
        let service = service.clone();
        let id = application.id.clone();
        thread::spawn(move || {
            service.update_application(
                &staff(),
                &id,
                ApplicationPatch {
                    amount_requested: Some(5_000),
                    ..ApplicationPatch::default()
                },
            )
        })
    };
    entered_rx.recv().expect("amount update started");

    service
        .update_application(&staff(), &application.id, move_to(ApplicationStage::Submitted))
        .expect("submitted");
    resume_tx.send(()).expect("amount update waiting");
    amount_update
        .join()
        .expect("amount update thread")
        .expect("amount updated");

    let stored = service
        .get_application(&staff(), &application.id)
        .expect("stored");
    assert_eq!(stored.stage, ApplicationStage::Submitted);
    assert_eq!(stored.submitted_at, Some(start_time()));
    assert_eq!(stored.amount_requested, Some(5_000));

    let events = service
        .list_events(&staff(), &application.id)
        .expect("events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].to_stage, Some(stored.stage));
}

#[test]
fn explicit_null_clears_optional_fields() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(service, health_grant_draft());
    let deadline = NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date");
    let application = service
        .update_application(
            &staff(),
            &service
                .create_application(&staff(), application_draft(&client, &grant))
                .expect("application created")
                .id,
            ApplicationPatch {
                internal_deadline: Some(Some(deadline)),
                round_label: Some(Some("Spring intake".to_string())),
                ..ApplicationPatch::default()
            },
        )
        .expect("fields set");
    assert_eq!(application.internal_deadline, Some(deadline));
    assert_eq!(application.assigned_to, Some(staff().user_id));

    let untouched: ApplicationPatch =
        serde_json::from_str(r#"{"amount_requested": 7000}"#).expect("patch parses");
    let updated = service
        .update_application(&staff(), &application.id, untouched)
        .expect("amount set");
    assert_eq!(updated.round_label.as_deref(), Some("Spring intake"));
    assert_eq!(updated.internal_deadline, Some(deadline));

    let clearing: ApplicationPatch = serde_json::from_str(
        r#"{"internal_deadline": null, "assigned_to": null, "round_label": null}"#,
    )
    .expect("patch parses");
    assert_eq!(clearing.assigned_to, Some(None::<UserId>));
    let cleared = service
        .update_application(&staff(), &application.id, clearing)
        .expect("fields cleared");
    assert_eq!(cleared.internal_deadline, None);
    assert_eq!(cleared.assigned_to, None);
    assert_eq!(cleared.round_label, None);
    assert_eq!(cleared.amount_requested, Some(7_000));
}
