use super::common::*;

use std::sync::{Arc, Mutex};

use crate::workflows::grants::domain::{
    ApplicationPatch, ApplicationStage, ClientId, InviteDraft,
};
use crate::workflows::grants::memory::InMemoryGrantRepository;
use crate::workflows::grants::notify::{
    run_notification_worker, EmailNotifier, MailError, MailTransport, Notifier, OutboundEmail,
    QueuedNotifier,
};
use crate::workflows::grants::repository::{GrantRepository, MessageFilter};
use crate::workflows::grants::{GrantPipelineService, PipelineConfig};

fn submit() -> ApplicationPatch {
    ApplicationPatch {
        stage: Some(ApplicationStage::Submitted),
        ..ApplicationPatch::default()
    }
}

#[test]
fn stage_update_emails_every_member_and_logs_messages() {
    let transport = Arc::new(RecordingTransport::default());
    let (service, repository) = email_service(transport.clone());
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&service, health_grant_draft());
    seed_portal_user(&service, &client, "ada@harbour.example");
    seed_portal_user(&service, &client, "grace@harbour.example");

    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");
    service
        .update_application(&staff(), &application.id, submit())
        .expect("submitted");

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent
        .iter()
        .all(|email| email.subject == "Application Update: Community Health Fund"));
    assert!(sent[0].body.contains("New Status: Submitted"));

    let messages = repository
        .list_messages(&MessageFilter {
            client_id: Some(client.id.clone()),
            application_id: Some(application.id.clone()),
        })
        .expect("messages listed");
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|message| message.delivered));
    let mut recipients: Vec<&str> = messages
        .iter()
        .map(|message| message.sent_to.as_str())
        .collect();
    recipients.sort_unstable();
    assert_eq!(recipients, vec!["ada@harbour.example", "grace@harbour.example"]);
}

/// Removes the organization while its first e-mail is in flight.
struct ClientRemovingTransport {
    repository: Arc<InMemoryGrantRepository>,
    client_id: Mutex<Option<ClientId>>,
    sent_to: Mutex<Vec<String>>,
}

impl MailTransport for ClientRemovingTransport {
    fn deliver(&self, email: &OutboundEmail) -> Result<(), MailError> {
        if let Some(client_id) = self.client_id.lock().expect("transport mutex").take() {
            self.repository
                .delete_client(&client_id)
                .expect("client removed");
        }
        self.sent_to
            .lock()
            .expect("transport mutex")
            .push(email.to.clone());
        Ok(())
    }
}

#[test]
fn message_log_failure_does_not_skip_other_members() {
    let repository = Arc::new(InMemoryGrantRepository::seeded());
    let setup = GrantPipelineService::new(
        repository.clone(),
        Arc::new(RecordingNotifier::default()),
        PipelineConfig::default(),
    );
    let client = seed_client(&setup, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&setup, health_grant_draft());
    seed_portal_user(&setup, &client, "ada@harbour.example");
    seed_portal_user(&setup, &client, "grace@harbour.example");
    let application = setup
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    let transport = Arc::new(ClientRemovingTransport {
        repository: repository.clone(),
        client_id: Mutex::new(Some(client.id.clone())),
        sent_to: Mutex::new(Vec::new()),
    });
    let notifier = EmailNotifier::new(
        repository.clone(),
        transport.clone(),
        Arc::new(FixedClock::starting_at(start_time())),
        "https://portal.example.org",
    );

    notifier
        .application_stage(&application, ApplicationStage::Submitted)
        .expect("dispatch completes");

    let mut sent_to = transport.sent_to.lock().expect("transport mutex").clone();
    sent_to.sort_unstable();
    assert_eq!(sent_to, vec!["ada@harbour.example", "grace@harbour.example"]);
    assert!(repository
        .list_messages(&MessageFilter::default())
        .expect("messages listed")
        .is_empty());
}

#[test]
fn failed_delivery_is_still_logged() {
    let (service, _) = email_service(Arc::new(FailingTransport));
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&service, health_grant_draft());
    seed_portal_user(&service, &client, "ada@harbour.example");

    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");
    let updated = service
        .update_application(&staff(), &application.id, submit())
        .expect("stage change commits despite mail failure");
    assert_eq!(updated.stage, ApplicationStage::Submitted);

    let messages = service
        .client_messages(&staff(), &client.id)
        .expect("messages listed");
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].delivered);
    assert_eq!(messages[0].sent_to, "ada@harbour.example");
    assert_eq!(messages[0].application_id.as_ref(), Some(&application.id));
}

#[test]
fn non_notifying_stages_send_nothing() {
    let transport = Arc::new(RecordingTransport::default());
    let (service, _) = email_service(transport.clone());
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&service, health_grant_draft());
    seed_portal_user(&service, &client, "ada@harbour.example");

    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");
    service
        .update_application(
            &staff(),
            &application.id,
            ApplicationPatch {
                stage: Some(ApplicationStage::InProgress),
                ..ApplicationPatch::default()
            },
        )
        .expect("in progress");

    assert!(transport.sent().is_empty());
    assert!(service
        .client_messages(&staff(), &client.id)
        .expect("messages listed")
        .is_empty());
}

#[test]
fn messages_survive_application_delete() {
    let (service, repository) = email_service(Arc::new(RecordingTransport::default()));
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&service, health_grant_draft());
    seed_portal_user(&service, &client, "ada@harbour.example");
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");
    service
        .update_application(&staff(), &application.id, submit())
        .expect("submitted");

    service
        .delete_application(&staff(), &application.id)
        .expect("deleted");

    let messages = repository
        .list_messages(&MessageFilter::default())
        .expect("messages listed");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].application_id, None);
}

#[test]
fn invitation_email_links_to_accept_page() {
    let transport = Arc::new(RecordingTransport::default());
    let (service, _) = email_service(transport.clone());
    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());

    let invite = service
        .create_invite(
            &staff(),
            InviteDraft {
                email: "Board@Harbour.example".to_string(),
                name: Some("Board Chair".to_string()),
                client_id: client.id.clone(),
                client_role: Default::default(),
            },
        )
        .expect("invite created");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "board@harbour.example");
    assert!(sent[0].subject.contains("Harbour Clinic"));
    assert!(sent[0].body.contains(&format!(
        "https://portal.example.org/accept-invite?token={}",
        invite.token
    )));
}

#[tokio::test]
async fn queued_notifier_hands_jobs_to_worker() {
    let repository = Arc::new(InMemoryGrantRepository::seeded());
    let transport = Arc::new(RecordingTransport::default());
    let clock = Arc::new(FixedClock::starting_at(start_time()));
    let email = Arc::new(EmailNotifier::new(
        repository.clone(),
        transport.clone(),
        clock.clone(),
        "https://portal.example.org",
    ));
    let (queued, rx) = QueuedNotifier::channel(8, email.clone());
    let service = GrantPipelineService::new(
        repository.clone(),
        Arc::new(queued),
        PipelineConfig::default(),
    )
    .with_clock(clock);

    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&service, health_grant_draft());
    seed_portal_user(&service, &client, "ada@harbour.example");
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");
    service
        .update_application(&staff(), &application.id, submit())
        .expect("submitted");

    // Dropping the service closes the channel so the worker drains and exits.
    drop(service);
    run_notification_worker(email, rx).await;

    assert_eq!(transport.sent().len(), 1);
    let messages = repository
        .list_messages(&MessageFilter::default())
        .expect("messages listed");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].delivered);
}

#[tokio::test]
async fn full_queue_dispatches_inline() {
    let repository = Arc::new(InMemoryGrantRepository::seeded());
    let transport = Arc::new(RecordingTransport::default());
    let clock = Arc::new(FixedClock::starting_at(start_time()));
    let email = Arc::new(EmailNotifier::new(
        repository.clone(),
        transport.clone(),
        clock.clone(),
        "https://portal.example.org",
    ));
    let (queued, rx) = QueuedNotifier::channel(1, email.clone());
    let service = GrantPipelineService::new(
        repository.clone(),
        Arc::new(queued),
        PipelineConfig::default(),
    )
    .with_clock(clock);

    let client = seed_client(&service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&service, health_grant_draft());
    seed_portal_user(&service, &client, "ada@harbour.example");
    let application = service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");
    for stage in [ApplicationStage::Submitted, ApplicationStage::Awarded] {
        service
            .update_application(
                &staff(),
                &application.id,
                ApplicationPatch {
                    stage: Some(stage),
                    ..ApplicationPatch::default()
                },
            )
            .expect("stage updated");
    }

    // The second job overflowed the queue and was mailed on the spot.
    assert_eq!(transport.sent().len(), 1);

    drop(service);
    run_notification_worker(email, rx).await;

    assert_eq!(transport.sent().len(), 2);
    let messages = repository
        .list_messages(&MessageFilter::default())
        .expect("messages listed");
    assert_eq!(messages.len(), 2);
}

#[test]
fn stopped_worker_falls_back_to_inline_delivery() {
    let harness = build_service();
    let (queued, rx) = QueuedNotifier::channel(4, harness.notifier.clone());
    drop(rx);
    let client = seed_client(&harness.service, "Harbour Clinic", health_charity_profile());
    let grant = seed_grant(&harness.service, health_grant_draft());
    let application = harness
        .service
        .create_application(&staff(), application_draft(&client, &grant))
        .expect("application created");

    queued
        .application_stage(&application, ApplicationStage::Submitted)
        .expect("delivered inline");
    assert_eq!(
        harness.notifier.stages(),
        vec![(application.id.clone(), ApplicationStage::Submitted)]
    );
}
