use super::common::*;

use serde_json::json;

use crate::workflows::grants::access::AccessDenied;
use crate::workflows::grants::billing::WebhookEnvelope;
use crate::workflows::grants::domain::{ClientDraft, ClientPatch, GrantDraft, GrantStatus};
use crate::workflows::grants::{GrantQuery, PipelineError};

fn envelope(value: serde_json::Value) -> WebhookEnvelope {
    serde_json::from_value(value).expect("valid envelope")
}

#[test]
fn browsing_requires_grant_database_access() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());
    seed_grant(service, health_grant_draft());
    let member = portal_actor(&seed_portal_user(service, &client, "ada@harbour.example"));

    let err = service
        .browse_grants(&member, &client.id, &GrantQuery::default())
        .expect_err("no subscription yet");
    assert!(matches!(
        err,
        PipelineError::Forbidden(AccessDenied::SubscriptionRequired)
    ));

    service
        .update_client(
            &staff(),
            &client.id,
            ClientPatch {
                grant_db_access: Some(true),
                ..ClientPatch::default()
            },
        )
        .expect("override applied");

    let grants = service
        .browse_grants(&member, &client.id, &GrantQuery::default())
        .expect("browse allowed");
    assert_eq!(grants.len(), 1);

    let view = service
        .portal_subscription(&member, &client.id)
        .expect("subscription view");
    assert!(view.has_access);
    assert!(view.is_manual_override);
}

#[test]
fn portal_only_shows_open_grants() {
    let harness = build_service();
    let service = &harness.service;
    let client = service
        .create_client(
            &staff(),
            ClientDraft {
                name: "Harbour Clinic".to_string(),
                grant_db_access: true,
                ..ClientDraft::default()
            },
        )
        .expect("client");
    let open = seed_grant(service, health_grant_draft());
    let closed = seed_grant(
        service,
        GrantDraft {
            name: "Retired Program".to_string(),
            status: GrantStatus::Closed,
            ..GrantDraft::default()
        },
    );
    let member = portal_actor(&seed_portal_user(service, &client, "ada@harbour.example"));

    let listed = service
        .browse_grants(
            &member,
            &client.id,
            &GrantQuery {
                search: Some("health".to_string()),
                ..GrantQuery::default()
            },
        )
        .expect("browse allowed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, open.id);

    assert!(service.portal_grant(&member, &client.id, &open.id).is_ok());
    assert!(matches!(
        service.portal_grant(&member, &client.id, &closed.id),
        Err(PipelineError::NotFound { .. })
    ));
}

#[test]
fn non_members_cannot_browse_another_organization() {
    let harness = build_service();
    let service = &harness.service;
    let mine = seed_client(service, "Harbour Clinic", health_charity_profile());
    let theirs = seed_client(service, "Northern Arts", education_charity_profile());
    let member = portal_actor(&seed_portal_user(service, &mine, "ada@harbour.example"));

    assert!(matches!(
        service.portal_subscription(&member, &theirs.id),
        Err(PipelineError::Forbidden(AccessDenied::NotMember { .. }))
    ));
    assert!(matches!(
        service.get_client(&member, &theirs.id),
        Err(PipelineError::Forbidden(_))
    ));
    assert!(service.get_client(&member, &mine.id).is_ok());
}

#[test]
fn checkout_then_cancellation_toggles_access() {
    let harness = build_service();
    let service = &harness.service;
    let client = seed_client(service, "Harbour Clinic", health_charity_profile());

    let outcome = service
        .handle_billing_webhook(&envelope(json!({
            "type": "checkout.session.completed",
            "data": {"object": {
                "subscription": "sub_123",
                "metadata": {"client_id": client.id.as_str()}
            }}
        })))
        .expect("checkout handled");
    assert!(outcome.applied);
    assert_eq!(outcome.client_id.as_ref(), Some(&client.id));

    let stored = service.get_client(&staff(), &client.id).expect("client");
    assert!(stored.grant_db_access);
    assert_eq!(stored.subscription_id.as_deref(), Some("sub_123"));

    service
        .handle_billing_webhook(&envelope(json!({
            "type": "customer.subscription.updated",
            "data": {"object": {"id": "sub_123", "status": "past_due"}}
        })))
        .expect("past due handled");
    let stored = service.get_client(&staff(), &client.id).expect("client");
    assert!(stored.grant_db_access, "past_due keeps access");
    assert_eq!(stored.subscription_status.as_deref(), Some("past_due"));

    service
        .handle_billing_webhook(&envelope(json!({
            "type": "customer.subscription.deleted",
            "data": {"object": {"id": "sub_123"}}
        })))
        .expect("deletion handled");
    let stored = service.get_client(&staff(), &client.id).expect("client");
    assert!(!stored.grant_db_access);
    assert_eq!(stored.subscription_status.as_deref(), Some("canceled"));
}

#[test]
fn unknown_subscriptions_are_acknowledged() {
    let harness = build_service();
    let outcome = harness
        .service
        .handle_billing_webhook(&envelope(json!({
            "type": "invoice.paid",
            "data": {"object": {"subscription": "sub_unknown"}}
        })))
        .expect("acknowledged");
    assert!(!outcome.applied);
    assert_eq!(outcome.client_id, None);
    assert_eq!(outcome.event_type, "invoice.paid");
}
