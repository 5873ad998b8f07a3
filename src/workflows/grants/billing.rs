use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{Client, ClientId};

/// Raw webhook body as posted by the payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub object: Value,
}

/// Subscription lifecycle events that move `Client::grant_db_access`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    CheckoutCompleted {
        client_id: Option<ClientId>,
        subscription_id: Option<String>,
    },
    SubscriptionUpdated {
        subscription_id: Option<String>,
        status: Option<String>,
    },
    SubscriptionDeleted {
        subscription_id: Option<String>,
    },
    InvoicePaymentFailed {
        subscription_id: Option<String>,
    },
    InvoicePaid {
        subscription_id: Option<String>,
    },
    Ignored {
        event_type: String,
    },
}

/// Which client a billing event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingTarget {
    Client(ClientId),
    Subscription(String),
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChange {
    Grant,
    Revoke,
    Keep,
}

/// Portal access implied by a provider subscription status. `past_due` keeps the
/// current value while the provider retries payment.
pub fn access_for_status(status: &str) -> AccessChange {
    match status {
        "active" | "trialing" => AccessChange::Grant,
        "canceled" | "unpaid" | "incomplete_expired" => AccessChange::Revoke,
        _ => AccessChange::Keep,
    }
}

fn text(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl BillingEvent {
    pub fn from_envelope(envelope: &WebhookEnvelope) -> Self {
        let object = &envelope.data.object;
        match envelope.event_type.as_str() {
            "checkout.session.completed" => BillingEvent::CheckoutCompleted {
                client_id: object
                    .get("metadata")
                    .and_then(|metadata| text(metadata, "client_id"))
                    .map(ClientId),
                subscription_id: text(object, "subscription"),
            },
            "customer.subscription.updated" => BillingEvent::SubscriptionUpdated {
                subscription_id: text(object, "id"),
                status: text(object, "status"),
            },
            "customer.subscription.deleted" => BillingEvent::SubscriptionDeleted {
                subscription_id: text(object, "id"),
            },
            "invoice.payment_failed" => BillingEvent::InvoicePaymentFailed {
                subscription_id: text(object, "subscription"),
            },
            "invoice.paid" => BillingEvent::InvoicePaid {
                subscription_id: text(object, "subscription"),
            },
            other => BillingEvent::Ignored {
                event_type: other.to_string(),
            },
        }
    }

    pub fn target(&self) -> BillingTarget {
        let subscription = match self {
            BillingEvent::CheckoutCompleted {
                client_id: Some(client_id),
                subscription_id: Some(_),
            } => return BillingTarget::Client(client_id.clone()),
            BillingEvent::CheckoutCompleted { .. } | BillingEvent::Ignored { .. } => None,
            BillingEvent::SubscriptionUpdated {
                subscription_id, ..
            }
            | BillingEvent::SubscriptionDeleted { subscription_id }
            | BillingEvent::InvoicePaymentFailed { subscription_id }
            | BillingEvent::InvoicePaid { subscription_id } => subscription_id.clone(),
        };

        subscription.map_or(BillingTarget::Unresolved, BillingTarget::Subscription)
    }

    /// Mirror the event onto the client record.
    pub fn apply(&self, client: &mut Client) {
        match self {
            BillingEvent::CheckoutCompleted {
                subscription_id, ..
            } => {
                client.subscription_id = subscription_id.clone();
                client.subscription_status = Some("active".to_string());
                client.grant_db_access = true;
            }
            BillingEvent::SubscriptionUpdated {
                status: Some(status),
                ..
            } => {
                match access_for_status(status) {
                    AccessChange::Grant => client.grant_db_access = true,
                    AccessChange::Revoke => client.grant_db_access = false,
                    AccessChange::Keep => {}
                }
                client.subscription_status = Some(status.clone());
            }
            BillingEvent::SubscriptionUpdated { status: None, .. } => {}
            BillingEvent::SubscriptionDeleted { .. } => {
                client.subscription_status = Some("canceled".to_string());
                client.grant_db_access = false;
            }
            BillingEvent::InvoicePaymentFailed { .. } => {
                client.subscription_status = Some("past_due".to_string());
            }
            BillingEvent::InvoicePaid { .. } => {
                client.subscription_status = Some("active".to_string());
                client.grant_db_access = true;
            }
            BillingEvent::Ignored { .. } => {}
        }
    }

    pub fn label(&self) -> &str {
        match self {
            BillingEvent::CheckoutCompleted { .. } => "checkout.session.completed",
            BillingEvent::SubscriptionUpdated { .. } => "customer.subscription.updated",
            BillingEvent::SubscriptionDeleted { .. } => "customer.subscription.deleted",
            BillingEvent::InvoicePaymentFailed { .. } => "invoice.payment_failed",
            BillingEvent::InvoicePaid { .. } => "invoice.paid",
            BillingEvent::Ignored { event_type } => event_type,
        }
    }
}

/// Result reported back to the webhook caller. Unknown clients are acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingOutcome {
    pub event_type: String,
    pub client_id: Option<ClientId>,
    pub applied: bool,
}

/// Portal-facing view of a client's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    pub has_access: bool,
    pub status: Option<String>,
    pub is_manual_override: bool,
}

impl SubscriptionView {
    pub fn of(client: &Client) -> Self {
        let paid = matches!(
            client.subscription_status.as_deref(),
            Some("active") | Some("trialing")
        );
        Self {
            has_access: client.grant_db_access,
            status: client.subscription_status.clone(),
            is_manual_override: client.grant_db_access && !paid,
        }
    }
}

/// Configured subscription price identifiers, shown on the portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCatalog {
    pub monthly: Option<String>,
    pub annual: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    use super::super::domain::{ClientType, EligibilityProfile};

    fn client(access: bool, status: Option<&str>) -> Client {
        let now = Utc::now();
        Client {
            id: ClientId::from("client-1"),
            name: "Harbour Food Bank".into(),
            entity_type: None,
            notes: None,
            client_type: ClientType::SelfService,
            eligibility: EligibilityProfile::default(),
            subscription_id: Some("sub_1".into()),
            subscription_status: status.map(str::to_string),
            grant_db_access: access,
            created_at: now,
            updated_at: now,
        }
    }

    fn envelope(value: Value) -> WebhookEnvelope {
        serde_json::from_value(value).expect("valid envelope")
    }

    #[test]
    fn checkout_targets_client_from_metadata() {
        let event = BillingEvent::from_envelope(&envelope(json!({
            "type": "checkout.session.completed",
            "data": {"object": {"subscription": "sub_9", "metadata": {"client_id": "client-1"}}}
        })));

        assert_eq!(event.target(), BillingTarget::Client(ClientId::from("client-1")));

        let mut record = client(false, None);
        event.apply(&mut record);
        assert!(record.grant_db_access);
        assert_eq!(record.subscription_id.as_deref(), Some("sub_9"));
        assert_eq!(record.subscription_status.as_deref(), Some("active"));
    }

    #[test]
    fn checkout_without_subscription_is_unresolved() {
        let event = BillingEvent::from_envelope(&envelope(json!({
            "type": "checkout.session.completed",
            "data": {"object": {"metadata": {"client_id": "client-1"}}}
        })));
        assert_eq!(event.target(), BillingTarget::Unresolved);
    }

    #[test]
    fn past_due_update_keeps_access() {
        for access in [true, false] {
            let mut record = client(access, Some("active"));
            BillingEvent::SubscriptionUpdated {
                subscription_id: Some("sub_1".into()),
                status: Some("past_due".into()),
            }
            .apply(&mut record);
            assert_eq!(record.grant_db_access, access);
            assert_eq!(record.subscription_status.as_deref(), Some("past_due"));
        }
    }

    #[test]
    fn terminal_statuses_revoke_access() {
        for status in ["canceled", "unpaid", "incomplete_expired"] {
            let mut record = client(true, Some("active"));
            BillingEvent::SubscriptionUpdated {
                subscription_id: Some("sub_1".into()),
                status: Some(status.into()),
            }
            .apply(&mut record);
            assert!(!record.grant_db_access, "{status} should revoke access");
        }
    }

    #[test]
    fn update_without_status_keeps_the_current_one() {
        let event = BillingEvent::from_envelope(&envelope(json!({
            "type": "customer.subscription.updated",
            "data": {"object": {"id": "sub_1"}}
        })));
        let mut record = client(true, Some("active"));
        event.apply(&mut record);
        assert_eq!(record.subscription_status.as_deref(), Some("active"));
        assert!(record.grant_db_access);
    }

    #[test]
    fn invoice_events_toggle_status() {
        let mut record = client(true, Some("active"));
        BillingEvent::InvoicePaymentFailed {
            subscription_id: Some("sub_1".into()),
        }
        .apply(&mut record);
        assert!(record.grant_db_access);
        assert_eq!(record.subscription_status.as_deref(), Some("past_due"));

        BillingEvent::InvoicePaid {
            subscription_id: Some("sub_1".into()),
        }
        .apply(&mut record);
        assert!(record.grant_db_access);
        assert_eq!(record.subscription_status.as_deref(), Some("active"));
    }

    #[test]
    fn unknown_event_types_are_ignored() {
        let event = BillingEvent::from_envelope(&envelope(json!({"type": "customer.created"})));
        assert_eq!(event.target(), BillingTarget::Unresolved);
        assert_eq!(event.label(), "customer.created");
    }

    #[test]
    fn manual_override_is_reported() {
        let view = SubscriptionView::of(&client(true, None));
        assert!(view.is_manual_override);
        let view = SubscriptionView::of(&client(true, Some("trialing")));
        assert!(!view.is_manual_override);
    }
}
