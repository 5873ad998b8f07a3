use tracing::{info, warn};

use super::super::access::{AccessDenied, Actor, Operation, Ownership, Role};
use super::super::billing::{
    BillingEvent, BillingOutcome, BillingTarget, SubscriptionView, WebhookEnvelope,
};
use super::super::domain::{
    Client, ClientId, ClientType, EligibilityProfile, Grant, GrantId, GrantStatus, Invite,
    InviteDraft, InviteId, Signup, SignupDraft, User, UserId,
};
use super::super::invites::{self, InviteInfo};
use super::super::notify::Notifier;
use super::super::repository::{duplicate_email_message, GrantRepository};
use super::catalog::{require_name, GrantQuery};
use super::{GrantPipelineService, PipelineError};

impl<R, N> GrantPipelineService<R, N>
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    /// Organizations the actor belongs to.
    pub fn portal_clients(&self, actor: &Actor) -> Result<Vec<Client>, PipelineError> {
        let mut clients = Vec::new();
        for client_id in self.repository.memberships(&actor.user_id)? {
            if let Some(client) = self.repository.fetch_client(&client_id)? {
                clients.push(client);
            }
        }
        Ok(clients)
    }

    pub fn portal_subscription(
        &self,
        actor: &Actor,
        client_id: &ClientId,
    ) -> Result<SubscriptionView, PipelineError> {
        let ownership = self.ownership(actor, client_id)?;
        self.check(actor, Operation::ViewClient, ownership)?;
        let client = self.require_client(client_id)?;
        Ok(SubscriptionView::of(&client))
    }

    /// Open grants visible to a portal user while their organization has
    /// grant-database access.
    pub fn browse_grants(
        &self,
        actor: &Actor,
        client_id: &ClientId,
        query: &GrantQuery,
    ) -> Result<Vec<Grant>, PipelineError> {
        self.require_database_access(actor, client_id)?;
        Ok(self
            .repository
            .list_grants(Some(GrantStatus::Open))?
            .into_iter()
            .filter(|grant| query.matches(grant))
            .collect())
    }

    pub fn portal_grant(
        &self,
        actor: &Actor,
        client_id: &ClientId,
        grant_id: &GrantId,
    ) -> Result<Grant, PipelineError> {
        self.require_database_access(actor, client_id)?;
        self.repository
            .fetch_grant(grant_id)?
            .filter(|grant| grant.status == GrantStatus::Open)
            .ok_or_else(|| PipelineError::not_found("grant", grant_id))
    }

    fn require_database_access(
        &self,
        actor: &Actor,
        client_id: &ClientId,
    ) -> Result<Client, PipelineError> {
        let ownership = self.ownership(actor, client_id)?;
        self.check(actor, Operation::BrowseGrants, ownership)?;
        let client = self.require_client(client_id)?;
        if !actor.role.is_staff() && !client.grant_db_access {
            return Err(self.forbidden(actor, AccessDenied::SubscriptionRequired));
        }
        Ok(client)
    }

    /// Invite someone to a client's portal. A pending invite for the same e-mail
    /// and client is refreshed rather than duplicated.
    pub fn create_invite(
        &self,
        actor: &Actor,
        draft: InviteDraft,
    ) -> Result<Invite, PipelineError> {
        self.check(actor, Operation::ManageInvites, Ownership::NotApplicable)?;
        let email = draft.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(PipelineError::validation(format!(
                "'{email}' is not an email address"
            )));
        }
        let client = self.require_client(&draft.client_id)?;
        if self.repository.fetch_user_by_email(&email)?.is_some() {
            return Err(PipelineError::Conflict(duplicate_email_message(&email)));
        }

        let now = self.clock.now();
        let pending = self
            .repository
            .list_invites(&client.id)?
            .into_iter()
            .find(|invite| invite.email.eq_ignore_ascii_case(&email));

        let invite = match pending {
            Some(mut invite) => {
                invites::refresh(&mut invite, now, self.invite_ttl_days);
                invite.client_role = draft.client_role;
                if draft.name.is_some() {
                    invite.name = draft.name;
                }
                self.repository.update_invite(invite.clone())?;
                info!(invite_id = %invite.id, client_id = %client.id, "invite refreshed");
                invite
            }
            None => {
                let invite = self.repository.insert_invite(Invite {
                    id: InviteId::generate(),
                    email,
                    name: draft.name,
                    client_id: client.id.clone(),
                    client_role: draft.client_role,
                    token: invites::generate_token(),
                    expires_at: invites::expiry_from(now, self.invite_ttl_days),
                    created_by: Some(actor.user_id.clone()),
                    created_at: now,
                })?;
                info!(invite_id = %invite.id, client_id = %client.id, "invite created");
                invite
            }
        };

        self.send_invitation(&invite, &client);
        Ok(invite)
    }

    pub fn list_invites(
        &self,
        actor: &Actor,
        client_id: &ClientId,
    ) -> Result<Vec<Invite>, PipelineError> {
        self.check(actor, Operation::ManageInvites, Ownership::NotApplicable)?;
        self.require_client(client_id)?;
        Ok(self.repository.list_invites(client_id)?)
    }

    /// Issue a new token and expiry and send the invitation again.
    pub fn resend_invite(
        &self,
        actor: &Actor,
        invite_id: &InviteId,
    ) -> Result<Invite, PipelineError> {
        self.check(actor, Operation::ManageInvites, Ownership::NotApplicable)?;
        let mut invite = self.require_invite(invite_id)?;
        let client = self.require_client(&invite.client_id)?;

        invites::refresh(&mut invite, self.clock.now(), self.invite_ttl_days);
        self.repository.update_invite(invite.clone())?;
        info!(invite_id = %invite.id, "invite resent");

        self.send_invitation(&invite, &client);
        Ok(invite)
    }

    pub fn cancel_invite(&self, actor: &Actor, invite_id: &InviteId) -> Result<(), PipelineError> {
        self.check(actor, Operation::ManageInvites, Ownership::NotApplicable)?;
        self.repository.delete_invite(invite_id)?;
        info!(invite_id = %invite_id, "invite cancelled");
        Ok(())
    }

    /// Public lookup used by the accept page. Unknown tokens report an invalid invite.
    pub fn verify_invite(&self, token: &str) -> Result<InviteInfo, PipelineError> {
        let Some(invite) = self.repository.fetch_invite_by_token(token)? else {
            return Ok(InviteInfo::invalid());
        };
        let client = self.repository.fetch_client(&invite.client_id)?;
        Ok(InviteInfo::describe(&invite, client.as_ref(), self.clock.now()))
    }

    /// Consume an invite, creating a client-role user linked to the inviting
    /// organization.
    pub fn accept_invite(&self, token: &str, name: Option<String>) -> Result<User, PipelineError> {
        let invite = self
            .repository
            .fetch_invite_by_token(token)?
            .ok_or_else(|| PipelineError::not_found("invite", "token"))?;
        let now = self.clock.now();
        if invite.is_expired(now) {
            return Err(PipelineError::validation("invite has expired"));
        }

        let user = User {
            id: UserId::generate(),
            email: invite.email.clone(),
            name: name.or_else(|| invite.name.clone()),
            role: Role::Client,
            is_active: true,
            created_at: now,
        };
        let stored = self.repository.accept_invite(&invite, user)?;
        info!(
            user_id = %stored.id,
            client_id = %invite.client_id,
            "invite accepted"
        );
        Ok(stored)
    }

    /// Public self-service sign-up. The organization starts without grant-database
    /// access until a subscription is paid for.
    pub fn signup(&self, draft: SignupDraft) -> Result<Signup, PipelineError> {
        let email = draft.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(PipelineError::validation(format!(
                "'{email}' is not an email address"
            )));
        }
        let organization = require_name(&draft.organization_name, "organization")?;

        let now = self.clock.now();
        let client = Client {
            id: ClientId::generate(),
            name: organization,
            entity_type: draft.entity_type,
            notes: None,
            client_type: ClientType::SelfService,
            eligibility: EligibilityProfile::default(),
            subscription_id: None,
            subscription_status: None,
            grant_db_access: false,
            created_at: now,
            updated_at: now,
        };
        let user = User {
            id: UserId::generate(),
            email,
            name: draft.name,
            role: Role::Client,
            is_active: true,
            created_at: now,
        };

        self.repository
            .insert_signup(client.clone(), user.clone())?;
        info!(user_id = %user.id, client_id = %client.id, "self-service signup");
        Ok(Signup { user, client })
    }

    /// Mirror a payment-provider event onto the client it concerns. Events for
    /// unknown clients or subscriptions are acknowledged without change.
    pub fn handle_billing_webhook(
        &self,
        envelope: &WebhookEnvelope,
    ) -> Result<BillingOutcome, PipelineError> {
        let event = BillingEvent::from_envelope(envelope);
        let client = match event.target() {
            BillingTarget::Client(client_id) => self.repository.fetch_client(&client_id)?,
            BillingTarget::Subscription(subscription_id) => self
                .repository
                .fetch_client_by_subscription(&subscription_id)?,
            BillingTarget::Unresolved => None,
        };

        let Some(mut client) = client else {
            info!(event_type = event.label(), "billing event ignored");
            return Ok(BillingOutcome {
                event_type: event.label().to_string(),
                client_id: None,
                applied: false,
            });
        };

        event.apply(&mut client);
        client.updated_at = self.clock.now();
        self.repository.update_client(client.clone())?;
        info!(
            event_type = event.label(),
            client_id = %client.id,
            grant_db_access = client.grant_db_access,
            "billing event applied"
        );

        Ok(BillingOutcome {
            event_type: event.label().to_string(),
            client_id: Some(client.id),
            applied: true,
        })
    }

    fn require_invite(&self, invite_id: &InviteId) -> Result<Invite, PipelineError> {
        self.repository
            .fetch_invite(invite_id)?
            .ok_or_else(|| PipelineError::not_found("invite", invite_id))
    }

    fn send_invitation(&self, invite: &Invite, client: &Client) {
        if let Err(err) = self.notifier.invitation(invite, client) {
            warn!(invite_id = %invite.id, error = %err, "invitation email failed");
        }
    }
}
