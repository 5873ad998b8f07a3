use serde::Deserialize;
use tracing::info;

use super::super::access::{Actor, Operation, Ownership};
use super::super::domain::{
    Client, ClientDraft, ClientId, ClientPatch, ClientRole, DeadlineType, Grant, GrantDraft,
    GrantId, GrantPatch, GrantStatus, Membership, Message, Tag, TagCategory, TagId, User,
    UserDraft, UserId,
};
use super::super::lookups::{slugify, LookupCatalog};
use super::super::notify::Notifier;
use super::super::repository::{GrantRepository, MessageFilter};
use super::{GrantPipelineService, PipelineError};

/// Catalog filters for grant listings. Tag filters match grants that require the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GrantQuery {
    pub status: Option<GrantStatus>,
    pub deadline_type: Option<DeadlineType>,
    pub search: Option<String>,
    pub cause: Option<TagId>,
    pub applicant_type: Option<TagId>,
    pub province: Option<TagId>,
}

impl GrantQuery {
    pub(crate) fn matches(&self, grant: &Grant) -> bool {
        if self
            .deadline_type
            .is_some_and(|deadline_type| grant.deadline_type != deadline_type)
        {
            return false;
        }

        let tag_filters = [
            (TagCategory::Cause, &self.cause),
            (TagCategory::ApplicantType, &self.applicant_type),
            (TagCategory::Province, &self.province),
        ];
        for (category, wanted) in tag_filters {
            if let Some(tag) = wanted {
                if !grant.eligibility.tags(category).contains(tag) {
                    return false;
                }
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [
                    Some(grant.name.as_str()),
                    grant.description.as_deref(),
                    grant.funder.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientQuery {
    pub search: Option<String>,
}

pub(super) fn require_name(name: &str, entity: &str) -> Result<String, PipelineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::validation(format!("{entity} name is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_amounts(min: Option<u64>, max: Option<u64>) -> Result<(), PipelineError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(PipelineError::validation(format!(
            "amount_min ({min}) exceeds amount_max ({max})"
        ))),
        _ => Ok(()),
    }
}

fn normalize_currency(raw: &str) -> Result<String, PipelineError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(PipelineError::validation(format!(
            "currency must be a three-letter code, got '{raw}'"
        )))
    }
}

impl<R, N> GrantPipelineService<R, N>
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn lookups(&self) -> Result<LookupCatalog, PipelineError> {
        Ok(self.repository.lookups()?)
    }

    pub fn add_lookup_tag(
        &self,
        actor: &Actor,
        category: TagCategory,
        name: &str,
    ) -> Result<Tag, PipelineError> {
        self.check(actor, Operation::ManageGrants, Ownership::NotApplicable)?;
        let name = require_name(name, category.label())?;
        let tag = Tag {
            id: TagId(slugify(&name)),
            name,
        };
        self.repository.save_tag(category, tag.clone())?;
        Ok(tag)
    }

    pub fn create_grant(&self, actor: &Actor, draft: GrantDraft) -> Result<Grant, PipelineError> {
        self.check(actor, Operation::ManageGrants, Ownership::NotApplicable)?;
        let name = require_name(&draft.name, "grant")?;
        validate_amounts(draft.amount_min, draft.amount_max)?;
        let currency = normalize_currency(&draft.currency)?;

        let now = self.clock.now();
        let grant = Grant {
            id: GrantId::generate(),
            name,
            funder: draft.funder,
            description: draft.description,
            source_url: draft.source_url,
            notes: draft.notes,
            status: draft.status,
            deadline_type: draft.deadline_type,
            deadline_at: draft.deadline_at,
            next_deadline_at: draft.next_deadline_at,
            last_verified_at: None,
            amount_min: draft.amount_min,
            amount_max: draft.amount_max,
            currency,
            eligibility: draft.eligibility,
            created_by: Some(actor.user_id.clone()),
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_grant(grant)?;
        info!(grant_id = %stored.id, "grant cataloged");
        Ok(stored)
    }

    pub fn update_grant(
        &self,
        actor: &Actor,
        grant_id: &GrantId,
        patch: GrantPatch,
    ) -> Result<Grant, PipelineError> {
        self.check(actor, Operation::ManageGrants, Ownership::NotApplicable)?;
        let mut grant = self.require_grant(grant_id)?;

        if let Some(name) = patch.name {
            grant.name = require_name(&name, "grant")?;
        }
        if let Some(currency) = patch.currency {
            grant.currency = normalize_currency(&currency)?;
        }
        if patch.funder.is_some() {
            grant.funder = patch.funder;
        }
        if patch.description.is_some() {
            grant.description = patch.description;
        }
        if patch.source_url.is_some() {
            grant.source_url = patch.source_url;
        }
        if patch.notes.is_some() {
            grant.notes = patch.notes;
        }
        if let Some(status) = patch.status {
            grant.status = status;
        }
        if let Some(deadline_type) = patch.deadline_type {
            grant.deadline_type = deadline_type;
        }
        if patch.deadline_at.is_some() {
            grant.deadline_at = patch.deadline_at;
        }
        if patch.next_deadline_at.is_some() {
            grant.next_deadline_at = patch.next_deadline_at;
        }
        if patch.last_verified_at.is_some() {
            grant.last_verified_at = patch.last_verified_at;
        }
        if patch.amount_min.is_some() {
            grant.amount_min = patch.amount_min;
        }
        if patch.amount_max.is_some() {
            grant.amount_max = patch.amount_max;
        }
        if let Some(eligibility) = patch.eligibility {
            grant.eligibility = eligibility;
        }
        validate_amounts(grant.amount_min, grant.amount_max)?;

        grant.updated_at = self.clock.now();
        self.repository.update_grant(grant.clone())?;
        Ok(grant)
    }

    /// Record that staff re-checked a grant with its funder.
    pub fn verify_grant(
        &self,
        actor: &Actor,
        grant_id: &GrantId,
        status: GrantStatus,
    ) -> Result<Grant, PipelineError> {
        self.check(actor, Operation::ManageGrants, Ownership::NotApplicable)?;
        let mut grant = self.require_grant(grant_id)?;
        let now = self.clock.now();
        grant.status = status;
        grant.last_verified_at = Some(now);
        grant.updated_at = now;
        self.repository.update_grant(grant.clone())?;
        info!(grant_id = %grant.id, status = status.label(), "grant verified");
        Ok(grant)
    }

    pub fn get_grant(&self, actor: &Actor, grant_id: &GrantId) -> Result<Grant, PipelineError> {
        self.check(actor, Operation::ViewCatalog, Ownership::NotApplicable)?;
        self.require_grant(grant_id)
    }

    pub fn list_grants(
        &self,
        actor: &Actor,
        query: &GrantQuery,
    ) -> Result<Vec<Grant>, PipelineError> {
        self.check(actor, Operation::ViewCatalog, Ownership::NotApplicable)?;
        Ok(self
            .repository
            .list_grants(query.status)?
            .into_iter()
            .filter(|grant| query.matches(grant))
            .collect())
    }

    /// Removes the grant with its matches and applications.
    pub fn delete_grant(&self, actor: &Actor, grant_id: &GrantId) -> Result<(), PipelineError> {
        self.check(actor, Operation::ManageGrants, Ownership::NotApplicable)?;
        self.repository.delete_grant(grant_id)?;
        info!(grant_id = %grant_id, "grant deleted");
        Ok(())
    }

    pub fn create_client(
        &self,
        actor: &Actor,
        draft: ClientDraft,
    ) -> Result<Client, PipelineError> {
        self.check(actor, Operation::ManageClients, Ownership::NotApplicable)?;
        let name = require_name(&draft.name, "client")?;
        let now = self.clock.now();
        let client = Client {
            id: ClientId::generate(),
            name,
            entity_type: draft.entity_type,
            notes: draft.notes,
            client_type: draft.client_type,
            eligibility: draft.eligibility,
            subscription_id: None,
            subscription_status: None,
            grant_db_access: draft.grant_db_access,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_client(client)?;
        info!(client_id = %stored.id, "client created");
        Ok(stored)
    }

    /// Profile and record updates. `grant_db_access` here is the manual staff override;
    /// billing webhooks never go through this path.
    pub fn update_client(
        &self,
        actor: &Actor,
        client_id: &ClientId,
        patch: ClientPatch,
    ) -> Result<Client, PipelineError> {
        self.check(actor, Operation::ManageClients, Ownership::NotApplicable)?;
        let mut client = self.require_client(client_id)?;

        if let Some(name) = patch.name {
            client.name = require_name(&name, "client")?;
        }
        if patch.entity_type.is_some() {
            client.entity_type = patch.entity_type;
        }
        if patch.notes.is_some() {
            client.notes = patch.notes;
        }
        if let Some(client_type) = patch.client_type {
            client.client_type = client_type;
        }
        if let Some(eligibility) = patch.eligibility {
            client.eligibility = eligibility;
        }
        if let Some(access) = patch.grant_db_access {
            info!(client_id = %client.id, access, "grant database access overridden");
            client.grant_db_access = access;
        }

        client.updated_at = self.clock.now();
        self.repository.update_client(client.clone())?;
        Ok(client)
    }

    pub fn get_client(
        &self,
        actor: &Actor,
        client_id: &ClientId,
    ) -> Result<Client, PipelineError> {
        let ownership = self.ownership(actor, client_id)?;
        self.check(actor, Operation::ViewClient, ownership)?;
        self.require_client(client_id)
    }

    pub fn list_clients(
        &self,
        actor: &Actor,
        query: &ClientQuery,
    ) -> Result<Vec<Client>, PipelineError> {
        self.check(actor, Operation::ViewCatalog, Ownership::NotApplicable)?;
        let term = query
            .search
            .as_deref()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty());

        Ok(self
            .repository
            .list_clients()?
            .into_iter()
            .filter(|client| {
                term.as_ref()
                    .map_or(true, |term| client.name.to_lowercase().contains(term))
            })
            .collect())
    }

    /// Removes the client with its matches, applications, messages, members and invites.
    pub fn delete_client(
        &self,
        actor: &Actor,
        client_id: &ClientId,
    ) -> Result<(), PipelineError> {
        self.check(actor, Operation::ManageClients, Ownership::NotApplicable)?;
        self.repository.delete_client(client_id)?;
        info!(client_id = %client_id, "client deleted");
        Ok(())
    }

    pub fn client_messages(
        &self,
        actor: &Actor,
        client_id: &ClientId,
    ) -> Result<Vec<Message>, PipelineError> {
        self.check(actor, Operation::ViewCatalog, Ownership::NotApplicable)?;
        self.require_client(client_id)?;
        Ok(self.repository.list_messages(&MessageFilter {
            client_id: Some(client_id.clone()),
            application_id: None,
        })?)
    }

    pub fn register_user(&self, actor: &Actor, draft: UserDraft) -> Result<User, PipelineError> {
        self.check(
            actor,
            Operation::RegisterUser { target: draft.role },
            Ownership::NotApplicable,
        )?;
        let email = draft.email.trim().to_string();
        if !email.contains('@') {
            return Err(PipelineError::validation(format!(
                "'{email}' is not an email address"
            )));
        }

        let user = User {
            id: UserId::generate(),
            email,
            name: draft.name,
            role: draft.role,
            is_active: true,
            created_at: self.clock.now(),
        };
        let stored = self.repository.insert_user(user)?;
        info!(user_id = %stored.id, role = stored.role.label(), "user registered");
        Ok(stored)
    }

    pub fn add_client_member(
        &self,
        actor: &Actor,
        client_id: &ClientId,
        user_id: &UserId,
        client_role: ClientRole,
    ) -> Result<Membership, PipelineError> {
        self.check(actor, Operation::ManageClients, Ownership::NotApplicable)?;
        let membership = Membership {
            client_id: client_id.clone(),
            user_id: user_id.clone(),
            client_role,
        };
        self.repository.add_membership(membership.clone())?;
        Ok(membership)
    }

    pub fn client_members(
        &self,
        actor: &Actor,
        client_id: &ClientId,
    ) -> Result<Vec<User>, PipelineError> {
        self.check(actor, Operation::ViewCatalog, Ownership::NotApplicable)?;
        self.require_client(client_id)?;
        Ok(self.repository.client_members(client_id)?)
    }

    pub(crate) fn require_grant(&self, grant_id: &GrantId) -> Result<Grant, PipelineError> {
        self.repository
            .fetch_grant(grant_id)?
            .ok_or_else(|| PipelineError::not_found("grant", grant_id))
    }

    pub(crate) fn require_client(&self, client_id: &ClientId) -> Result<Client, PipelineError> {
        self.repository
            .fetch_client(client_id)?
            .ok_or_else(|| PipelineError::not_found("client", client_id))
    }
}
