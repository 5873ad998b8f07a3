use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Application, ApplicationEvent, ApplicationId, ApplicationStage, Client, ClientId, ClientRole,
    Grant, GrantId, GrantMatch, GrantStatus, Invite, InviteId, ManagedServiceRequest, MatchId,
    MatchStatus, Membership, Message, ServiceRequestId, ServiceRequestStatus, Tag, TagCategory,
    User, UserId,
};
use super::lookups::LookupCatalog;
use super::repository::{
    deadline_order, duplicate_email_message, duplicate_match_message, ApplicationFilter,
    GrantRepository, MatchFilter, MessageFilter, RepositoryError,
};

#[derive(Default)]
struct Tables {
    lookups: LookupCatalog,
    users: HashMap<UserId, User>,
    memberships: Vec<Membership>,
    grants: HashMap<GrantId, Grant>,
    clients: HashMap<ClientId, Client>,
    matches: HashMap<MatchId, GrantMatch>,
    applications: HashMap<ApplicationId, Application>,
    // Insertion order breaks timestamp ties when listing newest first.
    events: Vec<ApplicationEvent>,
    messages: Vec<Message>,
    invites: HashMap<InviteId, Invite>,
    service_requests: Vec<ManagedServiceRequest>,
}

impl Tables {
    fn remove_applications<F>(&mut self, doomed: F)
    where
        F: Fn(&Application) -> bool,
    {
        let removed: Vec<ApplicationId> = self
            .applications
            .values()
            .filter(|application| doomed(application))
            .map(|application| application.id.clone())
            .collect();

        for id in &removed {
            self.applications.remove(id);
        }
        self.events
            .retain(|event| !removed.contains(&event.application_id));
        for message in &mut self.messages {
            if message
                .application_id
                .as_ref()
                .is_some_and(|id| removed.contains(id))
            {
                message.application_id = None;
            }
        }
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users
            .values()
            .any(|user| user.email.eq_ignore_ascii_case(email))
    }
}

/// Mutex-guarded store used by tests, demos and the default server mode.
///
/// All tables sit behind one lock so compound writes and uniqueness checks are atomic.
#[derive(Clone, Default)]
pub struct InMemoryGrantRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryGrantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the standard lookup vocabulary.
    pub fn seeded() -> Self {
        Self::with_lookups(LookupCatalog::standard())
    }

    pub fn with_lookups(lookups: LookupCatalog) -> Self {
        let repository = Self::default();
        if let Ok(mut tables) = repository.tables.lock() {
            tables.lookups = lookups;
        }
        repository
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store mutex poisoned".into()))
    }
}

impl GrantRepository for InMemoryGrantRepository {
    fn save_tag(&self, category: TagCategory, tag: Tag) -> Result<(), RepositoryError> {
        self.tables()?.lookups.insert(category, tag);
        Ok(())
    }

    fn lookups(&self) -> Result<LookupCatalog, RepositoryError> {
        Ok(self.tables()?.lookups.clone())
    }

    fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.email_taken(&user.email) {
            return Err(RepositoryError::Conflict(duplicate_email_message(&user.email)));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables()?.users.get(id).cloned())
    }

    fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn add_membership(&self, membership: Membership) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.clients.contains_key(&membership.client_id) {
            return Err(RepositoryError::not_found("client", &membership.client_id));
        }
        if !tables.users.contains_key(&membership.user_id) {
            return Err(RepositoryError::not_found("user", &membership.user_id));
        }
        tables.memberships.retain(|existing| {
            existing.client_id != membership.client_id || existing.user_id != membership.user_id
        });
        tables.memberships.push(membership);
        Ok(())
    }

    fn client_members(&self, client_id: &ClientId) -> Result<Vec<User>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .memberships
            .iter()
            .filter(|membership| &membership.client_id == client_id)
            .filter_map(|membership| tables.users.get(&membership.user_id).cloned())
            .collect())
    }

    fn memberships(&self, user_id: &UserId) -> Result<Vec<ClientId>, RepositoryError> {
        Ok(self
            .tables()?
            .memberships
            .iter()
            .filter(|membership| &membership.user_id == user_id)
            .map(|membership| membership.client_id.clone())
            .collect())
    }

    fn insert_grant(&self, grant: Grant) -> Result<Grant, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.grants.contains_key(&grant.id) {
            return Err(RepositoryError::Conflict(format!("grant {} already exists", grant.id)));
        }
        tables.grants.insert(grant.id.clone(), grant.clone());
        Ok(grant)
    }

    fn update_grant(&self, grant: Grant) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        match tables.grants.get_mut(&grant.id) {
            Some(slot) => {
                *slot = grant;
                Ok(())
            }
            None => Err(RepositoryError::not_found("grant", &grant.id)),
        }
    }

    fn fetch_grant(&self, id: &GrantId) -> Result<Option<Grant>, RepositoryError> {
        Ok(self.tables()?.grants.get(id).cloned())
    }

    fn list_grants(&self, status: Option<GrantStatus>) -> Result<Vec<Grant>, RepositoryError> {
        let tables = self.tables()?;
        let mut grants: Vec<Grant> = tables
            .grants
            .values()
            .filter(|grant| status.map_or(true, |status| grant.status == status))
            .cloned()
            .collect();
        grants.sort_by(|left, right| {
            deadline_order(left.deadline_at, right.deadline_at)
                .then_with(|| left.name.cmp(&right.name))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(grants)
    }

    fn delete_grant(&self, id: &GrantId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.grants.remove(id).is_none() {
            return Err(RepositoryError::not_found("grant", id));
        }
        tables.matches.retain(|_, record| &record.grant_id != id);
        tables.remove_applications(|application| &application.grant_id == id);
        Ok(())
    }

    fn insert_client(&self, client: Client) -> Result<Client, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.clients.contains_key(&client.id) {
            return Err(RepositoryError::Conflict(format!(
                "client {} already exists",
                client.id
            )));
        }
        tables.clients.insert(client.id.clone(), client.clone());
        Ok(client)
    }

    fn update_client(&self, client: Client) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        match tables.clients.get_mut(&client.id) {
            Some(slot) => {
                *slot = client;
                Ok(())
            }
            None => Err(RepositoryError::not_found("client", &client.id)),
        }
    }

    fn fetch_client(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        Ok(self.tables()?.clients.get(id).cloned())
    }

    fn fetch_client_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        Ok(self
            .tables()?
            .clients
            .values()
            .find(|client| client.subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    fn list_clients(&self) -> Result<Vec<Client>, RepositoryError> {
        let mut clients: Vec<Client> = self.tables()?.clients.values().cloned().collect();
        clients.sort_by(|left, right| {
            left.name
                .cmp(&right.name)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(clients)
    }

    fn delete_client(&self, id: &ClientId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.clients.remove(id).is_none() {
            return Err(RepositoryError::not_found("client", id));
        }
        tables.matches.retain(|_, record| &record.client_id != id);
        tables.remove_applications(|application| &application.client_id == id);
        tables.messages.retain(|message| &message.client_id != id);
        tables.memberships.retain(|membership| &membership.client_id != id);
        tables.invites.retain(|_, invite| &invite.client_id != id);
        tables
            .service_requests
            .retain(|request| &request.client_id != id);
        Ok(())
    }

    fn insert_match(&self, record: GrantMatch) -> Result<GrantMatch, RepositoryError> {
        let mut tables = self.tables()?;
        let duplicate = tables.matches.values().any(|existing| {
            existing.client_id == record.client_id && existing.grant_id == record.grant_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict(duplicate_match_message(
                &record.client_id,
                &record.grant_id,
            )));
        }
        tables.matches.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update_match(&self, record: GrantMatch) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        match tables.matches.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(RepositoryError::not_found("match", &record.id)),
        }
    }

    fn fetch_match(&self, id: &MatchId) -> Result<Option<GrantMatch>, RepositoryError> {
        Ok(self.tables()?.matches.get(id).cloned())
    }

    fn list_matches(&self, filter: &MatchFilter) -> Result<Vec<GrantMatch>, RepositoryError> {
        let tables = self.tables()?;
        let mut matches: Vec<GrantMatch> = tables
            .matches
            .values()
            .filter(|record| {
                filter
                    .client_id
                    .as_ref()
                    .map_or(true, |client_id| &record.client_id == client_id)
                    && filter.status.map_or(true, |status| record.status == status)
            })
            .cloned()
            .collect();
        matches.sort_by(|left, right| {
            right
                .fit_score
                .cmp(&left.fit_score)
                .then_with(|| left.created_at.cmp(&right.created_at))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(matches)
    }

    fn delete_match(&self, id: &MatchId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.matches.remove(id).is_none() {
            return Err(RepositoryError::not_found("match", id));
        }
        for application in tables.applications.values_mut() {
            if application.match_id.as_ref() == Some(id) {
                application.match_id = None;
            }
        }
        Ok(())
    }

    fn insert_application(
        &self,
        application: Application,
        event: ApplicationEvent,
        converts: Option<&MatchId>,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict(format!(
                "application {} already exists",
                application.id
            )));
        }
        if let Some(match_id) = converts {
            let record = tables
                .matches
                .get_mut(match_id)
                .ok_or_else(|| RepositoryError::not_found("match", match_id))?;
            record.status = MatchStatus::Converted;
            record.updated_at = application.created_at;
        }
        tables
            .applications
            .insert(application.id.clone(), application.clone());
        tables.events.push(event);
        Ok(application)
    }

    fn update_application(
        &self,
        id: &ApplicationId,
        change: &mut dyn FnMut(&mut Application) -> Option<ApplicationEvent>,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables
            .applications
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("application", id))?;
        let event = change(slot);
        let updated = slot.clone();
        if let Some(event) = event {
            tables.events.push(event);
        }
        Ok(updated)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.tables()?.applications.get(id).cloned())
    }

    fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let mut applications: Vec<Application> = tables
            .applications
            .values()
            .filter(|application| {
                filter
                    .client_id
                    .as_ref()
                    .map_or(true, |client_id| &application.client_id == client_id)
                    && filter.stage.map_or(true, |stage| application.stage == stage)
                    && filter
                        .assigned_to
                        .as_ref()
                        .map_or(true, |user| application.assigned_to.as_ref() == Some(user))
                    && filter
                        .client_ids
                        .as_ref()
                        .map_or(true, |allowed| allowed.contains(&application.client_id))
            })
            .cloned()
            .collect();
        applications.sort_by(|left, right| {
            deadline_order(left.internal_deadline, right.internal_deadline)
                .then_with(|| right.updated_at.cmp(&left.updated_at))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(applications)
    }

    fn delete_application(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.applications.contains_key(id) {
            return Err(RepositoryError::not_found("application", id));
        }
        tables.remove_applications(|application| &application.id == id);
        Ok(())
    }

    fn stage_counts(&self) -> Result<BTreeMap<ApplicationStage, u64>, RepositoryError> {
        let tables = self.tables()?;
        let mut counts = BTreeMap::new();
        for application in tables.applications.values() {
            *counts.entry(application.stage).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn append_event(&self, event: ApplicationEvent) -> Result<ApplicationEvent, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.applications.contains_key(&event.application_id) {
            return Err(RepositoryError::not_found(
                "application",
                &event.application_id,
            ));
        }
        tables.events.push(event.clone());
        Ok(event)
    }

    fn list_events(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationEvent>, RepositoryError> {
        let tables = self.tables()?;
        let mut events: Vec<ApplicationEvent> = tables
            .events
            .iter()
            .rev()
            .filter(|event| &event.application_id == application_id)
            .cloned()
            .collect();
        // Stable sort keeps reverse insertion order among equal timestamps.
        events.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(events)
    }

    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.clients.contains_key(&message.client_id) {
            return Err(RepositoryError::not_found("client", &message.client_id));
        }
        tables.messages.push(message.clone());
        Ok(message)
    }

    fn list_messages(&self, filter: &MessageFilter) -> Result<Vec<Message>, RepositoryError> {
        let tables = self.tables()?;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .rev()
            .filter(|message| {
                filter
                    .client_id
                    .as_ref()
                    .map_or(true, |client_id| &message.client_id == client_id)
                    && filter.application_id.as_ref().map_or(true, |application_id| {
                        message.application_id.as_ref() == Some(application_id)
                    })
            })
            .cloned()
            .collect();
        messages.sort_by(|left, right| right.sent_at.cmp(&left.sent_at));
        Ok(messages)
    }

    fn insert_invite(&self, invite: Invite) -> Result<Invite, RepositoryError> {
        let mut tables = self.tables()?;
        if tables
            .invites
            .values()
            .any(|existing| existing.token == invite.token)
        {
            return Err(RepositoryError::Conflict("invite token already issued".into()));
        }
        tables.invites.insert(invite.id.clone(), invite.clone());
        Ok(invite)
    }

    fn update_invite(&self, invite: Invite) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        match tables.invites.get_mut(&invite.id) {
            Some(slot) => {
                *slot = invite;
                Ok(())
            }
            None => Err(RepositoryError::not_found("invite", &invite.id)),
        }
    }

    fn fetch_invite(&self, id: &InviteId) -> Result<Option<Invite>, RepositoryError> {
        Ok(self.tables()?.invites.get(id).cloned())
    }

    fn fetch_invite_by_token(&self, token: &str) -> Result<Option<Invite>, RepositoryError> {
        Ok(self
            .tables()?
            .invites
            .values()
            .find(|invite| invite.token == token)
            .cloned())
    }

    fn list_invites(&self, client_id: &ClientId) -> Result<Vec<Invite>, RepositoryError> {
        let mut invites: Vec<Invite> = self
            .tables()?
            .invites
            .values()
            .filter(|invite| &invite.client_id == client_id)
            .cloned()
            .collect();
        invites.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(invites)
    }

    fn delete_invite(&self, id: &InviteId) -> Result<(), RepositoryError> {
        match self.tables()?.invites.remove(id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::not_found("invite", id)),
        }
    }

    fn accept_invite(&self, invite: &Invite, user: User) -> Result<User, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.invites.contains_key(&invite.id) {
            return Err(RepositoryError::not_found("invite", &invite.id));
        }
        if tables.email_taken(&user.email) {
            return Err(RepositoryError::Conflict(duplicate_email_message(&user.email)));
        }
        tables.users.insert(user.id.clone(), user.clone());
        tables.memberships.push(Membership {
            client_id: invite.client_id.clone(),
            user_id: user.id.clone(),
            client_role: invite.client_role,
        });
        tables.invites.remove(&invite.id);
        Ok(user)
    }

    fn insert_signup(&self, client: Client, owner: User) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.email_taken(&owner.email) {
            return Err(RepositoryError::Conflict(duplicate_email_message(&owner.email)));
        }
        tables.memberships.push(Membership {
            client_id: client.id.clone(),
            user_id: owner.id.clone(),
            client_role: ClientRole::Owner,
        });
        tables.clients.insert(client.id.clone(), client);
        tables.users.insert(owner.id.clone(), owner);
        Ok(())
    }

    fn insert_service_request(
        &self,
        request: ManagedServiceRequest,
    ) -> Result<ManagedServiceRequest, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.clients.contains_key(&request.client_id) {
            return Err(RepositoryError::not_found("client", &request.client_id));
        }
        tables.service_requests.push(request.clone());
        Ok(request)
    }

    fn update_service_request(
        &self,
        id: &ServiceRequestId,
        change: &mut dyn FnMut(&mut ManagedServiceRequest),
    ) -> Result<ManagedServiceRequest, RepositoryError> {
        let mut tables = self.tables()?;
        let request = tables
            .service_requests
            .iter_mut()
            .find(|request| &request.id == id)
            .ok_or_else(|| RepositoryError::not_found("service request", id))?;
        change(request);
        Ok(request.clone())
    }

    fn fetch_service_request(
        &self,
        id: &ServiceRequestId,
    ) -> Result<Option<ManagedServiceRequest>, RepositoryError> {
        Ok(self
            .tables()?
            .service_requests
            .iter()
            .find(|request| &request.id == id)
            .cloned())
    }

    fn list_service_requests(
        &self,
        status: Option<ServiceRequestStatus>,
    ) -> Result<Vec<ManagedServiceRequest>, RepositoryError> {
        let tables = self.tables()?;
        let mut requests: Vec<ManagedServiceRequest> = tables
            .service_requests
            .iter()
            .rev()
            .filter(|request| status.map_or(true, |status| request.status == status))
            .cloned()
            .collect();
        requests.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(requests)
    }
}
