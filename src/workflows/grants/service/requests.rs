use tracing::info;

use super::super::access::{Actor, Operation, Ownership};
use super::super::domain::{
    ClientId, ClientType, ManagedServiceRequest, ServiceRequestDraft, ServiceRequestId,
    ServiceRequestPatch, ServiceRequestStatus,
};
use super::super::notify::Notifier;
use super::super::repository::GrantRepository;
use super::{GrantPipelineService, PipelineError};

impl<R, N> GrantPipelineService<R, N>
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    /// A self-service organization asks staff to manage its grant work.
    pub fn request_managed_service(
        &self,
        actor: &Actor,
        client_id: &ClientId,
        draft: ServiceRequestDraft,
    ) -> Result<ManagedServiceRequest, PipelineError> {
        let ownership = self.ownership(actor, client_id)?;
        self.check(actor, Operation::RequestManagedService, ownership)?;
        let client = self.require_client(client_id)?;
        if client.client_type == ClientType::Managed {
            return Err(PipelineError::validation(format!(
                "client {client_id} is already managed by staff"
            )));
        }
        let message = draft.message.trim();
        if message.is_empty() {
            return Err(PipelineError::validation("a message is required"));
        }

        let now = self.clock.now();
        let stored = self
            .repository
            .insert_service_request(ManagedServiceRequest {
                id: ServiceRequestId::generate(),
                client_id: client.id,
                message: message.to_string(),
                contact_phone: draft
                    .contact_phone
                    .map(|phone| phone.trim().to_string())
                    .filter(|phone| !phone.is_empty()),
                status: ServiceRequestStatus::Pending,
                notes: None,
                created_by: Some(actor.user_id.clone()),
                created_at: now,
                updated_at: now,
            })?;
        info!(request_id = %stored.id, client_id = %stored.client_id, "managed service requested");
        Ok(stored)
    }

    pub fn list_service_requests(
        &self,
        actor: &Actor,
        status: Option<ServiceRequestStatus>,
    ) -> Result<Vec<ManagedServiceRequest>, PipelineError> {
        self.check(actor, Operation::ManageServiceRequests, Ownership::NotApplicable)?;
        Ok(self.repository.list_service_requests(status)?)
    }

    pub fn get_service_request(
        &self,
        actor: &Actor,
        request_id: &ServiceRequestId,
    ) -> Result<ManagedServiceRequest, PipelineError> {
        self.check(actor, Operation::ManageServiceRequests, Ownership::NotApplicable)?;
        self.repository
            .fetch_service_request(request_id)?
            .ok_or_else(|| PipelineError::not_found("service request", request_id))
    }

    /// Staff triage: move the status along and keep working notes.
    pub fn update_service_request(
        &self,
        actor: &Actor,
        request_id: &ServiceRequestId,
        patch: ServiceRequestPatch,
    ) -> Result<ManagedServiceRequest, PipelineError> {
        self.check(actor, Operation::ManageServiceRequests, Ownership::NotApplicable)?;
        let now = self.clock.now();
        let updated = self
            .repository
            .update_service_request(request_id, &mut |request| {
                if let Some(status) = patch.status {
                    request.status = status;
                }
                if let Some(notes) = &patch.notes {
                    request.notes = Some(notes.clone());
                }
                request.updated_at = now;
            })?;
        info!(
            request_id = %updated.id,
            status = updated.status.label(),
            "service request updated"
        );
        Ok(updated)
    }
}
