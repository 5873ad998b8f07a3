use tracing::{info, warn};

use super::super::access::{Actor, Operation, Ownership};
use super::super::domain::{
    Application, ApplicationDraft, ApplicationEvent, ApplicationId, ApplicationPatch,
    ApplicationStage, EventDraft, EventId, EventType,
};
use super::super::notify::Notifier;
use super::super::pipeline::{PipelineCounts, StageTransition};
use super::super::repository::{ApplicationFilter, GrantRepository};
use super::{GrantPipelineService, PipelineError};

impl<R, N> GrantPipelineService<R, N>
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    /// Open an application. A referenced match must belong to the same client and
    /// grant and is marked `converted` in the same write.
    pub fn create_application(
        &self,
        actor: &Actor,
        draft: ApplicationDraft,
    ) -> Result<Application, PipelineError> {
        self.check(actor, Operation::ManageApplications, Ownership::NotApplicable)?;
        self.require_client(&draft.client_id)?;
        self.require_grant(&draft.grant_id)?;

        if let Some(match_id) = &draft.match_id {
            let source = self.require_match(match_id)?;
            if source.client_id != draft.client_id || source.grant_id != draft.grant_id {
                return Err(PipelineError::validation(format!(
                    "match {match_id} belongs to a different client or grant"
                )));
            }
        }

        let now = self.clock.now();
        let mut application = Application {
            id: ApplicationId::generate(),
            client_id: draft.client_id,
            grant_id: draft.grant_id,
            match_id: draft.match_id,
            stage: draft.stage,
            internal_deadline: draft.internal_deadline,
            submitted_at: None,
            decision_at: None,
            amount_requested: draft.amount_requested,
            amount_awarded: None,
            assigned_to: draft.assigned_to.or_else(|| Some(actor.user_id.clone())),
            cycle_year: draft.cycle_year,
            round_label: draft.round_label,
            created_at: now,
            updated_at: now,
        };

        let transition = StageTransition::initial(application.stage);
        let event = transition.apply(&mut application, Some(&actor.user_id), now);
        let converts = application.match_id.clone();
        let stored = self
            .repository
            .insert_application(application, event, converts.as_ref())?;

        info!(
            application_id = %stored.id,
            client_id = %stored.client_id,
            stage = stored.stage.label(),
            "application created"
        );
        self.announce(&stored, transition);
        Ok(stored)
    }

    /// Patch an application. The patch is applied to the committed row inside the
    /// write, so concurrent patches never undo each other's stage move. Changing
    /// the stage records a status-change event in the same write; re-sending the
    /// current stage records nothing.
    pub fn update_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<Application, PipelineError> {
        self.check(actor, Operation::ManageApplications, Ownership::NotApplicable)?;
        let now = self.clock.now();

        let mut transition = None;
        let application = self
            .repository
            .update_application(application_id, &mut |application| {
                patch.apply_fields(application);
                application.updated_at = now;
                transition = patch
                    .stage
                    .and_then(|stage| StageTransition::between(application.stage, stage));
                transition.map(|moved| moved.apply(application, Some(&actor.user_id), now))
            })?;

        if let Some(transition) = transition {
            info!(
                application_id = %application.id,
                from = transition.from.map(ApplicationStage::label),
                to = transition.to.label(),
                "application stage changed"
            );
            self.announce(&application, transition);
        }
        Ok(application)
    }

    pub fn get_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Application, PipelineError> {
        let application = self.require_application(application_id)?;
        let ownership = self.ownership(actor, &application.client_id)?;
        self.check(actor, Operation::ViewApplication, ownership)?;
        Ok(application)
    }

    /// Client-role actors only ever see their own organizations' applications.
    pub fn list_applications(
        &self,
        actor: &Actor,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, PipelineError> {
        let mut filter = filter.clone();
        if !actor.role.is_staff() {
            filter.client_ids = Some(self.repository.memberships(&actor.user_id)?);
        }
        Ok(self.repository.list_applications(&filter)?)
    }

    /// Removes the application and its event ledger; logged messages are kept.
    pub fn delete_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<(), PipelineError> {
        self.check(actor, Operation::ManageApplications, Ownership::NotApplicable)?;
        self.repository.delete_application(application_id)?;
        info!(application_id = %application_id, "application deleted");
        Ok(())
    }

    /// Append a manual ledger entry. Status changes are only written by stage moves.
    pub fn add_event(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        draft: EventDraft,
    ) -> Result<ApplicationEvent, PipelineError> {
        self.check(actor, Operation::ManageApplications, Ownership::NotApplicable)?;
        if draft.event_type == EventType::StatusChange {
            return Err(PipelineError::validation(
                "status_change events are recorded by stage updates",
            ));
        }
        self.require_application(application_id)?;

        let event = ApplicationEvent {
            id: EventId::generate(),
            application_id: application_id.clone(),
            event_type: draft.event_type,
            from_stage: None,
            to_stage: None,
            note: draft.note,
            actor: Some(actor.user_id.clone()),
            created_at: self.clock.now(),
        };
        Ok(self.repository.append_event(event)?)
    }

    pub fn list_events(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationEvent>, PipelineError> {
        let application = self.require_application(application_id)?;
        let ownership = self.ownership(actor, &application.client_id)?;
        self.check(actor, Operation::ViewApplication, ownership)?;
        Ok(self.repository.list_events(application_id)?)
    }

    pub fn pipeline_counts(&self, actor: &Actor) -> Result<PipelineCounts, PipelineError> {
        self.check(actor, Operation::ViewCatalog, Ownership::NotApplicable)?;
        Ok(PipelineCounts::from_counts(self.repository.stage_counts()?))
    }

    pub(crate) fn require_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, PipelineError> {
        self.repository
            .fetch_application(application_id)?
            .ok_or_else(|| PipelineError::not_found("application", application_id))
    }

    fn announce(&self, application: &Application, transition: StageTransition) {
        if !transition.notifies_client() {
            return;
        }
        if let Err(err) = self.notifier.application_stage(application, transition.to) {
            warn!(
                application_id = %application.id,
                stage = transition.to.label(),
                error = %err,
                "stage notification failed"
            );
        }
    }
}
