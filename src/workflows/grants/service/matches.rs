use tracing::info;

use super::super::access::{Actor, Operation, Ownership};
use super::super::domain::{
    ClientId, GrantId, GrantMatch, GrantStatus, MatchDraft, MatchId, MatchPatch,
};
use super::super::notify::Notifier;
use super::super::repository::{GrantRepository, MatchFilter};
use super::super::scoring::{FitLevel, FitOutcome, MatchSuggestion};
use super::{GrantPipelineService, PipelineError};

impl<R, N> GrantPipelineService<R, N>
where
    R: GrantRepository + ?Sized,
    N: Notifier + ?Sized,
{
    /// Rank every open grant for a client. Nothing is persisted.
    pub fn suggest_matches(
        &self,
        actor: &Actor,
        client_id: &ClientId,
    ) -> Result<Vec<MatchSuggestion>, PipelineError> {
        self.check(actor, Operation::ManageMatches, Ownership::NotApplicable)?;
        let client = self.require_client(client_id)?;
        let grants = self.repository.list_grants(Some(GrantStatus::Open))?;
        let lookups = self.repository.lookups()?;
        Ok(self.scorer.suggest(&client, &grants, &lookups))
    }

    /// Score one client against one grant regardless of the grant's status.
    pub fn score_pair(
        &self,
        actor: &Actor,
        client_id: &ClientId,
        grant_id: &GrantId,
    ) -> Result<FitOutcome, PipelineError> {
        self.check(actor, Operation::ManageMatches, Ownership::NotApplicable)?;
        let client = self.require_client(client_id)?;
        let grant = self.require_grant(grant_id)?;
        let lookups = self.repository.lookups()?;
        Ok(self
            .scorer
            .score(&client.eligibility, &grant.eligibility, &lookups))
    }

    /// Persist a suggestion. The level is always derived from the score.
    pub fn create_match(
        &self,
        actor: &Actor,
        draft: MatchDraft,
    ) -> Result<GrantMatch, PipelineError> {
        self.check(actor, Operation::ManageMatches, Ownership::NotApplicable)?;
        if draft.fit_score > 100 {
            return Err(PipelineError::validation(format!(
                "fit_score must be between 0 and 100, got {}",
                draft.fit_score
            )));
        }
        self.require_client(&draft.client_id)?;
        self.require_grant(&draft.grant_id)?;

        let now = self.clock.now();
        let record = GrantMatch {
            id: MatchId::generate(),
            client_id: draft.client_id,
            grant_id: draft.grant_id,
            fit_score: draft.fit_score,
            fit_level: FitLevel::from_score(draft.fit_score),
            reasons: draft.reasons,
            notes: draft.notes,
            status: draft.status,
            owner: draft.owner.or_else(|| Some(actor.user_id.clone())),
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_match(record)?;
        info!(
            match_id = %stored.id,
            client_id = %stored.client_id,
            grant_id = %stored.grant_id,
            fit_score = stored.fit_score,
            "match saved"
        );
        Ok(stored)
    }

    /// Only status, notes and owner change; the score snapshot is immutable.
    pub fn update_match(
        &self,
        actor: &Actor,
        match_id: &MatchId,
        patch: MatchPatch,
    ) -> Result<GrantMatch, PipelineError> {
        self.check(actor, Operation::ManageMatches, Ownership::NotApplicable)?;
        let mut record = self.require_match(match_id)?;

        if let Some(status) = patch.status {
            record.status = status;
        }
        if patch.notes.is_some() {
            record.notes = patch.notes;
        }
        if patch.owner.is_some() {
            record.owner = patch.owner;
        }
        record.updated_at = self.clock.now();

        self.repository.update_match(record.clone())?;
        Ok(record)
    }

    pub fn get_match(
        &self,
        actor: &Actor,
        match_id: &MatchId,
    ) -> Result<GrantMatch, PipelineError> {
        self.check(actor, Operation::ViewCatalog, Ownership::NotApplicable)?;
        self.require_match(match_id)
    }

    pub fn list_matches(
        &self,
        actor: &Actor,
        filter: &MatchFilter,
    ) -> Result<Vec<GrantMatch>, PipelineError> {
        self.check(actor, Operation::ViewCatalog, Ownership::NotApplicable)?;
        Ok(self.repository.list_matches(filter)?)
    }

    /// Applications created from the match survive with `match_id` cleared.
    pub fn delete_match(&self, actor: &Actor, match_id: &MatchId) -> Result<(), PipelineError> {
        self.check(actor, Operation::ManageMatches, Ownership::NotApplicable)?;
        self.repository.delete_match(match_id)?;
        info!(match_id = %match_id, "match deleted");
        Ok(())
    }

    pub(crate) fn require_match(&self, match_id: &MatchId) -> Result<GrantMatch, PipelineError> {
        self.repository
            .fetch_match(match_id)?
            .ok_or_else(|| PipelineError::not_found("match", match_id))
    }
}
