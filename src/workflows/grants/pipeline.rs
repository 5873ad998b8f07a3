use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Application, ApplicationEvent, ApplicationStage, EventId, EventType, UserId,
};

/// A change of `Application::stage`, including the initial placement on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTransition {
    pub from: Option<ApplicationStage>,
    pub to: ApplicationStage,
}

impl StageTransition {
    pub fn initial(to: ApplicationStage) -> Self {
        Self { from: None, to }
    }

    /// `None` when the requested stage equals the current one.
    pub fn between(from: ApplicationStage, to: ApplicationStage) -> Option<Self> {
        (from != to).then_some(Self {
            from: Some(from),
            to,
        })
    }

    pub fn notifies_client(self) -> bool {
        self.to.notifies_client()
    }

    /// Move the application and stamp the stage timestamps, returning the ledger
    /// entry that records the move.
    ///
    /// `submitted_at` is only written the first time the application reaches
    /// `submitted`; `decision_at` is rewritten on every decision.
    pub fn apply(
        self,
        application: &mut Application,
        actor: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> ApplicationEvent {
        application.stage = self.to;
        application.updated_at = now;

        if self.to == ApplicationStage::Submitted && application.submitted_at.is_none() {
            application.submitted_at = Some(now);
        }
        if self.to.is_decision() {
            application.decision_at = Some(now);
        }

        ApplicationEvent {
            id: EventId::generate(),
            application_id: application.id.clone(),
            event_type: EventType::StatusChange,
            from_stage: self.from,
            to_stage: Some(self.to),
            note: None,
            actor: actor.cloned(),
            created_at: now,
        }
    }
}

/// Count of applications per stage with every stage present, serialized as
/// `{"draft": 0, "in_progress": 2, ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PipelineCounts(BTreeMap<ApplicationStage, u64>);

impl PipelineCounts {
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (ApplicationStage, u64)>,
    {
        let mut stages: BTreeMap<ApplicationStage, u64> = ApplicationStage::ordered()
            .into_iter()
            .map(|stage| (stage, 0))
            .collect();

        for (stage, count) in counts {
            *stages.entry(stage).or_default() += count;
        }

        Self(stages)
    }

    pub fn count(&self, stage: ApplicationStage) -> u64 {
        self.0.get(&stage).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ApplicationStage, u64)> + '_ {
        self.0.iter().map(|(stage, count)| (*stage, *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
