use chrono::{DateTime, Utc};
use serde::Serialize;

use super::outbound::QueuedMutation;

/// Where one lesson's auto-fix run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoFixPhase {
    Idle,
    ProcessingSkills,
    Merging,
    Submitting,
    Done,
    Error,
}

impl AutoFixPhase {
    pub fn can_transition_to(self, next: AutoFixPhase) -> bool {
        use AutoFixPhase::*;
        matches!(
            (self, next),
            (Idle | Done, ProcessingSkills)
                | (ProcessingSkills, Merging | Error)
                | (Merging, Submitting | Done)
                | (Submitting, Done | Error)
                | (Error, Idle)
        )
    }

    /// A run in one of these phases blocks another run on the same lesson.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            AutoFixPhase::ProcessingSkills | AutoFixPhase::Merging | AutoFixPhase::Submitting
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            AutoFixPhase::Idle => "idle",
            AutoFixPhase::ProcessingSkills => "processing_skills",
            AutoFixPhase::Merging => "merging",
            AutoFixPhase::Submitting => "submitting",
            AutoFixPhase::Done => "done",
            AutoFixPhase::Error => "error",
        }
    }
}

/// Lifecycle record of the latest auto-fix run for a lesson.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixRun {
    pub lesson_plan_id: String,
    pub phase: AutoFixPhase,
    pub started_at: DateTime<Utc>,
    pub mutation: Option<QueuedMutation>,
    pub submitted: usize,
    pub overbooked_adjusted: usize,
    pub underbooked_adjusted: usize,
}

impl AutoFixRun {
    pub fn start(lesson_plan_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            lesson_plan_id: lesson_plan_id.into(),
            phase: AutoFixPhase::ProcessingSkills,
            started_at,
            mutation: None,
            submitted: 0,
            overbooked_adjusted: 0,
            underbooked_adjusted: 0,
        }
    }

    /// Moves to `next`, returning the rejected pair when the move is not allowed.
    pub fn advance(&mut self, next: AutoFixPhase) -> Result<(), (AutoFixPhase, AutoFixPhase)> {
        if !self.phase.can_transition_to(next) {
            return Err((self.phase, next));
        }
        self.phase = next;
        Ok(())
    }
}
