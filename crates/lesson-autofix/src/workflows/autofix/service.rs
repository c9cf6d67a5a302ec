use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::collaborators::Collaborators;
use super::domain::{Lesson, SkillGrouping};
use super::engine::{AutoFixEngine, AutoFixPlan, AutoFixRequest};
use super::lifecycle::{AutoFixPhase, AutoFixRun};
use super::outbound::{
    AssignmentSubmitter, AutoFixNotice, AutoFixNotifier, LoadingState, NoticeKind, NotifyError,
    QueuedMutation, SubmissionError, NOTICE_DURATION_MS,
};
use super::submission::submit_plan;
use crate::config::AutoFixConfig;

pub const FAILURE_MESSAGE: &str = "Error updating lesson plan";

/// Toast text summarizing how many students each direction adjusted.
pub fn adjustment_message(overbooked: usize, underbooked: usize) -> String {
    format!(
        "{overbooked} overbooked {}, {underbooked} underbooked {}",
        students_adjusted(overbooked),
        students_adjusted(underbooked)
    )
}

fn students_adjusted(count: usize) -> &'static str {
    if count == 1 {
        "student adjusted"
    } else {
        "students adjusted"
    }
}

pub fn dismiss_alert_id(lesson_plan_id: &str) -> String {
    format!("{lesson_plan_id}_AUTO_FIX")
}

/// Receipt returned once a run has been handed to the assignment service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixReceipt {
    pub lesson_plan_id: String,
    pub phase: AutoFixPhase,
    pub mutation: Option<QueuedMutation>,
    pub submitted: usize,
    pub plan: AutoFixPlan,
}

/// Service coordinating planning, submission, and completion of auto-fix runs.
pub struct AutoFixService<S, N> {
    engine: Arc<AutoFixEngine>,
    submitter: Arc<S>,
    notifier: Arc<N>,
    runs: Mutex<HashMap<String, AutoFixRun>>,
}

impl<S, N> AutoFixService<S, N>
where
    S: AssignmentSubmitter + 'static,
    N: AutoFixNotifier + 'static,
{
    pub fn new(
        collaborators: Collaborators,
        config: AutoFixConfig,
        submitter: Arc<S>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            engine: Arc::new(AutoFixEngine::new(collaborators, config)),
            submitter,
            notifier,
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn preview(
        &self,
        lesson: &Lesson,
        groupings: &[SkillGrouping],
        request: &AutoFixRequest,
    ) -> AutoFixPlan {
        self.engine.plan(lesson, groupings, request)
    }

    /// Computes and submits a plan; at most one run per lesson may be in flight.
    pub fn confirm(
        &self,
        lesson: &Lesson,
        groupings: &[SkillGrouping],
        request: &AutoFixRequest,
    ) -> Result<AutoFixReceipt, AutoFixError> {
        let lesson_plan_id = lesson.lesson_plan_id.clone();
        self.begin(&lesson_plan_id)?;

        let plan = self.engine.plan(lesson, groupings, request);
        self.update(&lesson_plan_id, |run| {
            run.overbooked_adjusted = plan.overbooked_adjusted;
            run.underbooked_adjusted = plan.underbooked_adjusted;
            advance(run, AutoFixPhase::Merging)
        })?;

        if plan.is_empty() {
            let phase = self.update(&lesson_plan_id, |run| {
                advance(run, AutoFixPhase::Done)?;
                Ok(run.phase)
            })?;
            info!(lesson_plan_id = %lesson_plan_id, "no students needed adjustment");
            return Ok(AutoFixReceipt {
                lesson_plan_id,
                phase,
                mutation: None,
                submitted: 0,
                plan,
            });
        }

        self.update(&lesson_plan_id, |run| advance(run, AutoFixPhase::Submitting))?;

        match submit_plan(self.submitter.as_ref(), lesson, &plan, &request.skills_order) {
            Ok(outcome) => {
                let phase = self.update(&lesson_plan_id, |run| {
                    run.mutation = outcome.mutation.clone();
                    run.submitted = outcome.submitted;
                    if outcome.mutation.is_none() {
                        advance(run, AutoFixPhase::Done)?;
                    }
                    Ok(run.phase)
                })?;

                info!(
                    lesson_plan_id = %lesson_plan_id,
                    submitted = outcome.submitted,
                    phase = phase.label(),
                    "auto-fix submitted"
                );

                Ok(AutoFixReceipt {
                    lesson_plan_id,
                    phase,
                    mutation: outcome.mutation,
                    submitted: outcome.submitted,
                    plan,
                })
            }
            Err(error) => {
                warn!(lesson_plan_id = %lesson_plan_id, %error, "auto-fix submission failed");
                self.fail(&lesson_plan_id)?;
                Err(AutoFixError::Submission(error))
            }
        }
    }

    /// Consumes the assignment service's loading-state signal for a submitted run.
    pub fn complete(
        &self,
        lesson_plan_id: &str,
        state: LoadingState,
    ) -> Result<AutoFixPhase, AutoFixError> {
        let run = self
            .lock()
            .get(lesson_plan_id)
            .cloned()
            .filter(|run| run.phase == AutoFixPhase::Submitting)
            .ok_or_else(|| AutoFixError::UnknownRun {
                lesson_plan_id: lesson_plan_id.to_string(),
            })?;

        match state {
            LoadingState::None | LoadingState::Loading => Ok(run.phase),
            LoadingState::Success => {
                self.update(lesson_plan_id, |run| advance(run, AutoFixPhase::Done))?;
                info!(
                    lesson_plan_id,
                    overbooked = run.overbooked_adjusted,
                    underbooked = run.underbooked_adjusted,
                    "auto-fix completed"
                );
                self.notifier.notify(AutoFixNotice {
                    lesson_plan_id: lesson_plan_id.to_string(),
                    kind: NoticeKind::Success,
                    message: adjustment_message(run.overbooked_adjusted, run.underbooked_adjusted),
                    dismiss_alert_id: Some(dismiss_alert_id(lesson_plan_id)),
                    duration_ms: NOTICE_DURATION_MS,
                })?;
                Ok(AutoFixPhase::Done)
            }
            LoadingState::Error => {
                warn!(lesson_plan_id, "assignment service reported failure");
                self.fail(lesson_plan_id)
            }
        }
    }

    pub fn phase(&self, lesson_plan_id: &str) -> AutoFixPhase {
        self.lock()
            .get(lesson_plan_id)
            .map(|run| run.phase)
            .unwrap_or(AutoFixPhase::Idle)
    }

    pub fn run(&self, lesson_plan_id: &str) -> Option<AutoFixRun> {
        self.lock().get(lesson_plan_id).cloned()
    }

    fn begin(&self, lesson_plan_id: &str) -> Result<(), AutoFixError> {
        let mut runs = self.lock();
        if let Some(existing) = runs.get(lesson_plan_id) {
            if existing.phase.is_in_flight() {
                return Err(AutoFixError::InFlight {
                    lesson_plan_id: lesson_plan_id.to_string(),
                });
            }
        }
        runs.insert(
            lesson_plan_id.to_string(),
            AutoFixRun::start(lesson_plan_id, Utc::now()),
        );
        Ok(())
    }

    /// Records the failure, tells the teacher, and releases the lesson.
    fn fail(&self, lesson_plan_id: &str) -> Result<AutoFixPhase, AutoFixError> {
        self.update(lesson_plan_id, |run| {
            advance(run, AutoFixPhase::Error)?;
            run.mutation = None;
            run.submitted = 0;
            advance(run, AutoFixPhase::Idle)
        })?;

        self.notifier.notify(AutoFixNotice {
            lesson_plan_id: lesson_plan_id.to_string(),
            kind: NoticeKind::Failure,
            message: FAILURE_MESSAGE.to_string(),
            dismiss_alert_id: None,
            duration_ms: NOTICE_DURATION_MS,
        })?;

        Ok(AutoFixPhase::Idle)
    }

    fn update<T>(
        &self,
        lesson_plan_id: &str,
        change: impl FnOnce(&mut AutoFixRun) -> Result<T, AutoFixError>,
    ) -> Result<T, AutoFixError> {
        let mut runs = self.lock();
        let run = runs
            .get_mut(lesson_plan_id)
            .ok_or_else(|| AutoFixError::UnknownRun {
                lesson_plan_id: lesson_plan_id.to_string(),
            })?;
        change(run)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AutoFixRun>> {
        self.runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn advance(run: &mut AutoFixRun, next: AutoFixPhase) -> Result<(), AutoFixError> {
    run.advance(next)
        .map_err(|(from, to)| AutoFixError::InvalidTransition { from, to })
}

/// Error raised by the auto-fix service.
#[derive(Debug, thiserror::Error)]
pub enum AutoFixError {
    #[error("an auto-fix is already in progress for lesson {lesson_plan_id}")]
    InFlight { lesson_plan_id: String },
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Notification(#[from] NotifyError),
    #[error("no auto-fix awaiting completion for lesson {lesson_plan_id}")]
    UnknownRun { lesson_plan_id: String },
    #[error("auto-fix cannot move from {} to {}", from.label(), to.label())]
    InvalidTransition { from: AutoFixPhase, to: AutoFixPhase },
}
