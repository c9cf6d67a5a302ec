use serde::Serialize;
use tracing::debug;

use super::allocation::{allocate, Adder, Adjuster, AppliedChange, Remover, SkillSlice};
use super::booking::BookingCalculator;
use super::collaborators::{Collaborators, SkillQuery};
use super::domain::{AdjustmentDirection, Assignment, Lesson, SkillGrouping};
use crate::config::AutoFixConfig;

/// Outcome of adjusting one student's time for one skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillAdjustment {
    pub student_id: String,
    pub skill_id: String,
    pub direction: AdjustmentDirection,
    pub slice: SkillSlice,
    pub changes: Vec<AppliedChange>,
    pub minutes_targeted: f64,
    pub minutes_applied: f64,
}

impl SkillAdjustment {
    /// Gap left open after allocation; overshoot counts as closed.
    pub fn residual(&self) -> f64 {
        (self.minutes_targeted - self.minutes_applied).max(0.0)
    }
}

/// Whether an entry for the skill carries a teacher-assigned or auto-fix tag.
pub fn is_locked(assignment: &Assignment, skill_id: &str) -> bool {
    let teacher_assigned = format!("{skill_id}-TEACHER_ASSIGNED");
    let auto_fixed = format!("{skill_id}-AUTOFIX");

    assignment.manifest.iter().any(|entry| {
        entry.serves(skill_id) && (entry.has_tag(&teacher_assigned) || entry.has_tag(&auto_fixed))
    })
}

/// Runs booking, balancing, and priority allocation for one student and skill.
#[derive(Debug, Clone)]
pub struct SkillProcessor {
    collaborators: Collaborators,
    calculator: BookingCalculator,
    config: AutoFixConfig,
}

impl SkillProcessor {
    pub fn new(collaborators: Collaborators, config: AutoFixConfig) -> Self {
        let calculator =
            BookingCalculator::new(collaborators.time_balance.clone(), config.threshold_minutes);
        Self {
            collaborators,
            calculator,
            config,
        }
    }

    pub fn calculator(&self) -> &BookingCalculator {
        &self.calculator
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// `None` when the pair is locked, no longer needs `direction`, or nothing could change.
    pub fn process(
        &self,
        lesson: &Lesson,
        groupings: &[SkillGrouping],
        student_id: &str,
        skill_id: &str,
        direction: AdjustmentDirection,
        grades: &[u8],
    ) -> Option<SkillAdjustment> {
        let assignment = lesson.assignment_for(student_id)?;

        if is_locked(assignment, skill_id) {
            debug!(student_id, skill_id, "skill locked by teacher or earlier auto-fix");
            return None;
        }

        let record = self
            .calculator
            .evaluate(lesson, groupings, skill_id, student_id)?;
        if record.direction() != direction {
            return None;
        }

        let mut slice = SkillSlice::from_assignment(assignment, skill_id);
        let target = record.gap();

        let (outcome, changes) = match direction {
            AdjustmentDirection::Remove => {
                let mut remover = Remover::new(&self.collaborators, grades);
                let outcome = allocate(&mut slice, &mut remover, target);
                (outcome, remover.changes().to_vec())
            }
            AdjustmentDirection::Add => {
                let query = SkillQuery {
                    skill_id,
                    lesson_name: &lesson.name,
                    curriculum_id: &lesson.curriculum_id,
                    focus_skills: lesson.focus_skills(),
                    skill_resources: &lesson.skill_resources,
                };
                let resources = self.collaborators.catalog.resources_for(&query);
                let mut adder = Adder::new(
                    &self.collaborators,
                    &slice,
                    resources,
                    grades,
                    self.config.max_resource_minutes,
                );
                if !adder.has_candidates() {
                    debug!(student_id, skill_id, "no catalog resources available");
                    return None;
                }
                let outcome = allocate(&mut slice, &mut adder, target);
                (outcome, adder.changes().to_vec())
            }
        };

        if changes.is_empty() {
            return None;
        }

        debug!(
            student_id,
            skill_id,
            direction = direction.label(),
            targeted = outcome.target,
            applied = outcome.applied,
            changes = changes.len(),
            "skill adjusted"
        );

        Some(SkillAdjustment {
            student_id: student_id.to_string(),
            skill_id: skill_id.to_string(),
            direction,
            slice,
            changes,
            minutes_targeted: outcome.target,
            minutes_applied: outcome.applied,
        })
    }
}
