use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::collaborators::{most_common_grade, Collaborators};
use super::domain::{AdjustmentDirection, Lesson, SkillGrouping};
use super::merge::{CrossSkillMerge, StudentManifest};
use super::processor::{SkillAdjustment, SkillProcessor};
use crate::config::AutoFixConfig;

/// Students the teacher confirmed for auto-fix, plus the canonical skill ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixRequest {
    #[serde(default)]
    pub overbooked_student_ids: Vec<String>,
    #[serde(default)]
    pub underbooked_student_ids: Vec<String>,
    #[serde(default)]
    pub skills_order: Vec<String>,
}

impl AutoFixRequest {
    pub fn mode(&self) -> AutoFixMode {
        match (
            self.overbooked_student_ids.is_empty(),
            self.underbooked_student_ids.is_empty(),
        ) {
            (true, true) => AutoFixMode::Empty,
            (false, true) => AutoFixMode::Overbooked,
            (true, false) => AutoFixMode::Underbooked,
            (false, false) => AutoFixMode::Both,
        }
    }

    fn wants(&self, student_id: &str, direction: AdjustmentDirection) -> bool {
        let listed = match direction {
            AdjustmentDirection::Remove => &self.overbooked_student_ids,
            AdjustmentDirection::Add => &self.underbooked_student_ids,
        };
        listed.iter().any(|id| id == student_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoFixMode {
    Empty,
    Overbooked,
    Underbooked,
    Both,
}

/// Everything one auto-fix run would submit, computed without side effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixPlan {
    pub lesson_plan_id: String,
    pub mode: AutoFixMode,
    pub manifests: Vec<StudentManifest>,
    pub adjustments: Vec<SkillAdjustment>,
    pub overbooked_adjusted: usize,
    pub underbooked_adjusted: usize,
}

impl AutoFixPlan {
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    pub fn manifest_for(&self, student_id: &str) -> Option<&StudentManifest> {
        self.manifests
            .iter()
            .find(|manifest| manifest.student_id == student_id)
    }
}

/// Runs the skill processor over every skill and student, merging per student.
#[derive(Debug, Clone)]
pub struct AutoFixEngine {
    processor: SkillProcessor,
}

impl AutoFixEngine {
    pub fn new(collaborators: Collaborators, config: AutoFixConfig) -> Self {
        Self {
            processor: SkillProcessor::new(collaborators, config),
        }
    }

    pub fn processor(&self) -> &SkillProcessor {
        &self.processor
    }

    pub fn plan(
        &self,
        lesson: &Lesson,
        groupings: &[SkillGrouping],
        request: &AutoFixRequest,
    ) -> AutoFixPlan {
        let mode = request.mode();
        let skill_ids: Vec<String> = lesson.skill_ids().map(str::to_string).collect();
        let grades = most_common_grade(&lesson.students);
        let mut merge = CrossSkillMerge::new(self.processor.collaborators().ids.clone(), skill_ids.clone());
        let mut adjustments = Vec::new();

        if mode != AutoFixMode::Empty {
            for skill_id in &skill_ids {
                for student in &lesson.students {
                    for direction in [AdjustmentDirection::Remove, AdjustmentDirection::Add] {
                        if !request.wants(&student.id, direction) {
                            continue;
                        }

                        let Some(adjustment) = self.processor.process(
                            lesson,
                            groupings,
                            &student.id,
                            skill_id,
                            direction,
                            &grades,
                        ) else {
                            continue;
                        };

                        merge.apply(
                            &student.id,
                            lesson.assignment_for(&student.id),
                            &adjustment.slice,
                        );
                        adjustments.push(adjustment);
                    }
                }
            }
        }

        let overbooked_adjusted = distinct_students(&adjustments, AdjustmentDirection::Remove);
        let underbooked_adjusted = distinct_students(&adjustments, AdjustmentDirection::Add);

        info!(
            lesson_plan_id = %lesson.lesson_plan_id,
            mode = ?mode,
            students = merge.len(),
            adjustments = adjustments.len(),
            overbooked_adjusted,
            underbooked_adjusted,
            "auto-fix plan computed"
        );

        AutoFixPlan {
            lesson_plan_id: lesson.lesson_plan_id.clone(),
            mode,
            manifests: merge.into_manifests(),
            adjustments,
            overbooked_adjusted,
            underbooked_adjusted,
        }
    }
}

fn distinct_students(adjustments: &[SkillAdjustment], direction: AdjustmentDirection) -> usize {
    adjustments
        .iter()
        .filter(|adjustment| adjustment.direction == direction)
        .map(|adjustment| adjustment.student_id.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}
