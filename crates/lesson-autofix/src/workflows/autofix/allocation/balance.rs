use std::collections::BTreeSet;

use serde::Serialize;
use tracing::trace;

use super::slice::SkillSlice;
use super::{Adjuster, Step};
use crate::workflows::autofix::domain::{AdjustmentDirection, ContentCategory};

/// Resource counts per content category for one student and skill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    pub teacher_resource: usize,
    pub micro_lesson_and_legacy: usize,
    pub tutor_and_supports: usize,
}

impl CategoryCounts {
    pub fn new(teacher_resource: usize, micro_lesson_and_legacy: usize, tutor_and_supports: usize) -> Self {
        Self {
            teacher_resource,
            micro_lesson_and_legacy,
            tutor_and_supports,
        }
    }

    pub fn get(&self, category: ContentCategory) -> usize {
        match category {
            ContentCategory::TeacherResource => self.teacher_resource,
            ContentCategory::MicroLessonAndLegacy => self.micro_lesson_and_legacy,
            ContentCategory::TutorAndSupports => self.tutor_and_supports,
        }
    }

    pub fn add(&mut self, category: ContentCategory, count: usize) {
        match category {
            ContentCategory::TeacherResource => self.teacher_resource += count,
            ContentCategory::MicroLessonAndLegacy => self.micro_lesson_and_legacy += count,
            ContentCategory::TutorAndSupports => self.tutor_and_supports += count,
        }
    }

    /// Non-empty categories differ by at most one. Nothing assigned is never balanced.
    pub fn is_balanced(&self) -> bool {
        let present: Vec<usize> = ContentCategory::ordered()
            .into_iter()
            .map(|category| self.get(category))
            .filter(|count| *count > 0)
            .collect();

        match (present.iter().max(), present.iter().min()) {
            (Some(max), Some(min)) => max - min <= 1,
            _ => false,
        }
    }

    /// Largest non-empty category; the earliest category wins ties.
    pub fn most_represented(&self, skipped: &BTreeSet<ContentCategory>) -> Option<ContentCategory> {
        let mut best: Option<(ContentCategory, usize)> = None;
        for category in ContentCategory::ordered() {
            let count = self.get(category);
            if skipped.contains(&category) || count == 0 {
                continue;
            }
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((category, count));
            }
        }
        best.map(|(category, _)| category)
    }

    /// Smallest category, empty ones included; the earliest category wins ties.
    pub fn least_represented(&self, skipped: &BTreeSet<ContentCategory>) -> Option<ContentCategory> {
        let mut best: Option<(ContentCategory, usize)> = None;
        for category in ContentCategory::ordered() {
            let count = self.get(category);
            if skipped.contains(&category) {
                continue;
            }
            if best.map_or(true, |(_, low)| count < low) {
                best = Some((category, count));
            }
        }
        best.map(|(category, _)| category)
    }
}

pub fn category_counts(slice: &SkillSlice) -> CategoryCounts {
    slice.category_counts()
}

pub fn are_categories_balanced(counts: &CategoryCounts) -> bool {
    counts.is_balanced()
}

/// Category-preferring pass: shed from the largest category or fill the smallest,
/// one resource at a time, until balanced or `target` minutes are covered.
///
/// Returns the minutes applied.
pub fn balance_categories<A: Adjuster>(slice: &mut SkillSlice, adjuster: &mut A, target: f64) -> f64 {
    let mut applied = 0.0;
    let mut skipped = BTreeSet::new();

    while applied < target {
        let counts = slice.category_counts();
        if counts.is_balanced() {
            break;
        }

        let category = match adjuster.direction() {
            AdjustmentDirection::Remove => counts.most_represented(&skipped),
            AdjustmentDirection::Add => counts.least_represented(&skipped),
        };
        let Some(category) = category else {
            break;
        };

        match adjuster.step_in_category(slice, category) {
            Step::Applied(minutes) => {
                trace!(skill_id = %slice.skill_id, category = category.label(), minutes, "balanced");
                applied += minutes;
            }
            Step::Deferred => {
                skipped.insert(category);
            }
            Step::Exhausted => break,
        }
    }

    applied
}
