use std::sync::Arc;

use super::collaborators::{TimeBalance, TimeToGrowth};
use super::domain::{mastery_group, BookingRecord, Lesson, SkillGrouping};

/// Minutes a student may sit above or below the target before the engine reacts.
pub const THRESHOLD_FOR_AUTO_FIX: f64 = 4.0;

/// Classifies one student and skill as adequately, over-, or underbooked.
#[derive(Clone)]
pub struct BookingCalculator {
    time_balance: Arc<dyn TimeBalance>,
    threshold: f64,
}

impl BookingCalculator {
    pub fn new(time_balance: Arc<dyn TimeBalance>, threshold: f64) -> Self {
        Self {
            time_balance,
            threshold,
        }
    }

    /// `None` covers both "cannot evaluate" and "adequately booked".
    pub fn evaluate(
        &self,
        lesson: &Lesson,
        groupings: &[SkillGrouping],
        skill_id: &str,
        student_id: &str,
    ) -> Option<BookingRecord> {
        let assignment = lesson.assignment_for(student_id)?;
        let skill = lesson.skill(skill_id)?;

        let group = mastery_group(groupings, skill_id, student_id);
        let time_assigned = lesson.time_assigned_for(skill_id, group, student_id);

        let time_to_growth = match self.time_balance.time_to_growth(
            skill.time_to_master.unwrap_or(0.0),
            time_assigned,
            group,
        ) {
            TimeToGrowth::Minutes(minutes) => minutes,
            TimeToGrowth::Unavailable => return None,
        };

        let excess_time = (time_assigned - time_to_growth - self.threshold).max(0.0);
        let shortfall_time = (time_to_growth - time_assigned - self.threshold).max(0.0);

        if excess_time <= 0.0 && shortfall_time <= 0.0 {
            return None;
        }

        Some(BookingRecord {
            student_id: student_id.to_string(),
            skill_id: skill_id.to_string(),
            excess_time,
            shortfall_time,
            assignments: assignment.manifest.clone(),
            time_assigned,
            time_to_growth,
        })
    }
}

impl std::fmt::Debug for BookingCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingCalculator")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}
