use tracing::trace;

use super::slice::SkillSlice;
use super::{Adjuster, Step};

/// Walks the direction's fixed type order, applying resources of each type until
/// `target` minutes are covered or the type runs out.
///
/// Returns the minutes applied.
pub fn allocate_by_priority<A: Adjuster>(slice: &mut SkillSlice, adjuster: &mut A, target: f64) -> f64 {
    let mut applied = 0.0;

    for kind in adjuster.direction().priority_order() {
        while applied < target {
            match adjuster.step_of_type(slice, kind) {
                Step::Applied(minutes) => {
                    trace!(skill_id = %slice.skill_id, resource_type = kind.as_str(), minutes, "allocated");
                    applied += minutes;
                }
                Step::Deferred => continue,
                Step::Exhausted => break,
            }
        }

        if applied >= target {
            break;
        }
    }

    applied
}

/// Applies the adjuster's fallback once when the priority walk left a gap.
pub fn last_resort<A: Adjuster>(slice: &mut SkillSlice, adjuster: &mut A, remaining: f64) -> f64 {
    if remaining <= 0.0 {
        return 0.0;
    }

    match adjuster.last_resort(slice) {
        Some(minutes) => {
            trace!(skill_id = %slice.skill_id, minutes, remaining, "last resort applied");
            minutes
        }
        None => 0.0,
    }
}
