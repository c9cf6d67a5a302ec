//! Time allocation for one student and skill.
//!
//! Both directions share one routine: a category-preferring balance pass, then a walk
//! of the direction's fixed type order, then the direction's fallback. What "one step"
//! means is supplied by an [`Adjuster`]: [`Remover`] sheds from the slice, [`Adder`]
//! draws from a pool of catalog candidates.

pub mod balance;
pub mod priority;
pub mod slice;

use serde::Serialize;

use super::collaborators::Collaborators;
use super::domain::{AdjustmentDirection, ContentCategory, ManifestEntry, Resource, ResourceType};

pub use balance::{are_categories_balanced, balance_categories, category_counts, CategoryCounts};
pub use priority::{allocate_by_priority, last_resort};
pub use slice::{same_entry, SkillSlice};

/// Result of asking an adjuster for one change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// A resource was attached or detached, worth this many minutes.
    Applied(f64),
    /// Only oversized candidates were found; they were set aside.
    Deferred,
    Exhausted,
}

/// A single attach or detach recorded during allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedChange {
    pub resource_type: String,
    pub resource_id: String,
    pub minutes: f64,
}

pub trait Adjuster {
    fn direction(&self) -> AdjustmentDirection;

    fn step_in_category(&mut self, slice: &mut SkillSlice, category: ContentCategory) -> Step;

    fn step_of_type(&mut self, slice: &mut SkillSlice, kind: ResourceType) -> Step;

    /// One final change allowed to overshoot, returning its minutes.
    fn last_resort(&mut self, _slice: &mut SkillSlice) -> Option<f64> {
        None
    }

    fn changes(&self) -> &[AppliedChange];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationOutcome {
    pub target: f64,
    pub applied: f64,
}

impl AllocationOutcome {
    /// Minutes of the gap left open.
    pub fn residual(&self) -> f64 {
        (self.target - self.applied).max(0.0)
    }
}

pub fn allocate<A: Adjuster>(slice: &mut SkillSlice, adjuster: &mut A, target: f64) -> AllocationOutcome {
    let mut applied = balance_categories(slice, adjuster, target);

    if applied < target {
        applied += allocate_by_priority(slice, adjuster, target - applied);
    }
    if applied < target {
        applied += last_resort(slice, adjuster, target - applied);
    }

    AllocationOutcome { target, applied }
}

/// Sheds entries and teacher resources from an overbooked slice.
pub struct Remover<'a> {
    collaborators: &'a Collaborators,
    grades: &'a [u8],
    changes: Vec<AppliedChange>,
}

impl<'a> Remover<'a> {
    pub fn new(collaborators: &'a Collaborators, grades: &'a [u8]) -> Self {
        Self {
            collaborators,
            grades,
            changes: Vec::new(),
        }
    }

    fn detach_teacher_resource(&mut self, slice: &mut SkillSlice) -> Step {
        let Some(resource_id) = slice.detach_teacher_resource(self.collaborators.ids.as_ref()) else {
            return Step::Exhausted;
        };

        let minutes = self.collaborators.time_costs.minutes_for(
            ResourceType::TeacherResource.as_str(),
            self.grades,
            &slice.skill_id,
        );
        self.changes.push(AppliedChange {
            resource_type: ResourceType::TeacherResource.as_str().to_string(),
            resource_id,
            minutes,
        });
        Step::Applied(minutes)
    }

    fn record_entry(&mut self, slice: &SkillSlice, entry: ManifestEntry) -> Step {
        let minutes = self
            .collaborators
            .entry_cost(&entry, self.grades, &slice.skill_id);
        // Placeholders are named by the tutor resource behind them.
        let tutor_id = entry
            .is_skill_tutor_placeholder()
            .then(|| entry.tagged_resource_id().map(str::to_string))
            .flatten();
        let resource_id = tutor_id.unwrap_or(entry.story_id);
        self.changes.push(AppliedChange {
            resource_type: entry.activity_type,
            resource_id,
            minutes,
        });
        Step::Applied(minutes)
    }
}

impl Adjuster for Remover<'_> {
    fn direction(&self) -> AdjustmentDirection {
        AdjustmentDirection::Remove
    }

    fn step_in_category(&mut self, slice: &mut SkillSlice, category: ContentCategory) -> Step {
        if let Some(entry) = slice.take_entry_in(category) {
            return self.record_entry(slice, entry);
        }

        if category == ContentCategory::TeacherResource {
            return self.detach_teacher_resource(slice);
        }

        Step::Exhausted
    }

    fn step_of_type(&mut self, slice: &mut SkillSlice, kind: ResourceType) -> Step {
        if kind == ResourceType::TeacherResource {
            return self.detach_teacher_resource(slice);
        }

        match slice.take_entry_of(kind.as_str()) {
            Some(entry) => self.record_entry(slice, entry),
            None => Step::Exhausted,
        }
    }

    fn changes(&self) -> &[AppliedChange] {
        &self.changes
    }
}

/// Catalog resource with its grade-adjusted cost for the target skill.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub resource: Resource,
    pub minutes: f64,
}

/// Fills an underbooked slice from a pool of catalog candidates.
///
/// A candidate leaves the pool once it is attached, found to duplicate something in
/// the slice, or deferred for exceeding the size cap. Deferred candidates only come
/// back through [`Adjuster::last_resort`].
pub struct Adder<'a> {
    collaborators: &'a Collaborators,
    pool: Vec<Candidate>,
    deferred: Vec<Candidate>,
    max_resource_minutes: f64,
    changes: Vec<AppliedChange>,
}

impl<'a> Adder<'a> {
    pub fn new(
        collaborators: &'a Collaborators,
        slice: &SkillSlice,
        resources: Vec<Resource>,
        grades: &[u8],
        max_resource_minutes: f64,
    ) -> Self {
        let mut adder = Self {
            collaborators,
            pool: Vec::new(),
            deferred: Vec::new(),
            max_resource_minutes,
            changes: Vec::new(),
        };

        adder.pool = resources
            .into_iter()
            .filter(|resource| adder.is_available(slice, resource))
            .map(|resource| Candidate {
                minutes: collaborators.resource_cost(&resource, grades, &slice.skill_id),
                resource,
            })
            .collect();
        adder
    }

    pub fn has_candidates(&self) -> bool {
        !self.pool.is_empty()
    }

    fn is_available(&self, slice: &SkillSlice, resource: &Resource) -> bool {
        let ids = self.collaborators.ids.as_ref();
        match resource.kind() {
            Some(ResourceType::TeacherResource) => {
                !slice.contains_teacher_resource(ids, &resource.resource_unique_id)
            }
            _ => {
                let entries = self.collaborators.expander.entries_for(resource, &slice.skill_id);
                !entries.is_empty() && !entries.iter().any(|entry| slice.contains_entry(ids, entry))
            }
        }
    }

    fn attach(&mut self, slice: &mut SkillSlice, candidate: &Candidate) -> bool {
        if !self.is_available(slice, &candidate.resource) {
            return false;
        }

        let resource = &candidate.resource;
        if resource.kind() == Some(ResourceType::TeacherResource) {
            slice.attach_teacher_resource(self.collaborators.ids.as_ref(), &resource.resource_unique_id);
        } else {
            let entries = self.collaborators.expander.entries_for(resource, &slice.skill_id);
            slice.attach_entries(entries);
        }

        self.changes.push(AppliedChange {
            resource_type: resource.resource_type.clone(),
            resource_id: resource.resource_unique_id.clone(),
            minutes: candidate.minutes,
        });
        true
    }

    fn draw(&mut self, slice: &mut SkillSlice, wanted: impl Fn(&Resource) -> bool) -> Step {
        let mut deferred_any = false;
        let mut index = 0;

        while index < self.pool.len() {
            if !wanted(&self.pool[index].resource) {
                index += 1;
                continue;
            }

            let candidate = self.pool.remove(index);
            if candidate.minutes > self.max_resource_minutes {
                self.deferred.push(candidate);
                deferred_any = true;
                continue;
            }

            if self.attach(slice, &candidate) {
                return Step::Applied(candidate.minutes);
            }
        }

        if deferred_any {
            Step::Deferred
        } else {
            Step::Exhausted
        }
    }
}

impl Adjuster for Adder<'_> {
    fn direction(&self) -> AdjustmentDirection {
        AdjustmentDirection::Add
    }

    fn step_in_category(&mut self, slice: &mut SkillSlice, category: ContentCategory) -> Step {
        self.draw(slice, |resource| category.contains(&resource.resource_type))
    }

    fn step_of_type(&mut self, slice: &mut SkillSlice, kind: ResourceType) -> Step {
        self.draw(slice, |resource| resource.kind() == Some(kind))
    }

    /// Attaches the largest deferred candidate, the earliest one on ties.
    fn last_resort(&mut self, slice: &mut SkillSlice) -> Option<f64> {
        while !self.deferred.is_empty() {
            let mut largest = 0;
            for (index, candidate) in self.deferred.iter().enumerate() {
                if candidate.minutes > self.deferred[largest].minutes {
                    largest = index;
                }
            }

            let candidate = self.deferred.remove(largest);
            if self.attach(slice, &candidate) {
                return Some(candidate.minutes);
            }
        }
        None
    }

    fn changes(&self) -> &[AppliedChange] {
        &self.changes
    }
}
