//! Lookups the allocation engine consumes without owning.
//!
//! Each trait mirrors a contract the surrounding product already provides
//! (time tables, the mastery time balance, catalog queries). The standard
//! implementations below back the CLI, the HTTP host, and the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::domain::{
    LessonSkill, ManifestEntry, MasteryGroup, Resource, ResourceType, SkillRef, SkillResources,
    Student, SKILL_TUTOR_PLACEHOLDER_ID,
};

/// Grade-adjusted minutes for one unit of a resource type.
pub trait GradeTimeLookup: Send + Sync {
    fn minutes_for(&self, resource_type: &str, grades: &[u8], skill_id: &str) -> f64;
}

/// Target instructional time for a student given the skill and mastery group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeToGrowth {
    Minutes(f64),
    /// Rendered as `--` in the planner; the student cannot be evaluated.
    Unavailable,
}

pub trait TimeBalance: Send + Sync {
    fn time_to_growth(
        &self,
        time_to_master: f64,
        time_assigned: f64,
        group: MasteryGroup,
    ) -> TimeToGrowth;
}

/// Expands a catalog resource into the manifest entries attached for one skill.
pub trait ManifestExpander: Send + Sync {
    fn entries_for(&self, resource: &Resource, skill_id: &str) -> Vec<ManifestEntry>;
}

/// Descriptor handed to the resource catalog.
///
/// `LessonResourceCatalog` only reads `skill_id` and `skill_resources`. The lesson name,
/// curriculum and focus skills are there for remote catalogs that search by lesson context.
#[derive(Debug, Clone)]
pub struct SkillQuery<'a> {
    pub skill_id: &'a str,
    pub lesson_name: &'a str,
    pub curriculum_id: &'a str,
    pub focus_skills: Vec<&'a LessonSkill>,
    pub skill_resources: &'a [SkillResources],
}

pub trait ResourceCatalog: Send + Sync {
    fn resources_for(&self, query: &SkillQuery<'_>) -> Vec<Resource>;
}

/// Canonical form used whenever two identifiers are compared.
pub trait IdNormalizer: Send + Sync {
    fn normalize(&self, id: &str) -> String;

    fn same(&self, left: &str, right: &str) -> bool {
        self.normalize(left) == self.normalize(right)
    }
}

/// Bundle of lookups shared by every component of one auto-fix run.
#[derive(Clone)]
pub struct Collaborators {
    pub time_costs: Arc<dyn GradeTimeLookup>,
    pub time_balance: Arc<dyn TimeBalance>,
    pub expander: Arc<dyn ManifestExpander>,
    pub catalog: Arc<dyn ResourceCatalog>,
    pub ids: Arc<dyn IdNormalizer>,
}

impl Collaborators {
    pub fn standard() -> Self {
        Self {
            time_costs: Arc::new(StandardTimeTable::default()),
            time_balance: Arc::new(MasteryTimeBalance),
            expander: Arc::new(StandardManifestExpander),
            catalog: Arc::new(LessonResourceCatalog),
            ids: Arc::new(CanonicalIds),
        }
    }

    pub fn with_time_costs(mut self, time_costs: impl GradeTimeLookup + 'static) -> Self {
        self.time_costs = Arc::new(time_costs);
        self
    }

    pub fn with_time_balance(mut self, time_balance: impl TimeBalance + 'static) -> Self {
        self.time_balance = Arc::new(time_balance);
        self
    }

    pub fn with_catalog(mut self, catalog: impl ResourceCatalog + 'static) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Cost of attaching or detaching a resource: per-unit minutes times its story count.
    pub fn resource_cost(&self, resource: &Resource, grades: &[u8], skill_id: &str) -> f64 {
        self.time_costs
            .minutes_for(&resource.resource_type, grades, skill_id)
            * resource.story_count() as f64
    }

    pub fn entry_cost(&self, entry: &ManifestEntry, grades: &[u8], skill_id: &str) -> f64 {
        self.time_costs
            .minutes_for(&entry.activity_type, grades, skill_id)
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Per-type minutes with optional overrides for specific grades.
#[derive(Debug, Clone)]
pub struct StandardTimeTable {
    base: HashMap<ResourceType, f64>,
    by_grade: BTreeMap<(u8, ResourceType), f64>,
}

impl Default for StandardTimeTable {
    fn default() -> Self {
        let base = HashMap::from([
            (ResourceType::MicroLesson, 10.0),
            (ResourceType::IstationLegacyActivity, 10.0),
            (ResourceType::Tutor, 5.0),
            (ResourceType::SkillTutor, 5.0),
            (ResourceType::Erss, 8.0),
            (ResourceType::TextSet, 12.0),
            (ResourceType::TeacherResource, 10.0),
        ]);
        Self {
            base,
            by_grade: BTreeMap::new(),
        }
    }
}

impl StandardTimeTable {
    pub fn with_minutes(mut self, resource_type: ResourceType, minutes: f64) -> Self {
        self.base.insert(resource_type, minutes);
        self
    }

    pub fn with_grade_minutes(mut self, grade: u8, resource_type: ResourceType, minutes: f64) -> Self {
        self.by_grade.insert((grade, resource_type), minutes);
        self
    }
}

impl GradeTimeLookup for StandardTimeTable {
    fn minutes_for(&self, resource_type: &str, grades: &[u8], _skill_id: &str) -> f64 {
        let Some(kind) = ResourceType::parse(resource_type) else {
            return 0.0;
        };

        grades
            .iter()
            .find_map(|grade| self.by_grade.get(&(*grade, kind)))
            .or_else(|| self.base.get(&kind))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Scales `timeToMaster` by how far along the mastery group is.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasteryTimeBalance;

impl TimeBalance for MasteryTimeBalance {
    fn time_to_growth(
        &self,
        time_to_master: f64,
        _time_assigned: f64,
        group: MasteryGroup,
    ) -> TimeToGrowth {
        if time_to_master <= 0.0 {
            return TimeToGrowth::Unavailable;
        }

        let factor = match group {
            MasteryGroup::NoData => return TimeToGrowth::Unavailable,
            MasteryGroup::NotDeveloped => 1.0,
            MasteryGroup::Developing => 0.75,
            MasteryGroup::LikelyMastered => 0.5,
        };

        TimeToGrowth::Minutes(time_to_master * factor)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardManifestExpander;

impl ManifestExpander for StandardManifestExpander {
    fn entries_for(&self, resource: &Resource, skill_id: &str) -> Vec<ManifestEntry> {
        match resource.kind() {
            Some(ResourceType::TeacherResource) => Vec::new(),
            Some(ResourceType::SkillTutor) => vec![ManifestEntry {
                story_id: SKILL_TUTOR_PLACEHOLDER_ID.to_string(),
                activity_type: ResourceType::Tutor.as_str().to_string(),
                content_tags: Some(vec![
                    format!("resourceUniqueId-{}", resource.resource_unique_id),
                    format!("resourceType-{}", ResourceType::SkillTutor.as_str()),
                ]),
                skills: vec![SkillRef::new(skill_id)],
            }],
            _ => {
                let story_ids: Vec<&str> = if resource.story_ids.is_empty() {
                    vec![resource.resource_unique_id.as_str()]
                } else {
                    resource.story_ids.iter().map(String::as_str).collect()
                };

                story_ids
                    .into_iter()
                    .map(|story_id| ManifestEntry {
                        story_id: story_id.to_string(),
                        activity_type: resource.resource_type.clone(),
                        content_tags: Some(vec![
                            format!("resourceUniqueId-{}", resource.resource_unique_id),
                            format!("resourceType-{}", resource.resource_type),
                        ]),
                        skills: vec![SkillRef::new(skill_id)],
                    })
                    .collect()
            }
        }
    }
}

/// Catalog backed by the resources embedded in the lesson snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct LessonResourceCatalog;

impl ResourceCatalog for LessonResourceCatalog {
    fn resources_for(&self, query: &SkillQuery<'_>) -> Vec<Resource> {
        query
            .skill_resources
            .iter()
            .filter(|entry| entry.skill_id == query.skill_id)
            .flat_map(|entry| entry.resources.iter().cloned())
            .collect()
    }
}

/// Treats ids differing only in case, hyphenation, or braces as equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalIds;

impl IdNormalizer for CanonicalIds {
    fn normalize(&self, id: &str) -> String {
        id.trim()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .chars()
            .filter(|ch| *ch != '-')
            .flat_map(char::to_lowercase)
            .collect()
    }
}

/// Most common grade on the roster, ties going to the lower grade.
pub fn most_common_grade(students: &[Student]) -> Vec<u8> {
    let mut tally: BTreeMap<u8, usize> = BTreeMap::new();
    for student in students {
        *tally.entry(student.grade).or_default() += 1;
    }

    let mut best: Option<(u8, usize)> = None;
    for (grade, count) in tally {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((grade, count));
        }
    }

    best.map(|(grade, _)| vec![grade]).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, grade: u8) -> Student {
        Student {
            id: id.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            grade,
        }
    }

    fn resource(id: &str, kind: &str, stories: &[&str]) -> Resource {
        Resource {
            resource_unique_id: id.to_string(),
            resource_type: kind.to_string(),
            story_ids: stories.iter().map(|s| s.to_string()).collect(),
            tags: Vec::new(),
            title: String::new(),
            shared_skills: Vec::new(),
        }
    }

    #[test]
    fn most_common_grade_prefers_lower_grade_on_ties() {
        let roster = vec![student("a", 3), student("b", 2), student("c", 3), student("d", 2)];
        assert_eq!(most_common_grade(&roster), vec![2]);

        let roster = vec![student("a", 4), student("b", 4), student("c", 1)];
        assert_eq!(most_common_grade(&roster), vec![4]);

        assert!(most_common_grade(&[]).is_empty());
    }

    #[test]
    fn time_table_applies_grade_overrides() {
        let table = StandardTimeTable::default().with_grade_minutes(1, ResourceType::Tutor, 7.0);
        assert_eq!(table.minutes_for("tutor", &[1], "S1"), 7.0);
        assert_eq!(table.minutes_for("Tutor", &[3], "S1"), 5.0);
        assert_eq!(table.minutes_for("tutor", &[], "S1"), 5.0);
        assert_eq!(table.minutes_for("assessment", &[1], "S1"), 0.0);
    }

    #[test]
    fn mastery_balance_marks_no_data_unavailable() {
        let balance = MasteryTimeBalance;
        assert_eq!(
            balance.time_to_growth(40.0, 0.0, MasteryGroup::NotDeveloped),
            TimeToGrowth::Minutes(40.0)
        );
        assert_eq!(
            balance.time_to_growth(40.0, 0.0, MasteryGroup::LikelyMastered),
            TimeToGrowth::Minutes(20.0)
        );
        assert_eq!(
            balance.time_to_growth(40.0, 0.0, MasteryGroup::NoData),
            TimeToGrowth::Unavailable
        );
        assert_eq!(
            balance.time_to_growth(0.0, 0.0, MasteryGroup::Developing),
            TimeToGrowth::Unavailable
        );
    }

    #[test]
    fn expander_emits_placeholder_for_skill_tutors() {
        let entries =
            StandardManifestExpander.entries_for(&resource("st-1", "skillTutor", &[]), "S1");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_skill_tutor_placeholder());
        assert!(entries[0].has_tag("resourceType-skillTutor"));
        assert!(entries[0].has_tag("resourceUniqueId-st-1"));
    }

    #[test]
    fn expander_emits_one_entry_per_story() {
        let entries = StandardManifestExpander
            .entries_for(&resource("ts-1", "textSet", &["story-a", "story-b"]), "S2");
        let stories: Vec<&str> = entries.iter().map(|e| e.story_id.as_str()).collect();
        assert_eq!(stories, vec!["story-a", "story-b"]);
        assert!(entries.iter().all(|e| e.serves("S2")));

        let teacher = StandardManifestExpander
            .entries_for(&resource("tr-1", "teacherResource", &[]), "S2");
        assert!(teacher.is_empty());
    }

    #[test]
    fn canonical_ids_ignore_case_and_format() {
        let ids = CanonicalIds;
        assert!(ids.same("{ABC-123}", "abc123"));
        assert!(!ids.same("abc-124", "abc123"));
    }

    #[test]
    fn resource_cost_scales_with_story_count() {
        let collaborators = Collaborators::standard();
        let single = resource("ml-1", "microLesson", &[]);
        let double = resource("ts-1", "textSet", &["a", "b"]);
        assert_eq!(collaborators.resource_cost(&single, &[2], "S1"), 10.0);
        assert_eq!(collaborators.resource_cost(&double, &[2], "S1"), 24.0);
    }
}
