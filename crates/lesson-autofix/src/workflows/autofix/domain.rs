use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Reads an explicit `null` the same as an absent field.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Story id carried by skill-tutor manifest entries, which have no story of their own.
pub const SKILL_TUTOR_PLACEHOLDER_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Catalog resource types understood by the allocation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    TeacherResource,
    MicroLesson,
    IstationLegacyActivity,
    Tutor,
    SkillTutor,
    Erss,
    TextSet,
}

impl ResourceType {
    pub const fn all() -> [Self; 7] {
        [
            Self::TeacherResource,
            Self::MicroLesson,
            Self::IstationLegacyActivity,
            Self::Tutor,
            Self::SkillTutor,
            Self::Erss,
            Self::TextSet,
        ]
    }

    /// Case-insensitive parse of the raw activity/resource type strings found in snapshots.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(&lowered))
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TeacherResource => "teacherResource",
            Self::MicroLesson => "microLesson",
            Self::IstationLegacyActivity => "istationLegacyActivity",
            Self::Tutor => "tutor",
            Self::SkillTutor => "skillTutor",
            Self::Erss => "erss",
            Self::TextSet => "textSet",
        }
    }

    pub const fn category(self) -> ContentCategory {
        match self {
            Self::TeacherResource => ContentCategory::TeacherResource,
            Self::MicroLesson | Self::IstationLegacyActivity => {
                ContentCategory::MicroLessonAndLegacy
            }
            Self::Tutor | Self::SkillTutor | Self::Erss | Self::TextSet => {
                ContentCategory::TutorAndSupports
            }
        }
    }
}

/// Content buckets kept in balance for each student and skill.
///
/// Declaration order doubles as the tie-break order when two categories are
/// equally over- or under-represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentCategory {
    TeacherResource,
    MicroLessonAndLegacy,
    TutorAndSupports,
}

impl ContentCategory {
    pub const fn ordered() -> [Self; 3] {
        [
            Self::TeacherResource,
            Self::MicroLessonAndLegacy,
            Self::TutorAndSupports,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::TeacherResource => "Teacher Resources",
            Self::MicroLessonAndLegacy => "Micro-Lessons & Legacy Activities",
            Self::TutorAndSupports => "Tutoring & Supports",
        }
    }

    pub fn contains(self, raw_type: &str) -> bool {
        ResourceType::parse(raw_type).map(ResourceType::category) == Some(self)
    }
}

/// Whether an adjustment sheds or adds instructional time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Remove,
    Add,
}

impl AdjustmentDirection {
    /// Resource types in the order they are shed (remove) or filled (add).
    pub const fn priority_order(self) -> [ResourceType; 7] {
        match self {
            Self::Remove => [
                ResourceType::TeacherResource,
                ResourceType::IstationLegacyActivity,
                ResourceType::Tutor,
                ResourceType::SkillTutor,
                ResourceType::Erss,
                ResourceType::TextSet,
                ResourceType::MicroLesson,
            ],
            Self::Add => [
                ResourceType::MicroLesson,
                ResourceType::IstationLegacyActivity,
                ResourceType::Tutor,
                ResourceType::SkillTutor,
                ResourceType::Erss,
                ResourceType::TextSet,
                ResourceType::TeacherResource,
            ],
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Add => "add",
        }
    }
}

/// Mastery group a student falls into for one skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MasteryGroup {
    #[default]
    #[serde(rename = "no_data")]
    NoData,
    #[serde(rename = "undeveloped")]
    NotDeveloped,
    #[serde(rename = "developing")]
    Developing,
    #[serde(rename = "mastered")]
    LikelyMastered,
}

impl MasteryGroup {
    /// Key used by the lesson's time-assigned table.
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::NotDeveloped => "undeveloped",
            Self::Developing => "developing",
            Self::LikelyMastered => "mastered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillType {
    #[default]
    Focus,
    Prerequisite,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Student,
    Group,
    Class,
    #[default]
    #[serde(other)]
    Other,
}

/// Skill association carried by a manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRef {
    pub skill_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl SkillRef {
    pub fn new(skill_id: impl Into<String>) -> Self {
        Self {
            skill_id: skill_id.into(),
            display_name: None,
        }
    }
}

/// A resource as attached to one student's assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub story_id: String,
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<SkillRef>,
}

impl ManifestEntry {
    pub fn resource_type(&self) -> Option<ResourceType> {
        ResourceType::parse(&self.activity_type)
    }

    pub fn serves(&self, skill_id: &str) -> bool {
        self.skills.iter().any(|skill| skill.skill_id == skill_id)
    }

    pub fn primary_skill(&self) -> Option<&str> {
        self.skills.first().map(|skill| skill.skill_id.as_str())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.content_tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|candidate| candidate == tag))
    }

    pub fn is_skill_tutor_placeholder(&self) -> bool {
        self.story_id == SKILL_TUTOR_PLACEHOLDER_ID
            && self.resource_type() == Some(ResourceType::Tutor)
    }

    /// Id carried by the `resourceUniqueId-<id>` content tag.
    pub fn tagged_resource_id(&self) -> Option<&str> {
        self.content_tags
            .as_deref()?
            .iter()
            .find_map(|tag| tag.strip_prefix("resourceUniqueId-"))
    }
}

/// Teacher-resource bookkeeping kept beside the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub resource_unique_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<String>,
}

/// Assignment snapshot for a student or for the whole lesson.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub entity_id: String,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub manifest: Vec<ManifestEntry>,
    #[serde(default)]
    pub resources: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resource_metadata: Vec<ResourceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}

impl Assignment {
    pub fn teacher_resources(&self) -> &[String] {
        self.resources.as_deref().unwrap_or_default()
    }
}

/// Read-only catalog entry that may be attached to a student's manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub resource_unique_id: String,
    pub resource_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub story_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub shared_skills: Vec<String>,
}

impl Resource {
    pub fn kind(&self) -> Option<ResourceType> {
        ResourceType::parse(&self.resource_type)
    }

    pub fn story_count(&self) -> usize {
        self.story_ids.len().max(1)
    }

    /// First story id, falling back to the unique id for single-story resources.
    pub fn lead_story_id(&self) -> &str {
        self.story_ids
            .first()
            .map(String::as_str)
            .unwrap_or(&self.resource_unique_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillResources {
    pub skill_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSkill {
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub time_to_master: Option<f64>,
    #[serde(default)]
    pub skill_type: SkillType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub grade: u8,
}

/// Minutes already assigned, keyed by skill, then mastery group label, then student.
pub type TimeAssignedTable = BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>;

/// Snapshot of one lesson plan taken when the teacher confirms an auto-fix.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default)]
    pub lesson_plan_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub classroom_id: String,
    #[serde(default)]
    pub curriculum_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<LessonSkill>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub students: Vec<Student>,
    #[serde(default)]
    pub main_assignment: Option<Assignment>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub student_assignments: Vec<Assignment>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub time_assigned: TimeAssignedTable,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skill_resources: Vec<SkillResources>,
}

impl Lesson {
    pub fn skill(&self, skill_id: &str) -> Option<&LessonSkill> {
        self.skills
            .iter()
            .find(|skill| skill.skill_id.as_deref() == Some(skill_id))
    }

    /// Skill ids in lesson order, skipping skills without an id.
    pub fn skill_ids(&self) -> impl Iterator<Item = &str> {
        self.skills
            .iter()
            .filter_map(|skill| skill.skill_id.as_deref())
    }

    /// Focus skills, as passed to resource catalogs in [`SkillQuery`](super::collaborators::SkillQuery).
    pub fn focus_skills(&self) -> Vec<&LessonSkill> {
        self.skills
            .iter()
            .filter(|skill| skill.skill_type == SkillType::Focus)
            .collect()
    }

    /// The student's own assignment, if one was created for them.
    pub fn own_assignment(&self, student_id: &str) -> Option<&Assignment> {
        self.student_assignments
            .iter()
            .find(|assignment| assignment.entity_id == student_id)
    }

    /// The student's own assignment, falling back to the lesson's main assignment.
    pub fn assignment_for(&self, student_id: &str) -> Option<&Assignment> {
        self.own_assignment(student_id)
            .or(self.main_assignment.as_ref())
    }

    pub fn time_assigned_for(&self, skill_id: &str, group: MasteryGroup, student_id: &str) -> f64 {
        self.time_assigned
            .get(skill_id)
            .and_then(|groups| groups.get(group.label()))
            .and_then(|students| students.get(student_id))
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGroup {
    pub group_name: MasteryGroup,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub student_ids: Vec<String>,
}

/// Mastery grouping of the class for one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGrouping {
    pub skill_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub student_groups: Vec<StudentGroup>,
}

/// Group the student falls into for the skill; students missing from every group have no data.
pub fn mastery_group(groupings: &[SkillGrouping], skill_id: &str, student_id: &str) -> MasteryGroup {
    groupings
        .iter()
        .find(|grouping| grouping.skill_id == skill_id)
        .and_then(|grouping| {
            grouping
                .student_groups
                .iter()
                .find(|group| group.student_ids.iter().any(|id| id == student_id))
        })
        .map(|group| group.group_name)
        .unwrap_or_default()
}

/// Transient booking state for one student and skill outside the threshold buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub student_id: String,
    pub skill_id: String,
    pub excess_time: f64,
    pub shortfall_time: f64,
    pub assignments: Vec<ManifestEntry>,
    pub time_assigned: f64,
    pub time_to_growth: f64,
}

impl BookingRecord {
    pub fn direction(&self) -> AdjustmentDirection {
        if self.excess_time > 0.0 {
            AdjustmentDirection::Remove
        } else {
            AdjustmentDirection::Add
        }
    }

    /// Minutes the adjustment has to shed or fill.
    pub fn gap(&self) -> f64 {
        match self.direction() {
            AdjustmentDirection::Remove => self.excess_time,
            AdjustmentDirection::Add => self.shortfall_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_types_case_insensitively() {
        assert_eq!(
            ResourceType::parse("TeacherResource"),
            Some(ResourceType::TeacherResource)
        );
        assert_eq!(ResourceType::parse("textset"), Some(ResourceType::TextSet));
        assert_eq!(ResourceType::parse(" skillTutor "), Some(ResourceType::SkillTutor));
        assert_eq!(ResourceType::parse("assessment"), None);
    }

    #[test]
    fn categories_cover_every_resource_type() {
        assert!(ContentCategory::MicroLessonAndLegacy.contains("istationLegacyActivity"));
        assert!(ContentCategory::TutorAndSupports.contains("ERSS"));
        assert!(ContentCategory::TeacherResource.contains("teacherResource"));
        assert!(!ContentCategory::TutorAndSupports.contains("microLesson"));
        assert!(!ContentCategory::TutorAndSupports.contains("unknown"));
    }

    #[test]
    fn lesson_resolves_student_assignment_with_main_fallback() {
        let lesson = Lesson {
            main_assignment: Some(Assignment {
                entity_id: "class-1".to_string(),
                entity_type: EntityType::Class,
                ..Assignment::default()
            }),
            student_assignments: vec![Assignment {
                entity_id: "stu-1".to_string(),
                entity_type: EntityType::Student,
                ..Assignment::default()
            }],
            ..Lesson::default()
        };

        assert_eq!(
            lesson.assignment_for("stu-1").map(|a| a.entity_id.as_str()),
            Some("stu-1")
        );
        assert_eq!(
            lesson.assignment_for("stu-2").map(|a| a.entity_id.as_str()),
            Some("class-1")
        );
    }

    #[test]
    fn missing_collections_deserialize_as_empty() {
        let lesson: Lesson =
            serde_json::from_str(r#"{"lessonPlanId":"lp-1"}"#).expect("minimal lesson parses");
        assert!(lesson.skills.is_empty());
        assert!(lesson.students.is_empty());
        assert!(lesson.main_assignment.is_none());
        assert_eq!(lesson.skill_ids().count(), 0);
    }

    #[test]
    fn null_collections_deserialize_as_empty() {
        let lesson: Lesson = serde_json::from_str(
            r#"{
                "lessonPlanId": "lp-1",
                "skills": null,
                "students": null,
                "timeAssigned": null,
                "skillResources": [
                    { "skillId": "S1", "resources": [
                        { "resourceUniqueId": "ml-1", "resourceType": "microLesson", "storyIds": null, "tags": null }
                    ] }
                ],
                "studentAssignments": [
                    {
                        "entityId": "stu-1",
                        "manifest": [
                            { "storyId": "story-1", "activityType": "tutor", "contentTags": null, "skills": null }
                        ],
                        "resources": null,
                        "resourceMetadata": null
                    }
                ]
            }"#,
        )
        .expect("nulls read as empty");

        assert!(lesson.skills.is_empty());
        assert!(lesson.students.is_empty());
        assert!(lesson.time_assigned.is_empty());
        let resource = &lesson.skill_resources[0].resources[0];
        assert!(resource.story_ids.is_empty());
        assert_eq!(resource.story_count(), 1);
        let assignment = lesson.own_assignment("stu-1").expect("own assignment");
        assert!(assignment.manifest[0].skills.is_empty());
        assert!(assignment.resource_metadata.is_empty());
        assert!(assignment.teacher_resources().is_empty());

        let groupings: Vec<SkillGrouping> = serde_json::from_str(
            r#"[{ "skillId": "S1", "studentGroups": [{ "groupName": "developing", "studentIds": null }] }]"#,
        )
        .expect("null student ids read as empty");
        assert!(groupings[0].student_groups[0].student_ids.is_empty());
    }

    #[test]
    fn mastery_group_defaults_to_no_data() {
        let groupings = vec![SkillGrouping {
            skill_id: "S1".to_string(),
            student_groups: vec![StudentGroup {
                group_name: MasteryGroup::Developing,
                student_ids: vec!["stu-1".to_string()],
            }],
        }];

        assert_eq!(
            mastery_group(&groupings, "S1", "stu-1"),
            MasteryGroup::Developing
        );
        assert_eq!(mastery_group(&groupings, "S1", "stu-9"), MasteryGroup::NoData);
        assert_eq!(mastery_group(&groupings, "S2", "stu-1"), MasteryGroup::NoData);
    }
}
