use std::collections::BTreeSet;
use std::sync::Arc;

use super::common::*;

use crate::config::AutoFixConfig;
use crate::workflows::autofix::allocation::SkillSlice;
use crate::workflows::autofix::collaborators::{
    CanonicalIds, Collaborators, IdNormalizer, StandardTimeTable,
};
use crate::workflows::autofix::domain::{
    AdjustmentDirection, Assignment, ContentCategory, Lesson, ManifestEntry, ResourceMetadata,
    ResourceType, SkillRef, SkillResources, SKILL_TUTOR_PLACEHOLDER_ID,
};
use crate::workflows::autofix::engine::{AutoFixEngine, AutoFixRequest};
use crate::workflows::autofix::merge::{CrossSkillMerge, StudentManifest};
use crate::workflows::autofix::processor::SkillProcessor;

fn engine() -> AutoFixEngine {
    AutoFixEngine::new(Collaborators::standard(), AutoFixConfig::default())
}

fn processor() -> SkillProcessor {
    SkillProcessor::new(Collaborators::standard(), AutoFixConfig::default())
}

fn stories(entries: &[ManifestEntry]) -> Vec<&str> {
    entries.iter().map(|entry| entry.story_id.as_str()).collect()
}

fn skill_view(student: &StudentManifest, skill_id: &str) -> BTreeSet<(String, String)> {
    student
        .entries_for(skill_id)
        .map(|entry| (entry.story_id.clone(), entry.activity_type.clone()))
        .collect()
}

#[test]
fn overbooked_student_sheds_teacher_resource_first() {
    let mut lesson = lesson();
    lesson.student_assignments = vec![Assignment {
        entity_id: "stu-1".to_string(),
        manifest: vec![entry("story-t1", "tutor", &["S1"])],
        resources: Some(vec!["tr-1".to_string()]),
        resource_metadata: vec![ResourceMetadata {
            resource_unique_id: "tr-1".to_string(),
            skills: vec!["S1".to_string()],
        }],
        ..Assignment::default()
    }];
    lesson.skills[0].time_to_master = Some(10.0);
    assign_time(&mut lesson, "S1", "stu-1", 20.0);

    let adjustment = processor()
        .process(&lesson, &groupings(), "stu-1", "S1", AdjustmentDirection::Remove, &[3])
        .expect("stu-1 is overbooked");

    assert_eq!(adjustment.minutes_targeted, 6.0);
    assert_eq!(adjustment.changes.len(), 1);
    assert_eq!(adjustment.changes[0].resource_id, "tr-1");
    assert!(adjustment.slice.teacher_resources.is_empty());
    assert_eq!(stories(&adjustment.slice.manifest), vec!["story-t1"]);
}

fn skill_tutor(resource_id: &str, skill_id: &str) -> ManifestEntry {
    ManifestEntry {
        story_id: SKILL_TUTOR_PLACEHOLDER_ID.to_string(),
        activity_type: "tutor".to_string(),
        content_tags: Some(vec![
            format!("resourceUniqueId-{resource_id}"),
            "resourceType-skillTutor".to_string(),
        ]),
        skills: vec![SkillRef::new(skill_id)],
    }
}

#[test]
fn removing_one_of_two_skill_tutors_reaches_the_merged_manifest() {
    let mut lesson = lesson();
    lesson.student_assignments = vec![Assignment {
        entity_id: "stu-1".to_string(),
        manifest: vec![skill_tutor("st-a", "S1"), skill_tutor("st-b", "S1")],
        ..Assignment::default()
    }];
    assign_time(&mut lesson, "S1", "stu-1", 25.0);

    let plan = engine().plan(
        &lesson,
        &groupings(),
        &AutoFixRequest {
            overbooked_student_ids: vec!["stu-1".to_string()],
            ..AutoFixRequest::default()
        },
    );

    let removal = plan
        .adjustments
        .iter()
        .find(|adjustment| adjustment.student_id == "stu-1")
        .expect("stu-1 adjusted");
    assert_eq!(removal.changes.len(), 1);
    assert_eq!(removal.changes[0].resource_id, "st-a");
    assert_eq!(removal.changes[0].minutes, 5.0);
    assert_eq!(removal.slice.manifest.len(), 1);

    let stu_1 = plan.manifest_for("stu-1").expect("stu-1 merged");
    let remaining: Vec<Option<&str>> = stu_1
        .entries_for("S1")
        .map(ManifestEntry::tagged_resource_id)
        .collect();
    assert_eq!(remaining, vec![Some("st-b")]);
}

#[test]
fn overbooked_removal_walks_priority_until_covered() {
    let plan = engine().plan(&lesson(), &groupings(), &request());

    let removal = plan
        .adjustments
        .iter()
        .find(|adjustment| adjustment.direction == AdjustmentDirection::Remove)
        .expect("stu-1 adjusted");
    let removed: Vec<&str> = removal
        .changes
        .iter()
        .map(|change| change.resource_id.as_str())
        .collect();

    assert_eq!(removal.minutes_targeted, 16.0);
    assert_eq!(removed, vec!["tr-1", "story-t1", "story-x1"]);
    assert_eq!(removal.residual(), 0.0);

    let stu_1 = plan.manifest_for("stu-1").expect("stu-1 merged");
    assert_eq!(stories(&stu_1.manifest), vec!["story-m1", "story-sh", "story-e2"]);
    assert!(stu_1.teacher_resources.is_empty());
    assert!(stu_1.resource_metadata.is_empty());
}

#[test]
fn underbooked_student_skips_duplicate_catalog_entries() {
    let plan = engine().plan(&lesson(), &groupings(), &request());

    let stu_2 = plan.manifest_for("stu-2").expect("stu-2 merged");
    let c1_copies = stu_2
        .manifest
        .iter()
        .filter(|entry| entry.story_id.eq_ignore_ascii_case("story-c1"))
        .count();
    assert_eq!(c1_copies, 1);
    assert_eq!(
        stories(&stu_2.manifest),
        vec!["story-c1", "story-c2", "story-ml-new", "story-tu-new"]
    );

    let addition = plan
        .adjustments
        .iter()
        .find(|adjustment| adjustment.student_id == "stu-2")
        .expect("stu-2 adjusted");
    assert_eq!(addition.direction, AdjustmentDirection::Add);
    assert_eq!(addition.minutes_applied, 15.0);
}

#[test]
fn catalog_listing_the_same_story_twice_attaches_it_once() {
    let mut lesson = lesson();
    lesson.skill_resources = vec![SkillResources {
        skill_id: "S1".to_string(),
        resources: vec![
            resource("ml-a", "microLesson", &["story-twin"]),
            resource("ml-b", "microLesson", &["{STORY-TWIN}"]),
        ],
    }];

    let adjustment = processor()
        .process(&lesson, &groupings(), "stu-2", "S1", AdjustmentDirection::Add, &[3])
        .expect("stu-2 is underbooked");

    let twins = adjustment
        .slice
        .manifest
        .iter()
        .filter(|entry| CanonicalIds.same(&entry.story_id, "story-twin"))
        .count();
    assert_eq!(twins, 1);
    assert_eq!(adjustment.changes.len(), 1);
}

#[test]
fn teacher_assigned_skill_is_left_alone() {
    let mut lesson = lesson();
    lesson.student_assignments[0].manifest[0]
        .content_tags
        .get_or_insert_with(Vec::new)
        .push("S1-TEACHER_ASSIGNED".to_string());
    let original = lesson.student_assignments[0].clone();

    let plan = engine().plan(&lesson, &groupings(), &request());

    assert!(plan
        .adjustments
        .iter()
        .all(|adjustment| adjustment.student_id != "stu-1"));
    assert!(plan.manifest_for("stu-1").is_none());
    assert_eq!(plan.overbooked_adjusted, 0);
    assert_eq!(lesson.student_assignments[0], original);
}

#[test]
fn oversized_resource_is_added_as_last_resort() {
    let mut lesson = lesson();
    assign_time(&mut lesson, "S1", "stu-2", 11.0);
    lesson.skill_resources = vec![SkillResources {
        skill_id: "S1".to_string(),
        resources: vec![resource("big-set", "textSet", &["story-b1", "story-b2"])],
    }];
    let collaborators = Collaborators::standard()
        .with_time_costs(StandardTimeTable::default().with_minutes(ResourceType::TextSet, 9.0));
    let processor = SkillProcessor::new(collaborators, AutoFixConfig::default());

    let adjustment = processor
        .process(&lesson, &groupings(), "stu-2", "S1", AdjustmentDirection::Add, &[3])
        .expect("stu-2 is underbooked");

    assert_eq!(adjustment.minutes_targeted, 5.0);
    assert_eq!(adjustment.minutes_applied, 18.0);
    assert_eq!(adjustment.residual(), 0.0);
    assert_eq!(
        stories(&adjustment.slice.manifest),
        vec!["story-c1", "story-b1", "story-b2"]
    );
}

#[test]
fn merge_outcome_does_not_depend_on_skill_order() {
    let lesson = lesson();
    let assignment = lesson.assignment_for("stu-1").expect("stu-1 assignment");

    let mut s1 = SkillSlice::from_assignment(assignment, "S1");
    s1.take_entry_in(ContentCategory::TutorAndSupports);
    s1.detach_teacher_resource(&CanonicalIds);
    let mut s2 = SkillSlice::from_assignment(assignment, "S2");
    s2.attach_entries(vec![entry("story-new-2", "microLesson", &[])]);
    s2.attach_teacher_resource(&CanonicalIds, "tr-9");

    let skills = vec!["S1".to_string(), "S2".to_string()];
    let mut forward = CrossSkillMerge::new(Arc::new(CanonicalIds), skills.clone());
    forward.apply("stu-1", Some(assignment), &s1);
    forward.apply("stu-1", Some(assignment), &s2);
    let mut backward = CrossSkillMerge::new(Arc::new(CanonicalIds), skills);
    backward.apply("stu-1", Some(assignment), &s2);
    backward.apply("stu-1", Some(assignment), &s1);

    let forward = forward.get("stu-1").expect("forward merged");
    let backward = backward.get("stu-1").expect("backward merged");
    for skill_id in ["S1", "S2"] {
        assert_eq!(skill_view(forward, skill_id), skill_view(backward, skill_id));
        let mut left = forward.teacher_resources_for(skill_id);
        let mut right = backward.teacher_resources_for(skill_id);
        left.sort_unstable();
        right.sort_unstable();
        assert_eq!(left, right);
    }
    assert!(forward.is_consistent(&CanonicalIds));
    assert!(backward.is_consistent(&CanonicalIds));
}

#[test]
fn merged_manifests_keep_metadata_in_lockstep() {
    let mut lesson = lesson();
    lesson.student_assignments[0].resources =
        Some(vec!["tr-1".to_string(), "tr-shared".to_string()]);
    lesson.student_assignments[0]
        .resource_metadata
        .push(ResourceMetadata {
            resource_unique_id: "tr-shared".to_string(),
            skills: vec!["S1".to_string(), "S2".to_string()],
        });

    let plan = engine().plan(&lesson, &groupings(), &request());

    for student in &plan.manifests {
        assert!(
            student.is_consistent(&CanonicalIds),
            "inconsistent metadata for {}",
            student.student_id
        );
    }
    let stu_1 = plan.manifest_for("stu-1").expect("stu-1 merged");
    assert_eq!(stu_1.teacher_resources_for("S2"), vec!["tr-shared"]);
}

#[test]
fn balanced_slice_stays_balanced_after_removal() {
    let mut lesson = lesson();
    lesson.student_assignments[0].manifest = vec![
        entry("story-m1", "microLesson", &["S1"]),
        entry("story-m2", "microLesson", &["S1"]),
        entry("story-m3", "microLesson", &["S1"]),
        entry("story-t1", "tutor", &["S1"]),
    ];
    lesson.student_assignments[0].resources = Some(Vec::new());
    lesson.student_assignments[0].resource_metadata.clear();
    assign_time(&mut lesson, "S1", "stu-1", 34.0);

    let before = SkillSlice::from_assignment(&lesson.student_assignments[0], "S1").category_counts();
    assert!(!before.is_balanced());

    let adjustment = processor()
        .process(&lesson, &groupings(), "stu-1", "S1", AdjustmentDirection::Remove, &[3])
        .expect("stu-1 is overbooked");

    assert!(adjustment.slice.category_counts().is_balanced());
    assert_eq!(adjustment.changes[0].resource_id, "story-m1");
}

#[test]
fn exactly_threshold_over_target_is_left_alone() {
    let mut lesson = lesson();
    assign_time(&mut lesson, "S1", "stu-1", 24.0);

    let plan = engine().plan(
        &lesson,
        &groupings(),
        &AutoFixRequest {
            overbooked_student_ids: vec!["stu-1".to_string()],
            ..AutoFixRequest::default()
        },
    );

    assert!(plan.is_empty());
}

#[test]
fn missing_lesson_data_yields_empty_plan() {
    let plan = engine().plan(&Lesson::default(), &[], &request());
    assert!(plan.is_empty());
    assert!(plan.adjustments.is_empty());
}
