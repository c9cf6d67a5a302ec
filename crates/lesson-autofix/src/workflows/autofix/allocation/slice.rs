use serde::Serialize;

use super::balance::CategoryCounts;
use crate::workflows::autofix::collaborators::IdNormalizer;
use crate::workflows::autofix::domain::{
    Assignment, ContentCategory, ManifestEntry, ResourceMetadata, SkillRef,
};
use crate::workflows::autofix::normalizer::normalize_manifest;

/// Entries match on story id and activity type.
///
/// Skill-tutor placeholders all share one story id, so they also have to name the same
/// tutor resource in their `resourceUniqueId-` tag.
pub fn same_entry(ids: &dyn IdNormalizer, left: &ManifestEntry, right: &ManifestEntry) -> bool {
    if left.activity_type != right.activity_type || !ids.same(&left.story_id, &right.story_id) {
        return false;
    }
    if !left.is_skill_tutor_placeholder() {
        return true;
    }
    match (left.tagged_resource_id(), right.tagged_resource_id()) {
        (Some(a), Some(b)) => ids.same(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// The part of one student's assignment that serves a single skill.
///
/// Allocation only ever edits a slice, never the full assignment, so a pass for one
/// skill cannot disturb entries or teacher resources that serve other skills.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSlice {
    pub skill_id: String,
    pub manifest: Vec<ManifestEntry>,
    pub teacher_resources: Vec<String>,
    /// Metadata for `teacher_resources`, keeping every skill each resource serves.
    pub resource_metadata: Vec<ResourceMetadata>,
}

impl SkillSlice {
    pub fn from_assignment(assignment: &Assignment, skill_id: &str) -> Self {
        let manifest = normalize_manifest(&assignment.manifest)
            .into_iter()
            .filter(|entry| entry.serves(skill_id))
            .collect();

        let (teacher_resources, resource_metadata) = if assignment.resource_metadata.is_empty() {
            // Assignments saved before metadata existed: every resource counts for this skill.
            let ids = assignment.teacher_resources().to_vec();
            let metadata = ids
                .iter()
                .map(|id| ResourceMetadata {
                    resource_unique_id: id.clone(),
                    skills: vec![skill_id.to_string()],
                })
                .collect();
            (ids, metadata)
        } else {
            let metadata: Vec<ResourceMetadata> = assignment
                .resource_metadata
                .iter()
                .filter(|meta| meta.skills.iter().any(|skill| skill == skill_id))
                .cloned()
                .collect();
            let ids = metadata
                .iter()
                .map(|meta| meta.resource_unique_id.clone())
                .collect();
            (ids, metadata)
        };

        Self {
            skill_id: skill_id.to_string(),
            manifest,
            teacher_resources,
            resource_metadata,
        }
    }

    pub fn category_counts(&self) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        counts.add(ContentCategory::TeacherResource, self.teacher_resources.len());

        for entry in &self.manifest {
            match entry.resource_type().map(|kind| kind.category()) {
                Some(ContentCategory::TeacherResource) | None => {}
                Some(category) => counts.add(category, 1),
            }
        }

        counts
    }

    pub fn contains_teacher_resource(&self, ids: &dyn IdNormalizer, resource_id: &str) -> bool {
        self.teacher_resources
            .iter()
            .any(|existing| ids.same(existing, resource_id))
    }

    /// Whether the same entry (see [`same_entry`]) already serves this skill.
    pub fn contains_entry(&self, ids: &dyn IdNormalizer, entry: &ManifestEntry) -> bool {
        self.manifest
            .iter()
            .any(|existing| same_entry(ids, existing, entry))
    }

    /// Drops the first manifest entry whose type falls in `category`, returning it.
    pub fn take_entry_in(&mut self, category: ContentCategory) -> Option<ManifestEntry> {
        let position = self
            .manifest
            .iter()
            .position(|entry| category.contains(&entry.activity_type))?;
        Some(self.manifest.remove(position))
    }

    pub fn take_entry_of(&mut self, activity_type: &str) -> Option<ManifestEntry> {
        let position = self
            .manifest
            .iter()
            .position(|entry| entry.activity_type.eq_ignore_ascii_case(activity_type))?;
        Some(self.manifest.remove(position))
    }

    /// Detaches the first teacher resource from this skill.
    ///
    /// The resource leaves the slice together with its metadata; other skills it serves
    /// are untouched in the student's full assignment.
    pub fn detach_teacher_resource(&mut self, ids: &dyn IdNormalizer) -> Option<String> {
        if self.teacher_resources.is_empty() {
            return None;
        }
        let resource_id = self.teacher_resources.remove(0);
        self.resource_metadata
            .retain(|meta| !ids.same(&meta.resource_unique_id, &resource_id));
        Some(resource_id)
    }

    pub fn attach_teacher_resource(&mut self, ids: &dyn IdNormalizer, resource_id: &str) {
        if !self.contains_teacher_resource(ids, resource_id) {
            self.teacher_resources.push(resource_id.to_string());
        }

        match self
            .resource_metadata
            .iter_mut()
            .find(|meta| ids.same(&meta.resource_unique_id, resource_id))
        {
            Some(meta) => {
                if !meta.skills.iter().any(|skill| skill == &self.skill_id) {
                    meta.skills.push(self.skill_id.clone());
                }
            }
            None => self.resource_metadata.push(ResourceMetadata {
                resource_unique_id: resource_id.to_string(),
                skills: vec![self.skill_id.clone()],
            }),
        }
    }

    /// Appends entries, scoping their skill list to this slice's skill.
    pub fn attach_entries(&mut self, entries: Vec<ManifestEntry>) {
        let skill = SkillRef::new(self.skill_id.clone());
        for mut entry in entries {
            entry.skills = vec![skill.clone()];
            entry.content_tags.get_or_insert_with(Vec::new);
            self.manifest.push(entry);
        }
    }

    /// Every teacher resource has non-empty metadata for this skill, and vice versa.
    pub fn is_consistent(&self, ids: &dyn IdNormalizer) -> bool {
        let ids_covered = self.teacher_resources.iter().all(|id| {
            self.resource_metadata.iter().any(|meta| {
                ids.same(&meta.resource_unique_id, id)
                    && meta.skills.iter().any(|skill| skill == &self.skill_id)
            })
        });
        let metadata_covered = self.resource_metadata.iter().all(|meta| {
            !meta.skills.is_empty() && self.contains_teacher_resource(ids, &meta.resource_unique_id)
        });
        ids_covered && metadata_covered
    }
}
