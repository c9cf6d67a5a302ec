use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::allocation::{same_entry, SkillSlice};
use super::collaborators::IdNormalizer;
use super::domain::{Assignment, ManifestEntry, ResourceMetadata, SkillRef};
use super::normalizer::normalize_manifest;

/// Accumulated manifest for one student across every skill processed so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentManifest {
    pub student_id: String,
    pub manifest: Vec<ManifestEntry>,
    pub teacher_resources: Vec<String>,
    pub resource_metadata: Vec<ResourceMetadata>,
}

impl StudentManifest {
    /// Starts from the student's current assignment so untouched skills keep their entries.
    ///
    /// Teacher resources recorded without metadata are attributed to every lesson skill.
    pub fn seed(student_id: &str, assignment: Option<&Assignment>, lesson_skills: &[String]) -> Self {
        let Some(assignment) = assignment else {
            return Self {
                student_id: student_id.to_string(),
                manifest: Vec::new(),
                teacher_resources: Vec::new(),
                resource_metadata: Vec::new(),
            };
        };

        let teacher_resources = assignment.teacher_resources().to_vec();
        let resource_metadata = if assignment.resource_metadata.is_empty() {
            teacher_resources
                .iter()
                .map(|id| ResourceMetadata {
                    resource_unique_id: id.clone(),
                    skills: lesson_skills.to_vec(),
                })
                .collect()
        } else {
            assignment.resource_metadata.clone()
        };

        Self {
            student_id: student_id.to_string(),
            manifest: normalize_manifest(&assignment.manifest),
            teacher_resources,
            resource_metadata,
        }
    }

    /// Entries serving the skill, in manifest order.
    pub fn entries_for<'a>(&'a self, skill_id: &'a str) -> impl Iterator<Item = &'a ManifestEntry> + 'a {
        self.manifest.iter().filter(move |entry| entry.serves(skill_id))
    }

    pub fn teacher_resources_for(&self, skill_id: &str) -> Vec<&str> {
        self.resource_metadata
            .iter()
            .filter(|meta| meta.skills.iter().any(|skill| skill == skill_id))
            .map(|meta| meta.resource_unique_id.as_str())
            .collect()
    }

    /// Writes one skill's slice, touching only that skill's associations.
    fn apply(&mut self, ids: &dyn IdNormalizer, slice: &SkillSlice) {
        let skill_id = slice.skill_id.as_str();

        self.manifest.retain_mut(|entry| {
            if !entry.serves(skill_id) || slice.contains_entry(ids, entry) {
                return true;
            }
            entry.skills.retain(|skill| skill.skill_id != skill_id);
            !entry.skills.is_empty()
        });

        for incoming in &slice.manifest {
            let existing = self
                .manifest
                .iter_mut()
                .find(|entry| same_entry(ids, entry, incoming));
            match existing {
                Some(entry) => {
                    if !entry.serves(skill_id) {
                        entry.skills.push(SkillRef::new(skill_id));
                    }
                }
                None => {
                    let mut entry = incoming.clone();
                    entry.skills = vec![SkillRef::new(skill_id)];
                    self.manifest.push(entry);
                }
            }
        }

        for meta in &mut self.resource_metadata {
            let serves = meta.skills.iter().any(|skill| skill == skill_id);
            if serves && !slice.contains_teacher_resource(ids, &meta.resource_unique_id) {
                meta.skills.retain(|skill| skill != skill_id);
            }
        }
        let emptied: Vec<String> = self
            .resource_metadata
            .iter()
            .filter(|meta| meta.skills.is_empty())
            .map(|meta| meta.resource_unique_id.clone())
            .collect();
        self.resource_metadata.retain(|meta| !meta.skills.is_empty());
        self.teacher_resources
            .retain(|id| !emptied.iter().any(|gone| ids.same(gone, id)));

        for resource_id in &slice.teacher_resources {
            match self
                .resource_metadata
                .iter_mut()
                .find(|meta| ids.same(&meta.resource_unique_id, resource_id))
            {
                Some(meta) => {
                    if !meta.skills.iter().any(|skill| skill == skill_id) {
                        meta.skills.push(skill_id.to_string());
                    }
                }
                None => self.resource_metadata.push(ResourceMetadata {
                    resource_unique_id: resource_id.clone(),
                    skills: vec![skill_id.to_string()],
                }),
            }

            if !self.teacher_resources.iter().any(|id| ids.same(id, resource_id)) {
                self.teacher_resources.push(resource_id.clone());
            }
        }
    }

    /// Every listed teacher resource has non-empty metadata, and vice versa.
    pub fn is_consistent(&self, ids: &dyn IdNormalizer) -> bool {
        let listed = self.teacher_resources.iter().all(|id| {
            self.resource_metadata
                .iter()
                .any(|meta| ids.same(&meta.resource_unique_id, id) && !meta.skills.is_empty())
        });
        let recorded = self.resource_metadata.iter().all(|meta| {
            !meta.skills.is_empty()
                && self
                    .teacher_resources
                    .iter()
                    .any(|id| ids.same(id, &meta.resource_unique_id))
        });
        listed && recorded
    }
}

/// Per-student accumulators for one run, indexed by student id.
pub struct CrossSkillMerge {
    ids: Arc<dyn IdNormalizer>,
    lesson_skills: Vec<String>,
    students: Vec<StudentManifest>,
    index: HashMap<String, usize>,
}

impl CrossSkillMerge {
    pub fn new(ids: Arc<dyn IdNormalizer>, lesson_skills: Vec<String>) -> Self {
        Self {
            ids,
            lesson_skills,
            students: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Merges a skill slice into the student's accumulator, seeding it on first touch.
    pub fn apply(&mut self, student_id: &str, assignment: Option<&Assignment>, slice: &SkillSlice) {
        let slot = match self.index.get(student_id) {
            Some(slot) => *slot,
            None => {
                self.students
                    .push(StudentManifest::seed(student_id, assignment, &self.lesson_skills));
                let slot = self.students.len() - 1;
                self.index.insert(student_id.to_string(), slot);
                slot
            }
        };

        self.students[slot].apply(self.ids.as_ref(), slice);
    }

    pub fn get(&self, student_id: &str) -> Option<&StudentManifest> {
        self.index.get(student_id).map(|slot| &self.students[*slot])
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Accumulators in the order students were first touched.
    pub fn into_manifests(self) -> Vec<StudentManifest> {
        self.students
    }
}

impl std::fmt::Debug for CrossSkillMerge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossSkillMerge")
            .field("students", &self.students)
            .finish_non_exhaustive()
    }
}
