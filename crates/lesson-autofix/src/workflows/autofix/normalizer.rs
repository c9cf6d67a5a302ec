use super::domain::{ManifestEntry, SkillRef};

/// Canonical form of a manifest: every entry carries content tags and bare skill ids.
///
/// Skill-tutor placeholders keep whatever tags they arrived with, since those tags are
/// the only record of the tutor resource behind the placeholder story id.
pub fn normalize_manifest(manifest: &[ManifestEntry]) -> Vec<ManifestEntry> {
    manifest.iter().map(normalize_entry).collect()
}

pub fn normalize_entry(entry: &ManifestEntry) -> ManifestEntry {
    let content_tags = if entry.is_skill_tutor_placeholder() {
        entry.content_tags.clone().unwrap_or_default()
    } else {
        entry.content_tags.clone().unwrap_or_else(|| {
            vec![
                format!("resourceUniqueId-{}", entry.story_id),
                format!("resourceType-{}", entry.activity_type),
            ]
        })
    };

    ManifestEntry {
        story_id: entry.story_id.clone(),
        activity_type: entry.activity_type.clone(),
        content_tags: Some(content_tags),
        skills: entry
            .skills
            .iter()
            .map(|skill| SkillRef::new(skill.skill_id.clone()))
            .collect(),
    }
}
