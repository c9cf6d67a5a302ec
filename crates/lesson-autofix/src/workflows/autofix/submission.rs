use tracing::warn;

use super::domain::{Lesson, ManifestEntry};
use super::engine::AutoFixPlan;
use super::outbound::{
    AssignmentSubmitter, OriginalManifest, QueuedMutation, StudentSubmission, SubmissionError,
    SubmissionRequest,
};

/// Stable sort by the primary skill's position in `skills_order`.
///
/// Entries whose skill is missing from the ordering come after ordered ones, and
/// entries without any skill come last.
pub fn order_manifest_by_skills(manifest: &[ManifestEntry], skills_order: &[String]) -> Vec<ManifestEntry> {
    let mut ordered = manifest.to_vec();
    if skills_order.is_empty() {
        return ordered;
    }

    let rank = |entry: &ManifestEntry| -> (u8, usize) {
        match entry.primary_skill() {
            Some(skill_id) => match skills_order.iter().position(|id| id == skill_id) {
                Some(position) => (0, position),
                None => (1, 0),
            },
            None => (2, 0),
        }
    };

    ordered.sort_by_key(rank);
    ordered
}

/// Result of handing a plan to the assignment boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub mutation: Option<QueuedMutation>,
    /// Students accepted for processing; zero when nothing was queued.
    pub submitted: usize,
}

pub fn build_request(lesson: &Lesson, plan: &AutoFixPlan, skills_order: &[String]) -> SubmissionRequest {
    let students = plan
        .manifests
        .iter()
        .map(|student| StudentSubmission {
            student_id: student.student_id.clone(),
            manifest: order_manifest_by_skills(&student.manifest, skills_order),
            teacher_resources: student.teacher_resources.clone(),
            resource_metadata: student.resource_metadata.clone(),
        })
        .collect();

    let original_manifests = plan
        .manifests
        .iter()
        .filter_map(|student| {
            lesson
                .assignment_for(&student.student_id)
                .map(|assignment| OriginalManifest {
                    student_id: student.student_id.clone(),
                    manifest: assignment.manifest.clone(),
                })
        })
        .collect();

    SubmissionRequest {
        lesson_plan_id: lesson.lesson_plan_id.clone(),
        user_id: lesson.user_id.clone(),
        classroom_id: lesson.classroom_id.clone(),
        students,
        original_manifests,
        is_auto_fix: true,
    }
}

pub fn submit_plan<S>(
    submitter: &S,
    lesson: &Lesson,
    plan: &AutoFixPlan,
    skills_order: &[String],
) -> Result<SubmissionOutcome, SubmissionError>
where
    S: AssignmentSubmitter + ?Sized,
{
    if plan.is_empty() {
        return Ok(SubmissionOutcome {
            mutation: None,
            submitted: 0,
        });
    }

    let request = build_request(lesson, plan, skills_order);
    let students = request.students.len();

    match submitter.submit(request)? {
        Some(mutation) => Ok(SubmissionOutcome {
            mutation: Some(mutation),
            submitted: students,
        }),
        None => {
            warn!(
                lesson_plan_id = %lesson.lesson_plan_id,
                students,
                "assignment service queued nothing"
            );
            Ok(SubmissionOutcome {
                mutation: None,
                submitted: 0,
            })
        }
    }
}
