use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::config::AutoFixConfig;
use crate::workflows::autofix::collaborators::Collaborators;
use crate::workflows::autofix::domain::{
    Assignment, EntityType, Lesson, LessonSkill, ManifestEntry, MasteryGroup, Resource,
    ResourceMetadata, SkillGrouping, SkillRef, SkillResources, SkillType, Student, StudentGroup,
};
use crate::workflows::autofix::engine::AutoFixRequest;
use crate::workflows::autofix::outbound::{
    AssignmentSubmitter, AutoFixNotice, AutoFixNotifier, NotifyError, QueuedMutation,
    SubmissionError, SubmissionRequest,
};
use crate::workflows::autofix::{autofix_router, AutoFixService};

pub(super) const LESSON_ID: &str = "lp-100";

pub(super) fn entry(story: &str, activity: &str, skills: &[&str]) -> ManifestEntry {
    ManifestEntry {
        story_id: story.to_string(),
        activity_type: activity.to_string(),
        content_tags: Some(vec![
            format!("resourceUniqueId-{story}"),
            format!("resourceType-{activity}"),
        ]),
        skills: skills.iter().map(|skill| SkillRef::new(*skill)).collect(),
    }
}

pub(super) fn resource(id: &str, kind: &str, stories: &[&str]) -> Resource {
    Resource {
        resource_unique_id: id.to_string(),
        resource_type: kind.to_string(),
        story_ids: stories.iter().map(|story| story.to_string()).collect(),
        tags: Vec::new(),
        title: format!("{kind} {id}"),
        shared_skills: Vec::new(),
    }
}

fn skill(id: &str, time_to_master: f64) -> LessonSkill {
    LessonSkill {
        skill_id: Some(id.to_string()),
        display_name: format!("Skill {id}"),
        time_to_master: Some(time_to_master),
        skill_type: SkillType::Focus,
    }
}

fn student(id: &str, grade: u8) -> Student {
    Student {
        id: id.to_string(),
        first_name: format!("First {id}"),
        last_name: format!("Last {id}"),
        grade,
    }
}

/// Records `minutes` for the student under the skill's undeveloped group.
pub(super) fn assign_time(lesson: &mut Lesson, skill_id: &str, student_id: &str, minutes: f64) {
    lesson
        .time_assigned
        .entry(skill_id.to_string())
        .or_default()
        .entry(MasteryGroup::NotDeveloped.label().to_string())
        .or_default()
        .insert(student_id.to_string(), minutes);
}

/// Two skills with a 20 minute target; stu-1 is overbooked and stu-2 underbooked on S1.
pub(super) fn lesson() -> Lesson {
    let mut lesson = Lesson {
        lesson_plan_id: LESSON_ID.to_string(),
        name: "Week 12 phonics".to_string(),
        user_id: "teacher-7".to_string(),
        classroom_id: "class-3b".to_string(),
        curriculum_id: "curr-1".to_string(),
        skills: vec![skill("S1", 20.0), skill("S2", 20.0)],
        students: vec![student("stu-1", 3), student("stu-2", 3), student("stu-3", 4)],
        main_assignment: Some(Assignment {
            entity_id: "class-3b".to_string(),
            entity_type: EntityType::Class,
            manifest: vec![
                entry("story-c1", "microLesson", &["S1"]),
                entry("story-c2", "erss", &["S2"]),
            ],
            ..Assignment::default()
        }),
        student_assignments: vec![Assignment {
            entity_id: "stu-1".to_string(),
            entity_type: EntityType::Student,
            manifest: vec![
                entry("story-m1", "microLesson", &["S1"]),
                entry("story-t1", "tutor", &["S1"]),
                entry("story-x1", "textSet", &["S1"]),
                entry("story-sh", "microLesson", &["S1", "S2"]),
                entry("story-e2", "erss", &["S2"]),
            ],
            resources: Some(vec!["tr-1".to_string()]),
            resource_metadata: vec![ResourceMetadata {
                resource_unique_id: "tr-1".to_string(),
                skills: vec!["S1".to_string()],
            }],
            ..Assignment::default()
        }],
        time_assigned: BTreeMap::new(),
        skill_resources: vec![SkillResources {
            skill_id: "S1".to_string(),
            resources: vec![
                resource("ml-dup", "microLesson", &["STORY-C1"]),
                resource("ml-new", "microLesson", &["story-ml-new"]),
                resource("tu-new", "tutor", &["story-tu-new"]),
                resource("tr-new", "teacherResource", &[]),
            ],
        }],
    };

    assign_time(&mut lesson, "S1", "stu-1", 40.0);
    assign_time(&mut lesson, "S1", "stu-2", 5.0);
    assign_time(&mut lesson, "S1", "stu-3", 20.0);
    assign_time(&mut lesson, "S2", "stu-1", 22.0);
    assign_time(&mut lesson, "S2", "stu-2", 20.0);
    assign_time(&mut lesson, "S2", "stu-3", 20.0);
    lesson
}

pub(super) fn groupings() -> Vec<SkillGrouping> {
    ["S1", "S2"]
        .into_iter()
        .map(|skill_id| SkillGrouping {
            skill_id: skill_id.to_string(),
            student_groups: vec![StudentGroup {
                group_name: MasteryGroup::NotDeveloped,
                student_ids: vec![
                    "stu-1".to_string(),
                    "stu-2".to_string(),
                    "stu-3".to_string(),
                ],
            }],
        })
        .collect()
}

pub(super) fn request() -> AutoFixRequest {
    AutoFixRequest {
        overbooked_student_ids: vec!["stu-1".to_string()],
        underbooked_student_ids: vec!["stu-2".to_string()],
        skills_order: vec!["S2".to_string(), "S1".to_string()],
    }
}

pub(super) type TestService = AutoFixService<RecordingSubmitter, RecordingNotifier>;

pub(super) fn build_service_with(
    submitter: RecordingSubmitter,
) -> (TestService, Arc<RecordingSubmitter>, Arc<RecordingNotifier>) {
    let submitter = Arc::new(submitter);
    let notifier = Arc::new(RecordingNotifier::default());
    let service = AutoFixService::new(
        Collaborators::standard(),
        AutoFixConfig::default(),
        submitter.clone(),
        notifier.clone(),
    );
    (service, submitter, notifier)
}

pub(super) fn build_service() -> (TestService, Arc<RecordingSubmitter>, Arc<RecordingNotifier>) {
    build_service_with(RecordingSubmitter::default())
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    autofix_router(Arc::new(service))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) enum SubmitterMode {
    #[default]
    Queue,
    Decline,
    Fail,
}

#[derive(Default)]
pub(super) struct RecordingSubmitter {
    mode: SubmitterMode,
    requests: Mutex<Vec<SubmissionRequest>>,
}

impl RecordingSubmitter {
    pub(super) fn with_mode(mode: SubmitterMode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().expect("submitter mutex poisoned").clone()
    }
}

impl AssignmentSubmitter for RecordingSubmitter {
    fn submit(&self, request: SubmissionRequest) -> Result<Option<QueuedMutation>, SubmissionError> {
        let student_count = request.students.len();
        let mut guard = self.requests.lock().expect("submitter mutex poisoned");
        guard.push(request);

        match self.mode {
            SubmitterMode::Queue => Ok(Some(QueuedMutation {
                mutation_id: format!("mut-{}", guard.len()),
                queued_at: Utc.with_ymd_and_hms(2025, 3, 4, 9, 30, 0).unwrap(),
                student_count,
            })),
            SubmitterMode::Decline => Ok(None),
            SubmitterMode::Fail => Err(SubmissionError::Unavailable("gateway timeout".to_string())),
        }
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    notices: Mutex<Vec<AutoFixNotice>>,
}

impl RecordingNotifier {
    pub(super) fn notices(&self) -> Vec<AutoFixNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl AutoFixNotifier for RecordingNotifier {
    fn notify(&self, notice: AutoFixNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
