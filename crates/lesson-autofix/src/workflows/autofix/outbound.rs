use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ManifestEntry, ResourceMetadata};

/// Final per-student payload handed to the assignment-mutation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSubmission {
    pub student_id: String,
    pub manifest: Vec<ManifestEntry>,
    pub teacher_resources: Vec<String>,
    pub resource_metadata: Vec<ResourceMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalManifest {
    pub student_id: String,
    pub manifest: Vec<ManifestEntry>,
}

/// Arguments of one assignment mutation for a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub lesson_plan_id: String,
    pub user_id: String,
    pub classroom_id: String,
    pub students: Vec<StudentSubmission>,
    pub original_manifests: Vec<OriginalManifest>,
    pub is_auto_fix: bool,
}

/// Receipt for a mutation accepted for asynchronous processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    pub mutation_id: String,
    pub queued_at: DateTime<Utc>,
    pub student_count: usize,
}

/// The engine's only write boundary.
pub trait AssignmentSubmitter: Send + Sync {
    /// `Ok(None)` means the collaborator declined to queue anything.
    fn submit(&self, request: SubmissionRequest) -> Result<Option<QueuedMutation>, SubmissionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("assignment service rejected the mutation: {0}")]
    Rejected(String),
    #[error("assignment service unavailable: {0}")]
    Unavailable(String),
}

/// Loading-state signal reported by the mutation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingState {
    #[default]
    None,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Failure,
}

/// Toast shown to the teacher once the mutation settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixNotice {
    pub lesson_plan_id: String,
    pub kind: NoticeKind,
    pub message: String,
    /// Alert to dismiss alongside the toast, set on success only.
    pub dismiss_alert_id: Option<String>,
    pub duration_ms: u64,
}

pub const NOTICE_DURATION_MS: u64 = 5_000;

pub trait AutoFixNotifier: Send + Sync {
    fn notify(&self, notice: AutoFixNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Channel(String),
}
