use chrono::Utc;
use lesson_autofix::error::AppError;
use lesson_autofix::workflows::autofix::{
    AssignmentSubmitter, AutoFixNotice, AutoFixNotifier, AutoFixPayload, NoticeKind, NotifyError,
    QueuedMutation, SubmissionError, SubmissionRequest,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Accepts every mutation and keeps the requests for inspection.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAssignmentSubmitter {
    requests: Arc<Mutex<Vec<SubmissionRequest>>>,
}

impl AssignmentSubmitter for InMemoryAssignmentSubmitter {
    fn submit(&self, request: SubmissionRequest) -> Result<Option<QueuedMutation>, SubmissionError> {
        let mut guard = self
            .requests
            .lock()
            .map_err(|_| SubmissionError::Unavailable("submission store poisoned".to_string()))?;

        let student_count = request.students.len();
        let mutation = QueuedMutation {
            mutation_id: format!("{}-{}", request.lesson_plan_id, guard.len() + 1),
            queued_at: Utc::now(),
            student_count,
        };
        info!(
            lesson_plan_id = %request.lesson_plan_id,
            mutation_id = %mutation.mutation_id,
            student_count,
            "assignment mutation queued"
        );
        guard.push(request);
        Ok(Some(mutation))
    }
}

impl InMemoryAssignmentSubmitter {
    pub(crate) fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Logs each notice and keeps it for the demo transcript.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifier {
    notices: Arc<Mutex<Vec<AutoFixNotice>>>,
}

impl AutoFixNotifier for InMemoryNotifier {
    fn notify(&self, notice: AutoFixNotice) -> Result<(), NotifyError> {
        match notice.kind {
            NoticeKind::Success => {
                info!(lesson_plan_id = %notice.lesson_plan_id, message = %notice.message, "auto-fix notice")
            }
            NoticeKind::Failure => {
                warn!(lesson_plan_id = %notice.lesson_plan_id, message = %notice.message, "auto-fix notice")
            }
        }

        let mut guard = self
            .notices
            .lock()
            .map_err(|_| NotifyError::Channel("notice store poisoned".to_string()))?;
        guard.push(notice);
        Ok(())
    }
}

impl InMemoryNotifier {
    pub(crate) fn notices(&self) -> Vec<AutoFixNotice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Reads a `{ lesson, groupings, request }` snapshot from disk.
pub(crate) fn read_snapshot(path: &Path) -> Result<AutoFixPayload, AppError> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}
