//! Lesson-plan auto-fix: rebalances each student's per-skill instructional time.
//!
//! A run evaluates every student and skill against its time-to-growth target, sheds or
//! adds resources for the students the teacher confirmed, merges the per-skill results
//! into one manifest per student, and hands those manifests to the assignment service.

pub mod allocation;
pub mod booking;
pub mod collaborators;
pub mod domain;
pub mod engine;
pub mod lifecycle;
pub mod merge;
pub mod normalizer;
pub mod outbound;
pub mod processor;
pub mod report;
pub mod router;
pub mod service;
pub mod submission;

#[cfg(test)]
mod tests;

pub use allocation::{AppliedChange, CategoryCounts, SkillSlice};
pub use booking::{BookingCalculator, THRESHOLD_FOR_AUTO_FIX};
pub use collaborators::{
    most_common_grade, CanonicalIds, Collaborators, GradeTimeLookup, IdNormalizer,
    LessonResourceCatalog, ManifestExpander, MasteryTimeBalance, ResourceCatalog, SkillQuery,
    StandardManifestExpander, StandardTimeTable, TimeBalance, TimeToGrowth,
};
pub use domain::{
    AdjustmentDirection, Assignment, BookingRecord, ContentCategory, EntityType, Lesson,
    LessonSkill, ManifestEntry, MasteryGroup, Resource, ResourceMetadata, ResourceType,
    SkillGrouping, SkillRef, SkillResources, SkillType, Student, StudentGroup,
};
pub use engine::{AutoFixEngine, AutoFixMode, AutoFixPlan, AutoFixRequest};
pub use lifecycle::{AutoFixPhase, AutoFixRun};
pub use merge::{CrossSkillMerge, StudentManifest};
pub use normalizer::normalize_manifest;
pub use outbound::{
    AssignmentSubmitter, AutoFixNotice, AutoFixNotifier, LoadingState, NoticeKind, NotifyError,
    OriginalManifest, QueuedMutation, StudentSubmission, SubmissionError, SubmissionRequest,
};
pub use processor::{SkillAdjustment, SkillProcessor};
pub use report::write_adjustment_report;
pub use router::{autofix_router, AutoFixPayload, CompletionPayload};
pub use service::{adjustment_message, AutoFixError, AutoFixReceipt, AutoFixService};
pub use submission::{order_manifest_by_skills, submit_plan, SubmissionOutcome};
