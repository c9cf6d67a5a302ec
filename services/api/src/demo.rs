use crate::infra::{read_snapshot, InMemoryAssignmentSubmitter, InMemoryNotifier};
use clap::Args;
use lesson_autofix::config::{AppConfig, AutoFixConfig};
use lesson_autofix::error::AppError;
use lesson_autofix::workflows::autofix::{
    write_adjustment_report, Assignment, AutoFixEngine, AutoFixPayload, AutoFixPhase,
    AutoFixPlan, AutoFixRequest, AutoFixService, Collaborators, EntityType, Lesson, LessonSkill,
    LoadingState, ManifestEntry, MasteryGroup, Resource, ResourceMetadata, SkillGrouping,
    SkillRef, SkillResources, SkillType, Student, StudentGroup,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Simulate the assignment service reporting a failed mutation.
    #[arg(long)]
    pub(crate) fail_mutation: bool,
}

#[derive(Args, Debug)]
pub(crate) struct PlanArgs {
    /// JSON file holding `{ lesson, groupings, request }`
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Write a CSV adjustment report to this path
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

pub(crate) fn run_plan(args: PlanArgs) -> Result<(), AppError> {
    let PlanArgs { snapshot, csv } = args;
    let config = AppConfig::load()?;
    let payload = read_snapshot(&snapshot)?;

    let engine = AutoFixEngine::new(Collaborators::standard(), config.autofix);
    let plan = engine.plan(&payload.lesson, &payload.groupings, &payload.request);
    render_plan(&payload.lesson, &plan);

    if let Some(path) = csv {
        let file = File::create(&path)?;
        write_adjustment_report(file, &plan)?;
        println!("\nAdjustment report written to {}", path.display());
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let payload = demo_payload();
    let submitter = Arc::new(InMemoryAssignmentSubmitter::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = AutoFixService::new(
        Collaborators::standard(),
        AutoFixConfig::default(),
        submitter.clone(),
        notifier.clone(),
    );

    println!("Lesson plan auto-fix demo");
    let plan = service.preview(&payload.lesson, &payload.groupings, &payload.request);
    render_plan(&payload.lesson, &plan);

    let receipt = service.confirm(&payload.lesson, &payload.groupings, &payload.request)?;
    println!(
        "\nSubmitted {} student manifest(s) -> phase {}",
        receipt.submitted,
        receipt.phase.label()
    );
    if let Some(mutation) = &receipt.mutation {
        println!("  Queued mutation {}", mutation.mutation_id);
    }
    for request in submitter.requests() {
        for student in &request.students {
            let stories: Vec<&str> = student
                .manifest
                .iter()
                .map(|entry| entry.story_id.as_str())
                .collect();
            println!("  - {}: {}", student.student_id, stories.join(", "));
        }
    }

    if receipt.phase != AutoFixPhase::Submitting {
        return Ok(());
    }

    let signal = if args.fail_mutation {
        LoadingState::Error
    } else {
        LoadingState::Success
    };
    let phase = service.complete(&receipt.lesson_plan_id, signal)?;
    println!("\nAssignment service reported {signal:?} -> phase {}", phase.label());
    for notice in notifier.notices() {
        println!("  Notice ({:?}): {}", notice.kind, notice.message);
    }

    Ok(())
}

pub(crate) fn render_plan(lesson: &Lesson, plan: &AutoFixPlan) {
    println!(
        "\nAuto-fix plan for {} ({}) | mode {:?}",
        lesson.name, plan.lesson_plan_id, plan.mode
    );
    println!(
        "- {} overbooked / {} underbooked student(s) adjusted",
        plan.overbooked_adjusted, plan.underbooked_adjusted
    );

    if plan.is_empty() {
        println!("- No student needs an adjustment");
        return;
    }

    for adjustment in &plan.adjustments {
        println!(
            "  {} / {}: {} {:.1} of {:.1} min (residual {:.1})",
            adjustment.student_id,
            adjustment.skill_id,
            adjustment.direction.label(),
            adjustment.minutes_applied,
            adjustment.minutes_targeted,
            adjustment.residual()
        );
        for change in &adjustment.changes {
            println!(
                "    - {} {} ({:.0} min)",
                change.resource_type, change.resource_id, change.minutes
            );
        }
    }
}

fn entry(story: &str, activity: &str, skill: &str) -> ManifestEntry {
    ManifestEntry {
        story_id: story.to_string(),
        activity_type: activity.to_string(),
        content_tags: None,
        skills: vec![SkillRef::new(skill)],
    }
}

fn resource(id: &str, kind: &str, story: &str) -> Resource {
    Resource {
        resource_unique_id: id.to_string(),
        resource_type: kind.to_string(),
        story_ids: vec![story.to_string()],
        tags: Vec::new(),
        title: id.replace('-', " "),
        shared_skills: Vec::new(),
    }
}

/// Built-in lesson: Maya is overbooked on digraphs, Theo underbooked on blends.
pub(crate) fn demo_payload() -> AutoFixPayload {
    let skills = vec![
        LessonSkill {
            skill_id: Some("sk-digraphs".to_string()),
            display_name: "Consonant digraphs".to_string(),
            time_to_master: Some(25.0),
            skill_type: SkillType::Focus,
        },
        LessonSkill {
            skill_id: Some("sk-blends".to_string()),
            display_name: "Initial blends".to_string(),
            time_to_master: Some(30.0),
            skill_type: SkillType::Focus,
        },
    ];

    let students = vec![
        Student {
            id: "stu-maya".to_string(),
            first_name: "Maya".to_string(),
            last_name: "Ortiz".to_string(),
            grade: 2,
        },
        Student {
            id: "stu-theo".to_string(),
            first_name: "Theo".to_string(),
            last_name: "Brooks".to_string(),
            grade: 2,
        },
    ];

    let maya = Assignment {
        entity_id: "stu-maya".to_string(),
        entity_type: EntityType::Student,
        manifest: vec![
            entry("st-dg-lesson", "microLesson", "sk-digraphs"),
            entry("st-dg-tutor", "tutor", "sk-digraphs"),
            entry("st-dg-texts", "textSet", "sk-digraphs"),
            entry("st-dg-legacy", "istationLegacyActivity", "sk-digraphs"),
            entry("st-bl-lesson", "microLesson", "sk-blends"),
        ],
        resources: Some(vec!["tr-dg-cards".to_string()]),
        resource_metadata: vec![ResourceMetadata {
            resource_unique_id: "tr-dg-cards".to_string(),
            skills: vec!["sk-digraphs".to_string()],
        }],
        ..Assignment::default()
    };

    let class = Assignment {
        entity_id: "class-2a".to_string(),
        entity_type: EntityType::Class,
        manifest: vec![
            entry("st-dg-lesson", "microLesson", "sk-digraphs"),
            entry("st-bl-lesson", "microLesson", "sk-blends"),
        ],
        ..Assignment::default()
    };

    let mut time_assigned: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>> =
        BTreeMap::new();
    let undeveloped = MasteryGroup::NotDeveloped.label().to_string();
    let developing = MasteryGroup::Developing.label().to_string();
    time_assigned
        .entry("sk-digraphs".to_string())
        .or_default()
        .entry(undeveloped)
        .or_default()
        .extend([("stu-maya".to_string(), 47.0), ("stu-theo".to_string(), 25.0)]);
    time_assigned
        .entry("sk-blends".to_string())
        .or_default()
        .entry(developing)
        .or_default()
        .extend([("stu-maya".to_string(), 22.0), ("stu-theo".to_string(), 8.0)]);

    let lesson = Lesson {
        lesson_plan_id: "lp-demo".to_string(),
        name: "Week 6 phonics".to_string(),
        user_id: "teacher-demo".to_string(),
        classroom_id: "class-2a".to_string(),
        curriculum_id: "foundational-reading".to_string(),
        skills,
        students,
        main_assignment: Some(class),
        student_assignments: vec![maya],
        time_assigned,
        skill_resources: vec![SkillResources {
            skill_id: "sk-blends".to_string(),
            resources: vec![
                resource("ml-blends-2", "microLesson", "st-bl-lesson-2"),
                resource("tu-blends", "tutor", "st-bl-tutor"),
                resource("er-blends", "erss", "st-bl-erss"),
                resource("ts-blends", "textSet", "st-bl-texts"),
            ],
        }],
    };

    let groupings = vec![
        SkillGrouping {
            skill_id: "sk-digraphs".to_string(),
            student_groups: vec![StudentGroup {
                group_name: MasteryGroup::NotDeveloped,
                student_ids: vec!["stu-maya".to_string(), "stu-theo".to_string()],
            }],
        },
        SkillGrouping {
            skill_id: "sk-blends".to_string(),
            student_groups: vec![StudentGroup {
                group_name: MasteryGroup::Developing,
                student_ids: vec!["stu-maya".to_string(), "stu-theo".to_string()],
            }],
        },
    ];

    AutoFixPayload {
        lesson,
        groupings,
        request: AutoFixRequest {
            overbooked_student_ids: vec!["stu-maya".to_string()],
            underbooked_student_ids: vec!["stu-theo".to_string()],
            skills_order: vec!["sk-digraphs".to_string(), "sk-blends".to_string()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_lesson_adjusts_both_students() {
        let payload = demo_payload();
        let engine = AutoFixEngine::new(Collaborators::standard(), AutoFixConfig::default());

        let plan = engine.plan(&payload.lesson, &payload.groupings, &payload.request);

        assert_eq!(plan.overbooked_adjusted, 1);
        assert_eq!(plan.underbooked_adjusted, 1);
        assert!(plan.manifest_for("stu-maya").is_some());
        assert!(plan.manifest_for("stu-theo").is_some());
    }

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs::default()).expect("demo succeeds");
        run_demo(DemoArgs {
            fail_mutation: true,
        })
        .expect("failure path is reported, not raised");
    }
}
