use std::io::Write;

use serde::Serialize;

use super::engine::AutoFixPlan;

#[derive(Debug, Serialize)]
struct AdjustmentRow<'a> {
    #[serde(rename = "Student")]
    student_id: &'a str,
    #[serde(rename = "Skill")]
    skill_id: &'a str,
    #[serde(rename = "Direction")]
    direction: &'static str,
    #[serde(rename = "Minutes Targeted")]
    minutes_targeted: f64,
    #[serde(rename = "Minutes Applied")]
    minutes_applied: f64,
    #[serde(rename = "Residual")]
    residual: f64,
    #[serde(rename = "Changes")]
    changes: String,
}

/// Writes one CSV row per student and skill adjustment in the plan.
///
/// The changes column lists `type:id` pairs separated by `;`.
pub fn write_adjustment_report<W: Write>(writer: W, plan: &AutoFixPlan) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for adjustment in &plan.adjustments {
        let changes = adjustment
            .changes
            .iter()
            .map(|change| format!("{}:{}", change.resource_type, change.resource_id))
            .collect::<Vec<_>>()
            .join(";");

        csv_writer.serialize(AdjustmentRow {
            student_id: &adjustment.student_id,
            skill_id: &adjustment.skill_id,
            direction: adjustment.direction.label(),
            minutes_targeted: adjustment.minutes_targeted,
            minutes_applied: adjustment.minutes_applied,
            residual: adjustment.residual(),
            changes,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
