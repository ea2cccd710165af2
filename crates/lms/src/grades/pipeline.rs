use std::collections::HashMap;
use storage::models::{Assessment, CourseGradeReport, FlexAllocation, WeightSyncIssue};
use storage::services::{GradeAggregator, check_weight_sync};
use tracing::info;

use crate::Result;
use crate::traits::GradeSource;

/// Reads the gradebook once and computes every student's default and flex totals.
///
/// `allocations` is keyed by LMS user id.
pub async fn compute_course_grades(
    source: &dyn GradeSource,
    course_id: i64,
    assessments: &[Assessment],
    allocations: &HashMap<String, Vec<FlexAllocation>>,
) -> Result<CourseGradeReport> {
    let snapshot = source.fetch_gradebook(course_id).await?;
    info!(
        "Fetched {} assignment groups for course {}",
        snapshot.groups.len(),
        course_id
    );

    let aggregator = GradeAggregator::new(&snapshot, assessments)?;
    let report = aggregator.compute(allocations);

    info!(
        "Computed {} final grades (avg default {}, avg final {})",
        report.results.len(),
        report.averages.avg_default,
        report.averages.avg_override
    );

    Ok(report)
}

pub async fn weight_sync_check(
    source: &dyn GradeSource,
    course_id: i64,
    assessments: &[Assessment],
) -> Result<Vec<WeightSyncIssue>> {
    let snapshot = source.fetch_gradebook(course_id).await?;
    Ok(check_weight_sync(assessments, &snapshot))
}
