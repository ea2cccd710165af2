use serde::Serialize;
use std::time::Duration;
use storage::models::CourseGradeReport;
use tracing::{info, warn};

use crate::traits::GradeSink;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteSubmission {
    pub student_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionReport {
    pub completed: Vec<String>,
    pub incomplete: Vec<IncompleteSubmission>,
}

impl SubmissionReport {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }
}

/// Writes every student's effective total as the final-grade override.
///
/// Each student is retried on its own; one student exhausting its attempts never stops
/// the others. Configuration faults are not retried.
pub async fn submit_final_grades(
    sink: &dyn GradeSink,
    report: &CourseGradeReport,
    policy: &RetryPolicy,
) -> SubmissionReport {
    let mut outcome = SubmissionReport::default();

    for result in &report.results {
        let Some(enrollment_id) = result.enrollment_id.as_deref() else {
            warn!("Student {} has no enrollment id, skipping", result.student_id);
            outcome.incomplete.push(IncompleteSubmission {
                student_id: result.student_id.clone(),
                reason: "No enrollment id on the LMS".to_string(),
            });
            continue;
        };

        let score = result.effective_total();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match sink.set_override_score(enrollment_id, score).await {
                Ok(()) => {
                    outcome.completed.push(result.student_id.clone());
                    break;
                }
                Err(e) if e.is_configuration() || attempt >= policy.max_attempts => {
                    warn!(
                        "Giving up on student {} after {} attempt(s): {}",
                        result.student_id, attempt, e
                    );
                    outcome.incomplete.push(IncompleteSubmission {
                        student_id: result.student_id.clone(),
                        reason: e.to_string(),
                    });
                    break;
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} for student {} failed: {}",
                        attempt, policy.max_attempts, result.student_id, e
                    );
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    info!(
        "Submitted {} final grades, {} incomplete",
        outcome.completed.len(),
        outcome.incomplete.len()
    );

    outcome
}
