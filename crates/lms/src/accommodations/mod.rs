mod applier;
mod conflicts;

pub use applier::{ApplyItem, ApplyKind, ApplyReport, BatchApplier};
pub use conflicts::detect_conflicts;

use chrono::TimeZone;
use serde::Serialize;
use std::collections::HashSet;
use storage::models::{AccommodationRequest, QuizSnapshot, QuizVariant, StudentGroup};
use storage::services::time_window::should_warn;
use storage::services::{WindowCalculator, group_requests, plan_variants, selectable_quizzes};
use tracing::info;

use crate::traits::QuizSource;
use crate::{LmsError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct SelectableQuiz {
    #[serde(flatten)]
    pub quiz: QuizSnapshot,
    /// The window is already shorter than the time limit.
    pub should_warn: bool,
}

/// A validated batch ready to preview or apply.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedBatch {
    pub groups: Vec<StudentGroup>,
    pub variants: Vec<QuizVariant>,
}

/// Classic and new-format quizzes of the course that can be accommodated, by title.
pub async fn list_selectable_quizzes<Tz>(
    source: &dyn QuizSource,
    calculator: &WindowCalculator<Tz>,
    course_id: i64,
) -> Result<Vec<SelectableQuiz>>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let quizzes = source.list_quizzes(course_id).await?;
    let selectable = selectable_quizzes(calculator, &quizzes);
    info!(
        "{} of {} quizzes in course {} are selectable",
        selectable.len(),
        quizzes.len(),
        course_id
    );

    Ok(selectable
        .into_iter()
        .map(|quiz| SelectableQuiz {
            should_warn: should_warn(&quiz),
            quiz,
        })
        .collect())
}

/// Groups the requests and plans a variant for every chosen quiz.
///
/// An empty `quiz_ids` selects every selectable quiz. Asking for a quiz that does not
/// exist or cannot be accommodated rejects the batch.
pub async fn prepare_batch<Tz>(
    source: &dyn QuizSource,
    calculator: &WindowCalculator<Tz>,
    course_id: i64,
    requests: &[AccommodationRequest],
    quiz_ids: &[String],
) -> Result<PreparedBatch>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let groups = group_requests(requests)?;

    let quizzes = source.list_quizzes(course_id).await?;
    let selectable = selectable_quizzes(calculator, &quizzes);

    let chosen: Vec<QuizSnapshot> = if quiz_ids.is_empty() {
        selectable
    } else {
        let available: HashSet<&str> = selectable.iter().map(|q| q.id.as_str()).collect();
        let missing: Vec<&str> = quiz_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !available.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(LmsError::Validation(format!(
                "Quizzes not found or not selectable: {}",
                missing.join(", ")
            )));
        }
        selectable
            .into_iter()
            .filter(|q| quiz_ids.contains(&q.id))
            .collect()
    };

    let variants = plan_variants(calculator, &chosen, &groups);
    info!(
        "Planned {} quiz variant(s) for {} tier(s)",
        variants.len(),
        groups.len()
    );

    Ok(PreparedBatch { groups, variants })
}
