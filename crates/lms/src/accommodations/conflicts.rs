use chrono::TimeZone;
use std::collections::HashMap;
use storage::models::{AccommodationRequest, ConflictRecord, QuizVariant};
use storage::services::{WindowCalculator, find_conflicts};
use tracing::debug;

use crate::Result;
use crate::traits::QuizSource;

/// Lists the overrides of every quiz whose lock date will change and reports the
/// requested students already covered by one of them.
pub async fn detect_conflicts<Tz>(
    source: &dyn QuizSource,
    calculator: &WindowCalculator<Tz>,
    course_id: i64,
    requests: &[AccommodationRequest],
    variants: &[QuizVariant],
) -> Result<Vec<ConflictRecord>>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut overrides = HashMap::new();
    for variant in variants.iter().filter(|v| v.changes_lock()) {
        let existing = source.list_overrides(course_id, &variant.quiz).await?;
        debug!(
            "Quiz {} has {} existing override(s)",
            variant.quiz.id,
            existing.len()
        );
        overrides.insert(variant.quiz.id.clone(), existing);
    }

    Ok(find_conflicts(calculator, requests, variants, &overrides))
}
