//! Per-group score normalization.
//!
//! Turns raw assignment scores of one assignment group into a percentage per student,
//! applying the group's never-drop / drop-highest / drop-lowest policy the same way the
//! gradebook declares it.

use std::collections::HashMap;

use crate::models::{AssignmentGroupSnapshot, DropRules};

/// assignment id -> student id -> score
pub type RawScores = HashMap<String, HashMap<String, Option<f64>>>;

/// Computes the group percentage (0-100) of every student with at least one counted score.
///
/// Assignments without a positive max score or without submissions never count, and a
/// null score counts neither for nor against the student. Students left with nothing to
/// count are absent from the result rather than reported as zero.
pub fn normalize(
    raw_scores: &RawScores,
    max_scores: &HashMap<String, f64>,
    drop_rules: Option<&DropRules>,
) -> HashMap<String, f64> {
    let mut flat_by_student: HashMap<&str, Vec<(&str, f64)>> = HashMap::new();

    for (assignment_id, submissions) in raw_scores {
        let max_score = match max_scores.get(assignment_id) {
            Some(max) if *max > 0.0 => *max,
            _ => continue,
        };
        if submissions.is_empty() {
            continue;
        }

        for (student_id, score) in submissions {
            if let Some(score) = score {
                flat_by_student
                    .entry(student_id.as_str())
                    .or_default()
                    .push((assignment_id.as_str(), score / max_score));
            }
        }
    }

    let rules = drop_rules.filter(|r| r.is_effective());

    flat_by_student
        .into_iter()
        .filter(|(_, flats)| !flats.is_empty())
        .map(|(student_id, flats)| {
            let percent = match rules {
                Some(rules) => percent_with_drops(&flats, rules),
                None => mean(&flats) * 100.0,
            };
            (student_id.to_string(), percent)
        })
        .collect()
}

/// Normalizes a snapshot group from its raw assignment list.
/// Returns `None` when the snapshot carries no raw scores.
pub fn normalize_group(group: &AssignmentGroupSnapshot) -> Option<HashMap<String, f64>> {
    let assignments = group.assignments.as_ref()?;

    let mut raw_scores: RawScores = HashMap::new();
    let mut max_scores = HashMap::new();
    for assignment in assignments {
        if let Some(max) = assignment.max_score {
            max_scores.insert(assignment.assignment_id.clone(), max);
        }
        let by_student = raw_scores
            .entry(assignment.assignment_id.clone())
            .or_default();
        for submission in &assignment.submissions {
            by_student.insert(submission.student_id.clone(), submission.score);
        }
    }

    Some(normalize(
        &raw_scores,
        &max_scores,
        group.drop_rules.as_ref(),
    ))
}

fn mean(flats: &[(&str, f64)]) -> f64 {
    let sum: f64 = flats.iter().map(|(_, s)| s).sum();
    sum / flats.len() as f64
}

fn percent_with_drops(flats: &[(&str, f64)], rules: &DropRules) -> f64 {
    let (never_drop, mut droppable): (Vec<&(&str, f64)>, Vec<&(&str, f64)>) = flats
        .iter()
        .partition(|(id, _)| rules.never_drop_ids.iter().any(|n| n == id));

    droppable.sort_by(|a, b| a.1.total_cmp(&b.1));

    // Never drop every droppable score.
    let drop_high = (rules.drop_highest as usize).min(droppable.len().saturating_sub(1));
    droppable.truncate(droppable.len() - drop_high);

    let drop_low = (rules.drop_lowest as usize).min(droppable.len().saturating_sub(1));
    let kept = &droppable[drop_low..];

    let sum: f64 = never_drop.iter().map(|(_, s)| s).sum::<f64>()
        + kept.iter().map(|(_, s)| s).sum::<f64>();

    // The declared counts, not the number actually dropped.
    let denominator =
        flats.len() as i64 - i64::from(rules.drop_highest) - i64::from(rules.drop_lowest);
    if denominator <= 0 {
        return 0.0;
    }

    sum / denominator as f64 * 100.0
}
