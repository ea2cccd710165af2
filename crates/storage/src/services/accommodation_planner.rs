use chrono::TimeZone;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Result, ValidationReport};
use crate::models::{
    AccommodationRequest, ConflictRecord, ExistingOverride, Multiplier, QuizSnapshot, QuizVariant,
    StudentGroup,
};
use crate::services::time_window::WindowCalculator;

/// Groups requests by multiplier, tiers ascending and students by name.
///
/// A student may appear only once; the whole batch is rejected otherwise.
pub fn group_requests(requests: &[AccommodationRequest]) -> Result<Vec<StudentGroup>> {
    let mut report = ValidationReport::default();
    let mut seen = HashSet::new();
    let mut tiers: BTreeMap<Multiplier, Vec<AccommodationRequest>> = BTreeMap::new();

    for request in requests {
        if request.lms_user_id.trim().is_empty() {
            report.push(
                request.login_id.clone(),
                "Student has no user id on the LMS",
            );
            continue;
        }
        if !seen.insert(request.lms_user_id.as_str()) {
            report.push(
                request.login_id.clone(),
                "Student is listed more than once",
            );
            continue;
        }
        tiers
            .entry(request.multiplier)
            .or_default()
            .push(request.clone());
    }

    report.into_result()?;

    Ok(tiers
        .into_iter()
        .map(|(multiplier, mut students)| {
            students.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.login_id.cmp(&b.login_id))
            });
            StudentGroup {
                multiplier,
                students,
            }
        })
        .collect())
}

/// Selectable quizzes sorted by title.
pub fn selectable_quizzes<Tz>(
    calculator: &WindowCalculator<Tz>,
    quizzes: &[QuizSnapshot],
) -> Vec<QuizSnapshot>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut selectable: Vec<QuizSnapshot> = quizzes
        .iter()
        .filter(|q| calculator.is_selectable(q))
        .cloned()
        .collect();
    selectable.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
    selectable
}

/// One variant per quiz, with a plan for every tier present in `groups`.
pub fn plan_variants<Tz>(
    calculator: &WindowCalculator<Tz>,
    quizzes: &[QuizSnapshot],
    groups: &[StudentGroup],
) -> Vec<QuizVariant>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let tiers: Vec<Multiplier> = groups.iter().map(|g| g.multiplier).collect();
    quizzes
        .iter()
        .map(|quiz| calculator.plan_variant(quiz, &tiers))
        .collect()
}

/// Students of `targets` that `existing` already covers, in override order.
///
/// The conflict preview and the applier both match through this function.
pub fn overlapping_students<'a>(
    existing: &'a ExistingOverride,
    targets: &HashSet<&str>,
) -> Vec<&'a str> {
    existing
        .student_ids
        .iter()
        .map(String::as_str)
        .filter(|id| targets.contains(id))
        .collect()
}

/// Students already holding an override on this quiz.
pub fn students_with_overrides<'a>(
    overrides: &'a [ExistingOverride],
    targets: &HashSet<&str>,
) -> HashSet<&'a str> {
    overrides
        .iter()
        .flat_map(|o| overlapping_students(o, targets))
        .collect()
}

/// Conflicts between requested students and overrides that already exist on quizzes
/// whose lock date the batch will change.
///
/// `overrides` is keyed by quiz id.
pub fn find_conflicts<Tz>(
    calculator: &WindowCalculator<Tz>,
    requests: &[AccommodationRequest],
    variants: &[QuizVariant],
    overrides: &HashMap<String, Vec<ExistingOverride>>,
) -> Vec<ConflictRecord>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let by_student: HashMap<&str, &AccommodationRequest> = requests
        .iter()
        .map(|r| (r.lms_user_id.as_str(), r))
        .collect();
    let targets: HashSet<&str> = by_student.keys().copied().collect();

    let mut conflicts = Vec::new();
    for variant in variants.iter().filter(|v| v.changes_lock()) {
        let quiz = &variant.quiz;
        let Some(existing) = overrides.get(&quiz.id) else {
            continue;
        };

        for existing_override in existing {
            for student_id in overlapping_students(existing_override, &targets) {
                let request = by_student[student_id];
                conflicts.push(ConflictRecord {
                    login_id: request.login_id.clone(),
                    name: request.name.clone(),
                    lms_user_id: request.lms_user_id.clone(),
                    quiz_id: quiz.id.clone(),
                    quiz_title: quiz.title.clone(),
                    override_id: existing_override.override_id.clone(),
                    current_unlock_at: quiz.unlock_at.clone(),
                    current_lock_at: quiz.lock_at.clone(),
                    current_unlock_readable: calculator.readable_timestamp(&quiz.unlock_at),
                    current_lock_readable: calculator.readable_timestamp(&quiz.lock_at),
                    override_unlock_at: existing_override.unlock_at.clone(),
                    override_lock_at: existing_override.lock_at.clone(),
                    override_unlock_readable: calculator
                        .readable_timestamp(&existing_override.unlock_at),
                    override_lock_readable: calculator
                        .readable_timestamp(&existing_override.lock_at),
                });
            }
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::models::Timestamp;
    use chrono::{DateTime, Utc};

    fn request(login: &str, name: &str, multiplier: Multiplier, id: &str) -> AccommodationRequest {
        AccommodationRequest {
            login_id: login.to_string(),
            name: name.to_string(),
            multiplier,
            lms_user_id: id.to_string(),
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 5, h, m, 0).unwrap()
    }

    fn quiz(id: &str, title: &str, limit: Option<i64>, unlock: Option<DateTime<Utc>>, lock: Option<DateTime<Utc>>) -> QuizSnapshot {
        QuizSnapshot {
            id: id.to_string(),
            assignment_id: format!("assign-{}", id),
            title: title.to_string(),
            time_limit_minutes: limit,
            unlock_at: unlock.map(Timestamp::from),
            lock_at: lock.map(Timestamp::from),
            due_at: None,
            published: true,
            points_possible: None,
            is_new_format: false,
        }
    }

    fn existing(id: &str, quiz_id: &str, students: &[&str]) -> ExistingOverride {
        ExistingOverride {
            override_id: id.to_string(),
            quiz_id: quiz_id.to_string(),
            title: None,
            student_ids: students.iter().map(|s| s.to_string()).collect(),
            unlock_at: Some(Timestamp::from(at(9, 0))),
            lock_at: Some(Timestamp::from(at(17, 0))),
            due_at: None,
        }
    }

    fn calculator() -> WindowCalculator<Utc> {
        WindowCalculator::new(Utc, Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_group_requests_sorted() {
        let groups = group_requests(&[
            request("zed", "Zed Z", Multiplier::Double, "3"),
            request("amy", "amy a", Multiplier::OneAndHalf, "2"),
            request("bob", "Bob B", Multiplier::Double, "1"),
        ])
        .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].multiplier, Multiplier::OneAndHalf);
        assert_eq!(groups[1].multiplier, Multiplier::Double);
        assert_eq!(groups[1].student_ids(), vec!["1".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_group_requests_rejects_duplicates() {
        let result = group_requests(&[
            request("amy", "Amy", Multiplier::OneAndHalf, "2"),
            request("amy2", "Amy", Multiplier::Double, "2"),
        ]);
        match result {
            Err(StorageError::Validation(report)) => assert!(report.has_error_for("amy2")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_selectable_quizzes_sorted_by_title() {
        let calc = calculator();
        let quizzes = vec![
            quiz("1", "Quiz B", Some(30), None, None),
            quiz("2", "Open survey", None, None, None),
            quiz("3", "quiz a", Some(10), None, None),
        ];

        let titles: Vec<String> = selectable_quizzes(&calc, &quizzes)
            .into_iter()
            .map(|q| q.title)
            .collect();
        assert_eq!(titles, vec!["quiz a".to_string(), "Quiz B".to_string()]);
    }

    #[test]
    fn test_conflicts_only_for_quizzes_with_lock_changes() {
        let calc = calculator();
        let requests = vec![
            request("amy", "Amy", Multiplier::OneAndHalf, "2"),
            request("bob", "Bob", Multiplier::Double, "1"),
        ];
        let groups = group_requests(&requests).unwrap();

        // window 60 minutes with a 60 minute limit: every tier needs a later lock
        let tight = quiz("10", "Midterm", Some(60), Some(at(10, 0)), Some(at(11, 0)));
        // no window at all: only the time limit changes
        let open = quiz("11", "Practice", Some(60), None, None);
        let variants = plan_variants(&calc, &[tight, open], &groups);

        let overrides = HashMap::from([
            (
                "10".to_string(),
                vec![existing("o1", "10", &["1", "99"]), existing("o2", "10", &["77"])],
            ),
            ("11".to_string(), vec![existing("o3", "11", &["2"])]),
        ]);

        let conflicts = find_conflicts(&calc, &requests, &variants, &overrides);

        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.login_id, "bob");
        assert_eq!(conflict.quiz_id, "10");
        assert_eq!(conflict.override_id, "o1");
        assert_eq!(
            conflict.override_lock_readable.as_deref(),
            Some("Mon Oct 5, 2026 5:00 PM")
        );
        assert_eq!(
            conflict.current_lock_readable.as_deref(),
            Some("Mon Oct 5, 2026 11:00 AM")
        );
    }

    #[test]
    fn test_students_with_overrides() {
        let overrides = vec![existing("o1", "10", &["1", "2"]), existing("o2", "10", &["3"])];
        let targets: HashSet<&str> = ["2", "3", "4"].into_iter().collect();

        let covered = students_with_overrides(&overrides, &targets);
        assert_eq!(covered, ["2", "3"].into_iter().collect());
    }
}
