//! Wire-to-domain conversion for Canvas responses.

use storage::models::{
    AssignmentGroupSnapshot, AssignmentScores, DropRules, ExistingOverride, GradebookSnapshot,
    GroupGrade, QuizSnapshot, Submission, Timestamp,
};
use storage::repository::EnrollStudent;
use storage::services::rounding::decimal_from_f64;

use super::models::*;
use crate::{LmsError, Result};

fn timestamp(raw: Option<String>) -> Option<Timestamp> {
    raw.filter(|s| !s.trim().is_empty()).map(Timestamp::from)
}

pub fn classic_quiz(quiz: ClassicQuiz) -> QuizSnapshot {
    QuizSnapshot {
        id: quiz.id.to_string(),
        // Ungraded surveys have no assignment; their overrides hang off the quiz itself.
        assignment_id: quiz.assignment_id.unwrap_or(quiz.id).to_string(),
        title: quiz.title,
        time_limit_minutes: quiz.time_limit.filter(|m| *m > 0),
        unlock_at: timestamp(quiz.unlock_at),
        lock_at: timestamp(quiz.lock_at),
        due_at: timestamp(quiz.due_at),
        published: quiz.published,
        points_possible: quiz.points_possible,
        is_new_format: false,
    }
}

pub fn new_quiz(quiz: NewQuiz) -> QuizSnapshot {
    let time_limit_minutes = quiz
        .quiz_settings
        .as_ref()
        .filter(|s| s.has_time_limit)
        .and_then(|s| s.session_time_limit_in_seconds)
        .map(|seconds| seconds.div_euclid(60))
        .filter(|m| *m > 0);

    QuizSnapshot {
        assignment_id: quiz.id.clone(),
        id: quiz.id,
        title: quiz.title,
        time_limit_minutes,
        unlock_at: timestamp(quiz.unlock_at),
        lock_at: timestamp(quiz.lock_at),
        due_at: timestamp(quiz.due_at),
        published: quiz.published,
        points_possible: quiz.points_possible,
        is_new_format: true,
    }
}

pub fn existing_override(assignment_override: AssignmentOverride, quiz_id: &str) -> ExistingOverride {
    ExistingOverride {
        override_id: assignment_override.id.to_string(),
        quiz_id: quiz_id.to_string(),
        title: assignment_override.title,
        student_ids: assignment_override
            .student_ids
            .iter()
            .map(u64::to_string)
            .collect(),
        unlock_at: timestamp(assignment_override.unlock_at),
        lock_at: timestamp(assignment_override.lock_at),
        due_at: timestamp(assignment_override.due_at),
    }
}

pub fn enrolled_student(enrollment: Enrollment) -> EnrollStudent {
    let user = enrollment.user;
    let lms_user_id = enrollment.user_id.to_string();
    EnrollStudent {
        login_id: user
            .as_ref()
            .and_then(|u| u.login_id.clone())
            .unwrap_or_else(|| lms_user_id.clone()),
        sortable_name: user
            .and_then(|u| u.sortable_name)
            .unwrap_or_else(|| lms_user_id.clone()),
        lms_user_id,
        enrollment_id: Some(enrollment.id.to_string()),
    }
}

pub fn gradebook(course_id: i64, data: GradebookData) -> Result<GradebookSnapshot> {
    let course = data.course.ok_or_else(|| {
        LmsError::Configuration(format!(
            "Course {} is not visible to the configured API token",
            course_id
        ))
    })?;
    let groups = course.assignment_groups_connection.ok_or_else(|| {
        LmsError::Configuration(format!(
            "Course {} returned no assignment groups",
            course_id
        ))
    })?;

    let groups = groups
        .nodes
        .into_iter()
        .map(assignment_group)
        .collect::<Result<Vec<_>>>()?;

    Ok(GradebookSnapshot { course_id, groups })
}

fn assignment_group(group: GqlAssignmentGroup) -> Result<AssignmentGroupSnapshot> {
    let weight = group.group_weight.ok_or_else(|| {
        LmsError::Configuration(format!(
            "Assignment group '{}' has no weight; enable weighted assignment groups",
            group.name
        ))
    })?;

    let drop_rules = group.rules.map(|rules| DropRules {
        never_drop_ids: rules.never_drop.into_iter().map(|n| n.id).collect(),
        drop_highest: rules.drop_highest.unwrap_or(0),
        drop_lowest: rules.drop_lowest.unwrap_or(0),
    });

    let assignments = group.assignments_connection.map(|connection| {
        connection
            .nodes
            .into_iter()
            .map(|assignment| AssignmentScores {
                assignment_id: assignment.id,
                max_score: assignment.points_possible,
                submissions: assignment
                    .submissions_connection
                    .map(|c| c.nodes)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|s| {
                        s.user.map(|user| Submission {
                            student_id: user.id,
                            score: s.score,
                        })
                    })
                    .collect(),
            })
            .collect()
    });

    let grades = group.grades_connection.map(|connection| {
        connection
            .nodes
            .into_iter()
            .filter_map(|grade| {
                let enrollment = grade.enrollment?;
                let user = enrollment.user?;
                Some(GroupGrade {
                    student_id: user.id,
                    enrollment_id: Some(enrollment.id),
                    current_score: grade.current_score,
                })
            })
            .collect()
    });

    Ok(AssignmentGroupSnapshot {
        group_id: group.id,
        name: group.name,
        group_weight: decimal_from_f64(weight),
        drop_rules,
        assignments,
        grades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_new_quiz_time_limit_floors_seconds() {
        let quiz: NewQuiz = serde_json::from_value(serde_json::json!({
            "id": "501",
            "title": "Unit 3",
            "unlock_at": "2026-10-05T16:00:00Z",
            "lock_at": null,
            "due_at": "",
            "published": true,
            "points_possible": 10.0,
            "quiz_settings": {
                "has_time_limit": true,
                "session_time_limit_in_seconds": 2999
            }
        }))
        .unwrap();

        let snapshot = new_quiz(quiz);
        assert_eq!(snapshot.time_limit_minutes, Some(49));
        assert_eq!(snapshot.assignment_id, "501");
        assert!(snapshot.is_new_format);
        assert!(snapshot.lock_at.is_none());
        assert!(snapshot.due_at.is_none());
    }

    #[test]
    fn test_new_quiz_without_time_limit() {
        let quiz: NewQuiz = serde_json::from_value(serde_json::json!({
            "id": "502",
            "title": "Survey",
            "quiz_settings": {
                "has_time_limit": false,
                "session_time_limit_in_seconds": 600
            }
        }))
        .unwrap();

        assert_eq!(new_quiz(quiz).time_limit_minutes, None);
    }

    #[test]
    fn test_classic_quiz_keeps_malformed_dates() {
        let quiz: ClassicQuiz = serde_json::from_value(serde_json::json!({
            "id": 12,
            "assignment_id": 340,
            "title": "Midterm",
            "time_limit": 60,
            "unlock_at": "2026-10-05T16:00:00Z",
            "lock_at": "next tuesday",
            "due_at": null,
            "published": true,
            "points_possible": 50.0
        }))
        .unwrap();

        let snapshot = classic_quiz(quiz);
        assert_eq!(snapshot.id, "12");
        assert_eq!(snapshot.assignment_id, "340");
        assert_eq!(snapshot.time_limit_minutes, Some(60));
        assert!(snapshot.lock_at.unwrap().is_malformed());
    }

    #[test]
    fn test_gradebook_conversion() {
        let data: GradebookData = serde_json::from_value(serde_json::json!({
            "course": {
                "assignmentGroupsConnection": {
                    "nodes": [{
                        "_id": "7",
                        "name": "Labs",
                        "groupWeight": 40.0,
                        "rules": { "dropHighest": null, "dropLowest": 1, "neverDrop": [{ "_id": "91" }] },
                        "assignmentsConnection": {
                            "nodes": [{
                                "_id": "91",
                                "pointsPossible": 10.0,
                                "submissionsConnection": {
                                    "nodes": [
                                        { "score": 8.0, "user": { "_id": "1001" } },
                                        { "score": null, "user": null }
                                    ]
                                }
                            }]
                        },
                        "gradesConnection": {
                            "nodes": [
                                { "currentScore": 80.0, "enrollment": { "_id": "e1", "user": { "_id": "1001" } } }
                            ]
                        }
                    }]
                }
            }
        }))
        .unwrap();

        let snapshot = gradebook(42, data).unwrap();
        let group = &snapshot.groups[0];

        assert_eq!(group.group_weight, Decimal::new(40, 0));
        let rules = group.drop_rules.as_ref().unwrap();
        assert_eq!(rules.drop_highest, 0);
        assert_eq!(rules.drop_lowest, 1);
        assert_eq!(rules.never_drop_ids, vec!["91".to_string()]);

        let assignments = group.assignments.as_ref().unwrap();
        assert_eq!(assignments[0].submissions.len(), 1);

        let grades = group.grades.as_ref().unwrap();
        assert_eq!(grades[0].enrollment_id.as_deref(), Some("e1"));
    }

    #[test]
    fn test_connection_without_nodes_is_empty() {
        let data: GradebookData = serde_json::from_value(serde_json::json!({
            "course": {
                "assignmentGroupsConnection": {
                    "nodes": [{
                        "_id": "7",
                        "name": "Labs",
                        "groupWeight": 40.0,
                        "assignmentsConnection": {},
                        "gradesConnection": {}
                    }]
                }
            }
        }))
        .unwrap();

        let snapshot = gradebook(42, data).unwrap();
        let group = &snapshot.groups[0];
        assert!(group.assignments.as_ref().is_some_and(|a| a.is_empty()));
        assert!(group.grades.as_ref().is_some_and(|g| g.is_empty()));
    }

    #[test]
    fn test_missing_course_is_configuration_fault() {
        let data = GradebookData { course: None };
        assert!(gradebook(42, data).unwrap_err().is_configuration());
    }

    #[test]
    fn test_unweighted_group_is_configuration_fault() {
        let data: GradebookData = serde_json::from_value(serde_json::json!({
            "course": {
                "assignmentGroupsConnection": {
                    "nodes": [{ "_id": "7", "name": "Labs", "groupWeight": null }]
                }
            }
        }))
        .unwrap();

        assert!(gradebook(42, data).unwrap_err().is_configuration());
    }
}
