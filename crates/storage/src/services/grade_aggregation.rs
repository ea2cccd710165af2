use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::models::{
    Assessment, Averages, CourseGradeReport, FinalGradeResult, FlexAllocation, GradebookSnapshot,
    WeightSyncIssue,
};
use crate::services::allocation_validation::is_allocation_set_valid;
use crate::services::rounding::{decimal_from_f64, mean_percent, round_percent};
use crate::services::score_normalizer::normalize_group;

/// group id -> student id -> percent
pub type GroupPercents = HashMap<String, HashMap<String, Decimal>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScore {
    pub weight: Decimal,
    pub percent: Option<Decimal>,
}

/// Weighted average of the scores that have a percent, normalized by the sum of
/// the weights actually used so missing groups don't drag the total down.
pub fn weighted_total<I>(scores: I) -> Decimal
where
    I: IntoIterator<Item = WeightedScore>,
{
    let mut numerator = Decimal::ZERO;
    let mut weight_sum = Decimal::ZERO;

    for score in scores {
        if let Some(percent) = score.percent {
            numerator += percent * score.weight;
            weight_sum += score.weight;
        }
    }

    if weight_sum.is_zero() {
        return Decimal::ZERO;
    }
    round_percent(numerator / weight_sum)
}

/// Final grade under the gradebook's own group weights.
pub fn compute_default_total(
    snapshot: &GradebookSnapshot,
    percents: &GroupPercents,
    student_id: &str,
) -> Decimal {
    weighted_total(snapshot.groups.iter().map(|group| WeightedScore {
        weight: group.group_weight,
        percent: percents
            .get(&group.group_id)
            .and_then(|by_student| by_student.get(student_id))
            .copied(),
    }))
}

/// Final grade under the student's own allocation, or `None` when the allocation
/// set is incomplete or does not sum to 100.
pub fn compute_override_total(
    assessments: &[Assessment],
    allocations: &[FlexAllocation],
    percents: &GroupPercents,
    student_id: &str,
) -> Option<Decimal> {
    if !is_allocation_set_valid(assessments, allocations) {
        return None;
    }

    let flex_by_assessment: HashMap<_, _> = allocations
        .iter()
        .filter_map(|a| a.flex.map(|flex| (a.assessment_id, flex)))
        .collect();

    let scores = assessments.iter().filter_map(|assessment| {
        let group_id = assessment.group_id.as_ref()?;
        let percent = percents.get(group_id)?.get(student_id).copied()?;
        Some(WeightedScore {
            weight: *flex_by_assessment.get(&assessment.assessment_id)?,
            percent: Some(percent),
        })
    });

    Some(weighted_total(scores))
}

pub fn compute_averages(results: &[FinalGradeResult]) -> Averages {
    Averages {
        avg_override: mean_percent(results.iter().map(FinalGradeResult::effective_total)),
        avg_default: mean_percent(results.iter().map(|r| r.default_total)),
        avg_difference: mean_percent(
            results
                .iter()
                .map(|r| r.difference.unwrap_or(Decimal::ZERO)),
        ),
    }
}

/// Computes every student's final grade from one gradebook snapshot.
pub struct GradeAggregator<'a> {
    snapshot: &'a GradebookSnapshot,
    assessments: &'a [Assessment],
    percents: GroupPercents,
}

impl<'a> GradeAggregator<'a> {
    /// Checks the snapshot has the shape the engine needs and normalizes every group.
    pub fn new(snapshot: &'a GradebookSnapshot, assessments: &'a [Assessment]) -> Result<Self> {
        check_snapshot(snapshot)?;

        let mut percents = GroupPercents::new();
        for group in &snapshot.groups {
            let by_student: HashMap<String, Decimal> = match normalize_group(group) {
                Some(raw) => raw
                    .into_iter()
                    .map(|(student, pct)| (student, decimal_from_f64(pct)))
                    .collect(),
                None => group
                    .grades
                    .iter()
                    .flatten()
                    .filter_map(|g| {
                        g.current_score
                            .map(|score| (g.student_id.clone(), decimal_from_f64(score)))
                    })
                    .collect(),
            };
            debug!(
                "Group '{}' ({}): {} student percent(s)",
                group.name,
                group.group_id,
                by_student.len()
            );
            percents.insert(group.group_id.clone(), by_student);
        }

        Ok(Self {
            snapshot,
            assessments,
            percents,
        })
    }

    pub fn percents(&self) -> &GroupPercents {
        &self.percents
    }

    /// Every student listed in any group, with their enrollment id, sorted by student id.
    pub fn roster(&self) -> BTreeMap<String, Option<String>> {
        let mut roster: BTreeMap<String, Option<String>> = BTreeMap::new();
        for grade in self.snapshot.groups.iter().flat_map(|g| g.grades.iter().flatten()) {
            let entry = roster.entry(grade.student_id.clone()).or_default();
            if entry.is_none() {
                *entry = grade.enrollment_id.clone();
            }
        }
        roster
    }

    pub fn student_result(
        &self,
        student_id: &str,
        enrollment_id: Option<String>,
        allocations: &[FlexAllocation],
    ) -> FinalGradeResult {
        let default_total = compute_default_total(self.snapshot, &self.percents, student_id);
        let override_total =
            compute_override_total(self.assessments, allocations, &self.percents, student_id);

        FinalGradeResult {
            student_id: student_id.to_string(),
            enrollment_id,
            default_total,
            override_total,
            difference: override_total.map(|o| o - default_total),
        }
    }

    /// `allocations` is keyed by LMS user id. Students without an entry use the default weighting.
    pub fn compute(&self, allocations: &HashMap<String, Vec<FlexAllocation>>) -> CourseGradeReport {
        let results: Vec<FinalGradeResult> = self
            .roster()
            .into_iter()
            .map(|(student_id, enrollment_id)| {
                let student_allocations = allocations
                    .get(&student_id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                self.student_result(&student_id, enrollment_id, student_allocations)
            })
            .collect();

        let averages = compute_averages(&results);
        CourseGradeReport { results, averages }
    }
}

fn check_snapshot(snapshot: &GradebookSnapshot) -> Result<()> {
    if snapshot.groups.is_empty() {
        return Err(StorageError::Configuration(format!(
            "course {} returned no assignment groups",
            snapshot.course_id
        )));
    }

    for group in &snapshot.groups {
        if group.grades.is_none() {
            return Err(StorageError::Configuration(format!(
                "assignment group '{}' returned no grade list",
                group.name
            )));
        }
        if group.effective_drop_rules().is_some() && group.assignments.is_none() {
            return Err(StorageError::Configuration(format!(
                "assignment group '{}' has drop rules but no per-assignment scores",
                group.name
            )));
        }
    }

    Ok(())
}

/// Compares the local assessment setup against the gradebook's groups.
pub fn check_weight_sync(
    assessments: &[Assessment],
    snapshot: &GradebookSnapshot,
) -> Vec<WeightSyncIssue> {
    let mut issues = Vec::new();
    let mut by_group: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for assessment in assessments {
        let Some(group_id) = assessment.group_id.as_deref() else {
            continue;
        };
        by_group
            .entry(group_id)
            .or_default()
            .push(assessment.title.clone());

        match snapshot.groups.iter().find(|g| g.group_id == group_id) {
            Some(group) if group.group_weight != assessment.default_weight => {
                issues.push(WeightSyncIssue::WeightMismatch {
                    assessment: assessment.title.clone(),
                    group_id: group_id.to_string(),
                    default_weight: assessment.default_weight,
                    group_weight: group.group_weight,
                });
            }
            Some(_) => {}
            None => issues.push(WeightSyncIssue::UnknownGroup {
                assessment: assessment.title.clone(),
                group_id: group_id.to_string(),
            }),
        }
    }

    for (group_id, titles) in by_group {
        if titles.len() > 1 {
            issues.push(WeightSyncIssue::DuplicateGroupMatch {
                group_id: group_id.to_string(),
                assessments: titles,
            });
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssignmentGroupSnapshot, AssignmentScores, DropRules, GroupGrade, Submission};
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn ws(weight: &str, percent: Option<&str>) -> WeightedScore {
        WeightedScore {
            weight: dec(weight),
            percent: percent.map(dec),
        }
    }

    fn assessment(title: &str, default: &str, group: Option<&str>) -> Assessment {
        Assessment {
            assessment_id: Uuid::new_v4(),
            course_id: 1,
            title: title.to_string(),
            default_weight: dec(default),
            min_weight: Decimal::ZERO,
            max_weight: dec("100"),
            group_id: group.map(str::to_string),
            created_at: chrono::NaiveDateTime::default(),
        }
    }

    fn allocation(assessment: &Assessment, flex: Option<&str>) -> FlexAllocation {
        FlexAllocation {
            student_id: Uuid::nil(),
            assessment_id: assessment.assessment_id,
            flex: flex.map(dec),
            updated_at: chrono::NaiveDateTime::default(),
        }
    }

    fn group(id: &str, weight: &str, grades: &[(&str, Option<f64>)]) -> AssignmentGroupSnapshot {
        AssignmentGroupSnapshot {
            group_id: id.to_string(),
            name: format!("Group {}", id),
            group_weight: dec(weight),
            drop_rules: None,
            assignments: None,
            grades: Some(
                grades
                    .iter()
                    .map(|(student, score)| GroupGrade {
                        student_id: student.to_string(),
                        enrollment_id: Some(format!("e-{}", student)),
                        current_score: *score,
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_weighted_total_worked_example() {
        let total = weighted_total(vec![
            ws("50", Some("70")),
            ws("0", Some("36.7")),
            ws("10", Some("75")),
            ws("40", Some("66.67")),
        ]);
        // (3500 + 0 + 750 + 2666.8) / 100
        assert_eq!(total, dec("69.17"));
    }

    #[test]
    fn test_missing_percent_is_excluded_from_normalizer() {
        let total = weighted_total(vec![ws("50", Some("80")), ws("50", None)]);
        assert_eq!(total, dec("80.00"));
    }

    #[test]
    fn test_zero_weight_sum_is_zero() {
        assert_eq!(weighted_total(vec![ws("0", Some("80"))]), Decimal::ZERO);
        assert_eq!(weighted_total(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn test_weighted_total_is_idempotent() {
        let scores = vec![ws("30", Some("91.239")), ws("70", Some("77.7777"))];
        let first = weighted_total(scores.clone());
        let second = weighted_total(scores);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_override_requires_valid_allocation() {
        let exams = assessment("Exams", "60", Some("g1"));
        let labs = assessment("Labs", "40", Some("g2"));
        let assessments = vec![exams.clone(), labs.clone()];

        let mut percents = GroupPercents::new();
        percents.insert("g1".into(), HashMap::from([("s1".to_string(), dec("90"))]));
        percents.insert("g2".into(), HashMap::from([("s1".to_string(), dec("60"))]));

        let valid = vec![allocation(&exams, Some("80")), allocation(&labs, Some("20"))];
        assert_eq!(
            compute_override_total(&assessments, &valid, &percents, "s1"),
            Some(dec("84.00"))
        );

        let incomplete = vec![allocation(&exams, Some("80")), allocation(&labs, None)];
        assert_eq!(
            compute_override_total(&assessments, &incomplete, &percents, "s1"),
            None
        );

        let wrong_sum = vec![allocation(&exams, Some("70")), allocation(&labs, Some("20"))];
        assert_eq!(
            compute_override_total(&assessments, &wrong_sum, &percents, "s1"),
            None
        );
    }

    #[test]
    fn test_override_skips_unbound_assessments() {
        let exams = assessment("Exams", "60", Some("g1"));
        let participation = assessment("Participation", "40", None);
        let assessments = vec![exams.clone(), participation.clone()];

        let mut percents = GroupPercents::new();
        percents.insert("g1".into(), HashMap::from([("s1".to_string(), dec("72.5"))]));

        let allocations = vec![
            allocation(&exams, Some("50")),
            allocation(&participation, Some("50")),
        ];
        assert_eq!(
            compute_override_total(&assessments, &allocations, &percents, "s1"),
            Some(dec("72.50"))
        );
    }

    #[test]
    fn test_averages_fall_back_to_default() {
        let results = vec![
            FinalGradeResult {
                student_id: "s1".into(),
                enrollment_id: None,
                default_total: dec("80"),
                override_total: Some(dec("85")),
                difference: Some(dec("5")),
            },
            FinalGradeResult {
                student_id: "s2".into(),
                enrollment_id: None,
                default_total: dec("70.01"),
                override_total: None,
                difference: None,
            },
        ];

        let averages = compute_averages(&results);
        assert_eq!(averages.avg_override, dec("77.51"));
        assert_eq!(averages.avg_default, dec("75.01"));
        assert_eq!(averages.avg_difference, dec("2.50"));
    }

    #[test]
    fn test_aggregator_end_to_end() {
        let snapshot = GradebookSnapshot {
            course_id: 42,
            groups: vec![
                group("g1", "60", &[("s1", Some(90.0)), ("s2", Some(50.0))]),
                group("g2", "40", &[("s1", Some(60.0)), ("s2", None)]),
            ],
        };
        let exams = assessment("Exams", "60", Some("g1"));
        let labs = assessment("Labs", "40", Some("g2"));
        let assessments = vec![exams.clone(), labs.clone()];

        let allocations = HashMap::from([(
            "s1".to_string(),
            vec![allocation(&exams, Some("80")), allocation(&labs, Some("20"))],
        )]);

        let aggregator = GradeAggregator::new(&snapshot, &assessments).unwrap();
        let report = aggregator.compute(&allocations);

        assert_eq!(report.results.len(), 2);
        let s1 = &report.results[0];
        assert_eq!(s1.student_id, "s1");
        assert_eq!(s1.enrollment_id.as_deref(), Some("e-s1"));
        assert_eq!(s1.default_total, dec("78.00"));
        assert_eq!(s1.override_total, Some(dec("84.00")));
        assert_eq!(s1.difference, Some(dec("6.00")));

        let s2 = &report.results[1];
        assert_eq!(s2.default_total, dec("50.00"));
        assert_eq!(s2.override_total, None);

        assert_eq!(report.averages.avg_default, dec("64.00"));
        assert_eq!(report.averages.avg_override, dec("67.00"));
        assert_eq!(report.averages.avg_difference, dec("3.00"));
    }

    #[test]
    fn test_aggregator_applies_drop_rules_from_raw_scores() {
        let mut quizzes = group("g1", "100", &[("s1", Some(95.0))]);
        quizzes.drop_rules = Some(DropRules {
            never_drop_ids: vec![],
            drop_highest: 1,
            drop_lowest: 0,
        });
        quizzes.assignments = Some(
            [70.0, 80.0, 90.0, 100.0]
                .iter()
                .enumerate()
                .map(|(i, score)| AssignmentScores {
                    assignment_id: format!("a{}", i),
                    max_score: Some(100.0),
                    submissions: vec![Submission {
                        student_id: "s1".to_string(),
                        score: Some(*score),
                    }],
                })
                .collect(),
        );
        let snapshot = GradebookSnapshot {
            course_id: 1,
            groups: vec![quizzes],
        };

        let aggregator = GradeAggregator::new(&snapshot, &[]).unwrap();
        let report = aggregator.compute(&HashMap::new());
        assert_eq!(report.results[0].default_total, dec("80.00"));
    }

    #[test]
    fn test_aggregator_rejects_broken_snapshot() {
        let empty = GradebookSnapshot {
            course_id: 1,
            groups: vec![],
        };
        assert!(matches!(
            GradeAggregator::new(&empty, &[]),
            Err(StorageError::Configuration(_))
        ));

        let mut no_grades = group("g1", "100", &[]);
        no_grades.grades = None;
        let snapshot = GradebookSnapshot {
            course_id: 1,
            groups: vec![no_grades],
        };
        assert!(matches!(
            GradeAggregator::new(&snapshot, &[]),
            Err(StorageError::Configuration(_))
        ));

        let mut rules_without_raw = group("g1", "100", &[("s1", Some(50.0))]);
        rules_without_raw.drop_rules = Some(DropRules {
            never_drop_ids: vec![],
            drop_highest: 0,
            drop_lowest: 2,
        });
        let snapshot = GradebookSnapshot {
            course_id: 1,
            groups: vec![rules_without_raw],
        };
        assert!(matches!(
            GradeAggregator::new(&snapshot, &[]),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn test_weight_sync_issues() {
        let snapshot = GradebookSnapshot {
            course_id: 1,
            groups: vec![group("g1", "60", &[]), group("g2", "40", &[])],
        };
        let assessments = vec![
            assessment("Exams", "60", Some("g1")),
            assessment("Labs", "30", Some("g2")),
            assessment("Bonus labs", "10", Some("g2")),
            assessment("Ghost", "0", Some("g9")),
        ];

        let issues = check_weight_sync(&assessments, &snapshot);

        assert!(issues.contains(&WeightSyncIssue::WeightMismatch {
            assessment: "Labs".into(),
            group_id: "g2".into(),
            default_weight: dec("30"),
            group_weight: dec("40"),
        }));
        assert!(issues.contains(&WeightSyncIssue::UnknownGroup {
            assessment: "Ghost".into(),
            group_id: "g9".into(),
        }));
        assert!(issues.contains(&WeightSyncIssue::DuplicateGroupMatch {
            group_id: "g2".into(),
            assessments: vec!["Labs".into(), "Bonus labs".into()],
        }));
        assert!(!issues.iter().any(|i| matches!(
            i,
            WeightSyncIssue::WeightMismatch { assessment, .. } if assessment == "Exams"
        )));
    }
}
