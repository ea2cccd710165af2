use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Drop policy of an assignment group as configured on the LMS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRules {
    pub never_drop_ids: Vec<String>,
    pub drop_highest: u32,
    pub drop_lowest: u32,
}

impl DropRules {
    /// Rules that drop nothing are equivalent to having no rules.
    pub fn is_effective(&self) -> bool {
        self.drop_highest > 0 || self.drop_lowest > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub student_id: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentScores {
    pub assignment_id: String,
    pub max_score: Option<f64>,
    pub submissions: Vec<Submission>,
}

/// Pre-aggregated group grade for one enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupGrade {
    pub student_id: String,
    pub enrollment_id: Option<String>,
    pub current_score: Option<f64>,
}

/// One assignment group as read from the external gradebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentGroupSnapshot {
    pub group_id: String,
    pub name: String,
    pub group_weight: Decimal,
    pub drop_rules: Option<DropRules>,
    /// Raw per-assignment scores. Required when the group has effective drop rules.
    pub assignments: Option<Vec<AssignmentScores>>,
    pub grades: Option<Vec<GroupGrade>>,
}

impl AssignmentGroupSnapshot {
    pub fn effective_drop_rules(&self) -> Option<&DropRules> {
        self.drop_rules.as_ref().filter(|r| r.is_effective())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradebookSnapshot {
    pub course_id: i64,
    pub groups: Vec<AssignmentGroupSnapshot>,
}

/// Final grade of one student under both weighting schemes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalGradeResult {
    pub student_id: String,
    pub enrollment_id: Option<String>,
    pub default_total: Decimal,
    /// Null when the student's allocation set is not valid.
    pub override_total: Option<Decimal>,
    pub difference: Option<Decimal>,
}

impl FinalGradeResult {
    /// The grade that counts: the student's own weighting when valid, else the default.
    pub fn effective_total(&self) -> Decimal {
        self.override_total.unwrap_or(self.default_total)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Averages {
    pub avg_override: Decimal,
    pub avg_default: Decimal,
    pub avg_difference: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseGradeReport {
    pub results: Vec<FinalGradeResult>,
    pub averages: Averages,
}

/// A disagreement between local assessment setup and the LMS gradebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightSyncIssue {
    WeightMismatch {
        assessment: String,
        group_id: String,
        default_weight: Decimal,
        group_weight: Decimal,
    },
    UnknownGroup {
        assessment: String,
        group_id: String,
    },
    DuplicateGroupMatch {
        group_id: String,
        assessments: Vec<String>,
    },
}
