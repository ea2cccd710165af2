use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{AllocationInput, AssessmentInput, validate_percentage};
use crate::error::{Result, ValidationReport};
use crate::models::{Assessment, FlexAllocation};

/// Validates an instructor's whole assessment batch before anything is written.
pub fn validate_assessment_batch(inputs: &[AssessmentInput]) -> Result<()> {
    let mut report = ValidationReport::default();

    if inputs.is_empty() {
        report.push("assessments", "At least one assessment is required");
    }

    let mut titles = HashSet::new();
    let mut groups: HashMap<&str, &str> = HashMap::new();
    let mut default_sum = Decimal::ZERO;

    for (idx, input) in inputs.iter().enumerate() {
        let prefix = format!("assessments[{}]", idx);

        if let Err(errors) = input.validate() {
            for e in ValidationReport::from(errors).errors {
                report.push(format!("{}.{}", prefix, e.field), e.message);
            }
        }

        if input.min_weight > input.default_weight {
            report.push(
                format!("{}.min_weight", prefix),
                format!(
                    "'{}': minimum {} is above the default {}",
                    input.title, input.min_weight, input.default_weight
                ),
            );
        }
        if input.default_weight > input.max_weight {
            report.push(
                format!("{}.max_weight", prefix),
                format!(
                    "'{}': maximum {} is below the default {}",
                    input.title, input.max_weight, input.default_weight
                ),
            );
        }

        if !titles.insert(input.title.trim().to_lowercase()) {
            report.push(
                format!("{}.title", prefix),
                format!("Duplicate assessment title: '{}'", input.title),
            );
        }

        if let Some(group_id) = input.group_id.as_deref() {
            if let Some(other) = groups.insert(group_id, input.title.as_str()) {
                report.push(
                    format!("{}.group_id", prefix),
                    format!(
                        "Assignment group {} is already matched to '{}'",
                        group_id, other
                    ),
                );
            }
        }

        default_sum += input.default_weight;
    }

    if !inputs.is_empty() && default_sum != Decimal::ONE_HUNDRED {
        report.push(
            "default_weight",
            format!("Default weights must sum to 100, got {}", default_sum),
        );
    }

    report.into_result()
}

/// Validates a student's submitted choices against the course's assessments.
///
/// Every assessment needs a value, each value must respect its bounds and the
/// values must sum to exactly 100.
pub fn validate_allocations(assessments: &[Assessment], inputs: &[AllocationInput]) -> Result<()> {
    let mut report = ValidationReport::default();
    let by_id: HashMap<Uuid, &Assessment> =
        assessments.iter().map(|a| (a.assessment_id, a)).collect();

    let mut seen = HashSet::new();
    let mut sum = Decimal::ZERO;

    for input in inputs {
        let Some(assessment) = by_id.get(&input.assessment_id) else {
            report.push(
                input.assessment_id.to_string(),
                "Unknown assessment for this course",
            );
            continue;
        };
        if !seen.insert(input.assessment_id) {
            report.push(assessment.title.clone(), "Allocated more than once");
            continue;
        }

        match input.flex {
            None => report.push(assessment.title.clone(), "A weight is required"),
            Some(flex) => {
                // stored as NUMERIC(5,2); extra digits would be rounded away on save
                if let Err(e) = validate_percentage(&flex) {
                    report.push(
                        assessment.title.clone(),
                        e.message.map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()),
                    );
                } else if !assessment.accepts(flex) {
                    report.push(
                        assessment.title.clone(),
                        format!(
                            "Weight {} must be between {} and {}",
                            flex, assessment.min_weight, assessment.max_weight
                        ),
                    );
                }
                sum += flex;
            }
        }
    }

    for assessment in assessments {
        if !seen.contains(&assessment.assessment_id) {
            report.push(assessment.title.clone(), "A weight is required");
        }
    }

    if sum != Decimal::ONE_HUNDRED {
        report.push("total", format!("Weights must sum to 100, got {}", sum));
    }

    report.into_result()
}

/// True when every assessment has a chosen weight and the weights sum to 100.
pub fn is_allocation_set_valid(assessments: &[Assessment], allocations: &[FlexAllocation]) -> bool {
    if assessments.is_empty() {
        return false;
    }

    let mut sum = Decimal::ZERO;
    for assessment in assessments {
        let flex = allocations
            .iter()
            .find(|a| a.assessment_id == assessment.assessment_id)
            .and_then(|a| a.flex);
        match flex {
            Some(flex) => sum += flex,
            None => return false,
        }
    }

    sum == Decimal::ONE_HUNDRED
}

/// Students holding at least one chosen weight outside its assessment's bounds.
pub fn students_out_of_range(
    assessments: &[Assessment],
    allocations: &[FlexAllocation],
) -> Vec<Uuid> {
    let by_id: HashMap<Uuid, &Assessment> =
        assessments.iter().map(|a| (a.assessment_id, a)).collect();

    let mut students: Vec<Uuid> = allocations
        .iter()
        .filter(|a| match (a.flex, by_id.get(&a.assessment_id)) {
            (Some(flex), Some(assessment)) => !assessment.accepts(flex),
            _ => false,
        })
        .map(|a| a.student_id)
        .collect();

    students.sort();
    students.dedup();
    students
}
