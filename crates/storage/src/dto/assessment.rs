use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// One row of the instructor's assessment batch form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssessmentInput {
    /// Set when editing an existing assessment.
    pub assessment_id: Option<Uuid>,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: String,

    #[validate(custom(function = "validate_percentage"))]
    pub default_weight: Decimal,

    #[validate(custom(function = "validate_percentage"))]
    pub min_weight: Decimal,

    #[validate(custom(function = "validate_percentage"))]
    pub max_weight: Decimal,

    #[validate(length(min = 1, max = 64, message = "Group id cannot be empty"))]
    pub group_id: Option<String>,
}

/// Replaces the whole assessment set of a course at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentBatchRequest {
    pub assessments: Vec<AssessmentInput>,
}

pub(crate) fn validate_percentage(value: &Decimal) -> Result<(), validator::ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        let mut error = validator::ValidationError::new("percentage_range");
        error.message = Some("Weight must be between 0 and 100".into());
        return Err(error);
    }
    if value.normalize().scale() > 2 {
        let mut error = validator::ValidationError::new("percentage_precision");
        error.message = Some("Weight can have at most two decimal places".into());
        return Err(error);
    }
    Ok(())
}
