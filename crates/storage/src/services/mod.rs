pub mod accommodation_planner;
pub mod allocation_validation;
pub mod grade_aggregation;
pub mod rounding;
pub mod score_normalizer;
pub mod time_window;

pub use accommodation_planner::{
    find_conflicts, group_requests, overlapping_students, plan_variants, selectable_quizzes,
    students_with_overrides,
};
pub use allocation_validation::{
    is_allocation_set_valid, students_out_of_range, validate_allocations,
    validate_assessment_batch,
};
pub use grade_aggregation::{GradeAggregator, check_weight_sync};
pub use time_window::WindowCalculator;
