pub mod allocation;
pub mod assessment;

pub use allocation::{AllocationInput, StudentAllocationRequest};
pub use assessment::{AssessmentBatchRequest, AssessmentInput};
pub(crate) use assessment::validate_percentage;
