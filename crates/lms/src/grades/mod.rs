mod pipeline;
mod submit;

pub use pipeline::{compute_course_grades, weight_sync_check};
pub use submit::{IncompleteSubmission, RetryPolicy, SubmissionReport, submit_final_grades};
