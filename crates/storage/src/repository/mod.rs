pub mod allocation;
pub mod assessment;
pub mod course;
pub mod student;

pub use allocation::AllocationRepository;
pub use assessment::AssessmentRepository;
pub use course::CourseRepository;
pub use student::{EnrollStudent, StudentRepository};
