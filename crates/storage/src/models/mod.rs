pub mod accommodation;
pub mod assessment;
pub mod course;
pub mod flex_allocation;
pub mod gradebook;
pub mod quiz;
pub mod student;

pub use accommodation::*;
pub use assessment::Assessment;
pub use course::Course;
pub use flex_allocation::FlexAllocation;
pub use gradebook::*;
pub use quiz::*;
pub use student::Student;
