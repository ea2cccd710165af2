pub mod accommodations;
pub mod canvas;
pub mod config;
pub mod error;
pub mod grades;
pub mod traits;

pub use canvas::CanvasClient;
pub use config::{CanvasConfig, Config};
pub use error::{LmsError, Result};
pub use traits::{GradeSink, GradeSource, OverrideRequest, QuizSink, QuizSource};
