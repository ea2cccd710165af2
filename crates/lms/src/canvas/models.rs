use serde::{Deserialize, Serialize};

// REST

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassicQuiz {
    pub id: u64,
    pub assignment_id: Option<u64>,
    pub title: String,
    /// Minutes.
    pub time_limit: Option<i64>,
    pub unlock_at: Option<String>,
    pub lock_at: Option<String>,
    pub due_at: Option<String>,
    #[serde(default)]
    pub published: bool,
    pub points_possible: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NewQuiz {
    /// The assignment id of the quiz, sent as a string.
    pub id: String,
    pub title: String,
    pub unlock_at: Option<String>,
    pub lock_at: Option<String>,
    pub due_at: Option<String>,
    #[serde(default)]
    pub published: bool,
    pub points_possible: Option<f64>,
    pub quiz_settings: Option<NewQuizSettings>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NewQuizSettings {
    #[serde(default)]
    pub has_time_limit: bool,
    pub session_time_limit_in_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssignmentOverride {
    pub id: u64,
    pub assignment_id: Option<u64>,
    pub title: Option<String>,
    #[serde(default)]
    pub student_ids: Vec<u64>,
    pub unlock_at: Option<String>,
    pub lock_at: Option<String>,
    pub due_at: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct CreateOverrideBody {
    pub assignment_override: OverrideFields,
}

#[derive(Debug, Serialize, Clone)]
pub struct OverrideFields {
    pub title: String,
    pub student_ids: Vec<String>,
    pub unlock_at: Option<String>,
    pub lock_at: Option<String>,
    pub due_at: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct QuizExtensionsBody {
    pub quiz_extensions: Vec<QuizExtension>,
}

#[derive(Debug, Serialize, Clone)]
pub struct QuizExtension {
    pub user_id: String,
    pub extra_time: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct Accommodation {
    pub user_id: String,
    pub extra_time: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CanvasCourse {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Enrollment {
    pub id: u64,
    pub user_id: u64,
    pub user: Option<EnrollmentUser>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnrollmentUser {
    pub id: u64,
    pub sortable_name: Option<String>,
    pub login_id: Option<String>,
}

// GraphQL

#[derive(Debug, Deserialize, Clone)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GradebookData {
    pub course: Option<GradebookCourse>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GradebookCourse {
    pub assignment_groups_connection: Option<Connection<GqlAssignmentGroup>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GqlAssignmentGroup {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub group_weight: Option<f64>,
    pub rules: Option<GqlRules>,
    pub assignments_connection: Option<Connection<GqlAssignment>>,
    pub grades_connection: Option<Connection<GqlGrade>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GqlRules {
    pub drop_highest: Option<u32>,
    pub drop_lowest: Option<u32>,
    #[serde(default)]
    pub never_drop: Vec<GqlNode>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GqlNode {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GqlAssignment {
    #[serde(rename = "_id")]
    pub id: String,
    pub points_possible: Option<f64>,
    pub submissions_connection: Option<Connection<GqlSubmission>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GqlSubmission {
    pub score: Option<f64>,
    pub user: Option<GqlNode>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GqlGrade {
    pub current_score: Option<f64>,
    pub enrollment: Option<GqlEnrollment>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GqlEnrollment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: Option<GqlNode>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SetOverrideScoreData {
    pub set_override_score: Option<SetOverrideScorePayload>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SetOverrideScorePayload {
    #[serde(default)]
    pub errors: Option<Vec<GqlValidationError>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GqlValidationError {
    pub attribute: Option<String>,
    pub message: String,
}
