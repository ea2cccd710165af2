use reqwest::header::{AUTHORIZATION, HeaderMap, LINK};
use reqwest::{Method, RequestBuilder, Response};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde::de::DeserializeOwned;
use storage::models::{ExistingOverride, GradebookSnapshot, QuizSnapshot};
use storage::repository::EnrollStudent;
use tracing::debug;

use super::graphql::{GRADEBOOK_QUERY, SET_OVERRIDE_SCORE_MUTATION};
use super::models::*;
use super::transformer;
use crate::config::CanvasConfig;
use crate::error::{LmsError, Result};
use crate::traits::{GradeSink, GradeSource, OverrideRequest, QuizSink, QuizSource};

const PAGE_SIZE: u32 = 100;

pub struct CanvasClient {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
}

impl CanvasClient {
    pub fn new(config: &CanvasConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("flexgrade/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            client,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn checked(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(LmsError::Configuration(format!(
                "LMS rejected the API token ({}): {}",
                status, body
            )));
        }
        Err(LmsError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Follows `Link: rel="next"` headers until the last page.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut next = Some(format!("{}{}per_page={}", self.url(path), separator, PAGE_SIZE));
        let mut items = Vec::new();

        while let Some(url) = next {
            let response = Self::checked(self.request(Method::GET, &url).send().await?).await?;
            next = next_link(response.headers());
            let page: Vec<T> = response.json().await?;
            items.extend(page);
        }

        Ok(items)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        let response = self
            .request(method, &self.url(path))
            .json(body)
            .send()
            .await?;
        Self::checked(response).await
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let response = self
            .send_json(Method::POST, "/api/graphql", &body)
            .await?;
        let envelope: GraphQlResponse<T> = response.json().await?;

        if !envelope.errors.is_empty() {
            let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(LmsError::Api {
                status: 200,
                body: messages.join("; "),
            });
        }

        envelope.data.ok_or_else(|| LmsError::Api {
            status: 200,
            body: "GraphQL response carried no data".to_string(),
        })
    }

    pub async fn fetch_course(&self, course_id: i64) -> Result<CanvasCourse> {
        let url = self.url(&format!("/api/v1/courses/{}", course_id));
        let response = Self::checked(self.request(Method::GET, &url).send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn list_students(&self, course_id: i64) -> Result<Vec<EnrollStudent>> {
        let enrollments: Vec<Enrollment> = self
            .get_all(&format!(
                "/api/v1/courses/{}/enrollments?type[]=StudentEnrollment&state[]=active",
                course_id
            ))
            .await?;

        Ok(enrollments
            .into_iter()
            .map(transformer::enrolled_student)
            .collect())
    }

    fn override_fields(request: &OverrideRequest) -> OverrideFields {
        let iso = |dt: Option<chrono::DateTime<chrono::Utc>>| {
            dt.map(|d| d.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        };
        OverrideFields {
            title: request.title.clone(),
            student_ids: request.student_ids.clone(),
            unlock_at: iso(request.unlock_at),
            lock_at: iso(request.lock_at),
            due_at: iso(request.due_at),
        }
    }
}

/// Extracts the `rel="next"` target of a Link header.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut sections = part.split(';');
        let target = sections.next()?.trim();
        let is_next = sections.any(|s| {
            let s = s.trim();
            s == r#"rel="next""# || s == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[async_trait::async_trait]
impl GradeSource for CanvasClient {
    async fn fetch_gradebook(&self, course_id: i64) -> Result<GradebookSnapshot> {
        let data: GradebookData = self
            .graphql(
                GRADEBOOK_QUERY,
                serde_json::json!({ "courseId": course_id.to_string() }),
            )
            .await?;
        transformer::gradebook(course_id, data)
    }
}

#[async_trait::async_trait]
impl GradeSink for CanvasClient {
    async fn set_override_score(&self, enrollment_id: &str, score: Decimal) -> Result<()> {
        let data: SetOverrideScoreData = self
            .graphql(
                SET_OVERRIDE_SCORE_MUTATION,
                serde_json::json!({
                    "enrollmentId": enrollment_id,
                    "overrideScore": score.to_f64(),
                }),
            )
            .await?;

        let errors = data
            .set_override_score
            .and_then(|payload| payload.errors)
            .unwrap_or_default();
        if let Some(error) = errors.into_iter().next() {
            return Err(LmsError::Api {
                status: 200,
                body: match error.attribute {
                    Some(attribute) => format!("{}: {}", attribute, error.message),
                    None => error.message,
                },
            });
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl QuizSource for CanvasClient {
    async fn list_quizzes(&self, course_id: i64) -> Result<Vec<QuizSnapshot>> {
        let classic: Vec<ClassicQuiz> = self
            .get_all(&format!("/api/v1/courses/{}/quizzes", course_id))
            .await?;
        let new_format: Vec<NewQuiz> = self
            .get_all(&format!("/api/quiz/v1/courses/{}/quizzes", course_id))
            .await?;

        debug!(
            "Course {}: {} classic and {} new-format quizzes",
            course_id,
            classic.len(),
            new_format.len()
        );

        Ok(classic
            .into_iter()
            .map(transformer::classic_quiz)
            .chain(new_format.into_iter().map(transformer::new_quiz))
            .collect())
    }

    async fn list_overrides(
        &self,
        course_id: i64,
        quiz: &QuizSnapshot,
    ) -> Result<Vec<ExistingOverride>> {
        let overrides: Vec<AssignmentOverride> = self
            .get_all(&format!(
                "/api/v1/courses/{}/assignments/{}/overrides",
                course_id, quiz.assignment_id
            ))
            .await?;

        Ok(overrides
            .into_iter()
            .map(|o| transformer::existing_override(o, &quiz.id))
            .collect())
    }
}

#[async_trait::async_trait]
impl QuizSink for CanvasClient {
    async fn add_extra_time(
        &self,
        course_id: i64,
        quiz: &QuizSnapshot,
        student_ids: &[String],
        extra_minutes: i64,
    ) -> Result<()> {
        if quiz.is_new_format {
            let body: Vec<Accommodation> = student_ids
                .iter()
                .map(|id| Accommodation {
                    user_id: id.clone(),
                    extra_time: extra_minutes,
                })
                .collect();
            self.send_json(
                Method::POST,
                &format!(
                    "/api/quiz/v1/courses/{}/quizzes/{}/accommodations",
                    course_id, quiz.id
                ),
                &body,
            )
            .await?;
        } else {
            let body = QuizExtensionsBody {
                quiz_extensions: student_ids
                    .iter()
                    .map(|id| QuizExtension {
                        user_id: id.clone(),
                        extra_time: extra_minutes,
                    })
                    .collect(),
            };
            self.send_json(
                Method::POST,
                &format!(
                    "/api/v1/courses/{}/quizzes/{}/extensions",
                    course_id, quiz.id
                ),
                &body,
            )
            .await?;
        }

        Ok(())
    }

    async fn create_override(
        &self,
        course_id: i64,
        quiz: &QuizSnapshot,
        request: &OverrideRequest,
    ) -> Result<ExistingOverride> {
        let body = CreateOverrideBody {
            assignment_override: Self::override_fields(request),
        };
        let created: AssignmentOverride = self
            .send_json(
                Method::POST,
                &format!(
                    "/api/v1/courses/{}/assignments/{}/overrides",
                    course_id, quiz.assignment_id
                ),
                &body,
            )
            .await?
            .json()
            .await?;

        Ok(transformer::existing_override(created, &quiz.id))
    }

    async fn delete_override(
        &self,
        course_id: i64,
        quiz: &QuizSnapshot,
        override_id: &str,
    ) -> Result<()> {
        let url = self.url(&format!(
            "/api/v1/courses/{}/assignments/{}/overrides/{}",
            course_id, quiz.assignment_id, override_id
        ));
        Self::checked(self.request(Method::DELETE, &url).send().await?).await?;
        Ok(())
    }
}
