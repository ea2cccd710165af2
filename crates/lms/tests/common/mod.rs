#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use lms::{GradeSink, GradeSource, LmsError, OverrideRequest, QuizSink, QuizSource, Result};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use storage::models::{
    AccommodationRequest, ExistingOverride, GradebookSnapshot, Multiplier, QuizSnapshot,
    Timestamp,
};

/// Every write the fake received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ExtraTime {
        quiz_id: String,
        student_ids: Vec<String>,
        minutes: i64,
    },
    Create {
        quiz_id: String,
        request: OverrideRequest,
    },
    Delete {
        quiz_id: String,
        override_id: String,
    },
    Score {
        enrollment_id: String,
        score: Decimal,
    },
}

#[derive(Default)]
pub struct FakeLms {
    pub gradebook: Option<GradebookSnapshot>,
    pub quizzes: Vec<QuizSnapshot>,
    pub overrides: Mutex<HashMap<String, Vec<ExistingOverride>>>,
    pub calls: Mutex<Vec<Call>>,
    pub fail_extra_time: HashSet<String>,
    pub fail_create: HashSet<String>,
    pub fail_delete: HashSet<String>,
    pub fail_list_overrides: HashSet<String>,
    /// enrollment id -> number of calls that fail before one succeeds
    pub score_failures: Mutex<HashMap<String, u32>>,
    pub misconfigured_scores: bool,
    pub next_id: AtomicU64,
}

impl FakeLms {
    pub fn with_overrides(self, quiz_id: &str, overrides: Vec<ExistingOverride>) -> Self {
        self.overrides
            .lock()
            .unwrap()
            .insert(quiz_id.to_string(), overrides);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn overrides_of(&self, quiz_id: &str) -> Vec<ExistingOverride> {
        self.overrides
            .lock()
            .unwrap()
            .get(quiz_id)
            .cloned()
            .unwrap_or_default()
    }

    fn fault(what: &str) -> LmsError {
        LmsError::Api {
            status: 500,
            body: format!("{} failed", what),
        }
    }
}

#[async_trait::async_trait]
impl GradeSource for FakeLms {
    async fn fetch_gradebook(&self, course_id: i64) -> Result<GradebookSnapshot> {
        self.gradebook.clone().ok_or_else(|| {
            LmsError::Configuration(format!("Course {} is not visible", course_id))
        })
    }
}

#[async_trait::async_trait]
impl GradeSink for FakeLms {
    async fn set_override_score(&self, enrollment_id: &str, score: Decimal) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Score {
            enrollment_id: enrollment_id.to_string(),
            score,
        });

        if self.misconfigured_scores {
            return Err(LmsError::Configuration("Final grade override is disabled".into()));
        }

        let mut failures = self.score_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(enrollment_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Self::fault("setOverrideScore"));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl QuizSource for FakeLms {
    async fn list_quizzes(&self, _course_id: i64) -> Result<Vec<QuizSnapshot>> {
        Ok(self.quizzes.clone())
    }

    async fn list_overrides(
        &self,
        _course_id: i64,
        quiz: &QuizSnapshot,
    ) -> Result<Vec<ExistingOverride>> {
        if self.fail_list_overrides.contains(&quiz.id) {
            return Err(Self::fault("list overrides"));
        }
        Ok(self.overrides_of(&quiz.id))
    }
}

#[async_trait::async_trait]
impl QuizSink for FakeLms {
    async fn add_extra_time(
        &self,
        _course_id: i64,
        quiz: &QuizSnapshot,
        student_ids: &[String],
        extra_minutes: i64,
    ) -> Result<()> {
        if self.fail_extra_time.contains(&quiz.id) {
            return Err(Self::fault("extensions"));
        }
        self.calls.lock().unwrap().push(Call::ExtraTime {
            quiz_id: quiz.id.clone(),
            student_ids: student_ids.to_vec(),
            minutes: extra_minutes,
        });
        Ok(())
    }

    async fn create_override(
        &self,
        _course_id: i64,
        quiz: &QuizSnapshot,
        request: &OverrideRequest,
    ) -> Result<ExistingOverride> {
        if self.fail_create.contains(&quiz.id) {
            return Err(Self::fault("create override"));
        }
        self.calls.lock().unwrap().push(Call::Create {
            quiz_id: quiz.id.clone(),
            request: request.clone(),
        });

        let created = ExistingOverride {
            override_id: format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            quiz_id: quiz.id.clone(),
            title: Some(request.title.clone()),
            student_ids: request.student_ids.clone(),
            unlock_at: request.unlock_at.map(Timestamp::from),
            lock_at: request.lock_at.map(Timestamp::from),
            due_at: request.due_at.map(Timestamp::from),
        };
        self.overrides
            .lock()
            .unwrap()
            .entry(quiz.id.clone())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn delete_override(
        &self,
        _course_id: i64,
        quiz: &QuizSnapshot,
        override_id: &str,
    ) -> Result<()> {
        if self.fail_delete.contains(&quiz.id) {
            return Err(Self::fault("delete override"));
        }
        self.calls.lock().unwrap().push(Call::Delete {
            quiz_id: quiz.id.clone(),
            override_id: override_id.to_string(),
        });
        if let Some(list) = self.overrides.lock().unwrap().get_mut(&quiz.id) {
            list.retain(|o| o.override_id != override_id);
        }
        Ok(())
    }
}

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
}

pub fn now() -> DateTime<Utc> {
    at(1, 9, 0)
}

pub fn quiz(
    id: &str,
    time_limit: Option<i64>,
    unlock_at: Option<DateTime<Utc>>,
    lock_at: Option<DateTime<Utc>>,
) -> QuizSnapshot {
    QuizSnapshot {
        id: id.to_string(),
        assignment_id: format!("a{}", id),
        title: format!("Quiz {}", id),
        time_limit_minutes: time_limit,
        unlock_at: unlock_at.map(Timestamp::from),
        lock_at: lock_at.map(Timestamp::from),
        due_at: None,
        published: true,
        points_possible: Some(10.0),
        is_new_format: false,
    }
}

pub fn request(login: &str, multiplier: Multiplier, lms_user_id: &str) -> AccommodationRequest {
    AccommodationRequest {
        login_id: login.to_string(),
        name: login.to_uppercase(),
        multiplier,
        lms_user_id: lms_user_id.to_string(),
    }
}

pub fn existing(override_id: &str, quiz_id: &str, students: &[&str]) -> ExistingOverride {
    ExistingOverride {
        override_id: override_id.to_string(),
        quiz_id: quiz_id.to_string(),
        title: Some(format!("Override {}", override_id)),
        student_ids: students.iter().map(|s| s.to_string()).collect(),
        unlock_at: Some(Timestamp::from(at(5, 8, 0))),
        lock_at: Some(Timestamp::from(at(5, 20, 0))),
        due_at: None,
    }
}
