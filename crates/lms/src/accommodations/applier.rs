//! Applies planned quiz variants to the LMS.
//!
//! Every (quiz, tier) carries two independent outcomes, one for the time limit and one
//! for the lock date. A failed call is recorded on its item and the batch moves on.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use storage::models::{
    ApplyStatus, ExistingOverride, Multiplier, QuizSnapshot, QuizVariant, StudentGroup,
    Timestamp, valid_instant,
};
use storage::services::{overlapping_students, students_with_overrides};
use tracing::{info, warn};

use crate::{LmsError, Result};
use crate::traits::{OverrideRequest, QuizSink, QuizSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyKind {
    TimeLimit,
    LockAt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyItem {
    pub quiz_id: String,
    pub quiz_title: String,
    pub multiplier: Multiplier,
    pub kind: ApplyKind,
    pub status: ApplyStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    /// False as soon as one item failed.
    pub status: bool,
    pub items: Vec<ApplyItem>,
    pub variants: Vec<QuizVariant>,
}

impl ApplyReport {
    pub fn failures(&self) -> impl Iterator<Item = &ApplyItem> {
        self.items.iter().filter(|i| i.status.is_failure())
    }
}

fn item(
    quiz: &QuizSnapshot,
    multiplier: Multiplier,
    kind: ApplyKind,
    status: ApplyStatus,
    message: Option<String>,
) -> ApplyItem {
    ApplyItem {
        quiz_id: quiz.id.clone(),
        quiz_title: quiz.title.clone(),
        multiplier,
        kind,
        status,
        message,
    }
}

fn override_title(multiplier: Multiplier) -> String {
    format!("{} time accommodation", multiplier)
}

type TierStudents = HashMap<Multiplier, Vec<String>>;

fn students_of(students: &TierStudents, multiplier: Multiplier) -> &[String] {
    students
        .get(&multiplier)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub struct BatchApplier<'a> {
    source: &'a dyn QuizSource,
    sink: &'a dyn QuizSink,
    course_id: i64,
}

impl<'a> BatchApplier<'a> {
    pub fn new(source: &'a dyn QuizSource, sink: &'a dyn QuizSink, course_id: i64) -> Self {
        Self {
            source,
            sink,
            course_id,
        }
    }

    /// Applies every variant in order.
    ///
    /// With `should_override`, students already holding an override on a quiz are moved
    /// out of it before their new override is created. Without it they keep theirs and are
    /// left out of the new one.
    pub async fn apply(
        &self,
        groups: &[StudentGroup],
        mut variants: Vec<QuizVariant>,
        should_override: bool,
    ) -> ApplyReport {
        let students: TierStudents = groups
            .iter()
            .map(|g| (g.multiplier, g.student_ids()))
            .collect();

        info!(
            "Applying accommodations to {} quiz(zes) for {} tier(s)",
            variants.len(),
            groups.len()
        );

        let mut items = Vec::new();
        for variant in variants.iter_mut() {
            items.extend(self.apply_time_limits(variant, &students).await);
            items.extend(
                self.apply_lock_dates(variant, &students, should_override)
                    .await,
            );
        }

        let report = ApplyReport {
            status: items.iter().all(|i| !i.status.is_failure()),
            items,
            variants,
        };

        for failure in report.failures() {
            warn!(
                "{} {:?} for '{}' failed: {}",
                failure.multiplier,
                failure.kind,
                failure.quiz_title,
                failure.message.as_deref().unwrap_or("unknown error")
            );
        }

        report
    }

    async fn apply_time_limits(
        &self,
        variant: &mut QuizVariant,
        students: &TierStudents,
    ) -> Vec<ApplyItem> {
        let quiz = &variant.quiz;
        let mut items = Vec::new();

        for tier in variant.tiers.iter_mut() {
            let mut message = None;

            if tier.time_limit_status == ApplyStatus::Pending {
                let ids = students_of(students, tier.multiplier);
                tier.time_limit_status = match tier.extra_time(quiz.time_limit_minutes) {
                    Some(extra) if extra > 0 && !ids.is_empty() => {
                        match self
                            .sink
                            .add_extra_time(self.course_id, quiz, ids, extra)
                            .await
                        {
                            Ok(()) => {
                                info!(
                                    "'{}': +{} min for {} student(s) at {}",
                                    quiz.title,
                                    extra,
                                    ids.len(),
                                    tier.multiplier
                                );
                                ApplyStatus::Success
                            }
                            Err(e) => {
                                message = Some(e.to_string());
                                ApplyStatus::Failure
                            }
                        }
                    }
                    _ => ApplyStatus::NotApplicable,
                };
            }

            items.push(item(
                quiz,
                tier.multiplier,
                ApplyKind::TimeLimit,
                tier.time_limit_status,
                message,
            ));
        }

        items
    }

    async fn apply_lock_dates(
        &self,
        variant: &mut QuizVariant,
        students: &TierStudents,
        should_override: bool,
    ) -> Vec<ApplyItem> {
        let quiz = &variant.quiz;
        let mut messages: HashMap<Multiplier, String> = HashMap::new();

        for tier in variant.tiers.iter_mut() {
            if tier.lock_status == ApplyStatus::Pending
                && students_of(students, tier.multiplier).is_empty()
            {
                tier.lock_status = ApplyStatus::NotApplicable;
            }
        }

        let pending: Vec<usize> = variant
            .tiers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.lock_status == ApplyStatus::Pending)
            .map(|(idx, _)| idx)
            .collect();

        if !pending.is_empty() {
            let prepared = match self.source.list_overrides(self.course_id, quiz).await {
                Ok(existing) if !existing.is_empty() && should_override => {
                    let targets: HashSet<&str> = pending
                        .iter()
                        .flat_map(|&idx| students_of(students, variant.tiers[idx].multiplier))
                        .map(String::as_str)
                        .collect();
                    self.remove_students(quiz, &existing, &targets)
                        .await
                        .map(|()| Vec::new())
                        .map_err(|e| format!("Could not reconcile existing overrides: {}", e))
                }
                Ok(existing) => Ok(existing),
                Err(e) => Err(format!("Could not list existing overrides: {}", e)),
            };

            match prepared {
                Err(message) => {
                    for &idx in &pending {
                        let tier = &mut variant.tiers[idx];
                        tier.lock_status = ApplyStatus::Failure;
                        messages.insert(tier.multiplier, message.clone());
                    }
                }
                Ok(kept) => {
                    for &idx in &pending {
                        let tier = &mut variant.tiers[idx];
                        let ids = students_of(students, tier.multiplier);

                        let recipients: Vec<String> = if kept.is_empty() {
                            ids.to_vec()
                        } else {
                            let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
                            let covered = students_with_overrides(&kept, &targets);
                            ids.iter()
                                .filter(|id| !covered.contains(id.as_str()))
                                .cloned()
                                .collect()
                        };

                        if recipients.is_empty() {
                            tier.lock_status = ApplyStatus::NotApplicable;
                            messages.insert(
                                tier.multiplier,
                                "Every student already has an override on this quiz".to_string(),
                            );
                            continue;
                        }

                        let request = OverrideRequest {
                            title: override_title(tier.multiplier),
                            student_ids: recipients,
                            unlock_at: valid_instant(&quiz.unlock_at),
                            lock_at: tier.new_lock_at,
                            due_at: tier.new_due_at,
                        };

                        tier.lock_status = match self
                            .sink
                            .create_override(self.course_id, quiz, &request)
                            .await
                        {
                            Ok(created) => {
                                info!(
                                    "'{}': override {} for {} student(s) at {}",
                                    quiz.title,
                                    created.override_id,
                                    request.student_ids.len(),
                                    tier.multiplier
                                );
                                ApplyStatus::Success
                            }
                            Err(e) => {
                                messages.insert(tier.multiplier, e.to_string());
                                ApplyStatus::Failure
                            }
                        };
                    }
                }
            }
        }

        variant
            .tiers
            .iter()
            .map(|t| {
                item(
                    quiz,
                    t.multiplier,
                    ApplyKind::LockAt,
                    t.lock_status,
                    messages.remove(&t.multiplier),
                )
            })
            .collect()
    }

    /// Takes `targets` out of every existing override on the quiz. An override left with no
    /// students is deleted; one left with others is recreated for them with its own dates.
    async fn remove_students(
        &self,
        quiz: &QuizSnapshot,
        existing: &[ExistingOverride],
        targets: &HashSet<&str>,
    ) -> Result<()> {
        let overlapping: Vec<&ExistingOverride> = existing
            .iter()
            .filter(|o| !overlapping_students(o, targets).is_empty())
            .collect();

        // Recreating with an unreadable date would widen the window of the students left
        // behind, so nothing is touched.
        if let Some(unreadable) = overlapping.iter().find(|o| has_malformed_date(o)) {
            return Err(LmsError::Validation(format!(
                "Override {} has an unreadable date; move its students manually",
                unreadable.override_id
            )));
        }

        for existing_override in overlapping {

            let remaining: Vec<String> = existing_override
                .student_ids
                .iter()
                .filter(|id| !targets.contains(id.as_str()))
                .cloned()
                .collect();

            self.sink
                .delete_override(self.course_id, quiz, &existing_override.override_id)
                .await?;

            if remaining.is_empty() {
                info!(
                    "'{}': removed override {}",
                    quiz.title, existing_override.override_id
                );
                continue;
            }

            let request = OverrideRequest {
                title: existing_override
                    .title
                    .clone()
                    .unwrap_or_else(|| format!("{} students", remaining.len())),
                student_ids: remaining,
                unlock_at: valid_instant(&existing_override.unlock_at),
                lock_at: valid_instant(&existing_override.lock_at),
                due_at: valid_instant(&existing_override.due_at),
            };
            let recreated = self
                .sink
                .create_override(self.course_id, quiz, &request)
                .await?;
            info!(
                "'{}': override {} recreated as {} for {} remaining student(s)",
                quiz.title,
                existing_override.override_id,
                recreated.override_id,
                request.student_ids.len()
            );
        }

        Ok(())
    }
}

fn has_malformed_date(existing: &ExistingOverride) -> bool {
    [&existing.unlock_at, &existing.lock_at, &existing.due_at]
        .into_iter()
        .flatten()
        .any(Timestamp::is_malformed)
}
