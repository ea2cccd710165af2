use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use lms::accommodations::{
    BatchApplier, detect_conflicts, list_selectable_quizzes, prepare_batch,
};
use lms::grades::{RetryPolicy, compute_course_grades, submit_final_grades, weight_sync_check};
use lms::{CanvasClient, Config};
use serde::Serialize;
use std::path::{Path, PathBuf};
use storage::Database;
use storage::dto::{AssessmentBatchRequest, StudentAllocationRequest};
use storage::models::AccommodationRequest;
use storage::repository::{
    AllocationRepository, AssessmentRepository, CourseRepository, StudentRepository,
};
use storage::services::WindowCalculator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "flexgrade")]
#[command(about = "Flexible grade weighting and quiz accommodations for Canvas courses", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror a course and its student roster locally
    Courses {
        #[command(subcommand)]
        command: CourseCommand,
    },
    /// Compute and submit final grades
    Grades {
        #[command(subcommand)]
        command: GradeCommand,
    },
    /// Manage the weighted assessment categories of a course
    Assessments {
        #[command(subcommand)]
        command: AssessmentCommand,
    },
    /// Manage students' chosen weights
    Allocations {
        #[command(subcommand)]
        command: AllocationCommand,
    },
    /// Extend quiz time limits and lock dates
    Accommodations {
        #[command(subcommand)]
        command: AccommodationCommand,
    },
}

#[derive(Subcommand)]
enum CourseCommand {
    /// Fetch the course name and student roster
    Sync {
        #[arg(long)]
        course: i64,
    },
}

#[derive(Subcommand)]
enum GradeCommand {
    /// Print default and flex totals for every student
    Compute {
        #[arg(long)]
        course: i64,
    },
    /// Compute and write final grades to the gradebook
    Submit {
        #[arg(long)]
        course: i64,
    },
    /// Compare assessment defaults with the gradebook's group weights
    SyncCheck {
        #[arg(long)]
        course: i64,
    },
}

#[derive(Subcommand)]
enum AssessmentCommand {
    /// Validate and replace the course's assessments from a JSON file
    Import {
        #[arg(long)]
        course: i64,

        #[arg(long)]
        file: PathBuf,
    },
    /// Print the course's assessments
    List {
        #[arg(long)]
        course: i64,
    },
}

#[derive(Subcommand)]
enum AllocationCommand {
    /// Replace a student's weights from a JSON file
    Set {
        #[arg(long)]
        student: Uuid,

        #[arg(long)]
        file: PathBuf,
    },
    /// Clear the choices of students outside the current bounds
    Reset {
        #[arg(long)]
        course: i64,
    },
}

#[derive(Subcommand)]
enum AccommodationCommand {
    /// List quizzes that can be accommodated
    Quizzes {
        #[arg(long)]
        course: i64,
    },
    /// Show planned changes and conflicts with existing overrides
    Preview {
        #[arg(long)]
        course: i64,

        #[arg(long)]
        requests: PathBuf,

        #[arg(long = "quiz")]
        quizzes: Vec<String>,
    },
    /// Apply accommodations to the selected quizzes
    Apply {
        #[arg(long)]
        course: i64,

        #[arg(long)]
        requests: PathBuf,

        #[arg(long = "quiz", required = true)]
        quizzes: Vec<String>,

        /// Move students out of overrides they already hold
        #[arg(long = "override")]
        should_override: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "flexgrade={},lms={},storage={}",
                    log_level, log_level, log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    let client = CanvasClient::new(&config.canvas)?;

    match cli.command {
        Commands::Courses { command } => handle_course(command, &config, &client).await,
        Commands::Grades { command } => handle_grades(command, &config, &client).await,
        Commands::Assessments { command } => handle_assessments(command, &config).await,
        Commands::Allocations { command } => handle_allocations(command, &config).await,
        Commands::Accommodations { command } => handle_accommodations(command, &client).await,
    }
}

async fn connect(config: &Config) -> anyhow::Result<Database> {
    tracing::info!("Connecting to database...");
    let db = Database::new(config.database_url()?).await?;
    db.run_migrations().await?;
    Ok(db)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn handle_course(
    command: CourseCommand,
    config: &Config,
    client: &CanvasClient,
) -> anyhow::Result<()> {
    let CourseCommand::Sync { course } = command;
    let db = connect(config).await?;

    let canvas_course = client.fetch_course(course).await?;
    CourseRepository::new(db.pool())
        .upsert(course, &canvas_course.name)
        .await?;

    let roster = client.list_students(course).await?;
    let students = StudentRepository::new(db.pool());
    for entry in &roster {
        students.enroll(course, entry).await?;
    }

    tracing::info!(
        "Synced course '{}' with {} student(s)",
        canvas_course.name,
        roster.len()
    );
    Ok(())
}

async fn handle_grades(
    command: GradeCommand,
    config: &Config,
    client: &CanvasClient,
) -> anyhow::Result<()> {
    let db = connect(config).await?;

    match command {
        GradeCommand::Compute { course } => {
            let assessments = AssessmentRepository::new(db.pool())
                .list_by_course(course)
                .await?;
            let allocations = AllocationRepository::new(db.pool())
                .by_lms_user(course)
                .await?;
            let report = compute_course_grades(client, course, &assessments, &allocations).await?;
            print_json(&report)
        }
        GradeCommand::Submit { course } => {
            let assessments = AssessmentRepository::new(db.pool())
                .list_by_course(course)
                .await?;
            let allocations = AllocationRepository::new(db.pool())
                .by_lms_user(course)
                .await?;
            let report = compute_course_grades(client, course, &assessments, &allocations).await?;
            let submission = submit_final_grades(client, &report, &RetryPolicy::default()).await;
            print_json(&submission)?;

            if !submission.is_complete() {
                bail!(
                    "{} final grade(s) could not be submitted",
                    submission.incomplete.len()
                );
            }
            Ok(())
        }
        GradeCommand::SyncCheck { course } => {
            let assessments = AssessmentRepository::new(db.pool())
                .list_by_course(course)
                .await?;
            let issues = weight_sync_check(client, course, &assessments).await?;
            if issues.is_empty() {
                tracing::info!("Assessment weights match the gradebook");
            }
            print_json(&issues)
        }
    }
}

async fn handle_assessments(command: AssessmentCommand, config: &Config) -> anyhow::Result<()> {
    let db = connect(config).await?;
    let repo = AssessmentRepository::new(db.pool());

    match command {
        AssessmentCommand::Import { course, file } => {
            let batch: AssessmentBatchRequest = read_json(&file).await?;
            let saved = repo.replace_batch(course, &batch.assessments).await?;
            print_json(&saved)
        }
        AssessmentCommand::List { course } => print_json(&repo.list_by_course(course).await?),
    }
}

async fn handle_allocations(command: AllocationCommand, config: &Config) -> anyhow::Result<()> {
    let db = connect(config).await?;
    let repo = AllocationRepository::new(db.pool());

    match command {
        AllocationCommand::Set { student, file } => {
            let request: StudentAllocationRequest = read_json(&file).await?;
            let saved = repo.set_for_student(student, &request.allocations).await?;
            print_json(&saved)
        }
        AllocationCommand::Reset { course } => {
            let reset = repo.reset_out_of_range(course).await?;
            print_json(&serde_json::json!({ "students_reset": reset }))
        }
    }
}

async fn handle_accommodations(
    command: AccommodationCommand,
    client: &CanvasClient,
) -> anyhow::Result<()> {
    let calculator = WindowCalculator::new(chrono::Local, chrono::Utc::now());

    match command {
        AccommodationCommand::Quizzes { course } => {
            let quizzes = list_selectable_quizzes(client, &calculator, course).await?;
            print_json(&quizzes)
        }
        AccommodationCommand::Preview {
            course,
            requests,
            quizzes,
        } => {
            let requests: Vec<AccommodationRequest> = read_json(&requests).await?;
            let batch = prepare_batch(client, &calculator, course, &requests, &quizzes).await?;
            let conflicts =
                detect_conflicts(client, &calculator, course, &requests, &batch.variants).await?;

            print_json(&serde_json::json!({
                "groups": batch.groups,
                "variants": batch.variants,
                "conflicts": conflicts,
            }))
        }
        AccommodationCommand::Apply {
            course,
            requests,
            quizzes,
            should_override,
        } => {
            let requests: Vec<AccommodationRequest> = read_json(&requests).await?;
            let batch = prepare_batch(client, &calculator, course, &requests, &quizzes).await?;

            let applier = BatchApplier::new(client, client, course);
            let report = applier
                .apply(&batch.groups, batch.variants, should_override)
                .await;
            print_json(&report)?;

            if !report.status {
                bail!(
                    "{} accommodation item(s) failed",
                    report.failures().count()
                );
            }
            Ok(())
        }
    }
}
