//! Command-line front end for the student roster.
//!
//! # Responsibility
//! - Map subcommands onto the five `StudentService` operations.
//! - Print results as JSON and errors as one `error:` line.
//!
//! # Invariants
//! - Without `--db`, every invocation works on a fresh in-memory store.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use roster_core::db::{open_db, open_db_in_memory};
use roster_core::{
    default_log_level, init_logging, SqliteStudentRepository, StudentDraft, StudentId,
    StudentService,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Student roster - manage student records
#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Student roster - manage student records")]
#[command(version)]
struct Cli {
    /// Path to the SQLite database file (in-memory when omitted)
    #[arg(long, env = "ROSTER_DB")]
    db: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, env = "ROSTER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files (logging disabled when omitted)
    #[arg(long, env = "ROSTER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new student
    Add(StudentFields),
    /// Show one active student
    Get {
        #[arg(allow_negative_numbers = true)]
        id: StudentId,
    },
    /// List active students ordered by name
    List,
    /// Replace name, email, age and course of an active student
    Update {
        #[arg(allow_negative_numbers = true)]
        id: StudentId,
        #[command(flatten)]
        fields: StudentFields,
    },
    /// Soft-delete a student
    Delete {
        #[arg(allow_negative_numbers = true)]
        id: StudentId,
    },
}

#[derive(Args)]
struct StudentFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    age: i32,
    #[arg(long)]
    course: String,
}

impl From<StudentFields> for StudentDraft {
    fn from(value: StudentFields) -> Self {
        StudentDraft::new(value.name, value.email, value.age, value.course)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render_error(&err));
            ExitCode::FAILURE
        }
    }
}

/// Formats an error chain as one `error:` line.
///
/// Causes whose text already ends the line are skipped.
fn render_error(err: &anyhow::Error) -> String {
    let mut message = err.to_string();
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
    }
    format!("error: {message}")
}

fn run(cli: Cli) -> Result<()> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy())
            .map_err(anyhow::Error::msg)
            .context("failed to initialize logging")?;
    }

    let conn = open_connection(cli.db.as_deref())?;
    let repo = SqliteStudentRepository::try_new(&conn)?;
    let service = StudentService::new(repo);

    match cli.command {
        Commands::Add(fields) => {
            let student = service.create(fields.into())?;
            print_json(&student)
        }
        Commands::Get { id } => match service.get_by_id(id)? {
            Some(student) => print_json(&student),
            None => anyhow::bail!("no student with id {id}"),
        },
        Commands::List => print_json(&service.list_all()?),
        Commands::Update { id, fields } => {
            let student = service.update(id, fields.into())?;
            print_json(&student)
        }
        Commands::Delete { id } => {
            let deleted = service.delete(id)?;
            print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
        }
    }
}

fn open_connection(path: Option<&Path>) -> Result<Connection> {
    let conn = match path {
        Some(path) => open_db(path)
            .with_context(|| format!("failed to open database `{}`", path.display()))?,
        None => open_db_in_memory().context("failed to open in-memory database")?,
    };
    Ok(conn)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
