//! Command-line driver for the question service.
//!
//! # Responsibility
//! - Resolve configuration, start logging and open the configured store.
//! - Run one service operation and print the result as JSON.
//! - Shut the service down exactly once before exiting.
//!
//! Exit codes: 0 success, 1 other failure, 2 not found, 3 forbidden.

use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use moodini_core::{
    init_logging, Answer, MemoryController, PersistenceController, Question, QuestionId,
    QuestionService, QuestionServiceError, ServiceConfig, StoreBackend, User, UserId,
};
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "moodini", version, about = "Create, vote on and manage poll questions")]
struct Cli {
    /// JSON configuration file; flags and env vars override its values.
    #[arg(long, env = "MOODINI_CONFIG")]
    config: Option<PathBuf>,

    /// Store backend. `memory` starts empty on every invocation and is
    /// discarded on exit, so only `create` and `health` are useful with it.
    #[arg(long, env = "MOODINI_BACKEND", value_enum)]
    backend: Option<BackendArg>,

    #[arg(long, env = "MOODINI_DB")]
    db: Option<PathBuf>,

    #[arg(long, env = "MOODINI_READ_CONNECTIONS")]
    read_connections: Option<usize>,

    #[arg(long, env = "MOODINI_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files.
    #[arg(long, env = "MOODINI_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Memory,
    Sqlite,
}

impl From<BackendArg> for StoreBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Memory => StoreBackend::Memory,
            BackendArg::Sqlite => StoreBackend::Sqlite,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a question owned by `--user`.
    Create {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        question: String,
        /// Answer option; repeat for each option in display order.
        #[arg(long = "answer", required = true)]
        answers: Vec<String>,
    },
    /// Replace text and answers of a question owned by `--user`.
    Update {
        #[arg(long)]
        user: UserId,
        id: QuestionId,
        #[arg(long)]
        question: String,
        #[arg(long = "answer", required = true)]
        answers: Vec<String>,
    },
    /// Print one question.
    Show { id: QuestionId },
    /// Print all questions in creation order.
    List,
    /// Print the most recently created question.
    Latest,
    /// Delete a question owned by `--user`.
    Delete {
        #[arg(long)]
        user: UserId,
        id: QuestionId,
    },
    /// Vote for one answer and print its new count.
    Vote { id: QuestionId, answer: String },
    /// Print the vote counts of a question.
    Results { id: QuestionId },
    /// Check that the store can be read.
    Health,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("moodini: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(log_dir) = &config.log_dir {
        if let Err(err) = init_logging(&config.log_level, log_dir) {
            eprintln!("moodini: {err}");
            return ExitCode::FAILURE;
        }
    }

    let outcome = match config.backend {
        StoreBackend::Memory => run(QuestionService::new(MemoryController::new()), cli.command),
        StoreBackend::Sqlite => match config.open_sqlite() {
            Ok(controller) => run(QuestionService::new(controller), cli.command),
            Err(err) => Err(err.into()),
        },
    };

    match outcome {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("moodini: {err}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<ServiceConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };

    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(read_connections) = cli.read_connections {
        config.read_connections = read_connections;
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }

    config.validate()?;
    Ok(config)
}

fn run<C: PersistenceController>(
    service: QuestionService<C>,
    command: Command,
) -> Result<String, QuestionServiceError> {
    let result = execute(&service, command);
    let shutdown = service.shutdown();
    let output = result?;
    shutdown?;
    Ok(output)
}

fn execute<C: PersistenceController>(
    service: &QuestionService<C>,
    command: Command,
) -> Result<String, QuestionServiceError> {
    let value = match command {
        Command::Create {
            user,
            question,
            answers,
        } => json!(service.create(&User::new(user), Question::new(question, answers))?),
        Command::Update {
            user,
            id,
            question,
            answers,
        } => json!(service.update(&User::new(user), Question::new(question, answers).with_id(id))?),
        Command::Show { id } => match service.read(id)? {
            Some(question) => json!(question),
            None => return Err(QuestionServiceError::NotFound(Some(id))),
        },
        Command::List => json!(service.read_all()?),
        Command::Latest => json!(service.read_latest()?),
        Command::Delete { user, id } => {
            service.delete(&User::new(user), id)?;
            json!({ "deleted": id })
        }
        Command::Vote { id, answer } => {
            let answer = Answer::new(answer);
            let count = service.vote(id, &answer)?;
            json!({ "questionId": id, "answer": answer, "count": count })
        }
        Command::Results { id } => json!(service.results(id)?),
        Command::Health => {
            let status = service.health_check()?;
            json!({ "status": "ok", "questionCount": status.question_count })
        }
    };

    Ok(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
}

const EXIT_FAILURE: u8 = 1;
const EXIT_NOT_FOUND: u8 = 2;
const EXIT_FORBIDDEN: u8 = 3;

fn exit_code_for(err: &QuestionServiceError) -> u8 {
    match err {
        QuestionServiceError::NotFound(_) => EXIT_NOT_FOUND,
        QuestionServiceError::Forbidden { .. } => EXIT_FORBIDDEN,
        QuestionServiceError::Store(_) => EXIT_FAILURE,
    }
}
