//! EternaLearn CLI
//!
//! Main entry point for chatting with the tutor, serving the HTTP API, and
//! exporting progress reports.

use std::io::Write as _;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eterna_report::{json::JsonGenerator, MarkdownGenerator, QuizInput, ReportGenerator, ReportInput};
use eterna_tutor::{
    build_model, create_router, is_exit_command, AppState, Config, MemoryBank, StudentProfile,
    Tutor, TutorError,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

const WELCOME: &str = "\
Welcome to EternaLearn!

Your AI-powered adaptive learning companion.

What I can do:
  - Explain complex topics with visual aids
  - Generate personalized quizzes
  - Track your learning progress

Commands:
  - Type any topic to learn
  - Say \"quiz me on [topic]\" to practice
  - Say \"show my progress\" for stats
  - Type \"exit\" to quit

Let's make learning eternal :)";

/// EternaLearn - Adaptive Tutoring Assistant
///
/// Explains topics with visual aids, quizzes the student, scores their
/// answers, and tracks progress across sessions.
#[derive(Parser, Debug)]
#[command(name = "eterna")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: eterna.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Student identifier (overrides studentId)
    #[arg(short, long, value_name = "ID", global = true)]
    student: Option<String>,

    /// Path to the memory bank file (overrides memoryBankPath)
    #[arg(short, long, value_name = "FILE", global = true)]
    data: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat with the tutor in the terminal (default)
    Chat,

    /// Serve the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port for the HTTP API server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Print the student's progress summary
    Progress,

    /// Write Markdown and JSON progress reports
    Report {
        /// Output directory for reports
        #[arg(short, long, value_name = "DIR", default_value = "reports")]
        output_dir: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    // Priority: RUST_LOG env var > --verbose flag > logLevel > info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, student_id = %config.student_id, "Configuration loaded");

    let result = match args.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(&config).await,
        Command::Serve { host, port } => run_server(&config, SocketAddr::new(host, port)).await,
        Command::Progress => run_progress(&config).await,
        Command::Report { output_dir } => run_report(&config, Path::new(&output_dir)).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration and applies CLI overrides.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match args.config.as_deref() {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))?
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}"))?,
    };

    if let Some(ref student) = args.student {
        config.student_id.clone_from(student);
    }
    if let Some(ref data) = args.data {
        config.memory_bank_path.clone_from(data);
    }

    // Re-validate after overrides
    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(config)
}

async fn open_bank(config: &Config) -> anyhow::Result<Arc<MemoryBank>> {
    let bank = MemoryBank::open_file(config.memory_bank_path.as_str())
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "{e}\n\nSuggestion: Fix or move the file, or point --data at another memory bank"
            )
        })?;
    Ok(Arc::new(bank))
}

async fn build_tutor(config: &Config) -> anyhow::Result<Tutor> {
    let model = build_model(&config.model).map_err(|e| match e {
        TutorError::MissingApiKey { ref env_var } => anyhow::anyhow!(
            "{e}\n\nSuggestion: Export {env_var} or add it to a .env file"
        ),
        other => anyhow::anyhow!("{other}"),
    })?;
    let bank = open_bank(config).await?;

    tracing::info!(
        provider = ?config.model.provider,
        model = %config.model.model_name,
        memory_bank = %config.memory_bank_path,
        "EternaLearn initialized"
    );

    Ok(Tutor::new(config, model, bank))
}

async fn close_tutor(tutor: &Tutor) {
    if let Err(e) = tutor.close().await {
        tracing::warn!(error = %e, "Failed to flush memory bank on exit");
    }
}

/// Runs the interactive REPL until an exit word, EOF, or Ctrl+C.
async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let tutor = build_tutor(config).await?;

    println!("{WELCOME}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Ok(()) = tokio::signal::ctrl_c() => {
                println!("\n\nGoodbye!");
                break;
            }
        };

        let Some(line) = line else {
            println!("\nGoodbye!");
            break;
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if is_exit_command(message) {
            println!("\nHappy learning!");
            break;
        }

        let reply = tutor.handle_message(&config.student_id, message).await;
        println!("\nEternaLearn:\n{}", reply.text);
    }

    close_tutor(&tutor).await;
    Ok(())
}

/// Serves the HTTP API until Ctrl+C.
async fn run_server(config: &Config, addr: SocketAddr) -> anyhow::Result<()> {
    let tutor = Arc::new(build_tutor(config).await?);
    let router = create_router(AppState::new(Arc::clone(&tutor), config.student_id.clone()));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port")
    })?;

    println!("EternaLearn API running on http://{}", listener.local_addr()?);
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Shutting down...");
    close_tutor(&tutor).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
    }
    tracing::info!("Shutdown signal received");
}

/// Prints the progress summary without creating a profile.
async fn run_progress(config: &Config) -> anyhow::Result<()> {
    let bank = open_bank(config).await?;
    println!("{}", bank.progress_summary(&config.student_id).await);
    Ok(())
}

async fn run_report(config: &Config, output_dir: &Path) -> anyhow::Result<()> {
    let bank = open_bank(config).await?;
    let profile = bank.find_profile(&config.student_id).await.ok_or_else(|| {
        anyhow::anyhow!(
            "No learning record for student '{}'\n\nSuggestion: Chat with the tutor first or check --student",
            config.student_id
        )
    })?;

    generate_reports(&profile, output_dir)
}

/// Writes `{student}-progress.md` and `{student}-progress.json` to `output_dir`.
fn generate_reports(profile: &StudentProfile, output_dir: &Path) -> anyhow::Result<()> {
    println!("Generating reports...");

    let report = ReportGenerator::new(create_report_input(profile)).generate()?;

    std::fs::create_dir_all(output_dir)?;

    let md_path = output_dir.join(format!("{}-progress.md", profile.id));
    std::fs::write(&md_path, MarkdownGenerator::new(&report).generate())?;
    println!("  Markdown report: {}", md_path.display());

    let json_path = output_dir.join(format!("{}-progress.json", profile.id));
    JsonGenerator::new(&report).write_to_file(&json_path, true)?;
    println!("  JSON report: {}", json_path.display());

    println!();
    println!(
        "{} quizzes across {} topics, average score {:.1}%",
        report.summary.total_quizzes,
        report.summary.total_topics,
        report.summary.average_score * 100.0
    );

    Ok(())
}

fn create_report_input(profile: &StudentProfile) -> ReportInput {
    ReportInput {
        student_id: profile.id.clone(),
        created_at: profile.created_at,
        topics_covered: profile.topics_covered.clone(),
        strong_areas: profile.strong_areas.clone(),
        weak_areas: profile.weak_areas.clone(),
        quiz_history: profile
            .quiz_history
            .iter()
            .map(|q| QuizInput {
                timestamp: q.timestamp,
                topic: q.topic.clone(),
                score: q.score,
                total_questions: q.total_questions,
                correct_answers: q.correct_answers,
            })
            .collect(),
    }
}
