use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cldk_demo::analysis;
use cldk_demo::backend::{Backend, HostedClient, OllamaClient};
use cldk_demo::config::{Config, HostedCredentials};
use cldk_demo::dispatch::{DEFAULT_TEMPERATURE, Dispatcher};
use cldk_demo::display::ConsolePresenter;
use cldk_demo::error::AppError;
use cldk_demo::pipeline::{self, FailurePolicy, InteractiveStepper, NoPause, RunSettings, Stepper};
use cldk_demo::tasks::{self, Task};
use cldk_demo::types::{BackendKind, SourceLanguage};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Generates unit tests and summaries for Java and Python methods with an LLM.",
    long_about = "Walks a Java or Python project, builds an instruction for every method, \
                  prompts a local Ollama model (or the hosted watsonx service with -w), \
                  and prints the instruction next to the model's answer."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a JUnit test for every method of a Java project.
    JavaTest(RunArgs),
    /// Generate a unittest test case for every function of a Python project.
    PythonTest(RunArgs),
    /// Summarize every function of a Python project.
    PythonSummary(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the project.
    #[arg(short, long)]
    project_path: PathBuf,

    /// Use the hosted watsonx service instead of a local Ollama server.
    #[arg(short = 'w', long)]
    use_watsonx: bool,

    /// Model to prompt; defaults depend on the task and the backend.
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature.
    #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Only analyse files whose project-relative path matches this glob.
    #[arg(long)]
    include: Option<String>,

    /// What to do when the local backend reports an error.
    #[arg(long, value_enum, default_value_t = FailurePolicy::Halt)]
    on_failure: FailurePolicy,

    /// Do not wait for a key press after each method.
    #[arg(long)]
    no_pause: bool,
}

fn setup_logging(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn build_backend(config: &Config) -> Result<Backend, AppError> {
    Ok(match config.backend {
        BackendKind::Local => Backend::Local(OllamaClient::new(config.ollama_host.clone())),
        BackendKind::Hosted => Backend::Hosted(HostedClient::new(HostedCredentials::from_env()?)),
    })
}

fn run(task: Task, args: RunArgs) -> Result<(), AppError> {
    let backend_kind = if args.use_watsonx {
        BackendKind::Hosted
    } else {
        BackendKind::Local
    };
    let config = Config::new(
        args.project_path,
        backend_kind,
        args.model,
        args.temperature,
        args.include.as_deref(),
    )?;

    tracing::info!(
        "Running {:?} for project at {:?}",
        task,
        config.project_path
    );

    let jobs = match task.language() {
        SourceLanguage::Java => {
            let table = analysis::java_symbol_table(&config.project_path, config.include.as_ref())?;
            tasks::java_jobs(&table, task)
        }
        SourceLanguage::Python => {
            let modules = analysis::python_modules(&config.project_path, config.include.as_ref())?;
            tasks::python_jobs(&modules, task)
        }
    };

    if jobs.is_empty() {
        tracing::warn!("No methods found under {:?}", config.project_path);
        return Ok(());
    }

    let model = config
        .model
        .clone()
        .unwrap_or_else(|| task.default_model(config.backend).to_string());
    let dispatcher = Dispatcher::new(build_backend(&config)?);
    let presenter = ConsolePresenter::new();
    let mut stepper: Box<dyn Stepper> = if args.no_pause {
        Box::new(NoPause)
    } else {
        Box::new(InteractiveStepper::new())
    };

    let settings = RunSettings {
        task,
        model: &model,
        temperature: config.temperature,
        on_failure: args.on_failure,
    };
    let summary = pipeline::run(&jobs, &dispatcher, &presenter, stepper.as_mut(), &settings)?;

    if summary.stopped_early {
        tracing::info!(
            "Stopped after {} of {} method(s)",
            summary.processed,
            jobs.len()
        );
    }
    Ok(())
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Command::JavaTest(args) => run(Task::JavaTest, args),
        Command::PythonTest(args) => run(Task::PythonTest, args),
        Command::PythonSummary(args) => run(Task::PythonSummary, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_hosted_flag_and_defaults() {
        let cli = Cli::parse_from(["cldk-demo", "java-test", "-p", "demo", "-w"]);
        let Command::JavaTest(args) = cli.command else {
            panic!("expected java-test");
        };
        assert_eq!(args.project_path, PathBuf::from("demo"));
        assert!(args.use_watsonx);
        assert_eq!(args.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(args.on_failure, FailurePolicy::Halt);
        assert!(!args.no_pause);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn project_path_is_required() {
        assert!(Cli::try_parse_from(["cldk-demo", "python-summary"]).is_err());
    }

    #[test]
    fn failure_policy_and_pause_flags_parse() {
        let cli = Cli::parse_from([
            "cldk-demo",
            "python-test",
            "--project-path",
            "proj",
            "--on-failure",
            "skip",
            "--no-pause",
            "--include",
            "src/**/*.py",
        ]);
        let Command::PythonTest(args) = cli.command else {
            panic!("expected python-test");
        };
        assert_eq!(args.on_failure, FailurePolicy::Skip);
        assert!(args.no_pause);
        assert_eq!(args.include.as_deref(), Some("src/**/*.py"));
        assert!(!args.use_watsonx);
    }
}
