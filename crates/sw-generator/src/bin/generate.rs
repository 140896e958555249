//! CLI for generating step-by-step instructions.
//!
//! # Usage
//!
//! ```bash
//! # Ask the default Ollama model
//! cargo run -p sw-generator --bin stepwise -- --question "How do I repot a cactus?"
//!
//! # Read the question from stdin, lenient gating, Russian answer
//! cargo run -p sw-generator --bin stepwise -- --policy lenient --language ru
//!
//! # Local inference program; completions start at "1."
//! cargo run -p sw-generator --bin stepwise -- --backend local --marker dot \
//!     --local-cmd llama-cli --local-arg=-n --local-arg={max_tokens}
//! ```
//!
//! The backends own their async runtimes, so `main` stays synchronous.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use sw_core::{CancellationToken, GenerationBackend, QualityPolicy, QualityVerdict};
use sw_generator::{
    CommandRuntime, GeneratorConfig, GeneratorError, InstructionGenerator, Language,
    LocalModelBackend, OllamaBackend, OllamaConfig, PromptBuilder, StepMarkerStyle,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Ollama server over HTTP
    Ollama,
    /// Local inference program
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LanguageArg {
    Ru,
    En,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MarkerArg {
    Dot,
    Paren,
    Word,
}

/// Generate a structured step-by-step instruction for a question.
#[derive(Debug, Parser)]
#[command(name = "stepwise", version)]
struct Args {
    /// Question to answer (read from stdin if omitted)
    #[arg(short, long)]
    question: Option<String>,

    /// Generation backend
    #[arg(long, value_enum, default_value_t = BackendKind::Ollama)]
    backend: BackendKind,

    /// Model name (Ollama)
    #[arg(long)]
    model: Option<String>,

    /// Ollama base URL
    #[arg(long)]
    url: Option<String>,

    /// Local inference program
    #[arg(long, value_name = "PROGRAM", required_if_eq("backend", "local"))]
    local_cmd: Option<String>,

    /// Argument for the local program; `{temperature}` and `{max_tokens}` are filled in
    #[arg(long = "local-arg", value_name = "ARG", allow_hyphen_values = true)]
    local_args: Vec<String>,

    /// Quality policy
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Maximum generation attempts
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), conflicts_with = "unbounded")]
    max_attempts: Option<u32>,

    /// Retry until the policy is met
    #[arg(long)]
    unbounded: bool,

    /// Answer language
    #[arg(long, value_enum)]
    language: Option<LanguageArg>,

    /// Step marker style
    #[arg(long, value_enum)]
    marker: Option<MarkerArg>,

    /// Do not ask for substeps
    #[arg(long)]
    no_substeps: bool,

    /// Extra prompt directive (repeatable)
    #[arg(long = "directive", value_name = "TEXT")]
    directives: Vec<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum output tokens
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Add a note about the previous rejection to each retry prompt
    #[arg(long)]
    vary_prompt: bool,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.quiet);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let question = match args.question.clone() {
        Some(question) => question,
        None => match read_question() {
            Ok(question) => question,
            Err(e) => {
                eprintln!("Error reading question: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let backend = match build_backend(&args, &config) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error creating backend: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match PromptBuilder::build_str(&question, &config.prompt) {
        Ok(prompt) => {
            println!("Prompt:");
            println!("=======");
            println!("{}", prompt);
            println!();
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    println!("Backend: {}", backend.name());
    println!("Policy: {}", config.policy.describe());
    match config.attempts_max {
        Some(max) => println!("Max attempts: {}", max),
        None => println!("Max attempts: unbounded"),
    }
    println!();

    let generator = InstructionGenerator::new(backend, config);
    let mut progress = |_attempt: u32, verdict: &QualityVerdict| {
        if !verdict.accepted {
            println!("Instruction is not good enough. Generating again...");
        }
    };

    match generator.generate_with(&question, &CancellationToken::new(), Some(&mut progress)) {
        Ok(result) => {
            println!();
            println!("Instruction:");
            println!("============");
            println!("{}", result.text);
            println!();
            println!("{}", result.format_summary());
            ExitCode::SUCCESS
        }
        Err(GeneratorError::Exhausted { attempts, last, best }) => {
            eprintln!("No acceptable instruction after {} attempts", attempts);
            eprintln!("Last attempt: {}", last.verdict.reason.description());
            if !best.text.is_empty() {
                eprintln!();
                eprintln!("Best attempt (#{}):", best.attempt);
                eprintln!("{}", best.text);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Config file (or defaults), then flags on top.
fn build_config(args: &Args) -> Result<GeneratorConfig, sw_generator::ConfigError> {
    let mut config = match args.config {
        Some(ref path) => GeneratorConfig::from_file(path)?,
        None => GeneratorConfig::default(),
    };

    match args.policy {
        Some(PolicyArg::Strict) => config.policy = QualityPolicy::strict(),
        Some(PolicyArg::Lenient) => config.policy = QualityPolicy::lenient(),
        None => {}
    }

    if let Some(max) = args.max_attempts {
        config.attempts_max = Some(max);
    }
    if args.unbounded {
        config.attempts_max = None;
    }

    match args.language {
        Some(LanguageArg::Ru) => config.prompt.language = Language::Russian,
        Some(LanguageArg::En) => config.prompt.language = Language::English,
        None => {}
    }

    match args.marker {
        Some(MarkerArg::Dot) => config.prompt.marker_style = StepMarkerStyle::Dot,
        Some(MarkerArg::Paren) => config.prompt.marker_style = StepMarkerStyle::Paren,
        Some(MarkerArg::Word) => config.prompt.marker_style = StepMarkerStyle::Word,
        None => {}
    }

    if args.no_substeps {
        config.prompt.include_substeps = false;
    }
    config
        .prompt
        .extra_directives
        .extend(args.directives.iter().cloned());

    if let Some(temperature) = args.temperature {
        config.options.temperature = temperature;
    }
    if let Some(max_tokens) = args.max_tokens {
        config.options.output_length_max = max_tokens;
    }
    if args.vary_prompt {
        config.vary_prompt_per_attempt = true;
    }

    config.validate()?;
    Ok(config)
}

fn build_backend(
    args: &Args,
    config: &GeneratorConfig,
) -> Result<Box<dyn GenerationBackend>, sw_core::BackendError> {
    let mut env = OllamaConfig::from_env();

    match args.backend {
        BackendKind::Ollama => {
            if let Some(ref model) = args.model {
                env.model = model.clone();
            }
            if let Some(ref url) = args.url {
                env = env.with_base_url(url);
            }

            let backend = OllamaBackend::new(env)?;
            if !backend.health_check() {
                eprintln!(
                    "Warning: Ollama at {} is not reachable; attempts will fail until it is",
                    backend.config().base_url
                );
            }
            Ok(Box::new(backend))
        }
        BackendKind::Local => {
            let program = args.local_cmd.clone().unwrap_or_default();
            let runtime = CommandRuntime::new(program, args.local_args.clone(), env.timeout)?;

            // Raw completion models follow a started list far more reliably.
            let seed = config.prompt.marker_style.marker(1);
            Ok(Box::new(LocalModelBackend::new(runtime).with_completion_seed(seed)))
        }
    }
}

/// Prompt on stdin until a non-blank line arrives.
fn read_question() -> io::Result<String> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("Enter your question: ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no question on stdin",
            ));
        }
        if !line.trim().is_empty() {
            return Ok(line.trim().to_string());
        }
    }
}
