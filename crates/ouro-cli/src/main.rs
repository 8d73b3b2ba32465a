//! Ouro CLI - closed-loop code synthesis
//!
//! Usage:
//!   ouro build <directive>                 Generate and run a new program
//!   ouro repair --code <file> --error <e>  Fix a broken program
//!   ouro models                            List models the provider serves
//!   ouro clean                             Remove artifacts and the script file
//!   ouro init                              Write .ouro/config.toml

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ouro_agent::{get_auth_token, GeminiProvider, GenerationProvider};
use ouro_core::{Directive, OuroConfig, TracingStatusSink};
use ouro_orchestrator::{ReflexionController, SessionOutcome};
use ouro_sandbox::{PipInstaller, SandboxExecutor};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "ouro")]
#[command(author, version, about = "Closed-loop code synthesis: generate, run, heal, retry")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Working directory for the script, artifacts and .ouro/
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Print the result record as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Retries after the first attempt (overrides config)
    #[arg(long, global = true)]
    max_reflexion: Option<usize>,

    /// Model to try, in order (repeatable, replaces the configured cascade)
    #[arg(short, long = "model", global = true)]
    models: Vec<String>,

    /// Provider API key (defaults to the configured environment variable)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new program from a task description
    Build {
        /// What the program should do
        directive: String,
    },

    /// Repair a broken program
    Repair {
        /// File containing the broken code
        #[arg(long, value_name = "FILE")]
        code: PathBuf,

        /// Error message, or a file containing it
        #[arg(long, value_name = "FILE|TEXT")]
        error: String,
    },

    /// List models available to the configured key
    Models,

    /// Remove artifacts and the script file from the working directory
    Clean,

    /// Write the default configuration to .ouro/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Build { directive } => {
            if directive.trim().is_empty() {
                bail!("Directive must not be empty");
            }
            cmd_run(&cli, Directive::author(directive.clone())).await
        }
        Commands::Repair { code, error } => {
            let broken_code = tokio::fs::read_to_string(code)
                .await
                .with_context(|| format!("Failed to read broken code from {:?}", code))?;
            let error_text = read_text_or_file(error).await?;
            cmd_run(&cli, Directive::repair(broken_code, error_text)).await
        }
        Commands::Models => cmd_models(&cli).await,
        Commands::Clean => cmd_clean(&cli),
        Commands::Init { force } => cmd_init(&cli.dir, *force),
    }
}

/// Use `value` as a path if it names a file, otherwise as literal text
async fn read_text_or_file(value: &str) -> Result<String> {
    let path = Path::new(value);
    if path.is_file() {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path));
    }
    Ok(value.to_string())
}

fn load_config(cli: &Cli) -> Result<OuroConfig> {
    let mut config = OuroConfig::load_or_default(&cli.dir).with_context(|| {
        format!(
            "Failed to load {:?}",
            OuroConfig::path_for(&cli.dir)
        )
    })?;

    if let Some(max_reflexion) = cli.max_reflexion {
        config.reflexion.max_reflexion = max_reflexion;
    }
    if !cli.models.is_empty() {
        config.cascade.models = cli.models.clone();
    }
    Ok(config)
}

fn provider(cli: &Cli, config: &OuroConfig) -> Result<GeminiProvider> {
    let key = get_auth_token(cli.api_key.as_deref(), &config.cascade.api_key_env)?;
    Ok(GeminiProvider::new(key)?)
}

async fn cmd_run(cli: &Cli, directive: Directive) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let provider = provider(cli, &config)?;

    info!(
        "Working directory {:?}, models: {}",
        cli.dir,
        config.cascade.models.join(", ")
    );

    let executor = SandboxExecutor::from_config(&cli.dir, &config.sandbox);
    let installer = PipInstaller::new(config.sandbox.interpreter.clone());
    let mut controller = ReflexionController::from_config(
        &config,
        &cli.dir,
        provider,
        executor,
        installer,
        Arc::new(TracingStatusSink),
    );

    let outcome = controller.run(directive).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.generation_exhausted() {
        warn!("Every model failed; the output above is the provider's last error");
    }
    if outcome.result.mentions_rate_limit() {
        warn!("Provider quota exceeded (429). Wait a minute or use a different API key.");
    }

    Ok(if run_succeeded(&outcome) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// The cascade's diagnostic program verifies too, but means every model failed
fn run_succeeded(outcome: &SessionOutcome) -> bool {
    outcome.success() && !outcome.generation_exhausted()
}

fn print_outcome(outcome: &SessionOutcome) {
    let result = &outcome.result;

    println!("Output");
    println!("======");
    if result.stdout.trim().is_empty() {
        println!("(no output)");
    } else {
        println!("{}", result.stdout.trim_end());
    }

    if !result.artifacts.is_empty() {
        println!("\nArtifacts:");
        for artifact in &result.artifacts {
            println!("  {}", artifact.display());
        }
    }

    if !result.stderr.trim().is_empty() {
        println!("\nErrors");
        println!("======");
        println!("{}", result.stderr.trim_end());
    }

    println!("\nSource Code");
    println!("===========");
    println!("{}", result.final_code);

    println!();
    match &outcome.failure_reason {
        None => println!(
            "SUCCESS after {} attempt(s) (session {})",
            outcome.attempts_used, outcome.session_id
        ),
        Some(reason) => println!(
            "FAILED after {} attempt(s) (session {}): {}",
            outcome.attempts_used, outcome.session_id, reason
        ),
    }
}

async fn cmd_models(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let provider = provider(cli, &config)?;

    let models = provider
        .list_available_models()
        .await
        .context("Model discovery failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&models)?);
    } else if models.is_empty() {
        println!("No models support generateContent for this key");
    } else {
        println!("Models ({}):", models.len());
        for model in &models {
            println!("  {}", model);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_clean(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let executor = SandboxExecutor::from_config(&cli.dir, &config.sandbox);

    let removed = executor.clean();
    println!("Removed {} file(s) from {:?}", removed, cli.dir);
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(dir: &Path, force: bool) -> Result<ExitCode> {
    let path = OuroConfig::path_for(dir);
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }

    let written = OuroConfig::write_default(dir)
        .with_context(|| format!("Failed to write {:?}", path))?;

    println!("Initialized Ouro in {:?}", dir);
    println!("Created:");
    println!("  {}", written.display());
    println!("\nNext steps:");
    println!("  1. export GEMINI_API_KEY=...");
    println!("  2. ouro build \"Plot a sine wave and save it as sine.png\"");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ouro_core::{
        AttemptRecord, ExecutionResult, GenerationResult, RunResult, TerminalVerdict, Verdict,
    };

    fn outcome(generation: GenerationResult) -> SessionOutcome {
        SessionOutcome {
            session_id: "abcd1234".to_string(),
            verdict: TerminalVerdict::Success,
            attempts_used: 1,
            failure_reason: None,
            final_attempt: Some(AttemptRecord {
                index: 0,
                final_code: generation.source_code.clone(),
                generation,
                execution: ExecutionResult {
                    stdout: "output".to_string(),
                    ..Default::default()
                },
                heal_actions: Vec::new(),
                verdict: Verdict::Success,
            }),
            result: RunResult {
                success: true,
                stdout: "output".to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_run_success_for_generated_program() {
        let outcome = outcome(GenerationResult::from_model("print(1)", "gemini-pro"));
        assert!(run_succeeded(&outcome));
    }

    #[test]
    fn test_run_failure_when_every_model_failed() {
        let outcome = outcome(GenerationResult::sentinel(
            "All routes exhausted. Last error: 429",
        ));
        assert!(outcome.success());
        assert!(!run_succeeded(&outcome));
    }

    #[test]
    fn test_run_failure_when_budget_exhausted() {
        let mut outcome = outcome(GenerationResult::from_model("1/0", "gemini-pro"));
        outcome.verdict = TerminalVerdict::Fail;
        assert!(!run_succeeded(&outcome));
    }
}
