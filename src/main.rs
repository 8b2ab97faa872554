//! cdnflow CLI Entry Point
//!
//! Provides command-line interface for running provisioning workflows.
//!
//! # Usage
//!
//! ```bash
//! # Run a built-in playbook
//! cdnflow provision
//!
//! # Run a step table from a file
//! cdnflow my-workflow.yaml
//!
//! # Show the steps without calling the API
//! cdnflow onboarding --plan
//!
//! # Seed extra context and keep a JSON report
//! cdnflow provision --set fallback_service_id=2EgSbcP0 --report run.json
//! ```

use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use log::{error, info, warn};
use serde_json::Value;

use cdnflow::api::ApiClient;
use cdnflow::config::{parse_assignment, Settings};
use cdnflow::execution::{Engine, RecordStatus, RunOutcome, RunStatus};
use cdnflow::workflow::{load_workflow, playbooks, WorkflowDef};
use cdnflow::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct CliArgs {
    workflow: Option<String>,
    plan: bool,
    list: bool,
    config_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
    overrides: Vec<(String, Value)>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("CDN Provisioning Workflows");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: cdnflow [OPTIONS] <WORKFLOW>");
    println!();
    println!("Arguments:");
    println!("  <WORKFLOW>          Built-in playbook name or path to a workflow YAML file");
    println!();
    println!("Options:");
    println!("  --plan              Print the steps without calling the API");
    println!("  --list              List built-in playbooks");
    println!("  --config PATH       Settings file (default: cdnflow.yaml)");
    println!("  --set KEY=VALUE     Add a value to the initial context (repeatable)");
    println!("  --report PATH       Write the run outcome as JSON");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Environment:");
    println!("  FASTLY_TOKEN, FASTLY_API_URL, FASTLY_CUSTOMER_ID, FASTLY_SERVICE_ID,");
    println!("  CDNFLOW_TIMEOUT_SECS, CDNFLOW_CONFIG");
    println!();
    println!("Examples:");
    println!("  cdnflow provision");
    println!("  cdnflow onboarding --plan");
    println!("  cdnflow workflows/custom.yaml --set service_id=abc --report run.json");
}

/// Parses command-line arguments into a CliArgs struct.
fn parse_arguments(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--plan" => cli.plan = true,
            "--list" => cli.list = true,
            "--verbose" | "-v" => cli.verbose = true,
            "--config" | "--report" | "--set" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| format!("{} requires an argument", arg))?;
                match arg.as_str() {
                    "--config" => cli.config_path = Some(PathBuf::from(value)),
                    "--report" => cli.report_path = Some(PathBuf::from(value)),
                    _ => cli.overrides.push(parse_assignment(value)?),
                }
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if cli.workflow.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                cli.workflow = Some(arg.clone());
            }
        }
        i += 1;
    }

    if cli.workflow.is_none() && !cli.list {
        return Err("No workflow given".to_string());
    }

    Ok(cli)
}

/// Resolves a workflow argument to a built-in playbook or a YAML file.
fn load_definition(name: &str) -> Result<WorkflowDef, Box<dyn Error>> {
    if let Some(definition) = playbooks::builtin(name)? {
        info!("Using built-in playbook '{}'", name);
        return Ok(definition);
    }

    load_workflow(name).map_err(|e| {
        error!("Failed to load workflow: {}", e);
        let message = format!("Could not load workflow from '{}': {}", name, e);
        Box::<dyn Error>::from(message)
    })
}

/// Prints the steps of a workflow without running them.
fn print_plan(definition: &WorkflowDef) {
    println!("Workflow: {}", definition.name.bold());
    if let Some(description) = &definition.description {
        println!("  {}", description);
    }
    if !definition.inputs.is_empty() {
        println!("Inputs: {}", definition.inputs.join(", "));
    }
    println!();

    for (index, step) in definition.steps.iter().enumerate() {
        let mut flags = Vec::new();
        if step.required {
            flags.push("required".to_string());
        }
        if let Some(gate) = &step.gate {
            flags.push(format!("gate {} == {}", gate.path, gate.equals));
        }
        if step.fallback.is_some() {
            flags.push("fallback".to_string());
        }

        println!(
            "{:>3}. {:24} {:6} {}",
            index + 1,
            step.name,
            step.request.method.to_string(),
            step.request.path
        );
        if !flags.is_empty() {
            println!("       [{}]", flags.join(", ").dimmed());
        }

        let mut bound: Vec<&str> = Vec::new();
        for key in step.bound_keys() {
            if !bound.contains(&key) {
                bound.push(key);
            }
        }
        if !bound.is_empty() {
            println!("       -> {}", bound.join(", "));
        }
    }
}

/// Prints the per-step result table and final status.
fn print_summary(outcome: &RunOutcome) {
    println!();
    println!("{}", "Run summary".bold());

    for record in &outcome.log {
        let marker = match record.status {
            RecordStatus::Success if record.primary_error.is_some() => "~".yellow(),
            RecordStatus::Success => "✓".green(),
            RecordStatus::Error => "✗".red(),
        };
        match &record.error {
            Some(error) => println!("  {} {} ({})", marker, record.step, error),
            None => println!("  {} {}", marker, record.step),
        }
    }

    println!();
    match outcome.status {
        RunStatus::Completed if outcome.is_clean() => {
            println!("{}", "Workflow completed".green().bold());
        }
        RunStatus::Completed => println!(
            "{} ({} failed: {})",
            "Workflow completed with errors".yellow().bold(),
            outcome.failed_steps().len(),
            outcome.failed_steps().join(", ")
        ),
        RunStatus::Halted => {
            let step = outcome.halted_at.as_deref().unwrap_or("?");
            println!("{} at '{}'", "Workflow halted".red().bold(), step);
            if let Some(cause) = &outcome.halt_cause {
                println!("  {}", cause);
            }
        }
        RunStatus::Cancelled => println!("{}", "Workflow cancelled".yellow().bold()),
    }
    println!();
    print!("{}", outcome.timeline.report());
}

/// Writes the outcome as pretty JSON.
fn write_report(outcome: &RunOutcome, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(outcome)?;
    fs::write(path, json)
        .map_err(|e| format!("Failed to write report '{}': {}", path.display(), e))?;
    info!("Report written to: {}", path.display());
    Ok(())
}

/// Main application entry point.
async fn run() -> Result<RunStatus, Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let cli = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(cli.verbose);

    if cli.list {
        for name in playbooks::names() {
            println!("{}", name);
        }
        return Ok(RunStatus::Completed);
    }

    print_banner();

    let name = cli.workflow.as_deref().ok_or("No workflow given")?;
    let definition = load_definition(name)?;

    if cli.plan {
        print_plan(&definition);
        return Ok(RunStatus::Completed);
    }

    let settings = Settings::load(cli.config_path.as_deref())?;
    info!("API endpoint: {}", settings.api_url);

    let mut context = settings.initial_context(chrono::Utc::now());
    for (key, value) in cli.overrides {
        context.insert(key, value);
    }

    for key in definition.missing_inputs(&context) {
        warn!("Input '{}' is not set; steps reading it will fail", key);
    }

    let client = ApiClient::new(&settings.api_url, settings.require_token()?, settings.timeout())?;
    let workflow = definition.compile(Arc::new(client))?;

    // Ctrl-C stops the run before the next step
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_on_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            cancel_on_signal.store(true, Ordering::SeqCst);
        }
    });

    let mut engine = Engine::new();
    engine.set_cancel_flag(cancel);

    let outcome = engine.run(&workflow, context).await;
    print_summary(&outcome);

    if let Some(path) = &cli.report_path {
        write_report(&outcome, path)?;
    }

    Ok(outcome.status)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(RunStatus::Completed) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("cdnflow")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_workflow_and_flags() {
        let cli = parse_arguments(&args(&["provision", "--plan", "--verbose"])).unwrap();
        assert_eq!(cli.workflow.as_deref(), Some("provision"));
        assert!(cli.plan);
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_options_with_values() {
        let cli = parse_arguments(&args(&[
            "--config",
            "custom.yaml",
            "onboarding",
            "--set",
            "service_version=3",
            "--report",
            "out.json",
        ]))
        .unwrap();

        assert_eq!(cli.config_path, Some(PathBuf::from("custom.yaml")));
        assert_eq!(cli.report_path, Some(PathBuf::from("out.json")));
        assert_eq!(
            cli.overrides,
            vec![("service_version".to_string(), serde_json::json!(3))]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&[])).is_err());
        assert!(parse_arguments(&args(&["a", "b"])).is_err());
        assert!(parse_arguments(&args(&["a", "--bogus"])).is_err());
        assert!(parse_arguments(&args(&["a", "--config"])).is_err());
        assert!(parse_arguments(&args(&["a", "--set", "novalue"])).is_err());
    }

    #[test]
    fn test_list_needs_no_workflow() {
        let cli = parse_arguments(&args(&["--list"])).unwrap();
        assert!(cli.list);
        assert!(cli.workflow.is_none());
    }

    #[test]
    fn test_load_definition_builtin_and_missing() {
        assert_eq!(load_definition("onboarding").unwrap().name, "onboarding");
        assert!(load_definition("/nonexistent/workflow.yaml").is_err());
    }
}
