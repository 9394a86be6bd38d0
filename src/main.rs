use anyhow::{Context, Result};
use shipline::cli::commands::{HistoryCommand, RunCommand, ValidateCommand};
use shipline::cli::exit::{exit_code, failure_report, EXIT_FAILED, EXIT_PRE_RUN, EXIT_SUCCESS};
use shipline::cli::output::*;
use shipline::cli::{Cli, Command};
use shipline::core::config::PipelineConfig;
use shipline::execution::PipelineOrchestrator;
use shipline::persistence::{
    create_summary, ExecutionSummary, InMemoryPersistence, PersistenceBackend,
};
use shipline::runner::CommandRunner;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(feature = "sqlite")]
use shipline::persistence::SqliteExecutionStore;

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{:#}", e);
    }

    let code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await.unwrap_or_else(|e| {
            error!("{:#}", e);
            eprintln!("{} {}", CROSS, style(format!("{:#}", e)).red());
            EXIT_PRE_RUN
        }),
        Command::Validate(cmd) => validate_pipeline(cmd).unwrap_or_else(|e| {
            eprintln!("{} {:#}", CROSS, e);
            EXIT_PRE_RUN
        }),
        Command::History(cmd) => match show_history(cmd).await {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                eprintln!("{} {:#}", CROSS, e);
                EXIT_FAILED
            }
        },
    };

    std::process::exit(code);
}

/// Logs go to stderr; stdout is reserved for progress lines
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")
}

async fn run_pipeline(cmd: &RunCommand) -> Result<i32> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let spec = config
        .to_spec(&cmd.overrides())
        .context("Invalid pipeline")?;

    println!("{} Loaded pipeline: {}", INFO, style(spec.name()).bold());
    for (key, value) in &cmd.variables {
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        match history_store().await {
            Ok(store) => store,
            Err(e) => {
                warn!("{:#}; this run will not be recorded", e);
                Arc::new(InMemoryPersistence::new())
            }
        }
    };

    let mut orchestrator = PipelineOrchestrator::new(CommandRunner::new());
    orchestrator.on_event(|event| println!("{}", format_execution_event(event)));
    let cancel = orchestrator.cancellation_token();
    let total_steps = spec.steps().len();

    println!();
    let run = tokio::spawn(async move { orchestrator.run(&spec).await });
    let interrupt = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupt received, cancelling run");
        cancel.cancel();
    });

    let outcome = run.await.context("Pipeline task failed")?;
    interrupt.abort();
    let result = outcome.context("Pipeline could not start")?;

    let summary = create_summary(&result, total_steps);
    match store.save_execution(&summary).await {
        Ok(()) if !cmd.no_history => println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.execution_id.to_string()[..8]).dim()
        ),
        Ok(()) => {}
        Err(e) => warn!("Failed to save run history: {:#}", e),
    }

    if result.success {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&result.pipeline_name).bold(),
            style("successfully").green()
        );
    }
    if let Some(report) = failure_report(&result).context("Failed to encode summary")? {
        eprint!("\n{}", report);
    }

    Ok(exit_code(&result))
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating pipeline...", INFO);

    let validated = PipelineConfig::from_file(&cmd.file).and_then(|config| {
        let spec = config.to_spec(&cmd.overrides())?;
        Ok((config, spec))
    });

    match validated {
        Ok((config, spec)) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(spec.name()).bold());
            println!("  Steps: {}", style(spec.steps().len()).cyan());
            for step in spec.steps() {
                let mut flags = Vec::new();
                if step.retryable {
                    flags.push("retryable");
                }
                if step.credentials {
                    flags.push("credentials");
                }
                println!(
                    "    {} {} {}",
                    style(&step.name).cyan(),
                    style(step.command.join(" ")).dim(),
                    style(flags.join(", ")).yellow()
                );
            }
            if spec.needs_credentials() {
                let vars = spec.credential_config();
                println!(
                    "  Credentials: {}, {}",
                    style(&vars.username_env).cyan(),
                    style(&vars.secret_env).cyan()
                );
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            Ok(EXIT_PRE_RUN)
        }
    }
}

#[cfg(feature = "sqlite")]
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    let store = SqliteExecutionStore::with_default_path()
        .await
        .context("Failed to open run history")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    anyhow::bail!("Run history requires the `sqlite` feature")
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = history_store().await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;
        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    if cmd.pipelines {
        let names = store.list_pipelines().await?;
        if cmd.json {
            let data = serde_json::json!({ "pipelines": names });
            println!("{}", serde_json::to_string_pretty(&data)?);
        } else if names.is_empty() {
            println!("{} No runs found", INFO);
        } else {
            println!("{} Pipelines with recorded runs:", INFO);
            for name in &names {
                println!("  {}", style(name).cyan());
            }
        }
        return Ok(());
    }

    let executions = match &cmd.pipeline {
        Some(pipeline_name) => {
            let mut execs = store.list_executions(pipeline_name).await?;
            execs.truncate(cmd.limit);
            execs
        }
        None => store.recent_executions(cmd.limit).await?,
    };

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    println!("  Completed: {}", style(summary.completed_at.to_rfc3339()).dim());
    println!(
        "  Duration: {}",
        style(format_duration(std::time::Duration::from_millis(summary.duration_ms()))).dim()
    );
    println!(
        "  Steps: {}/{}",
        summary.completed_steps, summary.total_steps
    );
    if let Some(step) = &summary.failed_step {
        println!("  Failed step: {}", style(step).red());
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
