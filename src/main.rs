//! Browsebridge - supervised browser-automation runs
//!
//! Main entry point for the CLI application.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use browsebridge::cli::commands::dependency_report;
use browsebridge::{
    logging, AgentController, AgentState, Config, CredentialValidator, EnvironmentProbe, Model,
    ProcessRunner, Repl, ScriptRunner, Task,
};

/// Browsebridge - run natural-language browsing tasks through browser-use
#[derive(Parser, Debug)]
#[command(name = "browsebridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model id; the provider is inferred from it
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Python interpreter to run scripts with
    #[arg(long)]
    python: Option<PathBuf>,

    /// Run timeout in seconds
    #[arg(long, short = 't')]
    timeout: Option<u64>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single task mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Validate the credential and exit
    #[arg(long)]
    validate: bool,

    /// Check runtime dependencies and exit
    #[arg(long)]
    check_deps: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    init_config: bool,

    /// Provider credential (defaults to the provider's environment variable)
    #[arg(long, env = "BROWSEBRIDGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(python) = args.python {
        config.runtime.binary = python;
    }

    if let Some(timeout) = args.timeout {
        config.agent.run_timeout_secs = timeout;
    }

    if args.debug {
        config.agent.debug = true;
    }

    logging::init(config.agent.debug);

    if args.init_config {
        let path = config.save().context("failed to write configuration")?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let model = Model::resolve(args.model.unwrap_or_else(|| config.agent.default_model.clone()));
    let credential = args
        .api_key
        .or_else(|| env::var(model.provider.env_var()).ok())
        .filter(|c| !c.trim().is_empty());

    let runner: Arc<dyn ScriptRunner> = Arc::new(ProcessRunner::new(config.runtime.clone()));

    if args.check_deps {
        let probe = EnvironmentProbe::new(runner).with_check_timeout(config.validation.timeout());
        let runtime = probe.runtime_version().await;
        let status = probe.check_dependencies().await;
        print!("{}", dependency_report(runtime.as_deref(), &status));

        let missing: Vec<_> = status
            .iter()
            .filter(|(_, dependency)| !dependency.installed)
            .map(|(module, _)| module.as_str())
            .collect();
        if !missing.is_empty() {
            bail!("missing runtime modules: {}", missing.join(", "));
        }
        return Ok(());
    }

    if args.validate {
        let credential = credential
            .with_context(|| format!("no credential: pass --api-key or set {}", model.provider.env_var()))?;
        let outcome = CredentialValidator::new(runner, config.validation.clone())
            .validate(&credential, &model)
            .await;
        println!("{}", outcome);
        if !outcome.is_valid() {
            bail!("credential rejected for {}", model);
        }
        return Ok(());
    }

    // Single task mode
    if let Some(prompt) = args.prompt {
        let credential = credential
            .with_context(|| format!("no credential: pass --api-key or set {}", model.provider.env_var()))?;
        let controller = AgentController::from_config(&config, runner);

        let cancel = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        controller.submit(Task::new(prompt, model, credential));
        match controller.settled().await {
            AgentState::Error(message) => bail!("{}", message),
            _ => match controller.last_report() {
                Some(report) => println!("{}", report.summary),
                None => bail!("cancelled"),
            },
        }
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config, model, credential);
    repl.run().await?;

    Ok(())
}
