//! Interactive REPL
//!
//! Reads commands and tasks from stdin while printing every lifecycle
//! transition the controller publishes.

use std::collections::HashMap;
use std::env;
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::agent::{AgentController, AgentState, Conversation};
use crate::cli::commands::{dependency_report, help_text, models_text, parse, Command};
use crate::core::{Config, Model, Provider, Result, Task};
use crate::credential::CredentialValidator;
use crate::runtime::{EnvironmentProbe, ProcessRunner, ScriptRunner};

/// What the loop does after a line was handled
enum Flow {
    Continue,
    Exit,
}

/// A slow command running off the input loop. Its report comes back
/// through the loop's inbox.
#[derive(Default)]
struct Background {
    handle: Option<JoinHandle<()>>,
}

impl Background {
    fn is_busy(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start `job` unless the previous one is still going
    fn start<F>(&mut self, job: F, outbox: &mpsc::UnboundedSender<String>) -> bool
    where
        F: Future<Output = String> + Send + 'static,
    {
        if self.is_busy() {
            return false;
        }
        let outbox = outbox.clone();
        self.handle = Some(tokio::spawn(async move {
            let _ = outbox.send(job.await);
        }));
        true
    }

    /// Abort the running job. Dropping it kills its runtime process and
    /// removes its script. Returns whether anything was running.
    fn interrupt(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }
}

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    config: Config,
    model: Model,
    /// Credentials entered this session, never written anywhere
    credentials: HashMap<Provider, String>,
    controller: AgentController,
    validator: Arc<CredentialValidator>,
    probe: Arc<EnvironmentProbe>,
    conversation: Conversation,
    job: Background,
    outbox: mpsc::UnboundedSender<String>,
    inbox: mpsc::UnboundedReceiver<String>,
}

impl Repl {
    /// Create a REPL driving the configured runtime
    pub fn with_config(config: Config, model: Model, credential: Option<String>) -> Self {
        let runner: Arc<dyn ScriptRunner> = Arc::new(ProcessRunner::new(config.runtime.clone()));
        let mut credentials = HashMap::new();
        if let Some(credential) = credential {
            credentials.insert(model.provider, credential);
        }

        let (outbox, inbox) = mpsc::unbounded_channel();

        Self {
            controller: AgentController::from_config(&config, Arc::clone(&runner)),
            validator: Arc::new(CredentialValidator::new(
                Arc::clone(&runner),
                config.validation.clone(),
            )),
            probe: Arc::new(
                EnvironmentProbe::new(runner).with_check_timeout(config.validation.timeout()),
            ),
            conversation: Conversation::new(config.agent.context_window.max(1) * 2),
            job: Background::default(),
            outbox,
            inbox,
            credentials,
            model,
            config,
        }
    }

    /// Credential for the current provider: entered in this session, else
    /// the provider's environment variable.
    fn credential(&self) -> Option<String> {
        self.credentials
            .get(&self.model.provider)
            .cloned()
            .or_else(|| env::var(self.model.provider.env_var()).ok())
            .filter(|c| !c.trim().is_empty())
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut states = self.controller.observe();
        // The first item is the current state, not a transition
        let mut last = states.next().await.unwrap_or(AgentState::Idle);

        prompt()?;
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        println!("\nGoodbye!");
                        break;
                    };
                    if line.trim().is_empty() {
                        prompt()?;
                        continue;
                    }
                    if let Flow::Exit = self.handle_line(&line) {
                        println!("\nGoodbye!");
                        break;
                    }
                    prompt()?;
                }
                Some(state) = states.next() => {
                    self.on_transition(&last, &state);
                    last = state;
                }
                Some(report) = self.inbox.recv() => {
                    println!("\n{}\n", report);
                    prompt()?;
                }
                _ = tokio::signal::ctrl_c() => {
                    if self.controller.cancel() {
                        continue;
                    }
                    if self.job.interrupt() {
                        println!("\n[interrupted]\n");
                        prompt()?;
                        continue;
                    }
                    println!("\nGoodbye!");
                    break;
                }
            }
        }

        self.controller.cancel();
        self.job.interrupt();
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        match parse(line) {
            Command::Exit => return Flow::Exit,
            Command::Help => println!("{}\n", help_text()),
            Command::Models => println!("{}", models_text(&self.model.id)),
            Command::Usage(usage) => println!("{}\n", usage),
            Command::Status => println!("{}\n", self.status()),

            Command::Clear => {
                self.conversation.clear();
                println!("Conversation cleared.\n");
            }

            Command::SetModel(id) => {
                self.model = Model::resolve(id);
                println!("Model set to: {}\n", self.model);
            }

            Command::Key(credential) => {
                self.credentials
                    .insert(self.model.provider, credential.trim().to_string());
                println!(
                    "Credential set for {} (kept in memory only).\n",
                    self.model.provider.display_name()
                );
            }

            Command::Validate => match self.credential() {
                Some(credential) => {
                    let validator = Arc::clone(&self.validator);
                    let model = self.model.clone();
                    self.spawn_job(format!("Validating credential for {}...", model), async move {
                        validator.validate(&credential, &model).await.to_string()
                    });
                }
                None => println!("{}\n", self.missing_credential()),
            },

            Command::Deps => {
                let probe = Arc::clone(&self.probe);
                self.spawn_job("Checking runtime dependencies...".to_string(), async move {
                    let runtime = probe.runtime_version().await;
                    let status = probe.check_dependencies().await;
                    dependency_report(runtime.as_deref(), &status).trim_end().to_string()
                });
            }

            Command::Install(package) => {
                let probe = Arc::clone(&self.probe);
                self.spawn_job(format!("Installing {}...", package), async move {
                    match probe.install(&package).await {
                        Ok(result) if result.succeeded => format!("Installed {}.", package),
                        Ok(result) => format!("Install failed: {}", result.summary()),
                        Err(e) => format!("Install failed: {}", e),
                    }
                });
            }

            Command::Cancel => {
                if !self.controller.cancel() {
                    println!("Nothing is running.\n");
                }
            }

            Command::Acknowledge => {
                if !self.controller.acknowledge() {
                    println!("Nothing to acknowledge.\n");
                }
            }

            Command::Details => self.print_details(),

            Command::Task(text) => self.submit(text),
        }
        Flow::Continue
    }

    /// Run a slow command in the background so Ctrl+C stays responsive
    fn spawn_job<F>(&mut self, banner: String, job: F)
    where
        F: Future<Output = String> + Send + 'static,
    {
        if self.job.start(job, &self.outbox) {
            println!("{} (Ctrl+C to interrupt)", banner);
        } else {
            println!("Still busy with the previous command. Press Ctrl+C to interrupt it.\n");
        }
    }

    fn submit(&mut self, text: String) {
        let Some(credential) = self.credential() else {
            println!("{}\n", self.missing_credential());
            return;
        };

        let context = self.conversation.recent(self.config.agent.context_window);
        let task = Task::new(text.clone(), self.model.clone(), credential).with_context(context);
        if self.controller.submit(task) {
            self.conversation.add_user(text);
        } else {
            println!("A task is already running. Use 'cancel' to stop it.\n");
        }
    }

    fn on_transition(&mut self, from: &AgentState, to: &AgentState) {
        debug!(%from, %to, "state transition");
        match (from, to) {
            (_, AgentState::Running) => println!("\n[running] {}", self.model),
            (AgentState::Running, AgentState::Idle) => match self.controller.last_report() {
                Some(report) if report.succeeded => {
                    println!("\nAgent:\n{}\n", report.summary);
                    self.conversation.add_assistant(report.summary);
                }
                _ => println!("\n[cancelled]\n"),
            },
            (AgentState::Error(_), AgentState::Idle) => println!("\n[idle]\n"),
            (_, AgentState::Error(message)) => {
                println!("\n[error] {}", message);
                println!("Type 'details' for the full output or 'ack' to clear.\n");
            }
            _ => {}
        }
    }

    fn print_details(&self) {
        let Some(report) = self.controller.last_report() else {
            println!("No finished run yet.\n");
            return;
        };

        println!("Run #{}", report.run_id);
        match report.exit_code {
            Some(code) => println!("Exit code:   {}", code),
            None => println!("Exit code:   (runtime did not start)"),
        }
        if let Some(termination) = report.termination {
            println!("Termination: {:?}", termination);
        }
        println!("Summary:     {}", report.summary);
        println!("── stdout ──\n{}", report.stdout.trim_end());
        println!("── stderr ──\n{}\n", report.stderr.trim_end());
    }

    fn status(&self) -> String {
        format!(
            "Browsebridge Status:\n\
             ─────────────────────────────\n\
             Model:       {}\n\
             Credential:  {}\n\
             State:       {}\n\
             Command:     {}\n\
             Runtime:     {}\n\
             Timeout:     {}s\n\
             History:     {} messages",
            self.model,
            if self.credential().is_some() { "set" } else { "missing" },
            self.controller.state(),
            if self.job.is_busy() { "busy" } else { "none" },
            self.config.runtime.binary.display(),
            self.config.agent.run_timeout_secs,
            self.conversation.len(),
        )
    }

    fn missing_credential(&self) -> String {
        format!(
            "No credential for {}. Use 'key <credential>' or set {}.",
            self.model.provider.display_name(),
            self.model.provider.env_var()
        )
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!("Browsebridge {}", env!("CARGO_PKG_VERSION"));
        println!("Runtime: {}", self.config.runtime.binary.display());
        println!("Model:   {}", self.model);
        println!();
        println!("Commands: help, status, validate, deps, cancel, exit");
        println!("─────────────────────────────────────────────────────────");
    }
}

fn prompt() -> Result<()> {
    print!("You: ");
    io::stdout().flush()?;
    Ok(())
}
