//! Agent lifecycle controller
//!
//! Owns the single run slot. `submit` claims it with one atomic
//! check-and-set on the published state, the run itself happens on a
//! background task, and every transition is pushed to observers.
//!
//! ```text
//! Idle ──submit──▶ Running ──success──▶ Idle
//!   ▲                 │  └───failure──▶ Error(msg) ──submit/acknowledge──▶ …
//!   └────cancel───────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::state::{AgentState, RunReport};
use crate::core::{Config, Result, Task};
use crate::runtime::{EnvOverrides, RunResult, ScriptRunner};
use crate::script::ScriptGenerator;

/// Transitions buffered per observer before it starts missing them
const TRANSITION_BUFFER: usize = 64;

/// Everything the state check-and-set covers
struct Slot {
    state: AgentState,
    /// Id of the latest accepted submission
    run_id: u64,
    /// Cancels the in-flight run, present only while `Running`
    cancel: Option<CancellationToken>,
    report: Option<RunReport>,
}

struct Inner {
    generator: ScriptGenerator,
    runner: Arc<dyn ScriptRunner>,
    run_timeout: Duration,
    slot: watch::Sender<Slot>,
    transitions: broadcast::Sender<AgentState>,
}

/// Runs at most one task at a time and publishes its lifecycle
///
/// Cheap to clone; clones share the same run slot.
#[derive(Clone)]
pub struct AgentController {
    inner: Arc<Inner>,
}

impl AgentController {
    pub fn new(runner: Arc<dyn ScriptRunner>, generator: ScriptGenerator, run_timeout: Duration) -> Self {
        let (slot, _) = watch::channel(Slot {
            state: AgentState::Idle,
            run_id: 0,
            cancel: None,
            report: None,
        });
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);

        Self {
            inner: Arc::new(Inner {
                generator,
                runner,
                run_timeout,
                slot,
                transitions,
            }),
        }
    }

    pub fn from_config(config: &Config, runner: Arc<dyn ScriptRunner>) -> Self {
        Self::new(
            runner,
            ScriptGenerator::from_config(&config.agent),
            config.agent.run_timeout(),
        )
    }

    /// Start `task` unless a run is already in flight.
    ///
    /// Returns `false`, changing nothing, while `Running` or when called
    /// outside a tokio runtime.
    pub fn submit(&self, task: Task) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("submission rejected, no tokio runtime to run it on");
            return false;
        };
        let cancel = CancellationToken::new();
        let mut run_id = 0;

        let accepted = self.inner.slot.send_if_modified(|slot| {
            if slot.state.is_running() {
                return false;
            }
            slot.run_id += 1;
            slot.state = AgentState::Running;
            slot.cancel = Some(cancel.clone());
            slot.report = None;
            run_id = slot.run_id;
            self.inner.publish(&slot.state);
            true
        });

        if !accepted {
            debug!("submission rejected, a run is already in flight");
            return false;
        }

        info!(run_id, model = %task.model.id, provider = %task.model.provider, "run started");
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            let outcome = inner.execute(task, cancel).await;
            inner.finish(run_id, outcome);
        });
        true
    }

    /// Stop the in-flight run, if any.
    ///
    /// The state is `Idle` when this returns; the subprocess is killed in the
    /// background and whatever it produced is discarded. Returns whether a
    /// run was cancelled.
    pub fn cancel(&self) -> bool {
        let mut token = None;
        let cancelled = self.inner.slot.send_if_modified(|slot| {
            if !slot.state.is_running() {
                return false;
            }
            slot.state = AgentState::Idle;
            token = slot.cancel.take();
            self.inner.publish(&slot.state);
            true
        });

        if let Some(token) = token {
            token.cancel();
        }
        if cancelled {
            info!("run cancelled");
        }
        cancelled
    }

    /// Clear an `Error` back to `Idle`. Returns whether anything changed.
    pub fn acknowledge(&self) -> bool {
        self.inner.slot.send_if_modified(|slot| {
            if !slot.state.is_error() {
                return false;
            }
            slot.state = AgentState::Idle;
            self.inner.publish(&slot.state);
            true
        })
    }

    /// Current state snapshot
    pub fn state(&self) -> AgentState {
        self.inner.slot.borrow().state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.slot.borrow().state.is_running()
    }

    /// Report of the last run that finished without being cancelled
    pub fn last_report(&self) -> Option<RunReport> {
        self.inner.slot.borrow().report.clone()
    }

    /// Stream of states: the current one first, then every transition.
    ///
    /// An observer that falls more than a buffer's worth of transitions
    /// behind skips the ones it missed.
    pub fn observe(&self) -> BoxStream<'static, AgentState> {
        // Snapshot and subscription happen under the slot's read lock, so no
        // transition can land between them.
        let (current, receiver) = {
            let slot = self.inner.slot.borrow();
            (slot.state.clone(), self.inner.transitions.subscribe())
        };

        let updates = BroadcastStream::new(receiver).filter_map(|item| item.ok());
        Box::pin(tokio_stream::once(current).chain(updates))
    }

    /// Wait until no run is in flight and return the state it left behind
    pub async fn settled(&self) -> AgentState {
        let mut states = self.observe();
        while let Some(state) = states.next().await {
            if !state.is_running() {
                return state;
            }
        }
        self.state()
    }
}

impl Inner {
    fn publish(&self, state: &AgentState) {
        // No receivers is fine; late observers start from the snapshot
        let _ = self.transitions.send(state.clone());
    }

    async fn execute(&self, task: Task, cancel: CancellationToken) -> Result<RunResult> {
        let script = self.generator.generate(&task)?;
        let env = EnvOverrides::from([(
            task.credential_env_var().to_string(),
            task.credential.clone(),
        )]);
        drop(task);

        self.runner.run(&script, &env, self.run_timeout, cancel).await
    }

    fn finish(&self, run_id: u64, outcome: Result<RunResult>) {
        let (next, report) = match &outcome {
            Ok(result) if result.succeeded => {
                (AgentState::Idle, RunReport::from_result(run_id, result))
            }
            Ok(result) => (
                AgentState::Error(result.summary()),
                RunReport::from_result(run_id, result),
            ),
            Err(e) => (
                AgentState::Error(e.to_string()),
                RunReport::from_error(run_id, e),
            ),
        };

        let applied = self.slot.send_if_modified(|slot| {
            if slot.run_id != run_id || !slot.state.is_running() {
                return false;
            }
            slot.state = next.clone();
            slot.cancel = None;
            slot.report = Some(report);
            self.publish(&slot.state);
            true
        });

        if !applied {
            debug!(run_id, "discarding result of cancelled run");
        } else if let AgentState::Error(ref message) = next {
            warn!(run_id, %message, "run failed");
        } else {
            info!(run_id, "run finished");
        }
    }
}
