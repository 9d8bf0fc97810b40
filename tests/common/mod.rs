//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use browsebridge::core::Result;
use browsebridge::runtime::{EnvOverrides, RunResult, ScriptRunner};
use browsebridge::BridgeError;
use tokio_util::sync::CancellationToken;

/// What a stub run ends with
#[derive(Clone)]
pub enum Reply {
    Result(RunResult),
    LaunchFailure,
}

/// Runner that answers every script with a canned reply after a delay
pub struct StubRunner {
    reply: Reply,
    delay: Duration,
    /// Whether the stub returns early when its token is cancelled
    honor_cancel: bool,
    pub calls: AtomicUsize,
    pub saw_cancel: AtomicBool,
    pub envs: Mutex<Vec<EnvOverrides>>,
    pub scripts: Mutex<Vec<String>>,
}

impl StubRunner {
    pub fn new(reply: RunResult) -> Self {
        Self {
            reply: Reply::Result(reply),
            delay: Duration::ZERO,
            honor_cancel: true,
            calls: AtomicUsize::new(0),
            saw_cancel: AtomicBool::new(false),
            envs: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(text: &str) -> Self {
        Self::new(RunResult::exited(0, format!("SUCCESS: {}\n", text), ""))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(RunResult::exited(1, format!("ERROR: {}\n", message), ""))
    }

    pub fn launch_failure() -> Self {
        Self {
            reply: Reply::LaunchFailure,
            ..Self::succeeding("unused")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn ignoring_cancel(mut self) -> Self {
        self.honor_cancel = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptRunner for StubRunner {
    async fn run(
        &self,
        script: &str,
        env: &EnvOverrides,
        _timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.envs.lock().unwrap().push(env.clone());
        self.scripts.lock().unwrap().push(script.to_string());

        if self.honor_cancel {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => {
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    return Ok(RunResult::cancelled("", ""));
                }
            }
        } else {
            tokio::time::sleep(self.delay).await;
        }

        match &self.reply {
            Reply::Result(result) => Ok(result.clone()),
            Reply::LaunchFailure => Err(BridgeError::launch("python3", "runtime binary not found")),
        }
    }
}
