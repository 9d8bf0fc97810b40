//! Runtime dependency checks
//!
//! Asks the external runtime whether the libraries generated scripts import
//! are installed, which versions they are, and installs them on request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::Result;
use crate::runtime::result::{Marker, RunResult};
use crate::runtime::runner::{EnvOverrides, ScriptRunner};
use crate::script::ScriptGenerator;

/// Modules a task script needs at run time
pub const REQUIRED_MODULES: &[&str] = &["browser_use", "patchright", "langchain_openai"];

const CHECK_TIMEOUT: Duration = Duration::from_secs(30);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// What the runtime reported about one module
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependencyStatus {
    pub installed: bool,
    /// `None` when missing or when the package does not expose a version
    pub version: Option<String>,
}

impl DependencyStatus {
    fn from_payload(module: &str, payload: &str) -> Self {
        let version = payload
            .strip_prefix(module)
            .unwrap_or(payload)
            .trim();
        Self {
            installed: true,
            version: match version {
                "" | "unknown" => None,
                v => Some(v.to_string()),
            },
        }
    }
}

/// Queries the runtime for installed modules
pub struct EnvironmentProbe {
    runner: Arc<dyn ScriptRunner>,
    generator: ScriptGenerator,
    check_timeout: Duration,
    install_timeout: Duration,
}

impl EnvironmentProbe {
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self {
            runner,
            generator: ScriptGenerator::default(),
            check_timeout: CHECK_TIMEOUT,
            install_timeout: INSTALL_TIMEOUT,
        }
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Run a short query script; the `SUCCESS:` payload of a clean exit
    async fn query(&self, script: &str) -> Option<String> {
        match self
            .runner
            .run(
                script,
                &EnvOverrides::new(),
                self.check_timeout,
                CancellationToken::new(),
            )
            .await
        {
            Ok(result) if result.exit_code == 0 => match result.marker() {
                Some(Marker::Success(payload)) => Some(payload),
                _ => None,
            },
            Ok(result) => {
                debug!(summary = %result.summary(), "runtime query failed");
                None
            }
            Err(e) => {
                debug!(err = %e, "runtime query could not run");
                None
            }
        }
    }

    /// Whether `module` imports cleanly in the runtime
    pub async fn check_dependency(&self, module: &str) -> bool {
        self.inspect_dependency(module).await.installed
    }

    /// Installation status and version of `module`
    pub async fn inspect_dependency(&self, module: &str) -> DependencyStatus {
        let script = match self.generator.generate_dependency_check(module) {
            Ok(script) => script,
            Err(e) => {
                warn!(module, err = %e, "refusing dependency check");
                return DependencyStatus::default();
            }
        };

        let status = self
            .query(&script)
            .await
            .map(|payload| DependencyStatus::from_payload(module, &payload))
            .unwrap_or_default();
        debug!(module, installed = status.installed, version = ?status.version, "dependency checked");
        status
    }

    /// Status of every required module
    pub async fn check_dependencies(&self) -> BTreeMap<String, DependencyStatus> {
        let mut status = BTreeMap::new();
        for module in REQUIRED_MODULES {
            status.insert(module.to_string(), self.inspect_dependency(module).await);
        }
        status
    }

    /// Interpreter version and location, `None` when it does not run
    pub async fn runtime_version(&self) -> Option<String> {
        self.query(&self.generator.generate_runtime_check()).await
    }

    /// pip-install `package` into the runtime
    pub async fn install(&self, package: &str) -> Result<RunResult> {
        let script = self.generator.generate_install(package)?;
        info!(package, "installing runtime package");
        self.runner
            .run(
                &script,
                &EnvOverrides::new(),
                self.install_timeout,
                CancellationToken::new(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers dependency checks from a list of installed modules
    struct FakeRuntime {
        installed: Vec<&'static str>,
        calls: AtomicUsize,
        scripts: Mutex<Vec<String>>,
        timeouts: Mutex<Vec<Duration>>,
    }

    impl FakeRuntime {
        fn new(installed: Vec<&'static str>) -> Self {
            Self {
                installed,
                calls: AtomicUsize::new(0),
                scripts: Mutex::new(Vec::new()),
                timeouts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ScriptRunner for FakeRuntime {
        async fn run(
            &self,
            script: &str,
            _env: &EnvOverrides,
            timeout: Duration,
            _cancel: CancellationToken,
        ) -> Result<RunResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.timeouts.lock().unwrap().push(timeout);
            self.scripts.lock().unwrap().push(script.to_string());
            if script.contains("sys.version") {
                return Ok(RunResult::exited(0, "SUCCESS: Python 3.12.1 (/usr/bin/python3)\n", ""));
            }
            let hit = self
                .installed
                .iter()
                .find(|m| script.contains(&format!("MODULE = \"{}\"", m)));
            Ok(match hit {
                Some(&"patchright") => RunResult::exited(0, "SUCCESS: patchright unknown\n", ""),
                Some(m) => RunResult::exited(0, format!("SUCCESS: {} 1.2.3\n", m), ""),
                None => RunResult::exited(1, "ERROR: No module named 'x'\n", ""),
            })
        }
    }

    #[tokio::test]
    async fn test_check_dependency() {
        let runtime = Arc::new(FakeRuntime::new(vec!["browser_use"]));
        let probe = EnvironmentProbe::new(runtime.clone());

        assert!(probe.check_dependency("browser_use").await);
        assert!(!probe.check_dependency("patchright").await);
        assert_eq!(runtime.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_module_name_never_spawns() {
        let runtime = Arc::new(FakeRuntime::new(vec![]));
        let probe = EnvironmentProbe::new(runtime.clone());

        assert!(!probe.check_dependency("os; import sys").await);
        assert_eq!(runtime.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_dependencies_covers_required_modules() {
        let runtime = Arc::new(FakeRuntime::new(vec!["browser_use", "langchain_openai"]));
        let status = EnvironmentProbe::new(runtime).check_dependencies().await;

        assert_eq!(status.len(), REQUIRED_MODULES.len());
        assert!(status["browser_use"].installed);
        assert!(!status["patchright"].installed);
        assert!(status["langchain_openai"].installed);
    }

    #[tokio::test]
    async fn test_versions_are_reported() {
        let runtime = Arc::new(FakeRuntime::new(vec!["browser_use", "patchright"]));
        let probe = EnvironmentProbe::new(runtime);

        assert_eq!(
            probe.inspect_dependency("browser_use").await,
            DependencyStatus {
                installed: true,
                version: Some("1.2.3".to_string()),
            }
        );
        assert_eq!(probe.inspect_dependency("patchright").await.version, None);
        assert_eq!(probe.inspect_dependency("langchain_openai").await, DependencyStatus::default());
        assert_eq!(
            probe.runtime_version().await.as_deref(),
            Some("Python 3.12.1 (/usr/bin/python3)")
        );
    }

    #[tokio::test]
    async fn test_checks_use_configured_timeout_and_install_its_own() {
        let runtime = Arc::new(FakeRuntime::new(vec!["browser_use"]));
        let probe = EnvironmentProbe::new(runtime.clone()).with_check_timeout(Duration::from_secs(7));

        assert!(probe.check_dependency("browser_use").await);
        let _ = probe.install("patchright").await.unwrap();

        let timeouts = runtime.timeouts.lock().unwrap();
        assert_eq!(*timeouts, vec![Duration::from_secs(7), INSTALL_TIMEOUT]);
    }

    #[tokio::test]
    async fn test_install_runs_pip_script() {
        let runtime = Arc::new(FakeRuntime::new(vec![]));
        let probe = EnvironmentProbe::new(runtime.clone());

        assert!(probe.install("-e .").await.is_err());
        let _ = probe.install("patchright").await.unwrap();

        let scripts = runtime.scripts.lock().unwrap();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("PACKAGE = \"patchright\""));
    }
}
