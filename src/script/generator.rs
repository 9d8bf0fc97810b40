//! Script generation for the external runtime
//!
//! Renders tasks and probes into self-contained Python programs. Untrusted
//! values are only ever placed into the assignment block at the top of a
//! script, each encoded with [`py_str`]; the program body below it is fixed
//! text that refers to those values by name.
//!
//! Every script ends by printing exactly one `SUCCESS:` or `ERROR:` line and
//! exits non-zero after an `ERROR:` line.

use crate::core::config::AgentConfig;
use crate::core::{BridgeError, ClientBinding, Model, Result, Task};
use crate::script::literal::{is_module_name, is_package_spec, py_str};

/// Prefix of the terminal line printed by a successful script
pub const SUCCESS_MARKER: &str = "SUCCESS:";
/// Prefix of the terminal line printed by a failed script
pub const ERROR_MARKER: &str = "ERROR:";

/// Log record layout for task scripts. Logging shares stdout with the
/// terminal marker, so the level name is followed by a space, never a colon.
const LOG_FORMAT: &str = "%(levelname)s [%(name)s] %(message)s";

const REPORT_FN: &str = r#"

def report(marker, text):
    line = " ".join(str(text).split()) or "no details"
    print(marker + ": " + line, flush=True)
"#;

const TASK_BODY: &str = r#"

def compose_task():
    if not CONTEXT:
        return TASK
    lines = ["Conversation so far:"]
    for message in CONTEXT:
        lines.append("[" + message["role"] + "] " + message["content"])
    lines.append("")
    lines.append("Current task: " + TASK)
    return "\n".join(lines)


async def main():
    from browser_use import Agent

    agent = Agent(task=compose_task(), llm=build_llm())
    history = await agent.run(max_steps=MAX_STEPS)

    final_result = getattr(history, "final_result", None)
    result = final_result() if callable(final_result) else None
    errors_fn = getattr(history, "errors", None)
    errors = [e for e in (errors_fn() if callable(errors_fn) else []) if e]
    if not result and errors:
        raise RuntimeError(errors[-1])
    report("SUCCESS", result or "task completed")


if __name__ == "__main__":
    try:
        asyncio.run(main())
    except Exception as exc:
        report("ERROR", str(exc) or type(exc).__name__)
        sys.exit(1)
"#;

const PROBE_BODY: &str = r#"

if __name__ == "__main__":
    try:
        build_llm().invoke("Reply with the single word OK.")
    except Exception as exc:
        report("ERROR", str(exc) or type(exc).__name__)
        sys.exit(1)
    report("SUCCESS", "credential accepted for " + MODEL_ID)
"#;

const DEPENDENCY_BODY: &str = r#"

try:
    module = importlib.import_module(MODULE)
except Exception as exc:
    report("ERROR", str(exc) or type(exc).__name__)
    sys.exit(1)

version = getattr(module, "__version__", None)
if not isinstance(version, str) or not version:
    try:
        from importlib import metadata
        version = metadata.version(MODULE.replace("_", "-"))
    except Exception:
        version = "unknown"
report("SUCCESS", MODULE + " " + version)
"#;

const RUNTIME_BODY: &str = r#"

report("SUCCESS", "Python " + sys.version.split()[0] + " (" + sys.executable + ")")
"#;

const INSTALL_BODY: &str = r#"

completed = subprocess.run(
    [sys.executable, "-m", "pip", "install", PACKAGE],
    capture_output=True,
    text=True,
)
print(completed.stdout, flush=True)
if completed.returncode != 0:
    tail = [line for line in completed.stderr.splitlines() if line.strip()]
    report("ERROR", tail[-1] if tail else "pip exited with status " + str(completed.returncode))
    sys.exit(1)
report("SUCCESS", PACKAGE + " installed")
"#;

/// Incrementally assembled script text
struct ScriptText {
    body: String,
}

impl ScriptText {
    fn new(purpose: &str, imports: &[&str]) -> Self {
        let mut body = format!("# browsebridge {} script (generated)\n", purpose);
        for module in imports {
            body.push_str("import ");
            body.push_str(module);
            body.push('\n');
        }
        body.push('\n');
        Self { body }
    }

    /// `name = <encoded value>`
    fn assign_str(&mut self, name: &str, value: &str) {
        self.assign_raw(name, &py_str(value));
    }

    fn assign_raw(&mut self, name: &str, expr: &str) {
        self.body.push_str(name);
        self.body.push_str(" = ");
        self.body.push_str(expr);
        self.body.push('\n');
    }

    fn push(&mut self, code: &str) {
        self.body.push_str(code);
    }

    /// Model id, credential variable, and the credential itself
    fn bind_credential(&mut self, model: &Model, credential: &str) {
        self.assign_str("MODEL_ID", &model.id);
        self.assign_str("CREDENTIAL_ENV", model.provider.env_var());
        self.push("os.environ[CREDENTIAL_ENV] = ");
        self.push(&py_str(credential));
        self.push("\n");
    }

    fn client(&mut self, binding: ClientBinding) {
        self.push("\n\ndef build_llm():\n");
        self.push(&format!(
            "    from {} import {}\n\n",
            binding.module, binding.class
        ));
        self.push(&format!("    return {}(\n", binding.class));
        self.push("        model=MODEL_ID,\n");
        self.push(&format!(
            "        {}=os.environ[CREDENTIAL_ENV],\n",
            binding.key_kwarg
        ));
        if let Some(url) = binding.base_url {
            self.push(&format!("        base_url={},\n", py_str(url)));
        }
        self.push("    )\n");
    }

    fn finish(self) -> String {
        self.body
    }
}

/// Renders tasks, credential probes, and dependency checks into scripts
#[derive(Debug, Clone)]
pub struct ScriptGenerator {
    /// Step limit handed to the browser-use agent
    max_steps: u32,
}

impl ScriptGenerator {
    pub fn new(max_steps: u32) -> Self {
        Self { max_steps }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.max_steps)
    }

    /// Render a browsing task
    pub fn generate(&self, task: &Task) -> Result<String> {
        let context = serde_json::to_string(&task.context)?;

        let mut script = ScriptText::new(
            "task",
            &["asyncio", "json", "logging", "os", "sys", "warnings"],
        );
        script.bind_credential(&task.model, &task.credential);
        script.assign_str("TASK", &task.text);
        script.assign_raw("CONTEXT", &format!("json.loads({})", py_str(&context)));
        script.assign_raw("MAX_STEPS", &self.max_steps.to_string());
        script.push(&format!(
            "\nlogging.basicConfig(stream=sys.stdout, level=logging.INFO, format={}, force=True)\n",
            py_str(LOG_FORMAT)
        ));
        script.push("warnings.simplefilter(\"ignore\")\n");
        script.push(REPORT_FN);
        script.client(task.model.provider.client());
        script.push(TASK_BODY);
        Ok(script.finish())
    }

    /// Render a minimal script that checks a credential against a model
    pub fn generate_probe(&self, credential: &str, model: &Model) -> String {
        let mut script = ScriptText::new("credential probe", &["os", "sys", "warnings"]);
        script.bind_credential(model, credential);
        script.push("\nwarnings.simplefilter(\"ignore\")\n");
        script.push(REPORT_FN);
        script.client(model.provider.client());
        script.push(PROBE_BODY);
        script.finish()
    }

    /// Render an import-and-print check for a runtime module
    pub fn generate_dependency_check(&self, module: &str) -> Result<String> {
        if !is_module_name(module) {
            return Err(BridgeError::invalid_input(format!(
                "'{}' is not a module name",
                module
            )));
        }

        let mut script = ScriptText::new("dependency check", &["importlib", "sys"]);
        script.assign_str("MODULE", module);
        script.push(REPORT_FN);
        script.push(DEPENDENCY_BODY);
        Ok(script.finish())
    }

    /// Render a script reporting the interpreter version and location
    pub fn generate_runtime_check(&self) -> String {
        let mut script = ScriptText::new("runtime check", &["sys"]);
        script.push(REPORT_FN);
        script.push(RUNTIME_BODY);
        script.finish()
    }

    /// Render a pip install of `package` into the runtime
    pub fn generate_install(&self, package: &str) -> Result<String> {
        if !is_package_spec(package) {
            return Err(BridgeError::invalid_input(format!(
                "'{}' is not a package requirement",
                package
            )));
        }

        let mut script = ScriptText::new("install", &["subprocess", "sys"]);
        script.assign_str("PACKAGE", package);
        script.push(REPORT_FN);
        script.push(INSTALL_BODY);
        Ok(script.finish())
    }
}

impl Default for ScriptGenerator {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}
