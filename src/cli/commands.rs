//! CLI commands
//!
//! Special commands that can be executed in the REPL. Anything that is not a
//! command is a task.

use std::collections::BTreeMap;

use crate::core::Provider;
use crate::runtime::DependencyStatus;

/// A parsed REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Status,
    Models,
    /// Forget the conversation context
    Clear,
    SetModel(String),
    /// Credential for the current provider, kept in memory only
    Key(String),
    Validate,
    Deps,
    Install(String),
    Cancel,
    Acknowledge,
    Details,
    /// Command recognised but used wrong; carries the usage text
    Usage(&'static str),
    /// Submit the line as a browsing task
    Task(String),
}

const SET_USAGE: &str = "Usage: set model <model-id>\nExample: set model claude-3-5-sonnet-20241022";
const KEY_USAGE: &str = "Usage: key <credential>";
const INSTALL_USAGE: &str = "Usage: install <package>\nExample: install browser-use";

/// Parse one line of REPL input
pub fn parse(input: &str) -> Command {
    let input = input.trim();
    let mut parts = input.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    match (cmd.as_str(), args) {
        ("exit" | "quit" | "q", "") => Command::Exit,
        ("help" | "?", "") => Command::Help,
        ("status", "") => Command::Status,
        ("models", "") => Command::Models,
        ("clear" | "reset", "") => Command::Clear,
        ("validate", "") => Command::Validate,
        ("deps", "") => Command::Deps,
        ("cancel" | "stop", "") => Command::Cancel,
        ("ack", "") => Command::Acknowledge,
        ("details", "") => Command::Details,

        ("set", args) => {
            let mut parts = args.splitn(2, char::is_whitespace);
            match (parts.next(), parts.next().map(str::trim)) {
                (Some(key), Some(value)) if key.eq_ignore_ascii_case("model") && !value.is_empty() => {
                    Command::SetModel(value.to_string())
                }
                _ => Command::Usage(SET_USAGE),
            }
        }
        ("key", "") => Command::Usage(KEY_USAGE),
        ("key", credential) => Command::Key(credential.to_string()),
        ("install", "") => Command::Usage(INSTALL_USAGE),
        ("install", package) => Command::Install(package.to_string()),

        _ => Command::Task(input.to_string()),
    }
}

/// Generate help text
pub fn help_text() -> String {
    r#"Browsebridge Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit
  status           Show model, credential and run state
  models           List known models per provider
  clear, reset     Forget conversation context

  set model <id>   Switch model (provider follows the id)
  key <credential> Set the credential for the current provider
  validate         Check the current credential with the provider
  deps             Check runtime dependencies
  install <pkg>    pip install a package into the runtime

  cancel, stop     Cancel the running task
  ack              Clear an error state
  details          Show raw output of the last run

Anything else is submitted as a browsing task.

Keyboard Shortcuts:
  Ctrl+C           Cancel the running task or command, or exit when idle
  Ctrl+D           Exit
─────────────────────────────────────────────"#
        .to_string()
}

/// Known models per provider
pub fn models_text(current: &str) -> String {
    let mut output = String::from("Known models:\n");
    for provider in Provider::ALL {
        output.push_str(&format!("\n{} ({}):\n", provider.display_name(), provider.env_var()));
        for model in provider.models() {
            let marker = if *model == current { "*" } else { " " };
            output.push_str(&format!("  {} {}\n", marker, model));
        }
    }
    output
}

/// Interpreter line plus one line per module with its version
pub fn dependency_report(runtime: Option<&str>, status: &BTreeMap<String, DependencyStatus>) -> String {
    let mut output = format!("Runtime: {}\n", runtime.unwrap_or("not runnable"));
    for (module, dependency) in status {
        let state = match (dependency.installed, &dependency.version) {
            (false, _) => "missing".to_string(),
            (true, Some(version)) => version.clone(),
            (true, None) => "installed (version unknown)".to_string(),
        };
        output.push_str(&format!("  {:<18} {}\n", module, state));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("exit"), Command::Exit);
        assert_eq!(parse("  HELP "), Command::Help);
        assert_eq!(parse("ack"), Command::Acknowledge);
        assert_eq!(parse("set model gemini-1.5-pro"), Command::SetModel("gemini-1.5-pro".to_string()));
        assert_eq!(parse("install patchright"), Command::Install("patchright".to_string()));
        assert_eq!(parse("key  sk-abc "), Command::Key("sk-abc".to_string()));
    }

    #[test]
    fn test_parse_usage_errors() {
        assert_eq!(parse("set"), Command::Usage(SET_USAGE));
        assert_eq!(parse("set temperature 3"), Command::Usage(SET_USAGE));
        assert_eq!(parse("key"), Command::Usage(KEY_USAGE));
        assert_eq!(parse("install"), Command::Usage(INSTALL_USAGE));
    }

    #[test]
    fn test_command_words_with_arguments_are_tasks() {
        assert_eq!(
            parse("status of my order on example.com"),
            Command::Task("status of my order on example.com".to_string())
        );
        assert_eq!(
            parse("find the cheapest flight"),
            Command::Task("find the cheapest flight".to_string())
        );
    }

    #[test]
    fn test_dependency_report_shows_versions() {
        let status = BTreeMap::from([
            (
                "browser_use".to_string(),
                DependencyStatus {
                    installed: true,
                    version: Some("0.1.40".to_string()),
                },
            ),
            ("patchright".to_string(), DependencyStatus::default()),
        ]);

        let report = dependency_report(Some("Python 3.12.1 (/usr/bin/python3)"), &status);
        assert!(report.starts_with("Runtime: Python 3.12.1"));
        assert!(report.contains("browser_use        0.1.40"));
        assert!(report.contains("patchright         missing"));
        assert!(dependency_report(None, &BTreeMap::new()).contains("not runnable"));
    }

    #[test]
    fn test_models_text_marks_current() {
        let text = models_text("gpt-4o");
        assert!(text.contains("* gpt-4o"));
        assert!(text.contains("ANTHROPIC_API_KEY"));
    }
}
