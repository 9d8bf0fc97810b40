//! Credential validation
//!
//! Structural checks run first and never touch the runtime. Credentials that
//! pass them are tried against the provider with a probe script, and the
//! probe output is matched against known provider vocabulary.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::core::config::ValidationConfig;
use crate::core::{Model, Provider};
use crate::credential::vocabulary::{mentions, QUOTA_PHRASES, RATE_LIMIT_PHRASES};
use crate::runtime::{EnvOverrides, Marker, RunResult, ScriptRunner, Termination};
use crate::script::ScriptGenerator;

/// Verdict on a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    /// Rejected before contacting the provider
    Malformed(String),
    QuotaExceeded,
    RateLimited,
    /// Anything else, with the raw probe output
    Unknown(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Valid => write!(f, "credential is valid"),
            ValidationOutcome::Malformed(reason) => write!(f, "credential is malformed: {}", reason),
            ValidationOutcome::QuotaExceeded => write!(f, "credential has no remaining quota"),
            ValidationOutcome::RateLimited => write!(f, "provider is rate limiting this credential"),
            ValidationOutcome::Unknown(raw) => write!(f, "validation failed: {}", raw),
        }
    }
}

/// Checks credentials with probe scripts
///
/// Holds no run slot: validations run alongside agent runs and each other,
/// and every call spawns its own probe.
pub struct CredentialValidator {
    runner: Arc<dyn ScriptRunner>,
    generator: ScriptGenerator,
    config: ValidationConfig,
}

impl CredentialValidator {
    pub fn new(runner: Arc<dyn ScriptRunner>, config: ValidationConfig) -> Self {
        Self {
            runner,
            generator: ScriptGenerator::default(),
            config,
        }
    }

    /// Structural verdict, `None` when the credential is worth probing
    pub fn check_structure(&self, credential: &str, provider: Provider) -> Option<ValidationOutcome> {
        if credential.chars().count() < self.config.min_credential_len.max(1) {
            return Some(ValidationOutcome::Malformed("too short".to_string()));
        }
        if let Some(prefix) = provider.key_prefix() {
            if !credential.starts_with(prefix) {
                return Some(ValidationOutcome::Malformed("bad prefix".to_string()));
            }
        }
        None
    }

    /// Validate `credential` against `model`
    #[instrument(skip_all, fields(model = %model.id, provider = %model.provider))]
    pub async fn validate(&self, credential: &str, model: &Model) -> ValidationOutcome {
        let credential = credential.trim();
        if let Some(outcome) = self.check_structure(credential, model.provider) {
            debug!(%outcome, "rejected without probe");
            return outcome;
        }

        let script = self.generator.generate_probe(credential, model);
        let env = EnvOverrides::from([(
            model.provider.env_var().to_string(),
            credential.to_string(),
        )]);

        let outcome = match self
            .runner
            .run(&script, &env, self.config.timeout(), CancellationToken::new())
            .await
        {
            Ok(result) => classify(&result),
            Err(e) => ValidationOutcome::Unknown(e.to_string()),
        };
        info!(%outcome, "credential probed");
        outcome
    }
}

/// Map probe output onto a verdict
pub fn classify(result: &RunResult) -> ValidationOutcome {
    if let Termination::TimedOut { after } = result.termination {
        return ValidationOutcome::Unknown(format!("probe timed out after {}s", after.as_secs()));
    }
    if let Some(Marker::Success(_)) = result.marker() {
        return ValidationOutcome::Valid;
    }

    let raw = result.combined_output();
    let haystack = raw.to_lowercase();
    if mentions(&haystack, QUOTA_PHRASES) {
        ValidationOutcome::QuotaExceeded
    } else if mentions(&haystack, RATE_LIMIT_PHRASES) {
        ValidationOutcome::RateLimited
    } else {
        ValidationOutcome::Unknown(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify_success_marker() {
        let result = RunResult::exited(0, "SUCCESS: credential accepted for gpt-4o\n", "");
        assert_eq!(classify(&result), ValidationOutcome::Valid);
    }

    #[test]
    fn test_classify_quota_before_rate_limit() {
        let result = RunResult::exited(
            1,
            "ERROR: Error code: 429 - {'error': {'message': 'You exceeded your current quota', 'code': 'insufficient_quota'}}\n",
            "",
        );
        assert_eq!(classify(&result), ValidationOutcome::QuotaExceeded);
    }

    #[test]
    fn test_classify_rate_limited() {
        let result = RunResult::exited(1, "ERROR: Rate limit reached for requests\n", "");
        assert_eq!(classify(&result), ValidationOutcome::RateLimited);
    }

    #[test]
    fn test_classify_unknown_keeps_raw_output() {
        let result = RunResult::exited(1, "ERROR: Incorrect API key provided\n", "");
        assert_eq!(
            classify(&result),
            ValidationOutcome::Unknown("ERROR: Incorrect API key provided".to_string())
        );
    }

    #[test]
    fn test_classify_missing_marker_is_unknown() {
        let result = RunResult::exited(0, "hello\n", "");
        assert!(matches!(classify(&result), ValidationOutcome::Unknown(_)));
    }

    #[test]
    fn test_classify_timeout() {
        let result = RunResult::timed_out(Duration::from_secs(30), "", "");
        assert_eq!(
            classify(&result),
            ValidationOutcome::Unknown("probe timed out after 30s".to_string())
        );
    }
}
