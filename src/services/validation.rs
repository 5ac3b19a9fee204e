use crate::constants::policy::{BENCH_TOOL, DENYLIST, ERROR_MARKER, TIME_BASED_FLAG};
use crate::errors::{AssistantError, ErrorKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static RUNTIME_FLAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--runtime=(\S*)").expect("runtime flag regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl ValidationVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// True when the text is an error message produced upstream rather than a
/// command. Such text passes validation but is never executed.
pub fn is_upstream_error(command: &str) -> bool {
    command.trim_start().starts_with(ERROR_MARKER)
}

/// Checks a candidate command against the safety policy. Rules run in
/// order and the first failure wins.
///
/// Tool detection is a plain substring match, so a token such as `fiona`
/// also triggers the benchmark checks.
pub fn validate(command: &str, target_device: &str, max_runtime_seconds: u64) -> ValidationVerdict {
    if is_upstream_error(command) {
        return ValidationVerdict::allow();
    }

    let lowered = command.to_lowercase();
    if let Some(pattern) = DENYLIST.iter().find(|pattern| lowered.contains(*pattern)) {
        return ValidationVerdict::reject(format!(
            "command contains blocked pattern '{}'",
            pattern
        ));
    }

    if !lowered.contains(BENCH_TOOL) {
        return ValidationVerdict::allow();
    }

    if !command.contains(target_device) {
        return ValidationVerdict::reject(format!(
            "{} must target device '{}'",
            BENCH_TOOL, target_device
        ));
    }

    match RUNTIME_FLAG.captures(command).and_then(|caps| caps.get(1)) {
        Some(raw) => match parse_runtime_seconds(raw.as_str()) {
            Some(runtime) if runtime <= max_runtime_seconds => {}
            Some(runtime) => {
                return ValidationVerdict::reject(format!(
                    "runtime {}s exceeds the maximum of {}s",
                    runtime, max_runtime_seconds
                ))
            }
            None => {
                return ValidationVerdict::reject(format!(
                    "runtime '{}' is not a plain number of seconds",
                    raw.as_str()
                ))
            }
        },
        None if lowered.contains(TIME_BASED_FLAG) => {
            return ValidationVerdict::reject(format!(
                "{} is set without --runtime, the benchmark would never stop",
                TIME_BASED_FLAG
            ))
        }
        None => {}
    }

    ValidationVerdict::allow()
}

/// Plain seconds only: digits with an optional `s`. Other fio units
/// (`m`, `h`, `ms`, ...) and overflowing values yield `None`.
fn parse_runtime_seconds(raw: &str) -> Option<u64> {
    let digits = raw.strip_suffix('s').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A command that passed [`CommandPolicy::approve`]. Execution only accepts
/// this type, so unvalidated text cannot reach a remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand {
    command: String,
    query: Option<String>,
}

impl ValidatedCommand {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct CommandPolicy {
    target_device: String,
    max_runtime_seconds: u64,
}

impl CommandPolicy {
    pub fn new(target_device: impl Into<String>, max_runtime_seconds: u64) -> Self {
        Self {
            target_device: target_device.into(),
            max_runtime_seconds,
        }
    }

    pub fn target_device(&self) -> &str {
        &self.target_device
    }

    pub fn max_runtime_seconds(&self) -> u64 {
        self.max_runtime_seconds
    }

    pub fn validate(&self, command: &str) -> ValidationVerdict {
        validate(command, &self.target_device, self.max_runtime_seconds)
    }

    /// Gate in front of execution. Upstream error text passes validation
    /// but is still refused here since it is not a command.
    pub fn approve(
        &self,
        command: &str,
        query: Option<String>,
    ) -> Result<ValidatedCommand, AssistantError> {
        if is_upstream_error(command) {
            return Err(AssistantError::new(
                ErrorKind::Rejected,
                "UPSTREAM_ERROR",
                command.trim(),
            ));
        }
        let verdict = self.validate(command);
        if !verdict.allowed {
            let reason = verdict
                .reason
                .clone()
                .unwrap_or_else(|| "command violates safety constraints".to_string());
            return Err(AssistantError::rejected(reason)
                .with_details(serde_json::json!({ "verdict": verdict })));
        }
        Ok(ValidatedCommand {
            command: command.to_string(),
            query: query.filter(|q| !q.trim().is_empty()),
        })
    }
}
