use crate::constants::persistence::{
    INPUT_FILE, OUTPUT_FILE, STDERR_HEADER, STDOUT_HEADER, TIMESTAMP_FORMAT,
};
use crate::services::logger::Logger;
use crate::services::remote_shell::RemoteShell;
use crate::utils::shell::escape_shell_value;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Contents of `input.json`. Field order is part of the file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub query: String,
    pub command: String,
}

pub fn timestamp_folder(now: DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

pub fn render_input_record(query: &str, command: &str) -> String {
    let record = InputRecord {
        query: query.to_string(),
        command: command.to_string(),
    };
    // Serializing two string fields cannot fail.
    serde_json::to_string_pretty(&record).unwrap_or_default()
}

pub fn render_output_record(stdout: &str, stderr: &str) -> String {
    format!(
        "{}\n{}\n\n{}\n{}",
        STDOUT_HEADER, stdout, STDERR_HEADER, stderr
    )
}

/// Writes the input/output pair of an execution under a timestamped
/// directory on the remote host, using only the session it is handed.
/// Saved directories are never reused, so a second save within the same
/// second is not persisted.
#[derive(Clone)]
pub struct ResultSaver {
    logger: Logger,
    base_dir: String,
    host: String,
}

impl ResultSaver {
    pub fn new(logger: Logger, base_dir: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            logger: logger.child("results"),
            base_dir: base_dir.into(),
            host: host.into(),
        }
    }

    pub fn save(
        &self,
        shell: &mut dyn RemoteShell,
        query: &str,
        command: &str,
        stdout: &str,
        stderr: &str,
    ) -> Option<String> {
        self.save_at(shell, Local::now(), query, command, stdout, stderr)
    }

    /// Returns the absolute remote directory, or `None` when the results
    /// file could not be written. A failed `input.json` write is only
    /// logged.
    pub fn save_at(
        &self,
        shell: &mut dyn RemoteShell,
        now: DateTime<Local>,
        query: &str,
        command: &str,
        stdout: &str,
        stderr: &str,
    ) -> Option<String> {
        let base_dir = self.resolve_base_dir(shell)?;
        let base_dir = base_dir.trim_end_matches('/');
        let remote_dir = format!("{}/{}", base_dir, timestamp_folder(now));

        let mkdir_base = shell.run(&format!("mkdir -p {}", escape_shell_value(base_dir)));
        if !mkdir_base.succeeded() {
            self.logger.error(
                "Failed to create remote save directory",
                Some(&serde_json::json!({
                    "base_dir": base_dir,
                    "error": mkdir_base.failure_text(),
                })),
            );
            return None;
        }

        // The leaf is created without -p: a record from the same second
        // already owns it and is left untouched.
        let mkdir_leaf = shell.run(&format!("mkdir {}", escape_shell_value(&remote_dir)));
        if !mkdir_leaf.succeeded() {
            self.logger.error(
                "Failed to create remote results directory",
                Some(&serde_json::json!({
                    "remote_dir": remote_dir,
                    "error": mkdir_leaf.failure_text(),
                })),
            );
            return None;
        }

        let input_path = format!("{}/{}", remote_dir, INPUT_FILE);
        let input = shell.write_file(&input_path, &render_input_record(query, command));
        if !input.succeeded() {
            self.logger.warn(
                "Failed to save input record, continuing with output",
                Some(&serde_json::json!({
                    "path": input_path,
                    "error": input.failure_text(),
                })),
            );
        }

        let output_path = format!("{}/{}", remote_dir, OUTPUT_FILE);
        let output = shell.write_file(&output_path, &render_output_record(stdout, stderr));
        if !output.succeeded() {
            self.logger.error(
                "Failed to save output record",
                Some(&serde_json::json!({
                    "path": output_path,
                    "error": output.failure_text(),
                })),
            );
            return None;
        }

        self.logger.info(
            "Saved results",
            Some(&serde_json::json!({
                "location": format!("{}:{}", self.host, remote_dir),
            })),
        );
        Some(remote_dir)
    }

    /// Lets the remote shell expand `~` and variables in the configured base.
    fn resolve_base_dir(&self, shell: &mut dyn RemoteShell) -> Option<String> {
        let outcome = shell.run(&format!("echo {}", self.base_dir));
        if outcome.succeeded() {
            let resolved = outcome.into_result().stdout;
            if !resolved.is_empty() {
                return Some(resolved);
            }
            self.logger.error(
                "Remote save directory resolved to an empty path",
                Some(&serde_json::json!({ "base_dir": self.base_dir })),
            );
            return None;
        }
        self.logger.error(
            "Failed to resolve remote save directory",
            Some(&serde_json::json!({
                "base_dir": self.base_dir,
                "error": outcome.failure_text(),
            })),
        );
        None
    }
}
