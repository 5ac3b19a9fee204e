use crate::constants::persistence::MISSING_QUERY;
use crate::errors::AssistantError;
use crate::managers::results::ResultSaver;
use crate::services::logger::Logger;
use crate::services::remote_shell::{Connector, RemoteShell};
use crate::services::validation::ValidatedCommand;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const UNSAVED_WARNING: &str = "results were not saved to the remote host";

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub saved_path: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStage {
    Idle,
    Connecting,
    Executing,
    Persisting,
    Responding,
    Done,
    Failed,
}

/// Closes the wrapped session when dropped, whichever way the request ends.
struct SessionGuard {
    shell: Box<dyn RemoteShell>,
}

impl SessionGuard {
    fn shell(&mut self) -> &mut dyn RemoteShell {
        self.shell.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.shell.close();
    }
}

struct StageTracker<'a> {
    logger: &'a Logger,
    request_id: String,
    stage: ExecutionStage,
}

impl StageTracker<'_> {
    fn enter(&mut self, next: ExecutionStage) {
        self.logger.debug(
            "stage",
            Some(&serde_json::json!({
                "request_id": self.request_id,
                "from": self.stage,
                "to": next,
            })),
        );
        self.stage = next;
    }
}

/// Drives one validated command through connect, execute, persist and
/// respond. Each request owns its own session.
#[derive(Clone)]
pub struct ExecutionManager {
    logger: Logger,
    connector: Arc<dyn Connector>,
    saver: ResultSaver,
}

impl ExecutionManager {
    pub fn new(logger: Logger, connector: Arc<dyn Connector>, saver: ResultSaver) -> Self {
        Self {
            logger: logger.child("execution"),
            connector,
            saver,
        }
    }

    pub async fn execute(&self, command: ValidatedCommand) -> Result<ExecuteResponse, AssistantError> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.execute_blocking(&command))
            .await
            .map_err(|_| AssistantError::internal("Execution task failed"))?
    }

    pub fn execute_blocking(&self, command: &ValidatedCommand) -> Result<ExecuteResponse, AssistantError> {
        let mut tracker = StageTracker {
            logger: &self.logger,
            request_id: uuid::Uuid::new_v4().to_string(),
            stage: ExecutionStage::Idle,
        };
        let query = command.query().unwrap_or(MISSING_QUERY);
        self.logger.info(
            "Execution requested",
            Some(&serde_json::json!({
                "request_id": tracker.request_id,
                "query": query,
                "command": command.command(),
            })),
        );

        tracker.enter(ExecutionStage::Connecting);
        let mut guard = match self.connector.connect() {
            Ok(shell) => SessionGuard { shell },
            Err(err) => {
                tracker.enter(ExecutionStage::Failed);
                self.logger.error(
                    "Could not open remote session",
                    Some(&serde_json::json!({
                        "request_id": tracker.request_id,
                        "error": err.to_string(),
                    })),
                );
                return Err(AssistantError::from(err).with_hint(
                    "Check the SSH credentials and network settings, then the server log.",
                ));
            }
        };

        tracker.enter(ExecutionStage::Executing);
        let outcome = guard.shell().run(command.command());
        if outcome.is_transport_failure() {
            self.logger.warn(
                "Command could not be run, reporting exit code 1",
                Some(&serde_json::json!({
                    "request_id": tracker.request_id,
                    "error": outcome.failure_text(),
                })),
            );
        }
        let result = outcome.into_result();

        tracker.enter(ExecutionStage::Persisting);
        let saved_path = self.saver.save(
            guard.shell(),
            query,
            command.command(),
            &result.stdout,
            &result.stderr,
        );

        tracker.enter(ExecutionStage::Responding);
        let mut warnings = Vec::new();
        if saved_path.is_none() {
            self.logger.warn(
                "Command ran but results were not saved remotely",
                Some(&serde_json::json!({ "request_id": tracker.request_id })),
            );
            warnings.push(UNSAVED_WARNING.to_string());
        }
        drop(guard);
        tracker.enter(ExecutionStage::Done);

        Ok(ExecuteResponse {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code: result.exit_code,
            saved_path,
            warnings,
        })
    }
}
