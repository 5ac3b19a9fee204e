use crate::errors::AssistantError;
use crate::services::logger::Logger;
use crate::services::validation::{is_upstream_error, CommandPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const UNSAFE_GENERATION: &str = "Error: Generated command violates safety constraints.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Natural-language to command translation, provided by an external model
/// service. Implementations may answer with `Error: ...` text instead of a
/// command.
#[async_trait]
pub trait CommandGenerator: Send + Sync {
    async fn generate(&self, query: &str, history: &[ChatTurn]) -> Result<String, AssistantError>;
}

/// Removes the wrapping a model tends to add around a bare command.
pub fn sanitize_generated_command(raw: &str) -> String {
    let command = raw.trim().trim_matches('`');
    let command = command.strip_prefix("bash\n").unwrap_or(command);
    command.trim().to_string()
}

/// Asks the generator for a command and re-checks it against the policy.
/// Always returns displayable text: either a command that passed the policy
/// or an `Error: ...` message.
pub async fn generate_checked(
    generator: &dyn CommandGenerator,
    policy: &CommandPolicy,
    logger: &Logger,
    query: &str,
    history: &[ChatTurn],
) -> String {
    let raw = match generator.generate(query, history).await {
        Ok(raw) => raw,
        Err(err) => {
            logger.error(
                "Command generation failed",
                Some(&serde_json::json!({ "error": err.message })),
            );
            return format!("Error: Failed to invoke generator. {}", err.message);
        }
    };
    let command = sanitize_generated_command(&raw);
    if is_upstream_error(&command) {
        return command;
    }
    let verdict = policy.validate(&command);
    if verdict.allowed {
        return command;
    }
    logger.warn(
        "Generated command failed the safety check",
        Some(&serde_json::json!({ "command": command, "reason": verdict.reason })),
    );
    UNSAFE_GENERATION.to_string()
}
