use crate::constants::auth::LOGGED_KEY_PREFIX;
use crate::errors::AssistantError;
use crate::services::logger::Logger;
use crate::utils::text::truncate_utf8_prefix;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Disabled,
}

impl AuthOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthOutcome::Authenticated => "api_key",
            AuthOutcome::Disabled => "disabled",
        }
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

#[derive(Clone)]
pub struct Security {
    logger: Logger,
    api_key_digest: Option<[u8; 32]>,
}

impl Security {
    pub fn new(logger: Logger, api_key: Option<&str>) -> Self {
        let logger = logger.child("auth");
        if api_key.is_none() {
            logger.warn("API_KEY not configured - authentication disabled", None);
        }
        Self {
            logger,
            api_key_digest: api_key.map(digest),
        }
    }

    pub fn auth_enabled(&self) -> bool {
        self.api_key_digest.is_some()
    }

    /// Compares digests so the comparison time does not depend on how much
    /// of the presented key matches.
    pub fn verify_api_key(&self, presented: Option<&str>) -> Result<AuthOutcome, AssistantError> {
        let Some(expected) = self.api_key_digest.as_ref() else {
            return Ok(AuthOutcome::Disabled);
        };
        let Some(presented) = presented.filter(|v| !v.is_empty()) else {
            self.logger.warn("API key missing from request", None);
            return Err(AssistantError::unauthorized(
                "API key required. Provide via 'X-API-Key' header.",
            ));
        };
        if digest(presented) != *expected {
            self.logger.warn(
                "Invalid API key attempted",
                Some(&serde_json::json!({
                    "prefix": format!("{}...", truncate_utf8_prefix(presented, LOGGED_KEY_PREFIX)),
                })),
            );
            return Err(AssistantError::unauthorized("Invalid API key"));
        }
        self.logger.debug("API key authenticated", None);
        Ok(AuthOutcome::Authenticated)
    }

    pub fn clean_command(&self, command: &str) -> Result<String, AssistantError> {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return Err(AssistantError::invalid_params("Command must not be empty"));
        }
        if trimmed.contains('\0') {
            return Err(AssistantError::invalid_params("Command contains null bytes"));
        }
        Ok(trimmed.to_string())
    }
}
