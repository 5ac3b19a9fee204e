use crate::config::Settings;
use crate::managers::execution::ExecutionManager;
use crate::managers::results::ResultSaver;
use crate::managers::ssh::SshConnector;
use crate::services::logger::Logger;
use crate::services::remote_shell::Connector;
use crate::services::security::Security;
use crate::services::validation::CommandPolicy;
use std::sync::Arc;

/// Process-wide state, built once at startup and shared read-only by every
/// request handler.
pub struct App {
    pub logger: Logger,
    pub settings: Arc<Settings>,
    pub security: Security,
    pub policy: CommandPolicy,
    pub execution: ExecutionManager,
}

impl App {
    pub fn initialize(logger: Logger, settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let connector = Arc::new(SshConnector::new(logger.clone(), settings.clone()));
        Self::with_connector(logger, settings, connector)
    }

    pub fn with_connector(
        logger: Logger,
        settings: Arc<Settings>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let security = Security::new(logger.clone(), settings.api_key.as_deref());
        let policy = CommandPolicy::new(settings.target_device.clone(), settings.max_runtime_seconds);
        let saver = ResultSaver::new(
            logger.clone(),
            settings.remote_save_dir.clone(),
            settings.host.clone(),
        );
        let execution = ExecutionManager::new(logger.clone(), connector, saver);

        logger.info("Configuration loaded", Some(&settings.summary()));
        logger.info(
            "Command policy active",
            Some(&serde_json::json!({
                "target_device": policy.target_device(),
                "max_runtime_seconds": policy.max_runtime_seconds(),
                "api_auth": security.auth_enabled(),
            })),
        );
        if !settings.has_credential() {
            logger.error(
                "Critical configuration error: neither SSH_PASSWORD nor an existing SSH_KEY_PATH is set; every execution will fail to connect",
                None,
            );
        }

        Self {
            logger,
            settings,
            security,
            policy,
            execution,
        }
    }

    pub fn shutdown(&self) {
        self.logger.info("Shutting down", Some(&self.logger.stats()));
    }
}
