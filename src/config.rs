use crate::constants::{network, persistence, policy};
use crate::errors::AssistantError;
use crate::utils::user_paths::expand_home_path;
use serde_json::Value;
use std::path::PathBuf;

const DEFAULT_KEY_PATH: &str = "~/.ssh/id_rsa";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Password,
    KeyFile,
}

/// Kinds tried top-down; the first one configured wins. There is no
/// fallback to the next kind once authentication has been attempted.
pub const CREDENTIAL_ORDER: [CredentialKind; 2] = [CredentialKind::Password, CredentialKind::KeyFile];

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl Credential {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::Password(_) => CredentialKind::Password,
            Credential::KeyFile { .. } => CredentialKind::KeyFile,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password(_) => write!(f, "Password(***)"),
            Credential::KeyFile { path, .. } => write!(f, "KeyFile({})", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Heredoc,
    Sftp,
}

#[derive(Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
    pub key_passphrase: Option<String>,
    pub host_key_fingerprint: Option<String>,
    pub connect_timeout_ms: u64,
    pub remote_save_dir: String,
    pub write_mode: WriteMode,
    pub api_key: Option<String>,
    pub target_device: String,
    pub max_runtime_seconds: u64,
    pub listen_addr: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, AssistantError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AssistantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            read(key).ok_or_else(|| {
                AssistantError::configuration(format!("{} must be set", key))
                    .with_hint("Export it in the environment before starting the server.")
            })
        };

        let key_path = read("SSH_KEY_PATH")
            .unwrap_or_else(|| DEFAULT_KEY_PATH.to_string());
        let key_path = Some(expand_home_path(&key_path)).filter(|path| path.is_file());

        let write_mode = match read("REMOTE_WRITE_MODE")
            .unwrap_or_else(|| "heredoc".to_string())
            .to_lowercase()
            .as_str()
        {
            "heredoc" => WriteMode::Heredoc,
            "sftp" => WriteMode::Sftp,
            other => {
                return Err(AssistantError::configuration(format!(
                    "REMOTE_WRITE_MODE: unsupported value '{}'",
                    other
                ))
                .with_hint("Expected one of: heredoc, sftp."))
            }
        };

        Ok(Self {
            host: required("SSH_HOST")?,
            port: parse_number(read("SSH_PORT"), "SSH_PORT", network::SSH_DEFAULT_PORT)?,
            user: required("SSH_USER")?,
            // Raw lookup: passwords may legitimately carry surrounding spaces.
            password: lookup("SSH_PASSWORD").filter(|v| !v.is_empty()),
            key_path,
            key_passphrase: read("SSH_KEY_PASSPHRASE"),
            host_key_fingerprint: read("SSH_HOST_KEY_SHA256"),
            connect_timeout_ms: parse_number(
                read("SSH_CONNECT_TIMEOUT_MS"),
                "SSH_CONNECT_TIMEOUT_MS",
                network::TIMEOUT_SSH_READY_MS,
            )?,
            remote_save_dir: read("REMOTE_SAVE_DIR")
                .unwrap_or_else(|| persistence::DEFAULT_REMOTE_SAVE_DIR.to_string()),
            write_mode,
            api_key: read("API_KEY"),
            target_device: read("TARGET_DEVICE")
                .unwrap_or_else(|| policy::DEFAULT_TARGET_DEVICE.to_string()),
            max_runtime_seconds: parse_number(
                read("MAX_RUNTIME_SEC"),
                "MAX_RUNTIME_SEC",
                policy::DEFAULT_MAX_RUNTIME_SEC,
            )?,
            listen_addr: read("LISTEN_ADDR")
                .unwrap_or_else(|| network::DEFAULT_LISTEN_ADDR.to_string()),
        })
    }

    pub fn resolve_credential(&self) -> Option<Credential> {
        CREDENTIAL_ORDER.iter().find_map(|kind| match kind {
            CredentialKind::Password => self.password.clone().map(Credential::Password),
            CredentialKind::KeyFile => self.key_path.clone().map(|path| Credential::KeyFile {
                path,
                passphrase: self.key_passphrase.clone(),
            }),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.resolve_credential().is_some()
    }

    /// Secret-free description for startup logging.
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "host": self.host,
            "port": self.port,
            "user": self.user,
            "key_path": self.key_path.as_ref().map(|p| p.display().to_string()),
            "auth": self.resolve_credential().map(|c| match c.kind() {
                CredentialKind::Password => "password",
                CredentialKind::KeyFile => "key_file",
            }),
            "host_key_pinned": self.host_key_fingerprint.is_some(),
            "remote_save_dir": self.remote_save_dir,
            "write_mode": format!("{:?}", self.write_mode).to_lowercase(),
            "api_key_configured": self.api_key.is_some(),
            "target_device": self.target_device,
            "max_runtime_seconds": self.max_runtime_seconds,
            "listen_addr": self.listen_addr,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    raw: Option<String>,
    key: &str,
    fallback: T,
) -> Result<T, AssistantError> {
    match raw {
        None => Ok(fallback),
        Some(text) => text.parse::<T>().map_err(|_| {
            AssistantError::configuration(format!("{} must be a non-negative integer", key))
                .with_details(serde_json::json!({ "value": text }))
        }),
    }
}
