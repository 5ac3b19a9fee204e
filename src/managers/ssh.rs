use crate::config::{Credential, Settings, WriteMode};
use crate::constants::buffers::READ_CHUNK_SIZE;
use crate::constants::network as network_constants;
use crate::errors::SessionError;
use crate::services::logger::Logger;
use crate::services::remote_shell::{Connector, ExecOutcome, RemoteShell};
use crate::utils::shell::heredoc_write_command;
use crate::utils::text::decode_trimmed;
use base64::Engine;
use ssh2::{OpenFlags, OpenType, Session};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const IDLE_POLL_MS: u64 = 20;

/// Channel-level failure; only ever reported as a transport failure.
#[derive(Debug, thiserror::Error)]
enum ChannelFailure {
    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),
    #[error("SSH I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens authenticated SSH sessions to the configured host. One session per
/// request; nothing is pooled.
#[derive(Clone)]
pub struct SshConnector {
    logger: Logger,
    settings: Arc<Settings>,
}

impl SshConnector {
    pub fn new(logger: Logger, settings: Arc<Settings>) -> Self {
        Self {
            logger: logger.child("ssh"),
            settings,
        }
    }

    fn open_tcp(&self) -> Result<TcpStream, SessionError> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let connect_err = |source: std::io::Error| SessionError::Connect {
            addr: addr.clone(),
            source,
        };
        let socket = addr
            .to_socket_addrs()
            .map_err(connect_err)?
            .next()
            .ok_or_else(|| {
                connect_err(std::io::Error::new(
                    ErrorKind::NotFound,
                    "host did not resolve to any address",
                ))
            })?;
        TcpStream::connect_timeout(
            &socket,
            Duration::from_millis(self.settings.connect_timeout_ms),
        )
        .map_err(connect_err)
    }

    fn authenticate(&self, session: &Session, credential: &Credential) -> Result<(), SessionError> {
        let user = &self.settings.user;
        let outcome = match credential {
            Credential::Password(password) => session.userauth_password(user, password),
            Credential::KeyFile { path, passphrase } => {
                session.userauth_pubkey_file(user, None, path, passphrase.as_deref())
            }
        };
        outcome.map_err(|err| SessionError::Auth {
            user: user.clone(),
            reason: err.message().to_string(),
        })?;
        if !session.authenticated() {
            return Err(SessionError::Auth {
                user: user.clone(),
                reason: "server did not accept the credential".to_string(),
            });
        }
        Ok(())
    }
}

impl Connector for SshConnector {
    fn connect(&self) -> Result<Box<dyn RemoteShell>, SessionError> {
        let Some(credential) = self.settings.resolve_credential() else {
            self.logger
                .error("SSH connect refused: no credential configured", None);
            return Err(SessionError::MissingCredential);
        };
        self.logger.info(
            "Connecting",
            Some(&serde_json::json!({
                "host": self.settings.host,
                "port": self.settings.port,
                "user": self.settings.user,
                "auth": format!("{:?}", credential.kind()),
            })),
        );

        let tcp = self.open_tcp()?;
        let mut session = Session::new().map_err(SessionError::Handshake)?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(SessionError::Handshake)?;

        let observed = fingerprint_host_key_sha256(&session);
        if let Some(expected) = self.settings.host_key_fingerprint.as_ref() {
            if observed.as_ref() != Some(expected) {
                return Err(SessionError::HostKeyMismatch {
                    expected: expected.clone(),
                    observed: observed.unwrap_or_else(|| "unknown".to_string()),
                });
            }
        }

        self.authenticate(&session, &credential)?;
        let interval = std::cmp::max(1, (network_constants::KEEPALIVE_INTERVAL_MS / 1000) as u32);
        session.set_keepalive(true, interval);

        self.logger.info(
            "Connected",
            Some(&serde_json::json!({ "host_key": observed })),
        );
        Ok(Box::new(SshSession {
            logger: self.logger.clone(),
            session: Some(session),
            write_mode: self.settings.write_mode,
        }))
    }
}

pub struct SshSession {
    logger: Logger,
    session: Option<Session>,
    write_mode: WriteMode,
}

impl SshSession {
    fn exec_blocking(session: &Session, command: &str) -> Result<ExecOutcome, ChannelFailure> {
        let mut channel = session.channel_session()?;
        channel.exec(command)?;

        // stdout and stderr are drained in lockstep.
        session.set_blocking(false);
        let drained = drain_channel(session, &mut channel);
        session.set_blocking(true);
        let (stdout, stderr) = drained?;

        channel.wait_close()?;
        let exit_code = channel.exit_status()?;
        Ok(ExecOutcome::ran(
            decode_trimmed(&stdout),
            decode_trimmed(&stderr),
            exit_code,
        ))
    }

    fn sftp_write(session: &Session, path: &str, content: &str) -> Result<(), ChannelFailure> {
        let sftp = session.sftp()?;
        let mut remote_file = sftp.open_mode(
            Path::new(path),
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            0o644,
            OpenType::File,
        )?;
        remote_file.write_all(content.as_bytes())?;
        remote_file.write_all(b"\n")?;
        Ok(())
    }
}

impl RemoteShell for SshSession {
    fn run(&mut self, command: &str) -> ExecOutcome {
        let Some(session) = self.session.as_ref() else {
            return ExecOutcome::transport_failure("SSH session is closed");
        };
        self.logger.info(
            "Running remote command",
            Some(&serde_json::json!({ "command": command })),
        );
        match Self::exec_blocking(session, command) {
            Ok(outcome) => {
                if let ExecOutcome::Ran {
                    stderr, exit_code, ..
                } = &outcome
                {
                    self.logger.info(
                        "Remote command finished",
                        Some(&serde_json::json!({ "exit_code": exit_code })),
                    );
                    if !stderr.is_empty() {
                        self.logger
                            .warn("Remote stderr", Some(&serde_json::json!({ "stderr": stderr })));
                    }
                }
                outcome
            }
            Err(failure) => {
                self.logger.error(
                    "Remote command could not be run",
                    Some(&serde_json::json!({ "command": command, "error": failure.to_string() })),
                );
                ExecOutcome::transport_failure(failure.to_string())
            }
        }
    }

    fn write_file(&mut self, path: &str, content: &str) -> ExecOutcome {
        if self.write_mode == WriteMode::Heredoc {
            return self.run(&heredoc_write_command(path, content));
        }
        let Some(session) = self.session.as_ref() else {
            return ExecOutcome::transport_failure("SSH session is closed");
        };
        match Self::sftp_write(session, path, content) {
            Ok(()) => ExecOutcome::ran("", "", 0),
            Err(failure) => ExecOutcome::transport_failure(failure.to_string()),
        }
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "closing", None);
            self.logger.info("SSH session closed", None);
        }
    }
}

fn drain_channel(
    session: &Session,
    channel: &mut ssh2::Channel,
) -> Result<(Vec<u8>, Vec<u8>), ChannelFailure> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        let mut progressed = read_available(channel, &mut buf, &mut stdout)?;
        progressed |= read_available(&mut channel.stderr(), &mut buf, &mut stderr)?;
        if channel.eof() && !progressed {
            break;
        }
        if !progressed {
            let _ = session.keepalive_send();
            std::thread::sleep(Duration::from_millis(IDLE_POLL_MS));
        }
    }
    Ok((stdout, stderr))
}

fn read_available(
    stream: &mut impl Read,
    buf: &mut [u8],
    sink: &mut Vec<u8>,
) -> Result<bool, ChannelFailure> {
    match stream.read(buf) {
        Ok(n) if n > 0 => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn fingerprint_host_key_sha256(session: &Session) -> Option<String> {
    let hash = session.host_key_hash(ssh2::HashType::Sha256)?;
    let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash);
    Some(format!("SHA256:{}", encoded))
}
