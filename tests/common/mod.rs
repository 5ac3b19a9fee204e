#![allow(dead_code)]

use linux_assistant::config::Settings;
use linux_assistant::errors::SessionError;
use linux_assistant::services::remote_shell::{Connector, ExecOutcome, RemoteShell};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const HOME: &str = "/home/bench";

pub fn settings_from(pairs: &[(&str, &str)]) -> Settings {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::from_lookup(move |key| map.get(key).cloned()).expect("settings")
}

/// Settings with a password and a non-routable host.
pub fn test_settings() -> Settings {
    settings_from(&[
        ("SSH_HOST", "192.0.2.10"),
        ("SSH_USER", "bench"),
        ("SSH_PASSWORD", "pw"),
        ("SSH_KEY_PATH", "/nonexistent/id_rsa"),
    ])
}

/// What the fake host has seen.
#[derive(Debug, Default)]
pub struct RemoteLog {
    pub commands: Vec<String>,
    pub files: HashMap<String, String>,
    pub dirs: HashSet<String>,
    pub connects: usize,
    pub closes: usize,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub command_outcome: ExecOutcome,
    pub fail_echo: bool,
    pub fail_mkdir: bool,
    pub fail_input: bool,
    pub fail_output: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            command_outcome: ExecOutcome::ran("ok", "", 0),
            fail_echo: false,
            fail_mkdir: false,
            fail_input: false,
            fail_output: false,
        }
    }
}

fn unquote(path: &str) -> String {
    path.trim_matches('\'').replace("'\\''", "'")
}

/// Interprets the heredoc write the persistence layer emits:
/// `cat << 'MARK' > 'path'\n<content>\nMARK\n`.
fn parse_heredoc(command: &str) -> Option<(String, String)> {
    let (header, rest) = command.split_once('\n')?;
    let header = header.strip_prefix("cat << '")?;
    let (marker, path) = header.split_once("' > ")?;
    let content = rest.strip_suffix(&format!("\n{}\n", marker))?;
    Some((unquote(path), format!("{}\n", content)))
}

pub struct FakeShell {
    log: Arc<Mutex<RemoteLog>>,
    script: Script,
}

impl RemoteShell for FakeShell {
    fn run(&mut self, command: &str) -> ExecOutcome {
        let mut log = self.log.lock().expect("remote log");
        log.commands.push(command.to_string());

        if let Some(base) = command.strip_prefix("echo ") {
            if self.script.fail_echo {
                return ExecOutcome::transport_failure("channel closed");
            }
            return ExecOutcome::ran(base.replacen('~', HOME, 1), "", 0);
        }
        if command.starts_with("mkdir -p ") {
            if self.script.fail_mkdir {
                return ExecOutcome::ran("", "mkdir: Permission denied", 1);
            }
            return ExecOutcome::ran("", "", 0);
        }
        if let Some(dir) = command.strip_prefix("mkdir ") {
            if !log.dirs.insert(unquote(dir)) {
                return ExecOutcome::ran("", "mkdir: cannot create directory: File exists", 1);
            }
            return ExecOutcome::ran("", "", 0);
        }
        if let Some((path, content)) = parse_heredoc(command) {
            if (path.ends_with("input.json") && self.script.fail_input)
                || (path.ends_with("output.txt") && self.script.fail_output)
            {
                return ExecOutcome::ran("", "No space left on device", 1);
            }
            log.files.insert(path, content);
            return ExecOutcome::ran("", "", 0);
        }
        self.script.command_outcome.clone()
    }

    fn close(&mut self) {
        self.log.lock().expect("remote log").closes += 1;
    }
}

#[derive(Clone)]
pub struct FakeConnector {
    pub log: Arc<Mutex<RemoteLog>>,
    pub script: Script,
    pub refuse: bool,
}

impl FakeConnector {
    pub fn new(script: Script) -> Self {
        Self {
            log: Arc::new(Mutex::new(RemoteLog::default())),
            script,
            refuse: false,
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(Script::default())
        }
    }

    pub fn snapshot<T>(&self, read: impl FnOnce(&RemoteLog) -> T) -> T {
        read(&self.log.lock().expect("remote log"))
    }
}

impl Connector for FakeConnector {
    fn connect(&self) -> Result<Box<dyn RemoteShell>, SessionError> {
        if self.refuse {
            return Err(SessionError::Auth {
                user: "bench".to_string(),
                reason: "denied".to_string(),
            });
        }
        self.log.lock().expect("remote log").connects += 1;
        Ok(Box::new(FakeShell {
            log: self.log.clone(),
            script: self.script.clone(),
        }))
    }
}
