use crate::constants::buffers::LOG_BUFFER_SIZE;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    }

    fn rank(self) -> u8 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
        }
    }

    fn allows(self, other: LogLevel) -> bool {
        other.rank() <= self.rank()
    }

    fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub context: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct Counters {
    error: u64,
    warn: u64,
    info: u64,
    debug: u64,
}

#[derive(Debug, Default)]
struct Journal {
    counters: Counters,
    recent: VecDeque<LogEntry>,
}

#[derive(Debug, Clone)]
pub struct Logger {
    context: String,
    level: LogLevel,
    journal: Arc<Mutex<Journal>>,
}

impl Logger {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            level: LogLevel::from_env(),
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    pub fn child(&self, suffix: &str) -> Self {
        let context = if suffix.is_empty() {
            self.context.clone()
        } else {
            format!("{}:{}", self.context, suffix)
        };
        Self {
            context,
            level: self.level,
            journal: self.journal.clone(),
        }
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    fn log(&self, level: LogLevel, message: &str, meta: Option<&serde_json::Value>) {
        if !self.level.allows(level) {
            return;
        }
        let meta = meta.filter(|m| !m.is_null()).cloned();
        let entry = LogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            context: self.context.clone(),
            message: message.to_string(),
            meta,
        };
        let meta_suffix = entry
            .meta
            .as_ref()
            .map(|m| format!(" {}", m))
            .unwrap_or_default();
        eprintln!(
            "[{}] {} [{}] {}{}",
            entry.timestamp,
            level.label(),
            entry.context,
            entry.message,
            meta_suffix
        );

        if let Ok(mut journal) = self.journal.lock() {
            match level {
                LogLevel::Error => journal.counters.error += 1,
                LogLevel::Warn => journal.counters.warn += 1,
                LogLevel::Info => journal.counters.info += 1,
                LogLevel::Debug => journal.counters.debug += 1,
            }
            if journal.recent.len() >= LOG_BUFFER_SIZE {
                journal.recent.pop_front();
            }
            journal.recent.push_back(entry);
        }
    }

    pub fn error(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Error, message, meta);
    }

    pub fn warn(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Warn, message, meta);
    }

    pub fn info(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Info, message, meta);
    }

    pub fn debug(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Debug, message, meta);
    }

    /// Most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let journal = self.journal.lock().unwrap_or_else(|err| err.into_inner());
        let skip = journal.recent.len().saturating_sub(limit);
        journal.recent.iter().skip(skip).cloned().collect()
    }

    pub fn stats(&self) -> serde_json::Value {
        let journal = self.journal.lock().unwrap_or_else(|err| err.into_inner());
        serde_json::json!({
            "level": self.level,
            "context": self.context,
            "buffered": journal.recent.len(),
            "error": journal.counters.error,
            "warn": journal.counters.warn,
            "info": journal.counters.info,
            "debug": journal.counters.debug,
        })
    }
}
