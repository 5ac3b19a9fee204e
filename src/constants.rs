pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const TIMEOUT_SSH_READY_MS: u64 = 10_000;
    pub const KEEPALIVE_INTERVAL_MS: u64 = 30_000;
    pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
}

pub mod policy {
    pub const ERROR_MARKER: &str = "Error:";
    pub const BENCH_TOOL: &str = "fio";
    pub const TIME_BASED_FLAG: &str = "--time_based";
    pub const DEFAULT_TARGET_DEVICE: &str = "/dev/nvme0n1";
    pub const DEFAULT_MAX_RUNTIME_SEC: u64 = 10;

    /// Matched case-insensitively as plain substrings.
    pub const DENYLIST: &[&str] = &[
        "rm ", "mkfs", "reboot", "shutdown", "wget ", "curl ", "ssh ", "apt ", "dd ",
    ];
}

pub mod persistence {
    pub const DEFAULT_REMOTE_SAVE_DIR: &str = "~/fio_results";
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
    pub const INPUT_FILE: &str = "input.json";
    pub const OUTPUT_FILE: &str = "output.txt";
    pub const HEREDOC_MARKER: &str = "FIO_ASSISTANT_EOF";
    pub const MISSING_QUERY: &str = "N/A";
    pub const STDOUT_HEADER: &str = "--- STDOUT ---";
    pub const STDERR_HEADER: &str = "--- STDERR ---";
}

pub mod buffers {
    pub const LOG_BUFFER_SIZE: usize = 1_000;
    pub const DEFAULT_LOG_PAGE: usize = 100;
    pub const READ_CHUNK_SIZE: usize = 8_192;
}

pub mod auth {
    pub const API_KEY_HEADER: &str = "x-api-key";
    pub const LOGGED_KEY_PREFIX: usize = 4;
}
