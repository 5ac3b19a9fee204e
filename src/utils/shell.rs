use crate::constants::persistence::HEREDOC_MARKER;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Single-quotes a value for POSIX shells.
pub fn escape_shell_value(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..12).map(|_| rng.sample(Alphanumeric) as char).collect()
}

/// Picks a heredoc terminator that no line of `content` equals.
pub fn heredoc_marker(content: &str) -> String {
    let collides = |marker: &str| content.lines().any(|line| line == marker);
    let mut marker = HEREDOC_MARKER.to_string();
    while collides(&marker) {
        marker = format!("{}_{}", HEREDOC_MARKER, random_token());
    }
    marker
}

/// Builds a command writing `content` verbatim to `path`. The terminator is
/// quoted, so the shell performs no expansion inside the body. The file ends
/// with exactly one newline after `content`.
pub fn heredoc_write_command(path: &str, content: &str) -> String {
    let marker = heredoc_marker(content);
    format!(
        "cat << '{marker}' > {path}\n{content}\n{marker}\n",
        marker = marker,
        path = escape_shell_value(path),
        content = content
    )
}
