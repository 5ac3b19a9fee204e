use std::path::{Path, PathBuf};

pub fn expand_home_path(path: impl AsRef<Path>) -> PathBuf {
    let home = std::env::var("HOME").ok();
    expand_home_path_with(path, home.as_deref())
}

/// Resolves a leading `~` against `home`. Paths without the shorthand, or
/// with no home available, come back unchanged.
pub fn expand_home_path_with(path: impl AsRef<Path>, home: Option<&str>) -> PathBuf {
    let path = path.as_ref();
    let (Some(str_path), Some(home)) = (path.to_str(), home) else {
        return path.to_path_buf();
    };
    if str_path == "~" {
        return PathBuf::from(home);
    }
    match str_path.strip_prefix("~/") {
        Some(rest) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
