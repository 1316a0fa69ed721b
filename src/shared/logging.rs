use crate::config::StatePaths;
use std::fs;
use std::io::Write;

/// Appends one line to the application log, creating the logs directory on
/// first use. Callers format the line; see `app::log_submit_line`.
pub fn append_app_log_line(paths: &StatePaths, line: &str) -> std::io::Result<()> {
    let path = paths.app_log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    writeln!(file, "{line}")
}
