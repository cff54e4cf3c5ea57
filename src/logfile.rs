//! Bounded log file maintenance
//!
//! Keeps the diagnostic log file from growing without bound by cutting it
//! down to its most recent lines.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tracing::info;

/// Keep only the last `max_lines` lines of the file at `path`.
///
/// Returns `Ok(true)` when the file was rewritten and `Ok(false)` when it
/// was already short enough or does not exist yet.
pub async fn truncate_log_file(path: &Path, max_lines: usize) -> Result<bool> {
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read log file: {}", path.display()))
        }
    };

    let line_count = contents.split_inclusive(|b| *b == b'\n').count();
    if line_count <= max_lines {
        return Ok(false);
    }

    let keep_from = contents
        .split_inclusive(|b| *b == b'\n')
        .take(line_count - max_lines)
        .map(<[u8]>::len)
        .sum::<usize>();

    fs::write(path, &contents[keep_from..])
        .await
        .with_context(|| format!("Failed to rewrite log file: {}", path.display()))?;

    info!("Truncated log file to the last {} lines.", max_lines);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn numbered_lines(count: usize) -> String {
        (1..=count).map(|i| format!("line {}\n", i)).collect()
    }

    #[tokio::test]
    async fn test_truncates_to_last_lines() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("knob.log");
        std::fs::write(&path, numbered_lines(12))?;

        assert!(truncate_log_file(&path, 5).await?);

        let remaining = std::fs::read_to_string(&path)?;
        assert_eq!(remaining, "line 8\nline 9\nline 10\nline 11\nline 12\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_short_file_untouched() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("knob.log");
        std::fs::write(&path, numbered_lines(5))?;

        assert!(!truncate_log_file(&path, 5).await?);
        assert_eq!(std::fs::read_to_string(&path)?, numbered_lines(5));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_trailing_newline() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("knob.log");
        std::fs::write(&path, "a\nb\nc")?;

        assert!(truncate_log_file(&path, 2).await?);
        assert_eq!(std::fs::read_to_string(&path)?, "b\nc");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(!truncate_log_file(&temp_dir.path().join("absent.log"), 10).await?);
        Ok(())
    }
}
