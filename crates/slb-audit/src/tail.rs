//! Execution-log tailing.

use std::path::Path;

/// Default line count when the caller passes a non-positive `n`.
const DEFAULT_TAIL_LINES: i64 = 200;

/// Read the last `n` lines of a log file.
///
/// A file with fewer than `n` lines returns all of them; `n <= 0` uses the
/// default of 200.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn tail(path: &Path, n: i64) -> std::io::Result<Vec<String>> {
    let n = if n <= 0 { DEFAULT_TAIL_LINES } else { n };
    let n = usize::try_from(n).unwrap_or(usize::MAX);

    let contents = tokio::fs::read_to_string(path).await?;
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(ToString::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn log_with_lines(count: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..count {
            writeln!(file, "line {i}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_tail_returns_last_n() {
        let file = log_with_lines(10);
        let lines = tail(file.path(), 3).await.unwrap();
        assert_eq!(lines, vec!["line 7", "line 8", "line 9"]);
    }

    #[tokio::test]
    async fn test_tail_short_file_returns_all() {
        let file = log_with_lines(2);
        let lines = tail(file.path(), 10).await.unwrap();
        assert_eq!(lines, vec!["line 0", "line 1"]);
    }

    #[tokio::test]
    async fn test_tail_nonpositive_uses_default() {
        let file = log_with_lines(250);
        let lines = tail(file.path(), 0).await.unwrap();
        assert_eq!(lines.len(), 200);
        assert_eq!(lines[0], "line 50");

        let lines = tail(file.path(), -5).await.unwrap();
        assert_eq!(lines.len(), 200);
    }

    #[tokio::test]
    async fn test_tail_missing_file() {
        assert!(tail(Path::new("/nonexistent/file.log"), 5).await.is_err());
    }
}
