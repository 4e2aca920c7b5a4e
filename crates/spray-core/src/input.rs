//! Target and wordlist loading.

use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Read a list file: one entry per line, trimmed, skipping blank lines and
/// `#` comments.
pub async fn load_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut entries = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        entries.push(line.to_string());
    }

    tracing::debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_lines_skips_blank_and_comments() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("words.txt");
        std::fs::write(&path, "admin\n\n# comment\n  api  \n\t\nv1/users\n").expect("write list");

        let lines = load_lines(&path).await.expect("load lines");
        assert_eq!(lines, vec!["admin", "api", "v1/users"]);
    }

    #[tokio::test]
    async fn test_load_lines_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let err = load_lines(&tmp.path().join("absent.txt")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
