//! Saving binary responses.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

const DEFAULT_FILE_NAME: &str = "file";

/// Receives downloaded files.
#[async_trait]
pub trait DownloadSink: Send + Sync {
  async fn save(&self, file_name: &str, content: Bytes) -> std::io::Result<()>;
}

/// Writes downloads into a directory.
pub struct DirectorySink {
  dir: PathBuf,
}

impl DirectorySink {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  /// Target path for a suggested name. Only the final path component is kept.
  pub fn target(&self, file_name: &str) -> PathBuf {
    let name = Path::new(file_name)
      .file_name()
      .and_then(|n| n.to_str())
      .filter(|n| !n.is_empty())
      .unwrap_or(DEFAULT_FILE_NAME);
    self.dir.join(name)
  }
}

#[async_trait]
impl DownloadSink for DirectorySink {
  async fn save(&self, file_name: &str, content: Bytes) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&self.dir).await?;
    let path = self.target(file_name);
    tokio::fs::write(&path, &content).await?;
    info!(path = %path.display(), bytes = content.len(), "download saved");
    Ok(())
  }
}

/// Suggested file name from a `content-disposition` header.
///
/// Takes whatever follows `filename=` up to the next `;`, with quotes removed.
pub fn file_name_from_disposition(header: Option<&str>) -> String {
  header
    .and_then(|value| {
      let start = value.find("filename=")? + "filename=".len();
      let raw = value[start..].split(';').next()?;
      let name: String = raw.chars().filter(|c| *c != '"' && *c != '\'').collect();
      let name = name.trim().to_string();
      (!name.is_empty()).then_some(name)
    })
    .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_file_name_from_disposition() {
    assert_eq!(
      file_name_from_disposition(Some(r#"attachment; filename="report.csv""#)),
      "report.csv"
    );
    assert_eq!(
      file_name_from_disposition(Some("attachment; filename='a b.pdf'; size=10")),
      "a b.pdf"
    );
    assert_eq!(file_name_from_disposition(Some("inline")), "file");
    assert_eq!(file_name_from_disposition(None), "file");
  }

  #[test]
  fn test_directory_sink_strips_path_components() {
    let sink = DirectorySink::new("/tmp/downloads");

    assert_eq!(
      sink.target("../../etc/passwd"),
      PathBuf::from("/tmp/downloads/passwd")
    );
    assert_eq!(sink.target(""), PathBuf::from("/tmp/downloads/file"));
  }

  #[tokio::test]
  async fn test_directory_sink_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path().join("out"));

    sink
      .save("data.bin", Bytes::from_static(b"\x00\x01"))
      .await
      .unwrap();

    let written = std::fs::read(dir.path().join("out").join("data.bin")).unwrap();
    assert_eq!(written, vec![0u8, 1u8]);
  }
}
