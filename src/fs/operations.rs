use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use tokio::{
    fs::File,
    io::{self, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWriteExt},
};
use tracing::warn;

/// Checks whether the last line of a file is missing its line break, which happens when a write
/// was cut off. Leaves the cursor at the end of the file.
pub async fn ends_mid_line(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
) -> Result<bool, io::Error> {
    let length = file.seek(std::io::SeekFrom::End(0)).await?;
    if length == 0 {
        return Ok(false);
    }
    file.seek(std::io::SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replaces the contents of `path` by writing a sibling temporary file and renaming it over the
/// target, so a crash never leaves a truncated file behind.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let temporary = temporary_path(path);

    let result = async {
        let mut file = File::create(&temporary).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temporary, path).await
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&temporary).await {
            warn!("Failed to remove temporary file {temporary:?}: {e}");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use tempfile::{tempdir, tempfile};

    use super::*;

    #[tokio::test]
    async fn test_ends_mid_line_empty() -> Result<()> {
        let mut file = File::from_std(tempfile()?);
        assert!(!ends_mid_line(&mut file).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_ends_mid_line_complete() -> Result<()> {
        let mut file = tempfile()?;
        file.write_all(b"start,end\n1,2\n")?;
        let mut file = File::from_std(file);
        assert!(!ends_mid_line(&mut file).await?);
        assert_eq!(file.stream_position().await?, 14);
        Ok(())
    }

    #[tokio::test]
    async fn test_ends_mid_line_torn() -> Result<()> {
        let mut file = tempfile()?;
        file.write_all(b"start,end\n1,")?;
        let mut file = File::from_std(file);
        assert!(ends_mid_line(&mut file).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_atomically_replaces() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("projects.json");
        std::fs::write(&path, "old contents that are longer")?;

        write_atomically(&path, b"new").await?;

        assert_eq!(std::fs::read_to_string(&path)?, "new");
        assert!(!temporary_path(&path).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_write_atomically_missing_dir() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("missing").join("projects.json");
        assert!(write_atomically(&path, b"new").await.is_err());
        Ok(())
    }
}
