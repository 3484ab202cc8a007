//! Local staging of uploaded files.
//!
//! # Responsibilities
//! - Stream multipart file fields to the staging directory
//! - Enforce the per-file size limit while writing
//! - Name files for the repository (random suffix, optional prefix)
//! - Remove staged files once their upload attempt is over
//!
//! # Design Decisions
//! - Staged names are `<unix-millis>-<random>-<original basename>` and are
//!   opened with `create_new`, so same-named fields never share a file
//! - A file that breaks the size limit is deleted before the error returns
//! - Cleanup failures are logged, never surfaced

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("staging I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("file exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("reading upload stream failed: {0}")]
    Stream(String),
}

/// Directory uploads are written to before forwarding.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
    max_file_size: usize,
}

/// A file written to the staging directory.
#[derive(Debug)]
pub struct StagedFile {
    pub path: PathBuf,
    pub original_name: String,
    pub size: u64,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_file_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `stream` to a new staged file named after `original_name`.
    pub async fn stage<S, E>(&self, original_name: &str, stream: S) -> Result<StagedFile, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let mut stream = std::pin::pin!(stream);
        fs::create_dir_all(&self.dir).await?;

        let original_name = sanitize_file_name(original_name);
        let path = self
            .dir
            .join(staged_name(unix_millis(), &random_suffix(), &original_name));
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let mut size: u64 = 0;

        let written: Result<(), StagingError> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| StagingError::Stream(e.to_string()))?;
                size += chunk.len() as u64;
                if size > self.max_file_size as u64 {
                    return Err(StagingError::TooLarge {
                        limit: self.max_file_size,
                    });
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        drop(file);
        if let Err(e) = written {
            remove_quietly(&path).await;
            return Err(e);
        }

        tracing::debug!(path = %path.display(), size = size, "Staged upload");
        Ok(StagedFile {
            path,
            original_name,
            size,
        })
    }
}

impl StagedFile {
    pub async fn read(&self) -> Result<Bytes, StagingError> {
        Ok(Bytes::from(fs::read(&self.path).await?))
    }

    /// Delete the staged file.
    pub async fn cleanup(self) {
        remove_quietly(&self.path).await;
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        tracing::error!(path = %path.display(), error = %e, "Failed to clean up staged file");
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Final path component of a client-supplied file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => "upload".to_string(),
        base => base.to_string(),
    }
}

pub fn staged_name(millis: u128, suffix: &str, original_name: &str) -> String {
    format!("{}-{}-{}", millis, suffix, original_name)
}

/// Six random characters from `[0-9a-z]`.
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// `clip.mp4` + `a1b2c3` → `clip_a1b2c3.mp4`.
pub fn name_with_suffix(name: &str, suffix: &str) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    }
}

/// Repository file name for an upload: original name plus a random suffix.
pub fn randomized_name(name: &str) -> String {
    name_with_suffix(name, &random_suffix())
}

/// Place `name` under `prefix` when one is given.
pub fn target_path(prefix: Option<&str>, name: &str) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, name),
        None => name.to_string(),
    }
}

/// Human-readable size for log lines.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rendered = format!("{:.2}", value);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rendered, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_suffix_keeps_extension() {
        assert_eq!(name_with_suffix("clip.mp4", "a1b2c3"), "clip_a1b2c3.mp4");
        assert_eq!(name_with_suffix("archive.tar.gz", "zzzzzz"), "archive.tar_zzzzzz.gz");
        assert_eq!(name_with_suffix("README", "000000"), "README_000000");
    }

    #[test]
    fn test_random_suffix_shape() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));

        let name = randomized_name("2025-03-22 15-06-07.mkv");
        assert!(name.starts_with("2025-03-22 15-06-07_"));
        assert!(name.ends_with(".mkv"));
    }

    #[test]
    fn test_target_path() {
        assert_eq!(target_path(None, "a.mp4"), "a.mp4");
        assert_eq!(target_path(Some(""), "a.mp4"), "a.mp4");
        assert_eq!(target_path(Some("clips/2025/"), "a.mp4"), "clips/2025/a.mp4");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\dun\\video.mkv"), "video.mkv");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(
            staged_name(1700000000000, "k3x9q0", "a.mp4"),
            "1700000000000-k3x9q0-a.mp4"
        );
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(500), "500 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[tokio::test]
    async fn test_stage_read_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path().join("uploads"), 1024);

        let staged = staging
            .stage("nested/clip.mp4", chunks(&[b"abc", b"def"]))
            .await
            .unwrap();
        assert_eq!(staged.size, 6);
        assert_eq!(staged.original_name, "clip.mp4");
        assert!(staged
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("-clip.mp4"));
        assert_eq!(staged.read().await.unwrap(), Bytes::from_static(b"abcdef"));

        let path = staged.path.clone();
        staged.cleanup().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_same_name_stages_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path(), 1024);

        let first = staging.stage("same.txt", chunks(&[b"FIRST"])).await.unwrap();
        let second = staging.stage("same.txt", chunks(&[b"SECOND"])).await.unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(first.read().await.unwrap(), Bytes::from_static(b"FIRST"));
        assert_eq!(second.read().await.unwrap(), Bytes::from_static(b"SECOND"));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path(), 4);

        let result = staging.stage("big.bin", chunks(&[b"abc", b"def"])).await;
        assert!(matches!(result, Err(StagingError::TooLarge { limit: 4 })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
