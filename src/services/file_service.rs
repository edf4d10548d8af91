use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::UploadError;

/// Local storage for transient request artifacts.
///
/// Every stored file lives under the upload root at
/// `<branch>/<token><original-filename>`. The token is random per upload, so
/// concurrent requests can never collide and artifact paths are not
/// guessable; the original filename is kept so the extension survives for
/// downstream tooling.
#[derive(Clone)]
pub struct FileService {
    upload_root: PathBuf,
}

impl FileService {
    pub fn new(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
        }
    }

    /// Create the upload directory tree if it does not exist yet.
    ///
    /// Called once at startup so a missing directory surfaces immediately
    /// instead of as a store failure on the first upload.
    pub async fn initialize_directory_structure(&self) -> Result<()> {
        let directories = [self.image_dir(), self.pdf_dir(), self.page_image_dir()];

        for dir_path in directories {
            if let Err(e) = fs::create_dir_all(&dir_path).await {
                error!("Failed to create directory {:?}: {}", dir_path, e);
                return Err(anyhow::anyhow!(
                    "Failed to create directory structure: {}",
                    e
                ));
            }
            info!("Ensured directory exists: {:?}", dir_path);
        }

        Ok(())
    }

    /// Destination for uploaded images.
    pub fn image_dir(&self) -> PathBuf {
        self.upload_root.join("image")
    }

    /// Destination for uploaded PDF documents.
    pub fn pdf_dir(&self) -> PathBuf {
        self.upload_root.join("pdf")
    }

    /// Destination for page images rendered out of PDF documents.
    pub fn page_image_dir(&self) -> PathBuf {
        self.pdf_dir().join("image")
    }

    /// Random 16-byte hex token prefixed onto every artifact name.
    pub fn artifact_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Artifact name for one upload: token plus the sanitized client filename.
    pub fn artifact_name(token: &str, original_filename: &str) -> String {
        format!("{}{}", token, sanitize_filename(original_filename))
    }

    /// Write the uploaded bytes to `<dir>/<token><original-filename>`.
    pub async fn store(
        &self,
        dir: &Path,
        token: &str,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, UploadError> {
        let path = dir.join(Self::artifact_name(token, original_filename));
        fs::write(&path, bytes)
            .await
            .map_err(|source| UploadError::Store {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// True when the path exists and is a regular file, not a directory.
    pub async fn is_regular_file(&self, path: &Path) -> Result<bool, UploadError> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(UploadError::Inspect {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Best-effort removal; a failure is logged, never surfaced.
    pub async fn remove(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove artifact {:?}: {}", path, e);
            }
        }
    }
}

/// Reduce an untrusted client filename to a bare file name.
///
/// Strips any path components so a name like `../../etc/passwd` cannot steer
/// the artifact outside the upload directory.
pub fn sanitize_filename(original: &str) -> String {
    Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .replace(['/', '\\'], "_")
}

/// Tracks every artifact a request writes and deletes them once the response
/// has been assembled, unless retention is configured. MIME-rejected uploads
/// are removed eagerly by the pipeline and are simply gone by the time the
/// guard runs.
pub struct ArtifactGuard {
    paths: Vec<PathBuf>,
    retain: bool,
}

impl ArtifactGuard {
    pub fn new(retain: bool) -> Self {
        Self {
            paths: Vec::new(),
            retain,
        }
    }

    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Delete tracked artifacts. Missing files are fine; the pipeline may
    /// have removed them already.
    pub async fn finish(self, files: &FileService) {
        if self.retain {
            return;
        }
        for path in &self.paths {
            files.remove(path).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_hex() {
        let a = FileService::artifact_token();
        let b = FileService::artifact_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("scan.png"), "scan.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("dir/nested/file.jpg"), "file.jpg");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn store_writes_under_given_dir() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileService::new(dir.path());
        files.initialize_directory_structure().await.unwrap();

        let token = FileService::artifact_token();
        let path = files
            .store(&files.image_dir(), &token, "scan.png", b"bytes")
            .await
            .unwrap();

        assert!(path.starts_with(files.image_dir()));
        assert!(files.is_regular_file(&path).await.unwrap());
        assert_eq!(fs::read(&path).await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn duplicate_uploads_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileService::new(dir.path());
        files.initialize_directory_structure().await.unwrap();

        let a = files
            .store(
                &files.image_dir(),
                &FileService::artifact_token(),
                "same.png",
                b"x",
            )
            .await
            .unwrap();
        let b = files
            .store(
                &files.image_dir(),
                &FileService::artifact_token(),
                "same.png",
                b"x",
            )
            .await
            .unwrap();

        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn guard_removes_tracked_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileService::new(dir.path());
        files.initialize_directory_structure().await.unwrap();

        let path = files
            .store(
                &files.image_dir(),
                &FileService::artifact_token(),
                "a.png",
                b"x",
            )
            .await
            .unwrap();

        let mut guard = ArtifactGuard::new(false);
        guard.track(path.clone());
        guard.finish(&files).await;

        assert!(!files.is_regular_file(&path).await.unwrap());
    }

    #[tokio::test]
    async fn guard_retains_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileService::new(dir.path());
        files.initialize_directory_structure().await.unwrap();

        let path = files
            .store(
                &files.image_dir(),
                &FileService::artifact_token(),
                "a.png",
                b"x",
            )
            .await
            .unwrap();

        let mut guard = ArtifactGuard::new(true);
        guard.track(path.clone());
        guard.finish(&files).await;

        assert!(files.is_regular_file(&path).await.unwrap());
    }

    #[tokio::test]
    async fn missing_path_is_not_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileService::new(dir.path());
        assert!(!files
            .is_regular_file(&dir.path().join("absent.png"))
            .await
            .unwrap());
        // A directory is not a regular file either.
        assert!(!files.is_regular_file(dir.path()).await.unwrap());
    }
}
