//! The ingestion-and-recognition pipeline.
//!
//! One request moves strictly forward through persist → existence check →
//! content sniff → allow-list → branch (image or PDF) → filter → recognize →
//! respond. No stage is retried and no state is revisited; every expected
//! failure maps to exactly one response tag, while infrastructure failures
//! propagate as [`UploadError`].

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::UploadError;
use crate::mime_detection;
use crate::models::RecognitionResponse;
use crate::ocr::preprocess::{FilterError, ImageFilter};
use crate::ocr::OcrEngine;
use crate::pdf::PdfRenderer;
use crate::services::file_service::{ArtifactGuard, FileService};

/// One multipart file field, as received from the HTTP layer.
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Which endpoint the upload arrived on, and therefore which content types
/// the allow-list admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// `/read/image`: images only.
    Image,
    /// `/read/file`: PDF documents only.
    Pdf,
    /// `/read`: images always; PDFs only when enabled in configuration.
    Any,
}

/// Expected, enumerable pipeline outcomes. These are domain results carried
/// in a 200 body, never transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The stored artifact is missing or not a regular file.
    MissingArtifact,
    /// The sniffed content type is outside the allow-list.
    DisallowedType,
    /// The image (or a rendered page) could not be decoded or rasterized.
    UnreadableImage,
    /// The recognizer returned an error or timed out.
    RecognitionFailed,
    /// A PDF arrived on an endpoint with PDF support disabled.
    PdfDeclined,
}

impl Rejection {
    pub fn tag(&self) -> &'static str {
        match self {
            Rejection::MissingArtifact => "Failed (File)",
            Rejection::DisallowedType => "Failed (Mime)",
            Rejection::UnreadableImage => "Failed (Path)",
            Rejection::RecognitionFailed => "Failed (Text)",
            Rejection::PdfDeclined => "Failed (pdf)",
        }
    }
}

/// Outcome of the stage sequence: recognized text or a structured rejection.
/// Infrastructure errors travel separately through `Result`.
enum StageOutcome {
    Recognized(String),
    Rejected(Rejection),
}

/// Drives one upload through validation, filtering, and recognition.
///
/// The sniffing, filtering, recognition, and rasterization collaborators are
/// trait objects so the sequencing logic is testable with fakes.
pub struct Pipeline {
    config: Config,
    files: FileService,
    filter: Arc<dyn ImageFilter>,
    ocr: Arc<dyn OcrEngine>,
    pdf: Arc<dyn PdfRenderer>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        filter: Arc<dyn ImageFilter>,
        ocr: Arc<dyn OcrEngine>,
        pdf: Arc<dyn PdfRenderer>,
    ) -> Self {
        let files = FileService::new(&config.upload_path);
        Self {
            config,
            files,
            filter,
            ocr,
            pdf,
        }
    }

    pub fn files(&self) -> &FileService {
        &self.files
    }

    /// Process one uploaded file end to end and produce the response body.
    pub async fn process_upload(
        &self,
        upload: UploadedFile,
        kind: UploadKind,
    ) -> Result<RecognitionResponse, UploadError> {
        let token = FileService::artifact_token();
        let dir = match kind {
            UploadKind::Pdf => self.files.pdf_dir(),
            UploadKind::Image | UploadKind::Any => self.files.image_dir(),
        };

        let artifact = self
            .files
            .store(&dir, &token, &upload.file_name, &upload.bytes)
            .await?;
        info!("Stored upload {:?} ({} bytes)", artifact, upload.bytes.len());

        let mut guard = ArtifactGuard::new(self.config.retain_artifacts);
        guard.track(artifact.clone());

        let outcome = self
            .run_stages(&artifact, &token, &upload.file_name, kind, &mut guard)
            .await;
        guard.finish(&self.files).await;

        match outcome? {
            StageOutcome::Recognized(text) => Ok(RecognitionResponse::success(text)),
            StageOutcome::Rejected(rejection) => {
                info!(tag = rejection.tag(), "Upload rejected");
                Ok(RecognitionResponse::failure(rejection.tag()))
            }
        }
    }

    async fn run_stages(
        &self,
        artifact: &Path,
        token: &str,
        original_filename: &str,
        kind: UploadKind,
        guard: &mut ArtifactGuard,
    ) -> Result<StageOutcome, UploadError> {
        if !self.files.is_regular_file(artifact).await? {
            return Ok(StageOutcome::Rejected(Rejection::MissingArtifact));
        }

        let detected =
            mime_detection::sniff_file(artifact)
                .await
                .map_err(|source| UploadError::Inspect {
                    path: artifact.to_path_buf(),
                    source,
                })?;

        // An unrecognized signature is treated the same as a disallowed one:
        // the artifact is deleted and the upload rejected.
        let Some(detected) = detected else {
            self.files.remove(artifact).await;
            return Ok(StageOutcome::Rejected(Rejection::DisallowedType));
        };

        match kind {
            UploadKind::Any if detected.is_pdf() && !self.config.pdf_enabled => {
                // Declined before any rasterization side effects.
                Ok(StageOutcome::Rejected(Rejection::PdfDeclined))
            }
            UploadKind::Any if detected.is_pdf() => {
                self.pdf_branch(artifact, token, original_filename, guard)
                    .await
            }
            UploadKind::Pdf => {
                if !detected.is_pdf() {
                    self.files.remove(artifact).await;
                    return Ok(StageOutcome::Rejected(Rejection::DisallowedType));
                }
                self.pdf_branch(artifact, token, original_filename, guard)
                    .await
            }
            UploadKind::Image | UploadKind::Any => {
                if !detected.is_allowed(&self.config.allowed_image_types) {
                    self.files.remove(artifact).await;
                    return Ok(StageOutcome::Rejected(Rejection::DisallowedType));
                }
                self.image_branch(artifact).await
            }
        }
    }

    /// Filter the stored image in place, then recognize it.
    async fn image_branch(&self, artifact: &Path) -> Result<StageOutcome, UploadError> {
        match self.filter.filter(artifact).await {
            Ok(()) => {}
            Err(FilterError::Undecodable) => {
                return Ok(StageOutcome::Rejected(Rejection::UnreadableImage))
            }
            Err(e) => {
                return Err(UploadError::Filter {
                    path: artifact.to_path_buf(),
                    details: e.to_string(),
                })
            }
        }

        match self.ocr.recognize(artifact).await {
            Ok(text) => Ok(StageOutcome::Recognized(text)),
            Err(e) => {
                warn!("Recognition failed for {:?}: {}", artifact, e);
                Ok(StageOutcome::Rejected(Rejection::RecognitionFailed))
            }
        }
    }

    /// Render every page to a JPEG artifact, then run the image chain per
    /// page, concatenating the recognized text across pages.
    async fn pdf_branch(
        &self,
        artifact: &Path,
        token: &str,
        original_filename: &str,
        guard: &mut ArtifactGuard,
    ) -> Result<StageOutcome, UploadError> {
        let stem = FileService::artifact_name(token, original_filename);
        let pages = match self
            .pdf
            .rasterize(artifact, &self.files.page_image_dir(), &stem)
            .await
        {
            Ok(pages) => pages,
            Err(e) => {
                warn!("Rasterization failed for {:?}: {}", artifact, e);
                return Ok(StageOutcome::Rejected(Rejection::UnreadableImage));
            }
        };

        for page in &pages {
            guard.track(page.clone());
        }

        let mut page_texts = Vec::with_capacity(pages.len());
        for page in &pages {
            match self.filter.filter(page).await {
                Ok(()) => {}
                Err(FilterError::Undecodable) => {
                    return Ok(StageOutcome::Rejected(Rejection::UnreadableImage))
                }
                Err(e) => {
                    return Err(UploadError::Filter {
                        path: page.clone(),
                        details: e.to_string(),
                    })
                }
            }

            match self.ocr.recognize(page).await {
                Ok(text) => page_texts.push(text),
                Err(e) => {
                    warn!("Recognition failed for page {:?}: {}", page, e);
                    return Ok(StageOutcome::Rejected(Rejection::RecognitionFailed));
                }
            }
        }

        Ok(StageOutcome::Recognized(page_texts.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrError;
    use crate::pdf::RenderError;
    use async_trait::async_trait;
    use std::path::PathBuf;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const PDF_MAGIC: &[u8] = b"%PDF-1.4\nfake body";

    struct FakeFilter {
        undecodable: bool,
    }

    #[async_trait]
    impl ImageFilter for FakeFilter {
        async fn filter(&self, _path: &Path) -> Result<(), FilterError> {
            if self.undecodable {
                Err(FilterError::Undecodable)
            } else {
                Ok(())
            }
        }
    }

    struct FakeOcr {
        text: Option<&'static str>,
    }

    #[async_trait]
    impl OcrEngine for FakeOcr {
        async fn recognize(&self, _path: &Path) -> Result<String, OcrError> {
            match self.text {
                Some(text) => Ok(text.to_string()),
                None => Err(OcrError::RecognitionFailed {
                    details: "fake".to_string(),
                }),
            }
        }
    }

    struct FakeRenderer {
        pages: usize,
        fail: bool,
    }

    #[async_trait]
    impl PdfRenderer for FakeRenderer {
        async fn rasterize(
            &self,
            _pdf_path: &Path,
            out_dir: &Path,
            stem: &str,
        ) -> Result<Vec<PathBuf>, RenderError> {
            if self.fail {
                return Err(RenderError::Corrupt {
                    details: "fake".to_string(),
                });
            }
            let mut paths = Vec::new();
            for index in 0..self.pages {
                let path = out_dir.join(format!("{}.{:03}.jpg", stem, index));
                tokio::fs::write(&path, b"fake page").await.unwrap();
                paths.push(path);
            }
            Ok(paths)
        }
    }

    struct Fixture {
        pipeline: Pipeline,
        _dir: tempfile::TempDir,
    }

    async fn fixture(
        config_tweak: impl FnOnce(&mut Config),
        filter: FakeFilter,
        ocr: FakeOcr,
        pdf: FakeRenderer,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.upload_path = dir.path().to_string_lossy().into_owned();
        config_tweak(&mut config);

        let pipeline = Pipeline::new(config, Arc::new(filter), Arc::new(ocr), Arc::new(pdf));
        pipeline
            .files()
            .initialize_directory_structure()
            .await
            .unwrap();
        Fixture {
            pipeline,
            _dir: dir,
        }
    }

    fn png_upload() -> UploadedFile {
        UploadedFile {
            file_name: "scan.png".to_string(),
            bytes: PNG_MAGIC.to_vec(),
        }
    }

    fn pdf_upload() -> UploadedFile {
        UploadedFile {
            file_name: "doc.pdf".to_string(),
            bytes: PDF_MAGIC.to_vec(),
        }
    }

    async fn dir_entries(dir: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if entry.file_type().await.unwrap().is_file() {
                out.push(entry.path());
            }
        }
        out
    }

    #[tokio::test]
    async fn recognizes_allowed_image() {
        let fx = fixture(
            |_| {},
            FakeFilter { undecodable: false },
            FakeOcr {
                text: Some("hello borld"),
            },
            FakeRenderer {
                pages: 0,
                fail: false,
            },
        )
        .await;

        let resp = fx
            .pipeline
            .process_upload(png_upload(), UploadKind::Image)
            .await
            .unwrap();
        assert_eq!(resp.message, "");
        assert_eq!(resp.data, "hello borld");
    }

    #[tokio::test]
    async fn disallowed_type_is_rejected_and_artifact_removed() {
        let fx = fixture(
            |c| c.retain_artifacts = true,
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("x") },
            FakeRenderer {
                pages: 0,
                fail: false,
            },
        )
        .await;

        let upload = UploadedFile {
            file_name: "notes.txt".to_string(),
            bytes: b"plain text, no known signature".to_vec(),
        };
        let resp = fx
            .pipeline
            .process_upload(upload, UploadKind::Image)
            .await
            .unwrap();
        assert_eq!(resp.message, "Failed (Mime)");
        assert_eq!(resp.data, "");
        // MIME rejection deletes eagerly, even when retention is on.
        assert!(dir_entries(&fx.pipeline.files().image_dir()).await.is_empty());
    }

    #[tokio::test]
    async fn pdf_on_image_endpoint_is_a_mime_rejection() {
        let fx = fixture(
            |_| {},
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("x") },
            FakeRenderer {
                pages: 1,
                fail: false,
            },
        )
        .await;

        let resp = fx
            .pipeline
            .process_upload(pdf_upload(), UploadKind::Image)
            .await
            .unwrap();
        assert_eq!(resp.message, "Failed (Mime)");
    }

    #[tokio::test]
    async fn undecodable_image_fails_path() {
        let fx = fixture(
            |_| {},
            FakeFilter { undecodable: true },
            FakeOcr { text: Some("x") },
            FakeRenderer {
                pages: 0,
                fail: false,
            },
        )
        .await;

        let resp = fx
            .pipeline
            .process_upload(png_upload(), UploadKind::Image)
            .await
            .unwrap();
        assert_eq!(resp.message, "Failed (Path)");
        assert_eq!(resp.data, "");
    }

    #[tokio::test]
    async fn recognition_failure_fails_text() {
        let fx = fixture(
            |_| {},
            FakeFilter { undecodable: false },
            FakeOcr { text: None },
            FakeRenderer {
                pages: 0,
                fail: false,
            },
        )
        .await;

        let resp = fx
            .pipeline
            .process_upload(png_upload(), UploadKind::Image)
            .await
            .unwrap();
        assert_eq!(resp.message, "Failed (Text)");
        assert_eq!(resp.data, "");
    }

    #[tokio::test]
    async fn missing_artifact_fails_file() {
        let fx = fixture(
            |_| {},
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("x") },
            FakeRenderer {
                pages: 0,
                fail: false,
            },
        )
        .await;

        let mut guard = ArtifactGuard::new(false);
        let missing = fx.pipeline.files().image_dir().join("nope.png");
        let outcome = fx
            .pipeline
            .run_stages(&missing, "token", "nope.png", UploadKind::Image, &mut guard)
            .await
            .unwrap();
        match outcome {
            StageOutcome::Rejected(Rejection::MissingArtifact) => {}
            _ => panic!("expected MissingArtifact"),
        }
    }

    #[tokio::test]
    async fn pdf_pages_concatenate_text() {
        let fx = fixture(
            |_| {},
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("page") },
            FakeRenderer {
                pages: 3,
                fail: false,
            },
        )
        .await;

        let resp = fx
            .pipeline
            .process_upload(pdf_upload(), UploadKind::Pdf)
            .await
            .unwrap();
        assert_eq!(resp.message, "");
        assert_eq!(resp.data, "page\npage\npage");
    }

    #[tokio::test]
    async fn rasterization_failure_degrades_to_failed_path() {
        let fx = fixture(
            |_| {},
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("x") },
            FakeRenderer {
                pages: 0,
                fail: true,
            },
        )
        .await;

        let resp = fx
            .pipeline
            .process_upload(pdf_upload(), UploadKind::Pdf)
            .await
            .unwrap();
        assert_eq!(resp.message, "Failed (Path)");
        assert_eq!(resp.data, "");
    }

    #[tokio::test]
    async fn declined_pdf_has_no_rasterization_side_effects() {
        let fx = fixture(
            |c| c.pdf_enabled = false,
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("x") },
            FakeRenderer {
                pages: 2,
                fail: false,
            },
        )
        .await;

        let resp = fx
            .pipeline
            .process_upload(pdf_upload(), UploadKind::Any)
            .await
            .unwrap();
        assert_eq!(resp.message, "Failed (pdf)");
        assert_eq!(resp.data, "");
        assert!(dir_entries(&fx.pipeline.files().page_image_dir())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn artifacts_are_cleaned_after_success() {
        let fx = fixture(
            |_| {},
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("x") },
            FakeRenderer {
                pages: 2,
                fail: false,
            },
        )
        .await;

        fx.pipeline
            .process_upload(pdf_upload(), UploadKind::Pdf)
            .await
            .unwrap();

        assert!(dir_entries(&fx.pipeline.files().pdf_dir()).await.is_empty());
        assert!(dir_entries(&fx.pipeline.files().page_image_dir())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn artifacts_are_retained_when_configured() {
        let fx = fixture(
            |c| c.retain_artifacts = true,
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("x") },
            FakeRenderer {
                pages: 0,
                fail: false,
            },
        )
        .await;

        fx.pipeline
            .process_upload(png_upload(), UploadKind::Image)
            .await
            .unwrap();

        assert_eq!(dir_entries(&fx.pipeline.files().image_dir()).await.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_uploads_produce_independent_equal_results() {
        let fx = fixture(
            |c| c.retain_artifacts = true,
            FakeFilter { undecodable: false },
            FakeOcr { text: Some("same") },
            FakeRenderer {
                pages: 0,
                fail: false,
            },
        )
        .await;

        let a = fx
            .pipeline
            .process_upload(png_upload(), UploadKind::Image)
            .await
            .unwrap();
        let b = fx
            .pipeline
            .process_upload(png_upload(), UploadKind::Image)
            .await
            .unwrap();

        assert_eq!(a, b);
        // Two distinct artifacts for the same input file.
        assert_eq!(dir_entries(&fx.pipeline.files().image_dir()).await.len(), 2);
    }
}
