use crate::error::ExtractError;
use crate::extractor::{TesseractRecognizer, TextExtractor, TextRecognizer};
use crate::models::{ExtractionOptions, PageText};
use crate::rasterizer::{PageRasterizer, PdftoppmRasterizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
}

pub fn classify_input(path: &Path) -> Result<InputKind, ExtractError> {
    if !path.is_file() {
        return Err(ExtractError::MissingInput(path.display().to_string()));
    }

    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    Ok(if is_pdf { InputKind::Pdf } else { InputKind::Image })
}

/// Page texts in page order. `texts[i]` belongs to `page_numbers[i]`, and
/// `page_numbers` is always `1..=N`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPages {
    pub texts: Vec<String>,
    pub page_numbers: Vec<u32>,
}

impl ExtractedPages {
    fn from_ordered(texts: Vec<String>) -> Self {
        let page_numbers = (1..=texts.len() as u32).collect();
        Self {
            texts,
            page_numbers,
        }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn into_pages(self) -> Vec<PageText> {
        self.texts
            .into_iter()
            .zip(self.page_numbers)
            .map(|(text, number)| PageText { number, text })
            .collect()
    }
}

/// Page images produced for one invocation. Dropping this removes them along
/// with the workspace directory; removal errors are ignored.
struct RasterArtifacts {
    pages: Vec<PathBuf>,
    _workspace: TempDir,
}

impl Drop for RasterArtifacts {
    fn drop(&mut self) {
        for page in &self.pages {
            if let Err(error) = std::fs::remove_file(page) {
                if error.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %page.display(), %error, "could not remove page image");
                }
            }
        }
    }
}

pub struct ExtractionPipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    extractor: TextExtractor,
    options: ExtractionOptions,
}

impl ExtractionPipeline {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        recognizer: Arc<dyn TextRecognizer>,
        options: ExtractionOptions,
    ) -> Self {
        Self {
            rasterizer,
            extractor: TextExtractor::new(recognizer, options.ocr_timeout),
            options,
        }
    }

    /// pdftoppm for rasterization and tesseract, in `options.language`, for OCR.
    pub fn with_tools(
        pdftoppm: impl Into<PathBuf>,
        tesseract: impl Into<PathBuf>,
        options: ExtractionOptions,
    ) -> Self {
        let recognizer = TesseractRecognizer::new(tesseract, options.language.clone());
        Self::new(
            Arc::new(PdftoppmRasterizer::new(pdftoppm)),
            Arc::new(recognizer),
            options,
        )
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// Extracts the text of every page of `path`.
    ///
    /// Fails only when the input cannot be classified or rasterized. A page
    /// whose OCR fails comes back as an empty string. The input file itself is
    /// never modified or removed.
    pub async fn extract(&self, path: &Path) -> Result<ExtractedPages, ExtractError> {
        let kind = classify_input(path)?;
        info!(path = %path.display(), ?kind, "extracting pages");

        let texts = match kind {
            InputKind::Image => self.recognize_all(&[path.to_path_buf()]).await,
            InputKind::Pdf => {
                let workspace = tempfile::Builder::new().prefix("exam-ocr-").tempdir()?;
                let pages = self
                    .rasterizer
                    .rasterize(path, self.options.dpi, workspace.path())
                    .await?;
                let artifacts = RasterArtifacts {
                    pages,
                    _workspace: workspace,
                };

                self.recognize_all(&artifacts.pages).await
            }
        };

        let extracted = ExtractedPages::from_ordered(texts);
        info!(
            path = %path.display(),
            pages = extracted.len(),
            empty_pages = extracted.texts.iter().filter(|text| text.trim().is_empty()).count(),
            "extraction finished"
        );
        Ok(extracted)
    }

    /// Runs OCR on every image concurrently and returns the texts in the
    /// order of `images`, whatever order the workers finish in.
    async fn recognize_all(&self, images: &[PathBuf]) -> Vec<String> {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_pages.max(1)));
        let mut tasks = JoinSet::new();

        for (index, image) in images.iter().cloned().enumerate() {
            let extractor = self.extractor.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let text = extractor.extract(&image).await;
                (index, text)
            });
        }

        let mut texts = vec![String::new(); images.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, text)) => texts[index] = text,
                Err(error) => warn!(%error, "page task aborted, page left empty"),
            }
        }

        texts
    }
}
