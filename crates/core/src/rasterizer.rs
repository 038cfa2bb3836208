use crate::error::ExtractError;
use async_trait::async_trait;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_DPI: u32 = 300;

/// Renders every page of a multi-page document to its own image.
///
/// Implementations write their output inside `workspace`, which the caller
/// owns and removes afterwards, and return the images ordered by page.
/// Any failure is fatal for the whole document.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(
        &self,
        source: &Path,
        dpi: u32,
        workspace: &Path,
    ) -> Result<Vec<PathBuf>, ExtractError>;
}

#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: PathBuf,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(
        &self,
        source: &Path,
        dpi: u32,
        workspace: &Path,
    ) -> Result<Vec<PathBuf>, ExtractError> {
        let expected_pages = count_pdf_pages(source).await?;
        let prefix = workspace.join("page");

        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(source)
            .arg(&prefix)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                ExtractError::Rasterize(format!(
                    "failed to run {}: {error}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Rasterize(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(workspace).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(number) = page_number_from_file_name(&path) {
                pages.push((number, path));
            }
        }
        pages.sort_by_key(|(number, _)| *number);

        if pages.len() != expected_pages {
            return Err(ExtractError::Rasterize(format!(
                "expected {expected_pages} page images for {}, found {}",
                source.display(),
                pages.len()
            )));
        }

        debug!(source = %source.display(), pages = pages.len(), dpi, "rasterized pdf");
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }
}

async fn count_pdf_pages(source: &Path) -> Result<usize, ExtractError> {
    let owned = source.to_path_buf();
    let loaded = tokio::task::spawn_blocking(move || Document::load(&owned))
        .await
        .map_err(|error| ExtractError::Worker(error.to_string()))?;

    let document = loaded.map_err(|error| {
        ExtractError::PdfParse(format!("{}: {error}", source.display()))
    })?;

    let count = document.get_pages().len();
    if count == 0 {
        return Err(ExtractError::PdfParse(format!(
            "pdf has no pages: {}",
            source.display()
        )));
    }

    Ok(count)
}

/// `page-07.png` -> 7. pdftoppm zero-pads the suffix to the width of the
/// page count, so the numeric value is used for ordering.
fn page_number_from_file_name(path: &Path) -> Option<u32> {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if !is_png {
        return None;
    }

    let stem = path.file_stem()?.to_str()?;
    let (_, number) = stem.rsplit_once('-')?;
    number.parse().ok()
}
