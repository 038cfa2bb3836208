use crate::pipeline::{classify_input, ExtractionPipeline};
use crate::traits::DocumentStore;
use crate::{DocumentRecord, ExtractError, FieldParser, PageRecord, PageText};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

pub fn is_supported_upload(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file() && is_supported_upload(entry.path()))
        .map(|entry| entry.path().to_path_buf())
        .collect();

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, ExtractError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn build_page_record(parser: &FieldParser, page: PageText) -> PageRecord {
    let extracted_data = parser.parse(&page.text);

    PageRecord {
        page_number: page.number,
        parsed: extracted_data.to_parsed_fields(),
        text: page.text,
        extracted_data,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreStatus {
    Saved,
    NotSaved { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub store: StoreStatus,
    pub record: DocumentRecord,
}

pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub documents: Vec<DocumentRecord>,
    pub skipped_files: Vec<SkippedDocument>,
}

/// Turns an input file into a [`DocumentRecord`]: page extraction followed by
/// field parsing of every page.
pub struct DocumentProcessor {
    pipeline: ExtractionPipeline,
    parser: Arc<FieldParser>,
}

impl DocumentProcessor {
    pub fn new(pipeline: ExtractionPipeline, parser: Arc<FieldParser>) -> Self {
        Self { pipeline, parser }
    }

    pub fn parser(&self) -> &FieldParser {
        &self.parser
    }

    pub async fn process(&self, path: &Path) -> Result<DocumentRecord, ExtractError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ExtractError::MissingFileName(path.display().to_string()))?
            .to_string();

        if !is_supported_upload(path) {
            return Err(ExtractError::UnsupportedInput(format!(
                "{filename}: only {} files are accepted",
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }

        classify_input(path)?;
        let checksum = {
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || digest_file(&owned))
                .await
                .map_err(|error| ExtractError::Worker(error.to_string()))??
        };
        let extracted = self.pipeline.extract(path).await?;
        let pages = extracted
            .into_pages()
            .into_iter()
            .map(|page| build_page_record(&self.parser, page))
            .collect::<Vec<_>>();

        let record = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            filename,
            uploaded_at: Utc::now(),
            checksum,
            pages,
        };

        info!(
            id = %record.id,
            filename = %record.filename,
            pages = record.pages.len(),
            "document processed"
        );
        Ok(record)
    }

    /// Processes `path` and tries to persist the result. A storage failure is
    /// reported in the outcome and never changes the processed record.
    pub async fn process_and_store<S>(
        &self,
        path: &Path,
        store: &S,
    ) -> Result<ProcessOutcome, ExtractError>
    where
        S: DocumentStore + ?Sized,
    {
        let record = self.process(path).await?;
        let store_status = save_best_effort(store, &record).await;

        Ok(ProcessOutcome {
            store: store_status,
            record,
        })
    }

    pub async fn process_folder(&self, folder: &Path) -> Result<IngestionReport, ExtractError> {
        let files = discover_documents(folder);

        if files.is_empty() {
            return Err(ExtractError::InvalidArgument(format!(
                "no pdf or image files found in {}",
                folder.display()
            )));
        }

        let mut documents = Vec::new();
        let mut skipped_files = Vec::new();

        for path in files {
            match self.process(&path).await {
                Ok(record) => documents.push(record),
                Err(error) => skipped_files.push(SkippedDocument {
                    path,
                    reason: error.to_string(),
                }),
            }
        }

        Ok(IngestionReport {
            documents,
            skipped_files,
        })
    }
}

pub async fn save_best_effort<S>(store: &S, record: &DocumentRecord) -> StoreStatus
where
    S: DocumentStore + ?Sized,
{
    match store.insert(record).await {
        Ok(_) => StoreStatus::Saved,
        Err(error) => {
            warn!(id = %record.id, %error, "document processed but not saved");
            StoreStatus::NotSaved {
                reason: error.to_string(),
            }
        }
    }
}
