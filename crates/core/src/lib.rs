pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod questions;
pub mod rasterizer;
pub mod stores;
pub mod traits;

pub use error::{ExtractError, OcrError, ParseError, StoreError};
pub use extractor::{TesseractRecognizer, TextExtractor, TextRecognizer};
pub use ingest::{
    build_page_record, digest_file, discover_documents, is_supported_upload, save_best_effort,
    DocumentProcessor, IngestionReport, ProcessOutcome, SkippedDocument, StoreStatus,
    SUPPORTED_EXTENSIONS,
};
pub use models::{
    DocumentRecord, DocumentSummary, ExtractionOptions, FieldName, FieldRecord, PageRecord,
    PageText, ParsedField, ParserOptions, Question, QuestionTierPolicy,
};
pub use parser::{FieldParser, ScalarCascade};
pub use pipeline::{classify_input, ExtractedPages, ExtractionPipeline, InputKind};
pub use questions::{dedup_questions, normalize_whitespace, QuestionExtractor, QuestionTier};
pub use rasterizer::{PageRasterizer, PdftoppmRasterizer, DEFAULT_DPI};
pub use stores::{InMemoryStore, JsonDirStore};
pub use traits::DocumentStore;
