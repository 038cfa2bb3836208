use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("input file not found: {0}")]
    MissingInput(String),

    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("worker task failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to launch ocr engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ocr engine exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid {field} pattern: {source}")]
    Pattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document id: {0}")]
    InvalidId(String),

    #[error("store not available yet: {0}")]
    NotReady(String),
}
