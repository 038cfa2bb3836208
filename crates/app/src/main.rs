use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use exam_ocr_core::{
    save_best_effort, DocumentProcessor, DocumentStore, ExtractionOptions, ExtractionPipeline,
    FieldParser, InMemoryStore, JsonDirStore, ParserOptions, QuestionTierPolicy, StoreStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "exam-ocr", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Rasterization resolution for PDF pages.
    #[arg(long, env = "EXAM_OCR_DPI", default_value = "300")]
    dpi: u32,

    /// Tesseract language code.
    #[arg(long, env = "EXAM_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Per-page OCR timeout; an expired page is left empty.
    #[arg(long, env = "EXAM_OCR_TIMEOUT_SECS", default_value = "120")]
    ocr_timeout_secs: u64,

    /// Upper bound on pages recognized at the same time.
    #[arg(long, env = "EXAM_OCR_MAX_CONCURRENT_PAGES")]
    max_concurrent_pages: Option<usize>,

    /// pdftoppm executable.
    #[arg(long, env = "EXAM_OCR_PDFTOPPM", default_value = "pdftoppm")]
    pdftoppm_bin: PathBuf,

    /// tesseract executable.
    #[arg(long, env = "EXAM_OCR_TESSERACT", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// How question tiers combine on a page.
    #[arg(long, env = "EXAM_OCR_QUESTION_POLICY", value_enum, default_value_t = QuestionPolicy::FirstTier)]
    question_policy: QuestionPolicy,

    /// Directory for stored results. Results are kept in memory when unset.
    #[arg(long, env = "EXAM_OCR_STORE_DIR")]
    store_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum QuestionPolicy {
    /// Only the first tier that finds any question is used.
    FirstTier,
    /// Every tier is used and the results are deduplicated.
    MergeAll,
}

impl From<QuestionPolicy> for QuestionTierPolicy {
    fn from(value: QuestionPolicy) -> Self {
        match value {
            QuestionPolicy::FirstTier => QuestionTierPolicy::FirstSuccessfulTier,
            QuestionPolicy::MergeAll => QuestionTierPolicy::MergeAllTiers,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Extract and parse one PDF or image, then store the result.
    Extract {
        #[arg(long)]
        file: PathBuf,
    },
    /// Extract and parse every PDF or image under a folder.
    Ingest {
        #[arg(long)]
        folder: PathBuf,
    },
    /// Parse already-recognized text without running OCR.
    Parse {
        #[arg(long)]
        text_file: PathBuf,
    },
    /// Print a stored document.
    Show {
        #[arg(long)]
        id: String,
    },
    /// List stored documents.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let parser = Arc::new(
        FieldParser::new(ParserOptions {
            question_policy: cli.question_policy.into(),
            ..ParserOptions::default()
        })
        .context("compiling field patterns")?,
    );

    let store: Box<dyn DocumentStore> = match &cli.store_dir {
        Some(dir) => Box::new(JsonDirStore::new(dir)),
        None => Box::new(InMemoryStore::new()),
    };

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        persistent = cli.store_dir.is_some(),
        "exam-ocr boot"
    );

    match &cli.command {
        Command::Extract { file } => {
            let processor = build_processor(&cli, Arc::clone(&parser));
            let outcome = processor
                .process_and_store(file, store.as_ref())
                .await
                .with_context(|| format!("processing {}", file.display()))?;

            if let StoreStatus::NotSaved { reason } = &outcome.store {
                warn!(id = %outcome.record.id, %reason, "result not persisted");
            }
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Ingest { folder } => {
            let processor = build_processor(&cli, Arc::clone(&parser));
            let report = processor
                .process_folder(folder)
                .await
                .with_context(|| format!("ingesting {}", folder.display()))?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
            }

            let mut saved = 0usize;
            for record in &report.documents {
                if save_best_effort(store.as_ref(), record).await == StoreStatus::Saved {
                    saved += 1;
                }
                println!(
                    "{} {} pages={}",
                    record.id,
                    record.filename,
                    record.pages.len()
                );
            }

            println!(
                "{} documents processed, {} saved, {} skipped at {}",
                report.documents.len(),
                saved,
                report.skipped_files.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Parse { text_file } => {
            let text = tokio::fs::read_to_string(&text_file)
                .await
                .with_context(|| format!("reading {}", text_file.display()))?;
            let fields = parser.parse(&text);
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        Command::Show { id } => {
            if cli.store_dir.is_none() {
                warn!("no --store-dir given; the in-memory store starts empty");
            }
            match store.find(id).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => bail!("document not found: {id}"),
            }
        }
        Command::List => {
            if cli.store_dir.is_none() {
                warn!("no --store-dir given; the in-memory store starts empty");
            }
            let summaries = store.list().await?;
            for summary in &summaries {
                println!(
                    "{} {} {}",
                    summary.id,
                    summary.uploaded_at.to_rfc3339(),
                    summary.filename
                );
            }
            println!("count: {}", summaries.len());
        }
    }

    Ok(())
}

fn build_processor(cli: &Cli, parser: Arc<FieldParser>) -> DocumentProcessor {
    let defaults = ExtractionOptions::default();
    let options = ExtractionOptions {
        dpi: cli.dpi,
        language: cli.lang.clone(),
        ocr_timeout: Duration::from_secs(cli.ocr_timeout_secs),
        max_concurrent_pages: cli
            .max_concurrent_pages
            .unwrap_or(defaults.max_concurrent_pages),
    };

    let pipeline = ExtractionPipeline::with_tools(&cli.pdftoppm_bin, &cli.tesseract_bin, options);
    DocumentProcessor::new(pipeline, parser)
}
