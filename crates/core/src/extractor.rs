use crate::error::OcrError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// An OCR engine. Implementations must not block the executor, and any
/// engine process they start must stop when the returned future is dropped.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, OcrError>;
}

#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    language: String,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(OcrError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Runs a [`TextRecognizer`] on its own task and never fails: engine errors,
/// panics and timeouts all come back as an empty string. A timed-out
/// recognition is cancelled before `extract` returns.
#[derive(Clone)]
pub struct TextExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    timeout: Duration,
}

impl TextExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, timeout: Duration) -> Self {
        Self {
            recognizer,
            timeout,
        }
    }

    pub async fn extract(&self, image: &Path) -> String {
        let recognizer = Arc::clone(&self.recognizer);
        let owned = image.to_path_buf();
        let mut task = tokio::spawn(async move { recognizer.recognize(&owned).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(Ok(text))) => {
                debug!(image = %image.display(), chars = text.len(), "ocr finished");
                text
            }
            Ok(Ok(Err(error))) => {
                warn!(image = %image.display(), %error, "ocr failed, page left empty");
                String::new()
            }
            Ok(Err(error)) => {
                warn!(image = %image.display(), %error, "ocr worker aborted, page left empty");
                String::new()
            }
            Err(_) => {
                task.abort();
                // Waiting for the cancellation drops the engine child.
                let _ = task.await;
                warn!(
                    image = %image.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "ocr timed out, page left empty"
                );
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct Fixed(&'static str);

    #[async_trait]
    impl TextRecognizer for Fixed {
        async fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextRecognizer for Failing {
        async fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
            Err(OcrError::Engine {
                status: "exit status: 1".to_string(),
                stderr: "unsupported image format".to_string(),
            })
        }
    }

    struct Panicking;

    #[async_trait]
    impl TextRecognizer for Panicking {
        async fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
            panic!("engine crashed")
        }
    }

    struct Stuck;

    #[async_trait]
    impl TextRecognizer for Stuck {
        async fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    fn extractor(recognizer: impl TextRecognizer + 'static, timeout: Duration) -> TextExtractor {
        TextExtractor::new(Arc::new(recognizer), timeout)
    }

    #[tokio::test]
    async fn recognized_text_is_returned() {
        let text = extractor(Fixed("Name: Ada"), Duration::from_secs(5))
            .extract(Path::new("page.png"))
            .await;
        assert_eq!(text, "Name: Ada");
    }

    #[tokio::test]
    async fn engine_error_becomes_empty_text() {
        let text = extractor(Failing, Duration::from_secs(5))
            .extract(Path::new("page.png"))
            .await;
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn engine_panic_becomes_empty_text() {
        let text = extractor(Panicking, Duration::from_secs(5))
            .extract(Path::new("page.png"))
            .await;
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn timeout_becomes_empty_text() {
        let text = extractor(Stuck, Duration::from_millis(20))
            .extract(Path::new("page.png"))
            .await;
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn missing_tesseract_binary_is_a_spawn_error() {
        let recognizer = TesseractRecognizer::new("/nonexistent/tesseract-binary", "eng");
        let result = recognizer.recognize(Path::new("page.png")).await;
        assert!(matches!(result, Err(OcrError::Spawn(_))));
    }

    #[cfg(target_os = "linux")]
    fn process_is_running(pid: &str) -> bool {
        // Field 3 of /proc/<pid>/stat is the state; a zombie has already exited.
        fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                stat.rsplit_once(") ")
                    .and_then(|(_, rest)| rest.chars().next())
            })
            .is_some_and(|state| state != 'Z')
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timed_out_engine_process_is_killed() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pid_file = dir.path().join("engine.pid");
        let script = dir.path().join("slow-engine.sh");
        fs::write(
            &script,
            format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        )?;

        // `sh <script> stdout -l eng` stands in for a hung tesseract.
        let recognizer = TesseractRecognizer::new("/bin/sh", "eng");
        let text = extractor(recognizer, Duration::from_millis(500))
            .extract(&script)
            .await;
        assert_eq!(text, "");

        let pid = fs::read_to_string(&pid_file)?.trim().to_string();
        let mut running = process_is_running(&pid);
        for _ in 0..50 {
            if !running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            running = process_is_running(&pid);
        }
        assert!(!running, "engine process {pid} outlived its timeout");
        Ok(())
    }
}
