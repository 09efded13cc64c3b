//! Report export to PDF.
//!
//! The report page reads the shared `RenderState` on every request. An export flips it
//! to the print theme, waits for the page to settle, asks a `PageCapture` to print the
//! report URL, then puts the previous mode back. Both the mode and the busy flag are
//! restored by guards, so an error, a panic inside the capture or a dropped request
//! cannot leave the dashboard stuck in print mode or "exporting".

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use thiserror::Error;
use uuid::Uuid;

use site_core::RenderMode;
use site_core::report::report_file_name;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("an export is already running")]
    Busy,
    #[error("page capture failed: {0}")]
    Capture(String),
    #[error("page capture io: {0}")]
    Io(#[from] std::io::Error),
}

/// Prints a page to PDF.
#[async_trait]
pub trait PageCapture: Send + Sync {
    async fn capture_pdf(&self, url: &str) -> Result<Vec<u8>, ExportError>;
}

/// Current theme/animation for report rendering.
#[derive(Clone, Default)]
pub struct RenderState {
    mode: Arc<RwLock<RenderMode>>,
}

impl RenderState {
    pub fn get(&self) -> RenderMode {
        match self.mode.read() {
            Ok(mode) => *mode,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, mode: RenderMode) {
        match self.mode.write() {
            Ok(mut guard) => *guard = mode,
            Err(poisoned) => *poisoned.into_inner() = mode,
        }
    }

    /// Switch to `mode` until the returned guard drops.
    fn switch(&self, mode: RenderMode) -> ModeGuard {
        let previous = self.get();
        self.set(mode);
        ModeGuard {
            state: self.clone(),
            previous,
        }
    }
}

struct ModeGuard {
    state: RenderState,
    previous: RenderMode,
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        self.state.set(self.previous);
    }
}

struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug)]
pub struct ExportedReport {
    pub file_name: String,
    pub pdf: Vec<u8>,
}

#[derive(Clone)]
pub struct ReportExporter {
    render: RenderState,
    capture: Arc<dyn PageCapture>,
    busy: Arc<AtomicBool>,
    settle: Duration,
}

impl ReportExporter {
    pub fn new(render: RenderState, capture: Arc<dyn PageCapture>, settle: Duration) -> Self {
        Self {
            render,
            capture,
            busy: Arc::new(AtomicBool::new(false)),
            settle,
        }
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn export(&self, url: &str) -> Result<ExportedReport, ExportError> {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(ExportError::Busy)?;
        let file_name = report_file_name(&Local::now());
        tracing::info!("report export started file={} url={}", file_name, url);

        let pdf = {
            let _print = self.render.switch(RenderMode::print());
            tokio::time::sleep(self.settle).await;
            self.capture.capture_pdf(url).await
        };

        match pdf {
            Ok(pdf) => {
                tracing::info!("report export finished file={} bytes={}", file_name, pdf.len());
                Ok(ExportedReport { file_name, pdf })
            }
            Err(err) => {
                tracing::warn!("report export failed file={} err={}", file_name, err);
                Err(err)
            }
        }
    }
}

/// Runs a headless Chromium-compatible browser with `--print-to-pdf`.
pub struct CommandCapture {
    program: String,
    timeout: Duration,
    scratch_dir: PathBuf,
}

impl CommandCapture {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Directory for the browser's output file; the system temp dir by default.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }
}

/// The browser's output file. Removed when dropped, whatever the outcome.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("site-report-{}.pdf", Uuid::new_v4())),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("could not remove {}: {}", self.path.display(), err);
            }
        }
    }
}

#[async_trait]
impl PageCapture for CommandCapture {
    async fn capture_pdf(&self, url: &str) -> Result<Vec<u8>, ExportError> {
        let scratch = ScratchFile::new(&self.scratch_dir);
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", scratch.path.display()))
            .arg(url)
            .kill_on_drop(true);

        // A timed-out child is killed here, before `scratch` goes away.
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                ExportError::Capture(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Capture(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let pdf = tokio::fs::read(&scratch.path).await?;
        if pdf.is_empty() {
            return Err(ExportError::Capture(format!("{} wrote an empty pdf", self.program)));
        }
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_core::Theme;

    struct SeenMode {
        render: RenderState,
        seen: Arc<RwLock<Option<RenderMode>>>,
        fail: bool,
    }

    #[async_trait]
    impl PageCapture for SeenMode {
        async fn capture_pdf(&self, _url: &str) -> Result<Vec<u8>, ExportError> {
            *self.seen.write().expect("lock") = Some(self.render.get());
            if self.fail {
                Err(ExportError::Capture("boom".to_string()))
            } else {
                Ok(b"%PDF-1.4".to_vec())
            }
        }
    }

    fn exporter(fail: bool) -> (ReportExporter, Arc<RwLock<Option<RenderMode>>>) {
        let render = RenderState::default();
        let seen = Arc::new(RwLock::new(None));
        let capture = SeenMode {
            render: render.clone(),
            seen: seen.clone(),
            fail,
        };
        let exporter = ReportExporter::new(render, Arc::new(capture), Duration::from_millis(1));
        (exporter, seen)
    }

    #[tokio::test]
    async fn capture_sees_print_mode_and_mode_is_restored() {
        let (exporter, seen) = exporter(false);
        let report = exporter.export("http://localhost/report").await.expect("export");

        assert_eq!(report.pdf, b"%PDF-1.4".to_vec());
        assert!(report.file_name.starts_with("report_"));
        assert!(report.file_name.ends_with(".pdf"));
        assert_eq!(*seen.read().expect("lock"), Some(RenderMode::print()));
        assert_eq!(exporter.render_state().get(), RenderMode::default());
        assert!(!exporter.is_busy());
    }

    #[tokio::test]
    async fn failure_still_restores() {
        let (exporter, _) = exporter(true);
        exporter.render_state().set(RenderMode {
            theme: Theme::Dark,
            animate: false,
        });

        let err = exporter.export("http://localhost/report").await.unwrap_err();
        assert!(matches!(err, ExportError::Capture(_)));
        assert_eq!(
            exporter.render_state().get(),
            RenderMode {
                theme: Theme::Dark,
                animate: false,
            }
        );
        assert!(!exporter.is_busy());
    }

    #[tokio::test]
    async fn missing_browser_is_an_io_error() {
        let capture = CommandCapture::new("/nonexistent/headless-browser", Duration::from_secs(5));
        let err = capture.capture_pdf("http://localhost/report").await.unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));
    }

    /// Fake browser: writes the output file, then hangs.
    #[cfg(unix)]
    fn hanging_browser(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("slow-browser.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nfor arg in \"$@\"; do\n  case \"$arg\" in\n    --print-to-pdf=*) printf '%%PDF-partial' > \"${arg#--print-to-pdf=}\" ;;\n  esac\ndone\nexec sleep 5\n",
        )
        .expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_capture_removes_its_output() {
        let bin = tempfile::tempdir().expect("tempdir");
        let scratch = tempfile::tempdir().expect("tempdir");
        let browser = hanging_browser(bin.path());
        let capture = CommandCapture::new(browser.to_string_lossy(), Duration::from_secs(1))
            .with_scratch_dir(scratch.path());

        let err = capture.capture_pdf("http://localhost/report").await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        let left: Vec<_> = std::fs::read_dir(scratch.path()).expect("read dir").collect();
        assert!(left.is_empty(), "scratch files left behind: {left:?}");
    }
}
