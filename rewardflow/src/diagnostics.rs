//! Best-effort capture of screen and markup when an action fails.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Destination for failure diagnostics. Errors are reported to the caller,
/// which logs and ignores them.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn save(&self, label: &str, screenshot: &[u8], dom_text: &str) -> std::io::Result<()>;
}

/// Writes `<label>_screenshot.png` and `<label>_page_source.html` into a directory.
#[derive(Debug, Clone)]
pub struct FileDiagnosticSink {
    dir: PathBuf,
}

impl FileDiagnosticSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DiagnosticSink for FileDiagnosticSink {
    async fn save(&self, label: &str, screenshot: &[u8], dom_text: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let stem = sanitize_label(label);

        if !screenshot.is_empty() {
            let path = self.dir.join(format!("{stem}_screenshot.png"));
            tokio::fs::write(&path, screenshot).await?;
            debug!(path = %path.display(), "Saved failure screenshot");
        }

        let path = self.dir.join(format!("{stem}_page_source.html"));
        tokio::fs::write(&path, dom_text).await?;
        debug!(path = %path.display(), "Saved failure page source");
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnosticSink;

#[async_trait]
impl DiagnosticSink for NullDiagnosticSink {
    async fn save(&self, _label: &str, _screenshot: &[u8], _dom_text: &str) -> std::io::Result<()> {
        Ok(())
    }
}

/// Keep labels usable as file names: account identifiers are usually e-mail addresses.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '@' => c,
            _ => '_',
        })
        .collect()
}
