//! Document source.
//!
//! Reads the session's document from disk exactly once. Plain text and
//! Markdown are read as UTF-8; PDF and DOCX go through [`crate::extract`].
//! The content is fingerprinted so trace output and the chunk cache can tell
//! document versions apart.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// The raw document text for one session, immutable after loading.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
    /// SHA-256 hex digest of the loaded text.
    pub fingerprint: String,
}

/// Load the document at `path`. A missing path is fatal at startup.
pub fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        bail!("document not found at {}", path.display());
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let text = match ext.as_str() {
        "pdf" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read document: {}", path.display()))?;
            crate::extract::extract_pdf(&bytes)?
        }
        "docx" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read document: {}", path.display()))?;
            crate::extract::extract_docx(&bytes)?
        }
        _ => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read document: {}", path.display()))?,
    };

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let fingerprint = format!("{:x}", hasher.finalize());

    Ok(Document {
        path: path.to_path_buf(),
        text,
        fingerprint,
    })
}
