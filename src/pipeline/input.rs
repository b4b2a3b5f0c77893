//! Input resolution: turn a path or uploaded bytes into a local PDF file.
//!
//! pdfium needs a file-system path. Uploaded bytes are staged into a
//! `TempDir` that lives exactly as long as the returned [`ResolvedInput`],
//! so the staged copy is removed on success, rejection, error or panic.
//! The `%PDF` magic bytes are checked up front so callers get a meaningful
//! error rather than a pdfium failure.

use crate::error::SplitError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A PDF ready for pdfium.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was uploaded bytes, staged to a temp directory for one run.
    Staged { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Staged { path, .. } => path,
        }
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_local(path: impl AsRef<Path>) -> Result<ResolvedInput, SplitError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(SplitError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                return Err(SplitError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SplitError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(SplitError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Stage uploaded bytes as `<temp dir>/<file_name>` for the duration of a run.
pub fn stage_upload(bytes: &[u8], file_name: &str) -> Result<ResolvedInput, SplitError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(SplitError::NotAPdf {
            path: PathBuf::from(file_name),
            magic,
        });
    }

    let temp_dir = TempDir::new().map_err(|e| SplitError::Internal(format!("tempdir: {e}")))?;
    let path = temp_dir.path().join(staged_name(file_name));

    std::fs::write(&path, bytes).map_err(|e| SplitError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    })?;

    debug!("Staged upload ({} bytes) at {}", bytes.len(), path.display());
    Ok(ResolvedInput::Staged {
        path,
        _temp_dir: temp_dir,
    })
}

/// Keep only the final path component of an uploaded name.
fn staged_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload.pdf")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, SplitError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"hello world").unwrap();
        let err = resolve_local(&path).unwrap_err();
        assert!(matches!(err, SplitError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn local_pdf_resolves_to_itself() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        let resolved = resolve_local(&path).unwrap();
        assert_eq!(resolved.path(), path.as_path());
    }

    #[test]
    fn staged_upload_is_removed_on_drop() {
        let resolved = stage_upload(b"%PDF-1.7\n%%EOF", "../../evil/report.pdf").unwrap();
        let path = resolved.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "report.pdf");
        drop(resolved);
        assert!(!path.exists());
    }

    #[test]
    fn staged_upload_checks_magic() {
        let err = stage_upload(b"PK", "archive.zip").unwrap_err();
        assert!(matches!(err, SplitError::NotAPdf { .. }));
    }
}
