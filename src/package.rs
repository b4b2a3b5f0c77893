//! Shipping generated files: one ZIP, per-currency groups, or a directory.

use crate::error::SplitError;
use crate::output::GeneratedFile;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Suffix every generated filename carries.
const FILENAME_SUFFIX: &str = "-order details.pdf";

/// Bundle all files into one in-memory ZIP archive, one entry per file.
pub fn create_zip(files: &[GeneratedFile]) -> Result<Vec<u8>, SplitError> {
    let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for file in files {
        zip_writer
            .start_file(file.filename.as_str(), opts)
            .map_err(|e| SplitError::PackageFailed(format!("{}: {}", file.filename, e)))?;
        zip_writer
            .write_all(&file.content)
            .map_err(|e| SplitError::PackageFailed(format!("{}: {}", file.filename, e)))?;
    }

    let cursor = zip_writer
        .finish()
        .map_err(|e| SplitError::PackageFailed(e.to_string()))?;
    let bytes = cursor.into_inner();
    debug!("Packaged {} files into {} bytes", files.len(), bytes.len());
    Ok(bytes)
}

/// Files grouped by currency code, alphabetically; run order is kept inside
/// each group.
pub fn group_by_currency(files: &[GeneratedFile]) -> BTreeMap<&str, Vec<&GeneratedFile>> {
    let mut groups: BTreeMap<&str, Vec<&GeneratedFile>> = BTreeMap::new();
    for file in files {
        groups.entry(file.currency.as_str()).or_default().push(file);
    }
    groups
}

/// Display label for a file: its name without the fixed suffix.
pub fn download_label(filename: &str) -> &str {
    filename
        .strip_suffix(FILENAME_SUFFIX)
        .or_else(|| filename.strip_suffix(".pdf"))
        .unwrap_or(filename)
}

/// Write every file into `dir`, creating it if needed.
///
/// Each file is written to a `.tmp` sibling and renamed into place, so a
/// reader never sees a half-written PDF. Returns the final paths in run order.
pub async fn write_files(
    files: &[GeneratedFile],
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, SplitError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| SplitError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.filename);
        write_atomic(&path, &file.content).await?;
        written.push(path);
    }

    info!("Wrote {} files to {}", written.len(), dir.display());
    Ok(written)
}

/// Write `bytes` to `path` via a temp file and rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SplitError> {
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| SplitError::OutputWriteFailed {
            path: tmp_path.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| SplitError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::io::Read;
    use zip::ZipArchive;

    fn file(seq: u32, name: &str, currency: &str) -> GeneratedFile {
        GeneratedFile {
            filename: format!("S261017-{seq:02}_{name}_{currency}-order details.pdf"),
            content: format!("%PDF-1.7 page {seq}").into_bytes(),
            simplified_name: name.into(),
            currency: currency.into(),
            payment_total: Decimal::new(100, 0),
            sequence_number: seq,
            page_index: seq as usize,
            needs_review: false,
        }
    }

    #[test]
    fn zip_contains_every_file() {
        let files = vec![file(1, "ABC Fund", "USD"), file(2, "Barings", "EUR")];
        let bytes = create_zip(&files).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive
            .by_name("S261017-02_Barings_EUR-order details.pdf")
            .unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"%PDF-1.7 page 2");
    }

    #[test]
    fn empty_zip_is_still_valid() {
        let bytes = create_zip(&[]).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn groups_keep_run_order() {
        let files = vec![
            file(1, "A", "USD"),
            file(2, "B", "EUR"),
            file(3, "C", "USD"),
        ];
        let groups = group_by_currency(&files);
        let keys: Vec<_> = groups.keys().copied().collect();
        assert_eq!(keys, vec!["EUR", "USD"]);
        let usd: Vec<u32> = groups["USD"].iter().map(|f| f.sequence_number).collect();
        assert_eq!(usd, vec![1, 3]);
    }

    #[test]
    fn label_strips_suffix() {
        assert_eq!(
            download_label("S261017-01_ABC Fund_USD-order details.pdf"),
            "S261017-01_ABC Fund_USD"
        );
        assert_eq!(download_label("other.pdf"), "other");
        assert_eq!(download_label("README"), "README");
    }

    #[tokio::test]
    async fn write_files_leaves_no_temp_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out");
        let files = vec![file(1, "ABC Fund", "USD"), file(2, "Barings", "EUR")];

        let paths = write_files(&files, &out).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"%PDF-1.7 page 1");

        let names: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.ends_with(".pdf")));
    }
}
