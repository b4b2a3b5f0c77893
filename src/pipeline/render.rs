//! PDF access through pdfium: page text, rasterisation and single-page
//! extraction.
//!
//! Every operation binds pdfium, opens the document and does its work on a
//! blocking-pool thread. Nothing pdfium-owned crosses an `.await`.

use crate::error::{PageError, SplitError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Page-level capabilities the orchestrator needs from a source document.
pub trait PageSource {
    /// Number of pages; fixed for the lifetime of the source.
    fn page_count(&self) -> usize;

    /// Text layer of a page (empty for scanned pages).
    fn page_text(&self, page_index: usize)
        -> impl Future<Output = Result<String, PageError>> + Send;

    /// Rasterise a page at `scale` × its natural size.
    fn render_page(
        &self,
        page_index: usize,
        scale: f32,
    ) -> impl Future<Output = Result<DynamicImage, PageError>> + Send;

    /// Copy a page into a new standalone PDF and return its bytes.
    fn extract_page(&self, page_index: usize)
        -> impl Future<Output = Result<Vec<u8>, PageError>> + Send;
}

/// Bind the pdfium library.
///
/// Lookup order: `PDFIUM_LIB_PATH`, then a library next to the working
/// directory, then the system library path.
pub fn bind_pdfium() -> Result<Pdfium, SplitError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| SplitError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Map a pdfium load error onto the fatal error taxonomy.
fn load_error(path: &Path, password: Option<&str>, err: PdfiumError) -> SplitError {
    let err_str = format!("{:?}", err);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            SplitError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            SplitError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        SplitError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// A PDF on disk, opened through pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumDocument {
    path: PathBuf,
    password: Option<String>,
    page_count: usize,
    max_rendered_pixels: u32,
}

impl PdfiumDocument {
    /// Open and validate a document. This is the only run-fatal step.
    pub async fn open(
        path: &Path,
        password: Option<&str>,
        max_rendered_pixels: u32,
    ) -> Result<Self, SplitError> {
        let owned_path = path.to_path_buf();
        let pwd = password.map(str::to_string);

        let page_count = tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium()?;
            let document = pdfium
                .load_pdf_from_file(&owned_path, pwd.as_deref())
                .map_err(|e| load_error(&owned_path, pwd.as_deref(), e))?;
            Ok::<_, SplitError>(document.pages().len() as usize)
        })
        .await
        .map_err(|e| SplitError::Internal(format!("Open task panicked: {}", e)))??;

        info!("PDF loaded: {} pages", page_count);

        Ok(Self {
            path: path.to_path_buf(),
            password: password.map(str::to_string),
            page_count,
            max_rendered_pixels,
        })
    }

    /// Run `f` against a freshly opened document on the blocking pool.
    async fn with_document<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a Pdfium, &PdfDocument<'a>) -> Result<T, String> + Send + 'static,
    {
        let path = self.path.clone();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium().map_err(|e| e.to_string())?;
            let document = pdfium
                .load_pdf_from_file(&path, password.as_deref())
                .map_err(|e| format!("{:?}", e))?;
            f(&pdfium, &document)
        })
        .await
        .map_err(|e| format!("pdfium task panicked: {}", e))?
    }
}

impl PageSource for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn page_text(&self, page_index: usize) -> Result<String, PageError> {
        self.with_document(move |_, document| {
            let page = document
                .pages()
                .get(page_index as u16)
                .map_err(|e| format!("{:?}", e))?;
            let text = page.text().map_err(|e| format!("{:?}", e))?;
            Ok(text.all())
        })
        .await
        .map_err(|detail| PageError::TextFailed {
            page: page_index + 1,
            detail,
        })
    }

    async fn render_page(&self, page_index: usize, scale: f32) -> Result<DynamicImage, PageError> {
        let max_pixels = self.max_rendered_pixels as i32;

        self.with_document(move |_, document| {
            let page = document
                .pages()
                .get(page_index as u16)
                .map_err(|e| format!("{:?}", e))?;

            let render_config = PdfRenderConfig::new()
                .scale_page_by_factor(scale)
                .set_maximum_width(max_pixels)
                .set_maximum_height(max_pixels);

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| format!("{:?}", e))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_index + 1,
                image.width(),
                image.height()
            );
            Ok(image)
        })
        .await
        .map_err(|detail| PageError::RenderFailed {
            page: page_index + 1,
            detail,
        })
    }

    async fn extract_page(&self, page_index: usize) -> Result<Vec<u8>, PageError> {
        self.with_document(move |pdfium, document| {
            let mut single = pdfium.create_new_pdf().map_err(|e| format!("{:?}", e))?;
            single
                .pages_mut()
                .copy_page_from_document(document, page_index as u16, 0)
                .map_err(|e| format!("{:?}", e))?;
            single.save_to_bytes().map_err(|e| format!("{:?}", e))
        })
        .await
        .map_err(|detail| PageError::ExtractFailed {
            page: page_index + 1,
            detail,
        })
    }
}
