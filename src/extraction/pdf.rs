use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info, warn};

use crate::config::PdfConfig;
use crate::extraction::ocr::{OcrBackend, extract_text_from_image};

/// Confidence reported for text taken straight from a PDF text layer. The
/// text layer carries no per-token signal, so this is a fixed constant.
pub const PDF_TEXT_LAYER_CONFIDENCE: f64 = 0.8;

pub trait PdfBackend: Send + Sync {
    fn text_pages(&self, pdf: &Path) -> Result<Vec<String>>;
    fn rasterize_page(&self, pdf: &Path, page_number: usize, png_out: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PopplerCli {
    config: PdfConfig,
}

impl PopplerCli {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }
}

impl PdfBackend for PopplerCli {
    fn text_pages(&self, pdf: &Path) -> Result<Vec<String>> {
        let output = Command::new(&self.config.pdftotext_bin)
            .arg("-enc")
            .arg("UTF-8")
            .arg(pdf)
            .arg("-")
            .output()
            .with_context(|| format!("failed to execute pdftotext for {}", pdf.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftotext returned non-zero exit status for {}: {}",
                pdf.display(),
                stderr.trim()
            );
        }

        Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
    }

    fn rasterize_page(&self, pdf: &Path, page_number: usize, png_out: &Path) -> Result<()> {
        let output_root = png_out.with_extension("");

        let output = Command::new(&self.config.pdftoppm_bin)
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg("-singlefile")
            .arg("-png")
            .arg("-r")
            .arg(self.config.raster_dpi.to_string())
            .arg(pdf)
            .arg(&output_root)
            .output()
            .with_context(|| format!("failed to execute pdftoppm for {}", pdf.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftoppm returned non-zero exit status for {} page {}: {}",
                pdf.display(),
                page_number,
                stderr.trim()
            );
        }

        if !png_out.exists() {
            bail!(
                "pdftoppm did not produce expected image for {} page {}",
                pdf.display(),
                page_number
            );
        }

        Ok(())
    }
}

/// pdftotext terminates every page, including empty ones, with a form feed.
pub fn split_pages(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    let body = raw.strip_suffix('\u{000C}').unwrap_or(raw);

    body.split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect()
}

struct PageImage(PathBuf);

impl Drop for PageImage {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(err) = fs::remove_file(&self.0) {
                warn!(path = %self.0.display(), error = %err, "failed to remove page image");
            }
        }
    }
}

pub fn extract_text_from_pdf(
    pdf_backend: &dyn PdfBackend,
    ocr_backend: &dyn OcrBackend,
    temp_root: Option<&Path>,
    path: &Path,
) -> (String, f64) {
    match try_extract_text_from_pdf(pdf_backend, ocr_backend, temp_root, path) {
        Ok(extracted) => extracted,
        Err(err) => {
            error!(path = %path.display(), error = %format!("{err:#}"), "error extracting text from pdf");
            (String::new(), 0.0)
        }
    }
}

fn try_extract_text_from_pdf(
    pdf_backend: &dyn PdfBackend,
    ocr_backend: &dyn OcrBackend,
    temp_root: Option<&Path>,
    path: &Path,
) -> Result<(String, f64)> {
    let pages = pdf_backend.text_pages(path)?;
    let text = pages.join("\n");

    if !text.trim().is_empty() {
        debug!(path = %path.display(), pages = pages.len(), "using pdf text layer");
        return Ok((text, PDF_TEXT_LAYER_CONFIDENCE));
    }

    info!(path = %path.display(), pages = pages.len(), "pdf has no text layer; falling back to ocr");

    let mut builder = tempfile::Builder::new();
    builder.prefix("w2extract_pages_");
    let scratch = match temp_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .context("failed to create page raster directory")?;

    let mut page_texts = Vec::with_capacity(pages.len());
    let mut total_confidence = 0.0;

    for page_index in 0..pages.len() {
        let page_number = page_index + 1;
        let page_image = PageImage(scratch.path().join(format!("page_{page_index}.png")));

        pdf_backend.rasterize_page(path, page_number, &page_image.0)?;
        let (page_text, page_confidence) = extract_text_from_image(ocr_backend, &page_image.0);
        drop(page_image);

        debug!(page = page_number, confidence = page_confidence, "ocr page completed");
        page_texts.push(page_text);
        total_confidence += page_confidence;
    }

    let confidence = if page_texts.is_empty() {
        0.0
    } else {
        total_confidence / page_texts.len() as f64
    };

    Ok((page_texts.join("\n"), confidence))
}
