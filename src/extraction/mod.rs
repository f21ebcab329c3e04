use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::ExtractorConfig;
use crate::model::{ExtractedFields, ExtractionResult};

pub mod classifier;
pub mod error;
pub mod fields;
pub mod ocr;
pub mod pdf;
pub mod preprocess;

use classifier::Classifier;
use error::ExtractionError;
use fields::FieldCatalog;
use ocr::{OcrBackend, TesseractCli, extract_text_from_image};
use pdf::{PdfBackend, PopplerCli, extract_text_from_pdf};

pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".tiff", ".bmp"];
pub const PDF_EXTENSION: &str = ".pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
}

pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn document_kind(extension: &str) -> Option<DocumentKind> {
    if SUPPORTED_IMAGE_EXTENSIONS.contains(&extension) {
        Some(DocumentKind::Image)
    } else if extension == PDF_EXTENSION {
        Some(DocumentKind::Pdf)
    } else {
        None
    }
}

pub struct W2Extractor {
    classifier: Classifier,
    catalog: FieldCatalog,
    ocr: Arc<dyn OcrBackend>,
    pdf: Arc<dyn PdfBackend>,
    temp_root: Option<PathBuf>,
}

impl W2Extractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let ocr: Arc<dyn OcrBackend> = Arc::new(TesseractCli::new(config.ocr.clone()));
        let pdf: Arc<dyn PdfBackend> = Arc::new(PopplerCli::new(config.pdf.clone()));
        Self::with_backends(config, ocr, pdf)
    }

    pub fn with_backends(
        config: ExtractorConfig,
        ocr: Arc<dyn OcrBackend>,
        pdf: Arc<dyn PdfBackend>,
    ) -> Result<Self> {
        let classifier = Classifier::new(
            &config.classifier.indicators,
            config.classifier.min_matches,
        );
        let catalog = match &config.fields {
            Some(specs) => FieldCatalog::from_specs(specs)?,
            None => FieldCatalog::w2()?,
        };

        Ok(Self {
            classifier,
            catalog,
            ocr,
            pdf,
            temp_root: config.temp_root,
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn process(&self, path: &Path) -> ExtractionResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_pipeline(path)));

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err @ ExtractionError::UnsupportedFileType(_))) => {
                warn!(path = %path.display(), error = %err, "skipping document");
                ExtractionResult::failure(err.to_string())
            }
            Ok(Err(err)) => {
                error!(path = %path.display(), error = %err, "error processing document");
                ExtractionResult::failure(err.to_string())
            }
            Err(payload) => {
                let err = ExtractionError::Pipeline(panic_message(payload.as_ref()));
                error!(path = %path.display(), error = %err, "document pipeline panicked");
                ExtractionResult::failure(err.to_string())
            }
        }
    }

    fn run_pipeline(&self, path: &Path) -> Result<ExtractionResult, ExtractionError> {
        let extension = file_extension(path);
        let kind = document_kind(&extension)
            .ok_or_else(|| ExtractionError::UnsupportedFileType(extension.clone()))?;

        let (raw_text, confidence) = match kind {
            DocumentKind::Image => extract_text_from_image(self.ocr.as_ref(), path),
            DocumentKind::Pdf => extract_text_from_pdf(
                self.pdf.as_ref(),
                self.ocr.as_ref(),
                self.temp_root.as_deref(),
                path,
            ),
        };

        let is_w2_match = self.classifier.is_match(&raw_text);
        let extracted_fields = if is_w2_match {
            self.catalog.extract(&raw_text)
        } else {
            ExtractedFields::new()
        };

        info!(
            path = %path.display(),
            is_w2_match,
            confidence,
            fields = extracted_fields.len(),
            "document processed"
        );

        Ok(ExtractionResult {
            is_w2_match,
            confidence: confidence.clamp(0.0, 1.0),
            raw_text,
            extracted_fields,
            error: None,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "document pipeline panicked".to_string()
    }
}
