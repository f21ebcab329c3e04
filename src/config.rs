use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::extraction::classifier::{DEFAULT_MIN_MATCHES, W2_INDICATORS};
use crate::extraction::fields::FieldSpec;
use crate::util::read_json;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub ocr: OcrConfig,
    pub pdf: PdfConfig,
    pub classifier: ClassifierConfig,
    pub fields: Option<Vec<FieldSpec>>,
    pub temp_root: Option<PathBuf>,
}

impl ExtractorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub tesseract_bin: String,
    pub lang: String,
    pub engine_mode: u8,
    pub page_seg_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: "tesseract".to_string(),
            lang: "eng".to_string(),
            engine_mode: 3,
            page_seg_mode: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub pdftotext_bin: String,
    pub pdftoppm_bin: String,
    pub raster_dpi: u32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            pdftotext_bin: "pdftotext".to_string(),
            pdftoppm_bin: "pdftoppm".to_string(),
            raster_dpi: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub indicators: Vec<String>,
    pub min_matches: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            indicators: W2_INDICATORS.iter().map(|value| value.to_string()).collect(),
            min_matches: DEFAULT_MIN_MATCHES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_sections() {
        let raw = r#"{ "ocr": { "lang": "deu" }, "classifier": { "min_matches": 4 } }"#;

        let config: ExtractorConfig = serde_json::from_str(raw).expect("config should parse");
        assert_eq!(config.ocr.lang, "deu");
        assert_eq!(config.ocr.page_seg_mode, 6);
        assert_eq!(config.ocr.engine_mode, 3);
        assert_eq!(config.classifier.min_matches, 4);
        assert_eq!(config.classifier.indicators.len(), 8);
        assert_eq!(config.pdf.pdftoppm_bin, "pdftoppm");
        assert!(config.fields.is_none());
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "pdf": { "raster_dpi": 300 } }"#).expect("write config");

        let config = ExtractorConfig::load(&path).expect("load config");
        assert_eq!(config.pdf.raster_dpi, 300);
        assert_eq!(config.ocr.tesseract_bin, "tesseract");
    }
}
