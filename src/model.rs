use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Year(i32),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_year(&self) -> Option<i32> {
        match self {
            Self::Year(value) => Some(*value),
            _ => None,
        }
    }
}

pub type ExtractedFields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub is_w2_match: bool,
    pub confidence: f64,
    pub raw_text: String,
    pub extracted_fields: ExtractedFields,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_w2_match: false,
            confidence: 0.0,
            raw_text: String::new(),
            extracted_fields: ExtractedFields::new(),
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub tesseract: Option<String>,
    pub pdftotext: Option<String>,
    pub pdftoppm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub filename: String,
    pub sha256: Option<String>,
    pub result: ExtractionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub document_count: usize,
    pub w2_match_count: usize,
    pub error_count: usize,
    pub tool_versions: ToolVersions,
    pub documents: Vec<BatchEntry>,
}
