use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, error};

use crate::config::OcrConfig;
use crate::extraction::preprocess::preprocess_image;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub token_confidences: Vec<f64>,
}

pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &Path) -> Result<OcrOutput>;
}

#[derive(Debug, Clone)]
pub struct TesseractCli {
    config: OcrConfig,
}

impl TesseractCli {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn run(&self, image: &Path, extra: Option<&str>) -> Result<String> {
        let mut command = Command::new(&self.config.tesseract_bin);
        command
            .arg(image)
            .arg("stdout")
            .arg("--oem")
            .arg(self.config.engine_mode.to_string())
            .arg("--psm")
            .arg(self.config.page_seg_mode.to_string())
            .arg("-l")
            .arg(&self.config.lang);
        if let Some(extra) = extra {
            command.arg(extra);
        }

        let output = command
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", image.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status for {}: {}",
                image.display(),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).replace('\u{0000}', ""))
    }
}

impl OcrBackend for TesseractCli {
    fn recognize(&self, image: &Path) -> Result<OcrOutput> {
        let tsv = self.run(image, Some("tsv"))?;
        let text = self.run(image, None)?;

        Ok(OcrOutput {
            text,
            token_confidences: parse_tsv_confidences(&tsv)?,
        })
    }
}

pub fn parse_tsv_confidences(tsv: &str) -> Result<Vec<f64>> {
    let mut lines = tsv.lines();
    let header = lines.next().context("tesseract tsv output is empty")?;
    let conf_index = header
        .split('\t')
        .position(|column| column.trim() == "conf")
        .context("tesseract tsv output has no conf column")?;

    Ok(lines
        .filter_map(|line| line.split('\t').nth(conf_index))
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .collect())
}

pub fn mean_confidence(values: &[f64]) -> f64 {
    let usable: Vec<f64> = values
        .iter()
        .copied()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .collect();

    if usable.is_empty() {
        return 0.0;
    }

    let mean = usable.iter().sum::<f64>() / usable.len() as f64;
    (mean / 100.0).clamp(0.0, 1.0)
}

pub fn extract_text_from_image(backend: &dyn OcrBackend, path: &Path) -> (String, f64) {
    let processed = preprocess_image(path);

    match backend.recognize(processed.path()) {
        Ok(output) => {
            let confidence = mean_confidence(&output.token_confidences);
            debug!(
                path = %path.display(),
                tokens = output.token_confidences.len(),
                confidence,
                "ocr completed"
            );
            (output.text, confidence)
        }
        Err(err) => {
            error!(path = %path.display(), error = %format!("{err:#}"), "error extracting text from image");
            (String::new(), 0.0)
        }
    }
}
