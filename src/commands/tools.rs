use anyhow::Result;
use tracing::{info, warn};
use w2extract::ExtractorConfig;
use w2extract::model::ToolVersions;
use w2extract::util::command_version_optional;

use crate::cli::ExtractorArgs;

pub fn run(args: ExtractorArgs) -> Result<()> {
    let versions = collect_tool_versions(&args.load_config()?);

    for (tool, version) in [
        ("tesseract", &versions.tesseract),
        ("pdftotext", &versions.pdftotext),
        ("pdftoppm", &versions.pdftoppm),
    ] {
        match version {
            Some(version) => info!(tool, version = %version, "tool available"),
            None => warn!(tool, "tool unavailable; affected documents will yield empty text"),
        }
    }

    Ok(())
}

pub fn collect_tool_versions(config: &ExtractorConfig) -> ToolVersions {
    ToolVersions {
        tesseract: command_version_optional(&config.ocr.tesseract_bin, &["--version"]),
        pdftotext: command_version_optional(&config.pdf.pdftotext_bin, &["-v"]),
        pdftoppm: command_version_optional(&config.pdf.pdftoppm_bin, &["-v"]),
    }
}
