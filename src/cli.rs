use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use w2extract::ExtractorConfig;

#[derive(Parser, Debug)]
#[command(
    name = "w2extract",
    version,
    about = "Classify documents as W-2 wage and tax statements and extract their fields"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Process(ProcessArgs),
    Batch(BatchArgs),
    Tools(ExtractorArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractorArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub ocr_lang: Option<String>,

    #[arg(long)]
    pub ocr_psm: Option<u8>,

    #[arg(long)]
    pub ocr_oem: Option<u8>,

    #[arg(long)]
    pub raster_dpi: Option<u32>,

    #[arg(long)]
    pub temp_root: Option<PathBuf>,
}

impl ExtractorArgs {
    pub fn load_config(&self) -> Result<ExtractorConfig> {
        let mut config = match &self.config {
            Some(path) => ExtractorConfig::load(path)?,
            None => ExtractorConfig::default(),
        };

        if let Some(lang) = &self.ocr_lang {
            config.ocr.lang = lang.clone();
        }
        if let Some(psm) = self.ocr_psm {
            config.ocr.page_seg_mode = psm;
        }
        if let Some(oem) = self.ocr_oem {
            config.ocr.engine_mode = oem;
        }
        if let Some(dpi) = self.raster_dpi {
            config.pdf.raster_dpi = dpi;
        }
        if let Some(root) = &self.temp_root {
            config.temp_root = Some(root.clone());
        }

        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    pub path: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub omit_raw_text: bool,

    #[command(flatten)]
    pub extractor: ExtractorArgs,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[arg(long)]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[command(flatten)]
    pub extractor: ExtractorArgs,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::parse_from([
            "w2extract",
            "process",
            "w2.pdf",
            "--ocr-lang",
            "spa",
            "--ocr-psm",
            "4",
            "--raster-dpi",
            "300",
        ]);
        let Commands::Process(args) = cli.command else {
            panic!("expected process command");
        };

        let config = args.extractor.load_config().expect("config");
        assert_eq!(args.path, PathBuf::from("w2.pdf"));
        assert_eq!(config.ocr.lang, "spa");
        assert_eq!(config.ocr.page_seg_mode, 4);
        assert_eq!(config.ocr.engine_mode, 3);
        assert_eq!(config.pdf.raster_dpi, 300);
    }
}
