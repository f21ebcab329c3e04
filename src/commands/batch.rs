use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};
use w2extract::W2Extractor;
use w2extract::model::{BatchEntry, BatchManifest, ToolVersions};
use w2extract::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

use crate::cli::BatchArgs;
use crate::commands::tools::collect_tool_versions;

pub fn run(args: BatchArgs) -> Result<()> {
    let started_ts = Utc::now();
    let documents = discover_documents(&args.input_dir)?;

    if args.dry_run {
        info!(
            document_count = documents.len(),
            source = %args.input_dir.display(),
            "batch dry-run complete"
        );
        return Ok(());
    }

    let config = args.extractor.load_config()?;
    let tool_versions = collect_tool_versions(&config);
    let extractor = W2Extractor::new(config)?;

    info!(
        source = %args.input_dir.display(),
        document_count = documents.len(),
        "starting batch"
    );

    let manifest = build_manifest(&extractor, &args.input_dir, &documents, tool_versions)?;

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.input_dir.join("manifests").join(format!(
            "batch_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote batch manifest");
    info!(
        document_count = manifest.document_count,
        w2_match_count = manifest.w2_match_count,
        error_count = manifest.error_count,
        "batch completed"
    );

    Ok(())
}

pub fn build_manifest(
    extractor: &W2Extractor,
    input_dir: &Path,
    documents: &[PathBuf],
    tool_versions: ToolVersions,
) -> Result<BatchManifest> {
    let mut entries = Vec::with_capacity(documents.len());

    for path in documents {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let sha256 = match sha256_file(path) {
            Ok(hash) => Some(hash),
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "failed to hash document");
                None
            }
        };

        let result = extractor.process(path);
        entries.push(BatchEntry {
            filename,
            sha256,
            result,
        });
    }

    Ok(BatchManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        document_count: entries.len(),
        w2_match_count: entries.iter().filter(|entry| entry.result.is_w2_match).count(),
        error_count: entries
            .iter()
            .filter(|entry| entry.result.error.is_some())
            .count(),
        tool_versions,
        documents: entries,
    })
}

fn discover_documents(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false);

        if !hidden {
            documents.push(path);
        }
    }

    if documents.is_empty() {
        bail!("no documents found in {}", input_dir.display());
    }

    documents.sort();
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use w2extract::ExtractorConfig;
    use w2extract::extraction::ocr::{OcrBackend, OcrOutput};
    use w2extract::extraction::pdf::PdfBackend;

    use super::*;

    struct TextOcr(&'static str);

    impl OcrBackend for TextOcr {
        fn recognize(&self, _image: &Path) -> Result<OcrOutput> {
            Ok(OcrOutput {
                text: self.0.to_string(),
                token_confidences: vec![91.0],
            })
        }
    }

    struct NoPdf;

    impl PdfBackend for NoPdf {
        fn text_pages(&self, pdf: &Path) -> Result<Vec<String>> {
            bail!("unreadable pdf: {}", pdf.display())
        }

        fn rasterize_page(&self, _pdf: &Path, _page_number: usize, _png_out: &Path) -> Result<()> {
            bail!("unreadable pdf")
        }
    }

    fn no_tools() -> ToolVersions {
        ToolVersions {
            tesseract: None,
            pdftotext: None,
            pdftoppm: None,
        }
    }

    #[test]
    fn discover_documents_skips_directories_and_hidden_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("b.pdf"), b"%PDF").expect("write");
        fs::write(dir.path().join("a.png"), b"png").expect("write");
        fs::write(dir.path().join(".DS_Store"), b"x").expect("write");
        fs::create_dir(dir.path().join("manifests")).expect("mkdir");

        let documents = discover_documents(dir.path()).expect("discover");
        let names: Vec<_> = documents
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(names, vec!["a.png", "b.pdf"]);
    }

    #[test]
    fn discover_documents_fails_on_empty_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(discover_documents(dir.path()).is_err());
    }

    #[test]
    fn one_failing_document_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("broken.pdf"), b"%PDF").expect("write");
        fs::write(dir.path().join("notes.docx"), b"docx").expect("write");
        fs::write(dir.path().join("w2.png"), b"not really a png").expect("write");

        let extractor = W2Extractor::with_backends(
            ExtractorConfig::default(),
            Arc::new(TextOcr(
                "Form W-2 Wage and Tax Statement\nFederal income tax withheld 1,234.56",
            )),
            Arc::new(NoPdf),
        )
        .expect("extractor");

        let documents = discover_documents(dir.path()).expect("discover");
        let manifest =
            build_manifest(&extractor, dir.path(), &documents, no_tools()).expect("manifest");

        assert_eq!(manifest.document_count, 3);
        assert_eq!(manifest.w2_match_count, 1);
        assert_eq!(manifest.error_count, 1);

        let by_name = |name: &str| {
            manifest
                .documents
                .iter()
                .find(|entry| entry.filename == name)
                .expect("entry present")
        };

        let broken = by_name("broken.pdf");
        assert!(!broken.result.is_w2_match);
        assert!(broken.result.error.is_none());
        assert_eq!(broken.result.confidence, 0.0);

        let docx = by_name("notes.docx");
        assert_eq!(
            docx.result.error.as_deref(),
            Some("Unsupported file type: .docx")
        );
        assert!(docx.sha256.is_some());

        let w2 = by_name("w2.png");
        assert!(w2.result.is_w2_match);
        assert!((w2.result.confidence - 0.91).abs() < 1e-9);
    }
}
