use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::GrayImage;
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::morphology::open;
use tracing::{debug, warn};

const PROCESSED_MARKER: &str = "_processed";

pub struct PreprocessedImage {
    path: PathBuf,
    owned: bool,
}

impl PreprocessedImage {
    fn derived(path: PathBuf) -> Self {
        Self { path, owned: true }
    }

    fn original(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            owned: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_derived(&self) -> bool {
        self.owned
    }
}

impl Drop for PreprocessedImage {
    fn drop(&mut self) {
        if !self.owned || !self.path.exists() {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to remove preprocessed image");
        }
    }
}

pub fn processed_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match path.extension() {
        Some(ext) => format!("{stem}{PROCESSED_MARKER}.{}", ext.to_string_lossy()),
        None => format!("{stem}{PROCESSED_MARKER}"),
    };

    path.with_file_name(file_name)
}

pub fn preprocess_image(path: &Path) -> PreprocessedImage {
    let output_path = processed_path_for(path);

    match binarize_to(path, &output_path) {
        Ok(()) => {
            debug!(source = %path.display(), processed = %output_path.display(), "preprocessed image");
            PreprocessedImage::derived(output_path)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{err:#}"), "image preprocessing failed; using original");
            if output_path.exists() {
                let _ = fs::remove_file(&output_path);
            }
            PreprocessedImage::original(path)
        }
    }
}

pub fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let binary = threshold(gray, level, ThresholdType::Binary);
    open(&binary, Norm::LInf, 0)
}

fn binarize_to(source: &Path, output: &Path) -> Result<()> {
    let gray = image::open(source)
        .with_context(|| format!("failed to load image: {}", source.display()))?
        .to_luma8();

    binarize(&gray)
        .save(output)
        .with_context(|| format!("failed to write preprocessed image: {}", output.display()))
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn two_tone_image() -> GrayImage {
        GrayImage::from_fn(16, 16, |x, _| if x < 8 { Luma([150]) } else { Luma([240]) })
    }

    #[test]
    fn processed_path_inserts_marker_before_extension() {
        assert_eq!(
            processed_path_for(Path::new("/uploads/w2.scan.png")),
            PathBuf::from("/uploads/w2.scan_processed.png")
        );
        assert_eq!(
            processed_path_for(Path::new("/uploads/noext")),
            PathBuf::from("/uploads/noext_processed")
        );
    }

    #[test]
    fn binarize_splits_tones_at_histogram_threshold() {
        let gray = two_tone_image();
        assert!((150..240).contains(&otsu_level(&gray)));

        let output = binarize(&gray);

        assert!(output.pixels().all(|pixel| pixel.0[0] == 0 || pixel.0[0] == 255));
        assert_eq!(output.get_pixel(2, 2).0[0], 0);
        assert_eq!(output.get_pixel(12, 2).0[0], 255);
    }

    #[test]
    fn preprocess_writes_derived_file_and_removes_it_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("scan.png");
        two_tone_image().save(&source).expect("save source");

        let processed = preprocess_image(&source);
        assert!(processed.is_derived());
        assert_eq!(processed.path(), dir.path().join("scan_processed.png"));
        assert!(processed.path().exists());

        let derived = processed.path().to_path_buf();
        drop(processed);
        assert!(!derived.exists());
        assert!(source.exists());
    }

    #[test]
    fn preprocess_falls_back_to_original_path_on_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("broken.png");
        fs::write(&source, b"not an image").expect("write source");

        let processed = preprocess_image(&source);
        assert!(!processed.is_derived());
        assert_eq!(processed.path(), source.as_path());
        assert!(!dir.path().join("broken_processed.png").exists());

        drop(processed);
        assert!(source.exists());
    }
}
