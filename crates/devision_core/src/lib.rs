use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

mod batch;
pub mod config;
pub mod error;
pub mod gallery;
pub mod model;
pub mod normalize;
#[cfg(feature = "ort")]
pub mod onnx;
pub mod persist;
pub mod session;

pub use batch::BatchSummary;
pub use config::Settings;
pub use error::Error;
pub use gallery::{Gallery, Item, Prediction};
pub use model::{
    Detection, IntensitySegmenter, LabelMask, ModelSource, Segmentation, Segmenter,
    load_segmenter,
};
pub use normalize::Normalization;
pub use persist::{CountReport, LABELS_DIR, REPORT_FILE};
pub use session::{ItemView, NullPresenter, Presenter, Workflow};

/// Options controlling how folder scanning behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// When true, scan subdirectories recursively.
    pub recursive: bool,
}

/// List the supported images in a folder, sorted by path.
pub fn scan_folder(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    scan_folder_with(path, ScanOptions::default())
}

/// Scan a folder with options.
pub fn scan_folder_with(path: impl AsRef<Path>, opts: ScanOptions) -> Result<Vec<PathBuf>> {
    let root = path.as_ref();
    if !root.exists() {
        anyhow::bail!("Path does not exist: {}", root.display());
    }
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }

    let walker = if opts.recursive {
        WalkDir::new(root)
    } else {
        WalkDir::new(root).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker.sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("walkdir error: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && is_supported_image(path) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            matches!(ext.as_str(), "tif" | "tiff" | "png" | "jpg" | "jpeg")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn names(rows: Vec<PathBuf>) -> Vec<String> {
        rows.into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn scan_folder_empty_returns_empty() -> Result<()> {
        let dir = tempdir()?;
        let rows = scan_folder(dir.path())?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[test]
    fn scan_folder_missing_path_fails() {
        assert!(scan_folder("/no/such/folder/here").is_err());
    }

    #[test]
    fn scan_folder_lists_only_images_non_recursive() -> Result<()> {
        let dir = tempdir()?;
        File::create(dir.path().join("c.TIF"))?;
        File::create(dir.path().join("a.tiff"))?;
        File::create(dir.path().join("b.png"))?;
        File::create(dir.path().join("not-image.txt"))?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        File::create(nested.join("d.tif"))?;

        let rows = scan_folder_with(dir.path(), ScanOptions { recursive: false })?;
        assert_eq!(names(rows), vec!["a.tiff", "b.png", "c.TIF"]);
        Ok(())
    }

    #[test]
    fn scan_folder_lists_images_recursive_when_enabled() -> Result<()> {
        let dir = tempdir()?;
        File::create(dir.path().join("a.jpg"))?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        File::create(nested.join("b.TIFF"))?;

        let rows = scan_folder_with(dir.path(), ScanOptions { recursive: true })?;
        let mut files = names(rows);
        files.sort();
        assert_eq!(files, vec!["a.jpg", "b.TIFF"]);
        Ok(())
    }
}
