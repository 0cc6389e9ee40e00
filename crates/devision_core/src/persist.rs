//! Label-mask files and the cumulative count report.

use crate::error::{Error, Result};
use crate::gallery::base_name;
use crate::model::LabelMask;
use image::{ImageBuffer, ImageError, ImageFormat, Luma};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Subdirectory of the output directory receiving label masks.
pub const LABELS_DIR: &str = "labels";
/// Count report written by a batch run.
pub const REPORT_FILE: &str = "num_items.csv";

/// Create `path` and its parents unless they already exist.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::persistence(path, e))
}

/// Write `labels` as a 16-bit TIFF to `output_dir/labels/<base name of source>`.
///
/// The file keeps the source's exact name, whatever its extension, so masks can
/// be matched back to inputs.
pub fn write_label_mask(output_dir: &Path, source: &Path, labels: &LabelMask) -> Result<PathBuf> {
    let dir = output_dir.join(LABELS_DIR);
    ensure_dir(&dir)?;
    let path = dir.join(base_name(source));

    let (rows, cols) = labels.dim();
    let max = labels.iter().copied().max().unwrap_or(0);
    if max > u32::from(u16::MAX) {
        return Err(Error::persistence(
            &path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("label {max} does not fit a 16-bit mask"),
            ),
        ));
    }
    let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
            Luma([labels[[y as usize, x as usize]] as u16])
        });

    let file = File::create(&path).map_err(|e| Error::persistence(&path, e))?;
    let mut writer = BufWriter::new(file);
    buffer
        .write_to(&mut writer, ImageFormat::Tiff)
        .map_err(|e| Error::persistence(&path, image_to_io(e)))?;
    writer.flush().map_err(|e| Error::persistence(&path, e))?;
    tracing::debug!("wrote label mask {}", path.display());
    Ok(path)
}

fn image_to_io(err: ImageError) -> io::Error {
    match err {
        ImageError::IoError(e) => e,
        other => io::Error::other(other),
    }
}

/// `num_items.csv` open for one batch run: one `title,count` line per item,
/// no header. Dropping the report flushes and closes it, so rows written before
/// a failure stay on disk.
pub struct CountReport {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl CountReport {
    /// Create (or truncate) the report inside `output_dir`.
    pub fn create(output_dir: &Path) -> Result<Self> {
        ensure_dir(output_dir)?;
        let path = output_dir.join(REPORT_FILE);
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(|e| Error::persistence(&path, e.into()))?;
        Ok(Self {
            writer,
            path,
            rows: 0,
        })
    }

    pub fn append_row(&mut self, title: &str, object_count: usize) -> Result<()> {
        let count = object_count.to_string();
        self.writer
            .write_record([title, count.as_str()])
            .map_err(|e| Error::persistence(&self.path, e.into()))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close, returning the report path.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer
            .flush()
            .map_err(|e| Error::persistence(&self.path, e))?;
        Ok(self.path)
    }
}
