//! Segmentation model contract plus the built-in and directory-backed models.

use crate::error::{Error, Result};
use anyhow::ensure;
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-pixel object labels; 0 is background, each object has its own id.
pub type LabelMask = Array2<u32>;

/// Name of the pretrained model shipped with the crate.
pub const DEFAULT_PRETRAINED: &str = "2D_demo";

const THRESHOLDS_FILE: &str = "thresholds.json";
const ONNX_FILE: &str = "model.onnx";

/// One detected object, located by its centroid in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub row: f32,
    pub col: f32,
}

/// Model output for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub labels: LabelMask,
    pub detections: Vec<Detection>,
}

impl Segmentation {
    pub fn object_count(&self) -> usize {
        self.detections.len()
    }

    /// Reject results whose mask does not match the input image or whose
    /// detections fall outside the mask.
    pub fn validate(&self, rows: usize, cols: usize) -> anyhow::Result<()> {
        ensure!(
            self.labels.dim() == (rows, cols),
            "label mask is {:?}, expected ({rows}, {cols})",
            self.labels.dim()
        );
        for d in &self.detections {
            ensure!(
                d.row.is_finite()
                    && d.col.is_finite()
                    && (0.0..rows as f32).contains(&d.row)
                    && (0.0..cols as f32).contains(&d.col),
                "detection at ({}, {}) lies outside the image",
                d.row,
                d.col
            );
        }
        Ok(())
    }
}

/// Anything that turns a normalized `(row, col, channel)` image into a label
/// mask and a list of detections.
pub trait Segmenter: Send {
    /// Human readable model name for the UI and logs.
    fn name(&self) -> &str;

    fn predict(&self, image: ArrayView3<f32>) -> anyhow::Result<Segmentation>;
}

/// Where to load a model from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Pretrained(String),
    Directory(PathBuf),
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Pretrained(DEFAULT_PRETRAINED.to_string())
    }
}

/// Tuning values read from `thresholds.json` in a model directory.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Thresholds {
    pub prob: f32,
    #[serde(default)]
    pub min_area: Option<usize>,
}

pub fn load_segmenter(source: &ModelSource) -> Result<Box<dyn Segmenter>> {
    match source {
        ModelSource::Pretrained(name) if name == DEFAULT_PRETRAINED => {
            Ok(Box::new(IntensitySegmenter::default()))
        }
        ModelSource::Pretrained(name) => Err(Error::Model(format!(
            "unknown pretrained model `{name}`"
        ))),
        ModelSource::Directory(dir) => load_from_dir(dir),
    }
}

fn load_from_dir(dir: &Path) -> Result<Box<dyn Segmenter>> {
    if !dir.is_dir() {
        return Err(Error::Model(format!(
            "model directory does not exist: {}",
            dir.display()
        )));
    }
    let name = crate::gallery::base_name(dir);
    let thresholds = read_thresholds(&dir.join(THRESHOLDS_FILE))?;
    let onnx = dir.join(ONNX_FILE);

    if onnx.is_file() {
        return load_onnx(&onnx, name, thresholds);
    }
    match thresholds {
        Some(t) => {
            tracing::info!("using intensity model `{name}` with threshold {}", t.prob);
            let default = IntensitySegmenter::default();
            Ok(Box::new(IntensitySegmenter {
                name,
                threshold: t.prob,
                min_area: t.min_area.unwrap_or(default.min_area),
            }))
        }
        None => Err(Error::Model(format!(
            "no {ONNX_FILE} or {THRESHOLDS_FILE} in {}",
            dir.display()
        ))),
    }
}

fn read_thresholds(path: &Path) -> Result<Option<Thresholds>> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Model(format!("cannot read {}: {e}", path.display())))?;
    let t: Thresholds = serde_json::from_str(&raw)
        .map_err(|e| Error::Model(format!("invalid {}: {e}", path.display())))?;
    Ok(Some(t))
}

#[cfg(feature = "ort")]
fn load_onnx(
    path: &Path,
    name: String,
    thresholds: Option<Thresholds>,
) -> Result<Box<dyn Segmenter>> {
    let default = IntensitySegmenter::default();
    let seg = crate::onnx::OnnxSegmenter::new(
        path,
        name,
        thresholds.map_or(default.threshold, |t| t.prob),
        thresholds
            .and_then(|t| t.min_area)
            .unwrap_or(default.min_area),
    )
    .map_err(|e| Error::Model(format!("{e:#}")))?;
    Ok(Box::new(seg))
}

#[cfg(not(feature = "ort"))]
fn load_onnx(
    path: &Path,
    _name: String,
    _thresholds: Option<Thresholds>,
) -> Result<Box<dyn Segmenter>> {
    Err(Error::Model(format!(
        "{} needs the `ort` feature",
        path.display()
    )))
}

/// Built-in model: foreground is every pixel whose channel mean exceeds
/// `threshold`; objects are its 4-connected components.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensitySegmenter {
    pub name: String,
    pub threshold: f32,
    /// Components smaller than this many pixels are dropped as noise.
    pub min_area: usize,
}

impl Default for IntensitySegmenter {
    fn default() -> Self {
        Self {
            name: DEFAULT_PRETRAINED.to_string(),
            threshold: 0.5,
            min_area: 3,
        }
    }
}

impl Segmenter for IntensitySegmenter {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, image: ArrayView3<f32>) -> anyhow::Result<Segmentation> {
        let mean = image
            .mean_axis(Axis(2))
            .ok_or_else(|| anyhow::anyhow!("image has no channels"))?;
        let foreground = mean.mapv(|v| v > self.threshold);
        Ok(label_components(foreground.view(), self.min_area))
    }
}

/// Label the 4-connected `true` regions of `foreground` in raster order.
pub fn label_components(foreground: ArrayView2<bool>, min_area: usize) -> Segmentation {
    let (rows, cols) = foreground.dim();
    let mut labels = LabelMask::zeros((rows, cols));
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut detections = Vec::new();
    let mut queue = VecDeque::new();
    let mut pixels = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            if visited[[r, c]] || !foreground[[r, c]] {
                continue;
            }
            visited[[r, c]] = true;
            queue.push_back((r, c));
            pixels.clear();
            while let Some((pr, pc)) = queue.pop_front() {
                pixels.push((pr, pc));
                let neighbours = [
                    (pr.wrapping_sub(1), pc),
                    (pr + 1, pc),
                    (pr, pc.wrapping_sub(1)),
                    (pr, pc + 1),
                ];
                for (nr, nc) in neighbours {
                    if nr < rows && nc < cols && !visited[[nr, nc]] && foreground[[nr, nc]] {
                        visited[[nr, nc]] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }
            if pixels.len() < min_area.max(1) {
                continue;
            }
            let label = detections.len() as u32 + 1;
            let (mut sr, mut sc) = (0.0f64, 0.0f64);
            for &(pr, pc) in &pixels {
                labels[[pr, pc]] = label;
                sr += pr as f64;
                sc += pc as f64;
            }
            let n = pixels.len() as f64;
            detections.push(Detection {
                row: (sr / n) as f32,
                col: (sc / n) as f32,
            });
        }
    }

    Segmentation { labels, detections }
}
