use crate::model::{Segmentation, Segmenter, label_components};
use anyhow::{Context, Result, anyhow};
use ndarray::{Array2, Array4, ArrayView3, CowArray};
use once_cell::sync::OnceCell;
use ort::{
    GraphOptimizationLevel, SessionBuilder, environment::Environment, session::Session,
    tensor::OrtOwnedTensor, value::Value,
};
use std::path::Path;
use std::sync::Arc;

static ORT_ENV: OnceCell<Arc<Environment>> = OnceCell::new();

fn environment() -> Result<Arc<Environment>> {
    ORT_ENV
        .get_or_try_init(|| {
            Ok(Environment::builder()
                .with_name("devision")
                .build()?
                .into_arc())
        })
        .cloned()
}

/// Probability-map model run through ONNX Runtime.
///
/// The network takes an `NCHW` float tensor with the image's channels and
/// returns one object probability per pixel; objects are the connected
/// components above `threshold`.
pub struct OnnxSegmenter {
    session: Session,
    name: String,
    threshold: f32,
    min_area: usize,
}

impl OnnxSegmenter {
    pub fn new(model_path: &Path, name: String, threshold: f32, min_area: usize) -> Result<Self> {
        let env = environment()?;
        let session = SessionBuilder::new(&env)?
            .with_optimization_level(GraphOptimizationLevel::Level1)?
            .with_model_from_file(model_path)
            .with_context(|| format!("cannot load model {}", model_path.display()))?;
        tracing::info!("loaded onnx model `{name}` from {}", model_path.display());
        Ok(Self {
            session,
            name,
            threshold,
            min_area,
        })
    }

    fn probabilities(&self, image: ArrayView3<f32>) -> Result<Array2<f32>> {
        let (rows, cols, channels) = image.dim();
        let mut tensor = Array4::<f32>::zeros((1, channels, rows, cols));
        for ((r, c, ch), v) in image.indexed_iter() {
            tensor[[0, ch, r, c]] = *v;
        }
        let input_array = tensor.into_dyn();
        let cow = CowArray::from(input_array.view());
        let input = Value::from_array(self.session.allocator(), &cow)
            .map_err(|e| anyhow!("cannot build input tensor: {e}"))?;
        let outputs: Vec<Value> = self.session.run(vec![input])?;
        let first = outputs.first().ok_or_else(|| anyhow!("model returned no output"))?;
        let probs: OrtOwnedTensor<f32, _> = first.try_extract()?;
        let values: Vec<f32> = probs.view().iter().copied().collect();
        if values.len() != rows * cols {
            anyhow::bail!(
                "model returned {} values for a {rows}x{cols} image",
                values.len()
            );
        }
        Ok(Array2::from_shape_vec((rows, cols), values)?)
    }
}

impl Segmenter for OnnxSegmenter {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, image: ArrayView3<f32>) -> Result<Segmentation> {
        let probs = self.probabilities(image)?;
        let foreground = probs.mapv(|p| p > self.threshold);
        Ok(label_components(foreground.view(), self.min_area))
    }
}
