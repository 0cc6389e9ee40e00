//! The operator session: gallery, active model, output directory and the
//! single-item predict operation.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::gallery::{Gallery, Item, Prediction};
use crate::model::{ModelSource, Segmenter, load_segmenter};
use crate::normalize::{Normalization, load_image};
use crate::persist::write_label_mask;
use crate::{ScanOptions, scan_folder_with};
use std::path::{Path, PathBuf};

/// What the display layer needs to draw the current item.
#[derive(Debug, Clone, Copy)]
pub struct ItemView<'a> {
    pub index: usize,
    pub len: usize,
    pub item: &'a Item,
}

impl ItemView<'_> {
    pub fn title(&self) -> String {
        self.item.title()
    }

    /// Count label text, or `None` when the display should be cleared.
    pub fn count_label(&self) -> Option<String> {
        self.item
            .object_count()
            .map(|n| format!("Number of items: {n}"))
    }
}

/// Receives a re-render request whenever the current item changes or gets a
/// new prediction.
pub trait Presenter {
    fn show(&mut self, view: &ItemView<'_>);
}

/// Presenter for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn show(&mut self, _view: &ItemView<'_>) {}
}

pub struct Workflow {
    pub(crate) gallery: Gallery,
    segmenter: Box<dyn Segmenter>,
    pub(crate) output_dir: PathBuf,
    normalization: Normalization,
    presenter: Box<dyn Presenter>,
}

impl Workflow {
    pub fn new(segmenter: Box<dyn Segmenter>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            gallery: Gallery::new(),
            segmenter,
            output_dir: output_dir.into(),
            normalization: Normalization::default(),
            presenter: Box::new(NullPresenter),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let segmenter = load_segmenter(&settings.model)?;
        Ok(Self::new(segmenter, &settings.output_dir).with_normalization(settings.normalization))
    }

    /// Like [`Workflow::from_settings`], but a configured model that no longer
    /// loads is replaced by the default pretrained one. The load error is
    /// returned next to the session so the caller can report it.
    pub fn from_settings_or_default_model(settings: &Settings) -> Result<(Self, Option<Error>)> {
        settings.validate()?;
        let (segmenter, model_error) = match load_segmenter(&settings.model) {
            Ok(segmenter) => (segmenter, None),
            Err(e) => {
                tracing::warn!("falling back to the default model: {e}");
                (load_segmenter(&ModelSource::default())?, Some(e))
            }
        };
        let workflow =
            Self::new(segmenter, &settings.output_dir).with_normalization(settings.normalization);
        Ok((workflow, model_error))
    }

    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenter = Box::new(presenter);
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn set_normalization(&mut self, normalization: Normalization) {
        self.normalization = normalization;
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = dir.into();
        tracing::info!("output directory set to {}", self.output_dir.display());
    }

    pub fn model_name(&self) -> &str {
        self.segmenter.name()
    }

    /// Swap the active model. Existing predictions are kept.
    pub fn set_segmenter(&mut self, segmenter: Box<dyn Segmenter>) {
        tracing::info!("switching model to `{}`", segmenter.name());
        self.segmenter = segmenter;
    }

    pub fn load_model(&mut self, source: &ModelSource) -> Result<()> {
        let segmenter = load_segmenter(source)?;
        self.set_segmenter(segmenter);
        Ok(())
    }

    /// Append an image and show it.
    pub fn add_image(&mut self, path: impl Into<PathBuf>) -> usize {
        let index = self.gallery.append(path);
        self.render();
        index
    }

    pub fn add_images<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths.into_iter().map(|p| self.add_image(p)).count()
    }

    /// Append every supported image found in `dir`, in name order.
    pub fn add_folder(&mut self, dir: &Path, opts: ScanOptions) -> anyhow::Result<usize> {
        let files = scan_folder_with(dir, opts)?;
        Ok(self.add_images(files))
    }

    pub fn current(&self) -> Result<usize> {
        self.gallery.current()
    }

    pub fn current_view(&self) -> Result<ItemView<'_>> {
        let index = self.gallery.current()?;
        Ok(ItemView {
            index,
            len: self.gallery.len(),
            item: self.gallery.get(index)?,
        })
    }

    pub fn next(&mut self) -> Result<usize> {
        self.advance(1)
    }

    pub fn prev(&mut self) -> Result<usize> {
        self.advance(-1)
    }

    pub fn advance(&mut self, delta: isize) -> Result<usize> {
        let index = self.gallery.advance(delta)?;
        self.render();
        Ok(index)
    }

    pub fn goto_start(&mut self) -> Result<()> {
        self.gallery.goto_start()?;
        self.render();
        Ok(())
    }

    pub fn goto(&mut self, index: usize) -> Result<()> {
        self.gallery.goto(index)?;
        self.render();
        Ok(())
    }

    /// Predict the current item, write its mask and return the object count.
    /// Never touches the count report.
    pub fn predict_current(&mut self) -> Result<usize> {
        let index = self.gallery.current()?;
        let count = self.predict_index(index)?;
        self.render();
        Ok(count)
    }

    pub(crate) fn predict_index(&mut self, index: usize) -> Result<usize> {
        let source = self.gallery.get(index)?.source().to_path_buf();
        let image = load_image(&source)?;
        let (rows, cols, _) = image.dim();
        let normalized = self.normalization.apply(image.view());

        let segmentation = self
            .segmenter
            .predict(normalized.view())
            .map_err(Error::Prediction)?;
        segmentation
            .validate(rows, cols)
            .map_err(Error::Prediction)?;

        let mask_path = write_label_mask(&self.output_dir, &source, &segmentation.labels)?;
        let object_count = segmentation.object_count();
        tracing::debug!(
            "predicted {} objects in {} with `{}`",
            object_count,
            source.display(),
            self.segmenter.name()
        );
        self.gallery.set_prediction(
            index,
            Prediction {
                mask_path,
                labels: segmentation.labels,
                object_count,
            },
        )?;
        Ok(object_count)
    }

    pub(crate) fn render(&mut self) {
        let Ok(index) = self.gallery.current() else {
            return;
        };
        if let Ok(item) = self.gallery.get(index) {
            let view = ItemView {
                index,
                len: self.gallery.len(),
                item,
            };
            self.presenter.show(&view);
        }
    }
}
