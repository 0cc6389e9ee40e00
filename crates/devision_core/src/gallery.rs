//! Ordered item store with a wrap-around navigation cursor.

use crate::error::{Error, Result};
use crate::model::LabelMask;
use std::path::{Path, PathBuf};

/// Derived state of a predicted item. The mask and the count always travel
/// together, so an item can never report a count without a mask or the reverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Where the label mask was written.
    pub mask_path: PathBuf,
    pub labels: LabelMask,
    pub object_count: usize,
}

/// One gallery entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    source: PathBuf,
    prediction: Option<Prediction>,
}

impl Item {
    fn new(source: PathBuf) -> Self {
        Self {
            source,
            prediction: None,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Base name of the source file, used as display title and report key.
    pub fn title(&self) -> String {
        base_name(&self.source)
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    pub fn object_count(&self) -> Option<usize> {
        self.prediction.as_ref().map(|p| p.object_count)
    }

    pub fn is_predicted(&self) -> bool {
        self.prediction.is_some()
    }
}

pub(crate) fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Append-only list of items plus the index of the item currently shown.
#[derive(Debug, Default, Clone)]
pub struct Gallery {
    items: Vec<Item>,
    current: Option<usize>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unpredicted item and make it current. Returns its index.
    pub fn append(&mut self, source: impl Into<PathBuf>) -> usize {
        self.items.push(Item::new(source.into()));
        let index = self.items.len() - 1;
        self.current = Some(index);
        index
    }

    pub fn get(&self, index: usize) -> Result<&Item> {
        self.items.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    /// Store a prediction for `index`, replacing any earlier one.
    pub fn set_prediction(&mut self, index: usize, prediction: Prediction) -> Result<()> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        item.prediction = Some(prediction);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn current(&self) -> Result<usize> {
        self.current.ok_or(Error::EmptyStore)
    }

    pub fn current_item(&self) -> Result<&Item> {
        self.get(self.current()?)
    }

    /// Move the cursor by `delta`, wrapping at both ends.
    pub fn advance(&mut self, delta: isize) -> Result<usize> {
        let current = self.current()?;
        let len = self.items.len() as isize;
        let next = (current as isize + delta).rem_euclid(len) as usize;
        self.current = Some(next);
        Ok(next)
    }

    pub fn goto_start(&mut self) -> Result<()> {
        self.goto(0)
    }

    pub fn goto(&mut self, index: usize) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::EmptyStore);
        }
        self.get(index)?;
        self.current = Some(index);
        Ok(())
    }
}
