//! Predict-all export: one mask per item plus `num_items.csv`.

use crate::error::Result;
use crate::persist::CountReport;
use crate::session::Workflow;
use std::path::PathBuf;

/// Outcome of a completed batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub items: usize,
    pub total_objects: usize,
    pub report_path: PathBuf,
}

impl Workflow {
    pub fn run_batch(&mut self) -> Result<BatchSummary> {
        self.run_batch_with_progress(|_, _| {})
    }

    /// Predict every item in gallery order, writing its mask and one report
    /// row `title,count`. The report is created even for an empty gallery.
    ///
    /// Items are addressed by index, not through the cursor; the cursor only
    /// follows along so the display shows the item being processed. The first
    /// failure aborts the run and is returned; rows and masks written so far
    /// stay on disk.
    pub fn run_batch_with_progress<F>(&mut self, mut progress: F) -> Result<BatchSummary>
    where
        F: FnMut(usize, usize),
    {
        let mut report = CountReport::create(&self.output_dir)?;
        let total = self.gallery.len();
        tracing::info!(
            "batch over {total} items into {}",
            self.output_dir.display()
        );

        let mut total_objects = 0;
        for index in 0..total {
            self.gallery.goto(index)?;
            self.render();
            let count = match self.predict_index(index) {
                Ok(count) => count,
                Err(err) => {
                    tracing::warn!(
                        "batch aborted at item {} of {total}: {err}",
                        index + 1
                    );
                    return Err(err);
                }
            };
            self.render();
            let title = self.gallery.get(index)?.title();
            report.append_row(&title, count)?;
            total_objects += count;
            progress(index + 1, total);
        }

        let report_path = report.finish()?;
        tracing::info!("batch done: {total} items, {total_objects} objects");
        Ok(BatchSummary {
            items: total,
            total_objects,
            report_path,
        })
    }
}
