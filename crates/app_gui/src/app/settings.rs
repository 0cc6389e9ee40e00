//! Settings panel for normalization, thumbnails and the active model.

use super::{Shown, UiApp};
use devision_core::Normalization;
use eframe::egui;

impl UiApp {
    /// Renders the settings side panel.
    pub(super) fn render_settings_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Settings");
        ui.add_space(8.0);
        ui.label(format!("Model: {}", self.workflow.model_name()));
        ui.label(format!("Output: {}", self.workflow.output_dir().display()));

        ui.add_space(12.0);
        ui.label("Normalization percentiles");
        let mut pending: Normalization = self.settings.normalization;
        ui.horizontal(|ui| {
            ui.add(
                egui::DragValue::new(&mut pending.low)
                    .range(0.0..=100.0)
                    .speed(0.1)
                    .prefix("low "),
            );
            ui.add(
                egui::DragValue::new(&mut pending.high)
                    .range(0.0..=100.0)
                    .speed(0.1)
                    .prefix("high "),
            );
        });
        if pending != self.settings.normalization {
            match pending.validate() {
                Ok(()) => {
                    self.settings.normalization = pending;
                    self.workflow.set_normalization(pending);
                    self.shown = Shown::default();
                    self.status = "Normalization applies to the next prediction".to_string();
                }
                Err(e) => self.status = e.to_string(),
            }
        }

        ui.add_space(12.0);
        ui.horizontal(|ui| {
            ui.label("Thumbnail size");
            let resp = ui.add(
                egui::DragValue::new(&mut self.settings.thumbnail_size)
                    .range(64..=1024)
                    .speed(4),
            );
            if resp.changed() {
                self.shown = Shown::default();
            }
        });

        ui.add_space(12.0);
        ui.separator();
        if ui.button("Save settings").clicked() {
            self.save_settings();
            self.status = "Settings saved".to_string();
        }
    }
}
