//! Main window: gallery slideshow with predict and predict-all actions.

mod settings;
mod thumbs;

use anyhow::Result;
use devision_core::{ItemView, ModelSource, Presenter, Settings, Workflow, config::SETTINGS_FILE};
use eframe::{App, Frame, egui};
use rfd::FileDialog;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

/// Forwards re-render requests from the workflow to the UI loop.
struct ChannelPresenter(Sender<usize>);

impl Presenter for ChannelPresenter {
    fn show(&mut self, view: &ItemView<'_>) {
        let _ = self.0.send(view.index);
    }
}

/// Textures for the item currently on screen.
#[derive(Default)]
struct Shown {
    index: Option<usize>,
    source: Option<egui::TextureHandle>,
    mask: Option<egui::TextureHandle>,
}

pub struct UiApp {
    workflow: Workflow,
    settings: Settings,
    redraw_rx: Receiver<usize>,
    shown: Shown,
    status: String,
    show_settings: bool,
}

impl UiApp {
    pub fn new() -> Result<Self> {
        let mut settings = Settings::load().unwrap_or_else(|e| {
            tracing::warn!("ignoring {SETTINGS_FILE}: {e}");
            Settings::default()
        });
        let (tx, redraw_rx) = mpsc::channel();
        let (workflow, model_error) = Workflow::from_settings_or_default_model(&settings)?;
        let workflow = workflow.with_presenter(ChannelPresenter(tx));
        let status = match model_error {
            Some(e) => {
                settings.model = ModelSource::default();
                format!("Cannot load saved model ({e}), using {}", workflow.model_name())
            }
            None => format!("Model: {}", workflow.model_name()),
        };
        Ok(Self {
            workflow,
            settings,
            redraw_rx,
            shown: Shown::default(),
            status,
            show_settings: false,
        })
    }

    fn save_settings(&mut self) {
        if let Err(e) = self.settings.save_to(Path::new(SETTINGS_FILE)) {
            tracing::warn!("cannot save settings: {e}");
        }
    }

    fn select_images(&mut self) {
        if let Some(files) = FileDialog::new()
            .add_filter("Images", &["tif", "tiff", "png", "jpg", "jpeg"])
            .set_directory(".")
            .pick_files()
        {
            let added = self.workflow.add_images(files);
            self.status = format!("Added {added} images");
        }
    }

    fn select_model(&mut self) {
        let Some(dir) = FileDialog::new().set_directory(".").pick_folder() else {
            return;
        };
        let source = ModelSource::Directory(dir);
        match self.workflow.load_model(&source) {
            Ok(()) => {
                self.status = format!("Model: {}", self.workflow.model_name());
                self.settings.model = source;
                self.save_settings();
            }
            Err(e) => self.status = format!("Cannot load model: {e}"),
        }
    }

    fn select_output_dir(&mut self) {
        if let Some(dir) = FileDialog::new().set_directory(".").pick_folder() {
            self.workflow.set_output_dir(&dir);
            self.status = format!("Output: {}", dir.display());
            self.settings.output_dir = dir;
            self.save_settings();
        }
    }

    fn predict(&mut self) {
        let start = Instant::now();
        match self.workflow.predict_current() {
            Ok(n) => self.status = format!("Found {n} items ({:.1?})", start.elapsed()),
            Err(e) => self.status = format!("Prediction failed: {e}"),
        }
    }

    fn predict_all(&mut self) {
        // Blocking run; the window freezes until the batch finishes.
        let start = Instant::now();
        match self.workflow.run_batch() {
            Ok(summary) => {
                self.status = format!(
                    "Exported {} images, {} items to {} ({:.1?})",
                    summary.items,
                    summary.total_objects,
                    summary.report_path.display(),
                    start.elapsed()
                );
            }
            Err(e) => self.status = format!("Export stopped: {e}"),
        }
    }

    fn navigate(&mut self, delta: isize) {
        if let Err(e) = self.workflow.advance(delta) {
            self.status = e.to_string();
        }
    }

    /// Drop stale textures after the workflow asked for a re-render.
    fn drain_redraws(&mut self) {
        let mut latest = None;
        while let Ok(index) = self.redraw_rx.try_recv() {
            latest = Some(index);
        }
        if let Some(index) = latest {
            self.shown = Shown {
                index: Some(index),
                ..Shown::default()
            };
        }
    }

    fn ensure_textures(&mut self, ctx: &egui::Context) {
        let Ok(view) = self.workflow.current_view() else {
            return;
        };
        if self.shown.index != Some(view.index) {
            self.shown = Shown {
                index: Some(view.index),
                ..Shown::default()
            };
        }
        let size = self.settings.thumbnail_size;
        if self.shown.source.is_none() {
            match thumbs::source_preview(view.item.source(), self.settings.normalization, size) {
                Ok(img) => {
                    let name = format!("source:{}", view.item.source().display());
                    self.shown.source = Some(ctx.load_texture(
                        name,
                        img,
                        egui::TextureOptions::LINEAR,
                    ));
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load preview for {}: {}",
                        view.item.source().display(),
                        e
                    );
                }
            }
        }
        if self.shown.mask.is_none()
            && let Some(prediction) = view.item.prediction()
        {
            let img = thumbs::mask_preview(&prediction.labels, size);
            let name = format!("mask:{}", prediction.mask_path.display());
            self.shown.mask = Some(ctx.load_texture(name, img, egui::TextureOptions::NEAREST));
        }
    }
}

impl App for UiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.drain_redraws();
        self.ensure_textures(ctx);
        let has_items = !self.workflow.gallery().is_empty();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Select Images").clicked() {
                    self.select_images();
                }
                if ui.button("Select Output Location").clicked() {
                    self.select_output_dir();
                }
                if ui.button("Select Model").clicked() {
                    self.select_model();
                }
                ui.toggle_value(&mut self.show_settings, "Settings");
            });
        });

        egui::TopBottomPanel::bottom("actions").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(has_items, egui::Button::new("Predict"))
                    .clicked()
                {
                    self.predict();
                }
                if ui
                    .add_enabled(has_items, egui::Button::new("Predict All"))
                    .clicked()
                {
                    self.predict_all();
                }
                if !self.status.is_empty() {
                    ui.label(&self.status);
                }
            });
        });

        if self.show_settings {
            egui::SidePanel::right("settings").show(ctx, |ui| {
                self.render_settings_panel(ui);
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let Ok(view) = self.workflow.current_view() else {
                ui.heading("No images selected");
                return;
            };
            ui.vertical_centered(|ui| {
                ui.heading(format!("{} ({}/{})", view.title(), view.index + 1, view.len));
            });
            let side = self.settings.thumbnail_size as f32;
            ui.horizontal(|ui| {
                match &self.shown.source {
                    Some(tex) => {
                        ui.image((tex.id(), egui::vec2(side, side)));
                    }
                    None => {
                        ui.allocate_space(egui::vec2(side, side));
                    }
                }
                match &self.shown.mask {
                    Some(tex) => {
                        ui.image((tex.id(), egui::vec2(side, side)));
                    }
                    None => {
                        ui.allocate_space(egui::vec2(side, side));
                    }
                }
            });
            ui.vertical_centered(|ui| {
                ui.label(view.count_label().unwrap_or_default());
            });
            let mut delta = 0;
            ui.horizontal(|ui| {
                if ui.button("Prev").clicked() {
                    delta = -1;
                }
                if ui.button("Next").clicked() {
                    delta = 1;
                }
            });
            if delta != 0 {
                self.navigate(delta);
            }
        });
    }
}
