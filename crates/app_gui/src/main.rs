use eframe::NativeOptions;
use tracing_subscriber::EnvFilter;

mod app;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let title = format!("Devision Predictor {}", env!("DEVISION_VERSION"));
    let options = NativeOptions::default();
    if let Err(e) = eframe::run_native(
        &title,
        options,
        Box::new(|_cc| {
            let app = app::UiApp::new()?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(Box::new(app))
        }),
    ) {
        eprintln!("Application stopped with error: {e}");
    }
}
