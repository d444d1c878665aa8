//! Glance - a plugin-based real-time rendering playground.

use glance::config::ViewerConfig;
use glance::ViewerApp;

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ViewerConfig::global();
    let options = eframe::NativeOptions {
        renderer: eframe::Renderer::Wgpu,
        multisampling: config.sample_count.max(1) as u16,
        viewport: egui::ViewportBuilder::default()
            .with_title("Glance")
            .with_inner_size([config.window_width as f32, config.window_height as f32]),
        ..Default::default()
    };

    eframe::run_native(
        "glance",
        options,
        Box::new(|cc| {
            let app = ViewerApp::new(cc).map_err(|err| -> Box<dyn std::error::Error + Send + Sync> {
                Box::new(err)
            })?;
            Ok(Box::new(app))
        }),
    )
}
