mod ui;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> eframe::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "story_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = story_sync::settings::load_settings();
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Story Sync",
        options,
        Box::new(move |_cc| Ok(Box::new(ui::app::MyApp::new(settings)))),
    )
}
