use eframe::egui;

use story_sync::engine::protocol::EngineCommand;

use super::app::MyApp;

pub fn draw_right_panel(ctx: &egui::Context, app: &mut MyApp) {
    egui::SidePanel::right("right")
        .resizable(true)
        .default_width(280.0)
        .min_width(220.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                draw_status(ui, app);
                ui.separator();
                draw_session(ui, app);
            });
        });
}

/* =========================
   Status
   ========================= */

fn draw_status(ui: &mut egui::Ui, app: &MyApp) {
    let state = app.game_state();

    ui.heading("Status");

    ui.label("Health");
    ui.add(
        egui::ProgressBar::new(state.health.min(100) as f32 / 100.0)
            .text(state.health.to_string()),
    );

    ui.add_space(6.0);
    ui.collapsing("Inventory", |ui| {
        if state.inventory.is_empty() {
            ui.label("Empty");
        } else {
            for item in &state.inventory {
                ui.label(format!("• {item}"));
            }
        }
    });
}

/* =========================
   Session
   ========================= */

fn draw_session(ui: &mut egui::Ui, app: &mut MyApp) {
    ui.heading("Session");

    ui.label(format!("Model: {}", app.settings.llm.model));
    ui.label(format!("Server: {}", app.settings.llm.base_url));

    ui.horizontal(|ui| {
        if ui.button("Test connection").clicked() {
            app.send_command(EngineCommand::TestConnection);
        }

        if ui
            .add_enabled(!app.is_busy(), egui::Button::new("New session"))
            .clicked()
        {
            app.send_command(EngineCommand::NewSession);
        }
    });

    if let Some(status) = &app.ui.connection_status {
        ui.label(status.as_str());
    }

    ui.separator();
    ui.label("UI Scale");
    if ui
        .add(egui::Slider::new(&mut app.settings.ui_scale, 0.75..=2.0))
        .drag_stopped()
    {
        app.save_settings();
    }
}
