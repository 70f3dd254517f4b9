use eframe::egui;

use story_sync::engine::protocol::EngineCommand;

use super::app::MyApp;

pub fn draw_center_panel(ctx: &egui::Context, app: &mut MyApp) {
    let input_id = egui::Id::new("chat_input_box");
    let busy = app.is_busy();

    // ---------- Input bar ----------
    egui::TopBottomPanel::bottom("chat_input").show(ctx, |ui| {
        let mut send_now = false;

        if busy {
            ui.label(format!("The narrator is {}…", app.phase().label()));
        }

        ui.add_enabled_ui(!busy, |ui| {
            ui.horizontal(|ui| {
                let response = ui.add_sized(
                    [ui.available_width() - 60.0, 60.0],
                    egui::TextEdit::multiline(&mut app.ui.input_text)
                        .id(input_id)
                        .hint_text("What do you do?")
                        .lock_focus(true),
                );

                // Enter vs Shift+Enter
                if response.has_focus()
                    && ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift)
                {
                    send_now = true;
                }

                if ui.button("Send").clicked() {
                    send_now = true;
                }
            });
        });

        if send_now && !busy {
            let text = app.ui.input_text.trim().to_string();

            if !text.is_empty() {
                app.send_command(EngineCommand::SubmitPrompt(text));
                app.ui.input_text.clear();
            }

            // Keep cursor focused
            ui.memory_mut(|m| m.request_focus(input_id));
        }
    });

    // ---------- Chat history ----------
    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical()
            .stick_to_bottom(app.ui.should_auto_scroll)
            .show(ui, |ui| {
                for msg in &app.ui.rendered_messages {
                    app.draw_message(ui, msg);
                }
            });
    });
}
