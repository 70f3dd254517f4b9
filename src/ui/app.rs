use std::time::Duration;

use eframe::egui;
use egui::Layout;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use story_sync::engine::engine::spawn_engine;
use story_sync::engine::protocol::{EngineCommand, EngineResponse};
use story_sync::model::game_state::GameState;
use story_sync::model::turn::TurnPhase;
use story_sync::settings::{save_settings, Settings};

use super::center_panel::draw_center_panel;
use super::right_panel::draw_right_panel;

/* =========================
   Chat entries
   ========================= */

#[derive(Debug, Clone)]
pub enum ChatEntry {
    User(String),
    Narrator(String),
    System(String),
    Error(String),
}

/* =========================
   UI State
   ========================= */

#[derive(Default)]
pub struct UiState {
    pub input_text: String,
    pub rendered_messages: Vec<ChatEntry>,

    /// Narrator bubble that display updates are written into.
    pub live_reply: Option<usize>,

    pub connection_status: Option<String>,
    pub should_auto_scroll: bool,
}

/* =========================
   App
   ========================= */

pub struct MyApp {
    pub ui: UiState,
    pub settings: Settings,

    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    resp_rx: mpsc::UnboundedReceiver<EngineResponse>,
    state_rx: watch::Receiver<GameState>,
    phase_rx: watch::Receiver<TurnPhase>,
}

impl MyApp {
    pub fn new(settings: Settings) -> Self {
        let handle = spawn_engine(&settings);

        Self {
            ui: UiState::default(),
            settings,
            cmd_tx: handle.commands,
            resp_rx: handle.responses,
            state_rx: handle.state,
            phase_rx: handle.phase,
        }
    }

    pub fn send_command(&self, cmd: EngineCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!("Engine is no longer running");
        }
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase_rx.borrow()
    }

    pub fn is_busy(&self) -> bool {
        !self.phase().is_idle()
    }

    pub fn game_state(&self) -> GameState {
        self.state_rx.borrow().clone()
    }

    pub fn save_settings(&self) {
        if let Err(e) = save_settings(&self.settings) {
            warn!(error = %e, "Could not save settings");
        }
    }

    pub fn color(&self, key: &str) -> egui::Color32 {
        self.settings
            .speaker_colors
            .get(key)
            .map(|c| egui::Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]))
            .unwrap_or(egui::Color32::DARK_GRAY)
    }

    fn apply_response(&mut self, resp: EngineResponse) {
        match resp {
            EngineResponse::TurnStarted { prompt } => {
                let messages = &mut self.ui.rendered_messages;
                messages.push(ChatEntry::User(prompt));
                messages.push(ChatEntry::Narrator(String::new()));
                self.ui.live_reply = Some(messages.len() - 1);
            }

            EngineResponse::DisplayUpdate { text } => {
                self.fill_live_reply(text, false);
            }

            EngineResponse::TurnCompleted { display, .. } => {
                self.fill_live_reply(display, true);
            }

            EngineResponse::TurnFailed { partial, error } => {
                self.fill_live_reply(partial, true);
                self.ui
                    .rendered_messages
                    .push(ChatEntry::Error(format!("The narrator stopped: {error}")));
            }

            EngineResponse::SubmissionRejected { reason } => {
                self.ui.rendered_messages.push(ChatEntry::System(reason));
            }

            EngineResponse::ConnectionStatus(status) => {
                self.ui.connection_status = Some(match status {
                    Ok(s) => s,
                    Err(e) => format!("Connection failed: {e}"),
                });
            }

            EngineResponse::SessionReset { .. } => {
                self.ui.live_reply = None;
                self.ui.rendered_messages.clear();
                self.ui
                    .rendered_messages
                    .push(ChatEntry::System("A new adventure begins.".into()));
            }
        }

        self.ui.should_auto_scroll = true;
    }

    /// Full replace of the streaming narrator bubble.
    fn fill_live_reply(&mut self, text: String, finished: bool) {
        let slot = if finished {
            self.ui.live_reply.take()
        } else {
            self.ui.live_reply
        };

        if let Some(i) = slot {
            if let Some(entry) = self.ui.rendered_messages.get_mut(i) {
                *entry = ChatEntry::Narrator(text);
            }
        }
    }

    pub fn draw_message(&self, ui: &mut egui::Ui, msg: &ChatEntry) {
        let (bg, right, text) = match msg {
            ChatEntry::User(t) => (self.color("User"), true, format!("You: {t}")),
            ChatEntry::Narrator(t) if t.is_empty() => (self.color("Narrator"), false, "…".into()),
            ChatEntry::Narrator(t) => (self.color("Narrator"), false, t.clone()),
            ChatEntry::System(t) => (self.color("System"), false, t.clone()),
            ChatEntry::Error(t) => (self.color("Error"), false, t.clone()),
        };

        ui.add_space(6.0);

        if right {
            ui.with_layout(Layout::right_to_left(egui::Align::TOP), |ui| {
                bubble(ui, bg, &text);
            });
        } else {
            bubble(ui, bg, &text);
        }
    }
}

/* =========================
   egui App
   ========================= */

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        ctx.set_pixels_per_point(self.settings.ui_scale);

        while let Ok(resp) = self.resp_rx.try_recv() {
            self.apply_response(resp);
        }

        draw_right_panel(ctx, self);
        draw_center_panel(ctx, self);

        self.ui.should_auto_scroll = false;

        // Engine responses arrive from another thread.
        ctx.request_repaint_after(Duration::from_millis(50));
    }
}

/* =========================
   UI Helpers
   ========================= */

fn bubble(ui: &mut egui::Ui, color: egui::Color32, text: &str) {
    egui::Frame::new()
        .fill(color)
        .corner_radius(egui::CornerRadius::same(8))
        .inner_margin(egui::Margin::symmetric(10, 6))
        .show(ui, |ui| {
            ui.label(egui::RichText::new(text).color(egui::Color32::WHITE));
        });
}
