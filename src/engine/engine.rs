use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::engine::llm_client::LmStudioClient;
use crate::engine::protocol::{EngineCommand, EngineResponse};
use crate::engine::state_store::GameStateStore;
use crate::engine::turn_controller::TurnController;
use crate::model::game_state::GameState;
use crate::model::turn::TurnPhase;
use crate::settings::Settings;

pub struct Engine {
    rx: mpsc::UnboundedReceiver<EngineCommand>,
    tx: mpsc::UnboundedSender<EngineResponse>,
    controller: Arc<TurnController>,
}

impl Engine {
    pub fn new(
        rx: mpsc::UnboundedReceiver<EngineCommand>,
        tx: mpsc::UnboundedSender<EngineResponse>,
        controller: Arc<TurnController>,
    ) -> Self {
        Self { rx, tx, controller }
    }

    /// Processes commands until every command sender is dropped.
    ///
    /// Turns run as separate tasks so this loop stays responsive; a prompt
    /// that arrives mid-turn is rejected by the controller's busy gate.
    pub async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                EngineCommand::SubmitPrompt(text) => {
                    let controller = self.controller.clone();
                    tokio::spawn(async move {
                        if let Err(e) = controller.submit(&text).await {
                            debug!(error = %e, "Turn ended without completing");
                        }
                    });
                }

                EngineCommand::TestConnection => {
                    let controller = self.controller.clone();
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let status = controller.check_connection().await.map_err(|e| e.to_string());
                        let _ = tx.send(EngineResponse::ConnectionStatus(status));
                    });
                }

                EngineCommand::NewSession => {
                    if let Err(e) = self.controller.reset_session() {
                        let _ = self.tx.send(EngineResponse::SubmissionRejected {
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        debug!("Engine command channel closed");
    }
}

/// Everything the front-end needs to talk to a running engine.
pub struct EngineHandle {
    pub commands: mpsc::UnboundedSender<EngineCommand>,
    pub responses: mpsc::UnboundedReceiver<EngineResponse>,
    pub state: watch::Receiver<GameState>,
    pub phase: watch::Receiver<TurnPhase>,
}

/// Starts the engine on its own thread with a single-threaded runtime.
pub fn spawn_engine(settings: &Settings) -> EngineHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (resp_tx, resp_rx) = mpsc::unbounded_channel();

    let store = GameStateStore::new(GameState::with_health(settings.initial_health));
    let client = Arc::new(LmStudioClient::new(settings.llm.clone()));
    let controller = Arc::new(
        TurnController::new(client, store.clone(), resp_tx.clone())
            .with_history_limit(settings.history_limit),
    );

    let handle = EngineHandle {
        commands: cmd_tx,
        responses: resp_rx,
        state: store.subscribe(),
        phase: controller.watch_phase(),
    };

    info!(base_url = %settings.llm.base_url, model = %settings.llm.model, "Starting engine");

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Failed to start engine runtime");
                return;
            }
        };

        runtime.block_on(Engine::new(cmd_rx, resp_tx, controller).run());
    });

    handle
}
