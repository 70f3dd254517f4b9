mod common;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use story_sync::engine::engine::Engine;
use story_sync::engine::protocol::{EngineCommand, EngineResponse};
use story_sync::model::game_state::GameState;

use common::{controller, ScriptedSource};

async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<EngineResponse>, mut pred: F) -> EngineResponse
where
    F: FnMut(&EngineResponse) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("engine stopped");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for engine response")
}

#[tokio::test]
async fn engine_runs_turns_connection_checks_and_resets() {
    let (controller, mut responses) = controller(ScriptedSource::text(&[
        "Gold glitters.\n[STATUS]HEALTH:90,INVENTORY:gold coin[/STATUS]",
    ]));
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel();

    let engine = tokio::spawn(Engine::new(cmd_rx, status_tx, controller.clone()).run());

    cmd_tx
        .send(EngineCommand::SubmitPrompt("grab the gold".into()))
        .unwrap();
    let done = wait_for(&mut responses, |e| {
        matches!(e, EngineResponse::TurnCompleted { .. })
    })
    .await;
    assert_eq!(
        done,
        EngineResponse::TurnCompleted {
            display: "Gold glitters.".into(),
            state: GameState {
                health: 90,
                inventory: vec!["gold coin".into()],
            },
            committed: true,
        }
    );

    cmd_tx.send(EngineCommand::TestConnection).unwrap();
    let status = wait_for(&mut status_rx, |e| {
        matches!(e, EngineResponse::ConnectionStatus(_))
    })
    .await;
    assert_eq!(status, EngineResponse::ConnectionStatus(Ok("Ready".into())));

    cmd_tx.send(EngineCommand::NewSession).unwrap();
    let reset = wait_for(&mut responses, |e| {
        matches!(e, EngineResponse::SessionReset { .. })
    })
    .await;
    assert_eq!(
        reset,
        EngineResponse::SessionReset {
            state: GameState::default()
        }
    );
    assert!(controller.history().is_empty());

    drop(cmd_tx);
    engine.await.unwrap();
}
