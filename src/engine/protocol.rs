use crate::model::game_state::GameState;

pub enum EngineCommand {
    SubmitPrompt(String),
    TestConnection,
    NewSession,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineResponse {
    TurnStarted {
        prompt: String,
    },

    /// Safe display string for the reply in progress. Replaces the previous one.
    DisplayUpdate {
        text: String,
    },

    TurnCompleted {
        display: String,
        state: GameState,
        committed: bool,
    },

    /// The transport failed. `partial` is what had been displayed so far.
    TurnFailed {
        partial: String,
        error: String,
    },

    SubmissionRejected {
        reason: String,
    },

    ConnectionStatus(Result<String, String>),

    SessionReset {
        state: GameState,
    },
}
