use crate::engine::marker_scanner::{END_SENTINEL, START_SENTINEL};
use crate::model::game_state::GameState;
use crate::model::message::{ChatMessage, Message};

/// Builds the message list sent to the narrator.
/// This struct only formats text: no parsing, no networking.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(
        state: &GameState,
        history: &[Message],
        history_limit: usize,
        player_input: &str,
    ) -> Vec<ChatMessage> {
        let mut system = String::new();
        push_system_prompt(&mut system);
        push_current_state(&mut system, state);

        let recent = &history[history.len().saturating_sub(history_limit)..];

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(recent.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(player_input.trim()));
        messages
    }
}

fn push_system_prompt(prompt: &mut String) {
    prompt.push_str(
        "You are the narrator of a text adventure game.\n\n\
Rules:\n\
- Describe what happens in response to the player's action in a few vivid paragraphs.\n\
- Never act or speak for the player character.\n\
- You decide the consequences of actions, including damage, healing and items gained or lost.\n\n\
Output Format:\n",
    );

    prompt.push_str(&format!(
        "- End EVERY reply with exactly one status line:\n  \
{START_SENTINEL}HEALTH:<number>,INVENTORY:<item>,<item>{END_SENTINEL}\n\
- HEALTH is a whole number from 0 upwards.\n\
- INVENTORY is the full comma-separated list of items the player carries, or nothing if empty:\n  \
{START_SENTINEL}HEALTH:100,INVENTORY:{END_SENTINEL}\n\
- Do not write anything after the status line.\n\n"
    ));
}

fn push_current_state(prompt: &mut String, state: &GameState) {
    prompt.push_str("CURRENT STATUS:\n");
    prompt.push_str(START_SENTINEL);
    prompt.push_str(&state.to_marker_fields());
    prompt.push_str(END_SENTINEL);
    prompt.push('\n');
}
