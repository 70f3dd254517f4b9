use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Submitting,
    Streaming,
    Finalizing,
    Failed,
}

impl TurnPhase {
    pub fn is_idle(self) -> bool {
        self == TurnPhase::Idle
    }

    pub fn label(self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Submitting => "submitting",
            TurnPhase::Streaming => "streaming",
            TurnPhase::Finalizing => "finalizing",
            TurnPhase::Failed => "failed",
        }
    }
}

/// One prompt/reply cycle, owned by the turn controller.
#[derive(Debug, Clone)]
pub struct Turn {
    pub prompt: String,

    /// Everything received so far. Only ever grows.
    pub accumulated_text: String,

    /// Last safe display string published for this turn.
    pub display_text: String,

    pub is_complete: bool,
}

impl Turn {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            accumulated_text: String::new(),
            display_text: String::new(),
            is_complete: false,
        }
    }

    pub fn push_fragment(&mut self, fragment: &str) {
        self.accumulated_text.push_str(fragment);
    }

    /// Records a newly derived display string. Returns `false` when it is the
    /// same as what was already published.
    pub fn update_display(&mut self, display: String) -> bool {
        if self.display_text == display {
            return false;
        }
        self.display_text = display;
        true
    }
}
