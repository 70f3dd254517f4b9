//! Detects the `[STATUS]...[/STATUS]` marker in a narrator reply and derives
//! the part of the reply that is safe to show to the player.
//!
//! The scanner always works on the full accumulated text, never on a single
//! fragment, so re-running it after every fragment cannot drift.

use std::ops::Range;

pub const START_SENTINEL: &str = "[STATUS]";
pub const END_SENTINEL: &str = "[/STATUS]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMarker {
    /// Byte range in the accumulated text, sentinels included.
    pub span: Range<usize>,

    /// Text between the two sentinels.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerState {
    Absent,
    /// Start sentinel seen while the stream is still open.
    Pending,
    Complete(RawMarker),
    /// The stream finished with a start sentinel but no end sentinel.
    Unterminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub display: String,
    pub marker: MarkerState,
}

/// Scans `text` from scratch.
///
/// With `complete == false` nothing from the start sentinel onwards is ever
/// displayed, and a trailing prefix of the start sentinel (`"[STA"`) is held
/// back until the next fragment shows whether it really opens a marker.
pub fn scan(text: &str, complete: bool) -> Scan {
    let start = text.find(START_SENTINEL);
    if complete {
        finish_scan(text, start)
    } else {
        live_scan(text, start)
    }
}

/// Incremental front-end to [`scan`].
///
/// Remembers how far the start sentinel search got, so feeding it a growing
/// buffer costs time proportional to the new text only. Output is identical
/// to [`scan`] for the same text.
#[derive(Debug, Clone, Default)]
pub struct MarkerScanner {
    searched: usize,
    start: Option<usize>,
}

impl MarkerScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, text: &str) -> Scan {
        self.locate(text);
        live_scan(text, self.start)
    }

    pub fn finish(&mut self, text: &str) -> Scan {
        self.locate(text);
        finish_scan(text, self.start)
    }

    fn locate(&mut self, text: &str) {
        if text.len() < self.searched {
            // Not a continuation of the previous buffer.
            *self = Self::default();
        }
        if self.start.is_some() {
            return;
        }

        // Back up far enough to catch a sentinel split across fragments.
        let mut from = self.searched.saturating_sub(START_SENTINEL.len() - 1);
        while !text.is_char_boundary(from) {
            from -= 1;
        }

        self.start = text[from..].find(START_SENTINEL).map(|at| from + at);
        self.searched = text.len();
    }
}

fn live_scan(text: &str, start: Option<usize>) -> Scan {
    match start {
        Some(at) => Scan {
            display: text[..at].trim().to_string(),
            marker: MarkerState::Pending,
        },
        None => {
            let cut = text.len() - partial_start_suffix(text);
            Scan {
                display: text[..cut].trim().to_string(),
                marker: MarkerState::Absent,
            }
        }
    }
}

fn finish_scan(text: &str, start: Option<usize>) -> Scan {
    let Some(at) = start else {
        return Scan {
            display: text.trim().to_string(),
            marker: MarkerState::Absent,
        };
    };

    let body_start = at + START_SENTINEL.len();
    let Some(body_len) = text[body_start..].find(END_SENTINEL) else {
        return Scan {
            display: text[..at].trim().to_string(),
            marker: MarkerState::Unterminated,
        };
    };

    let body_end = body_start + body_len;
    let end = body_end + END_SENTINEL.len();
    let outside = format!("{}{}", &text[..at], &text[end..]);

    Scan {
        display: outside.trim().to_string(),
        marker: MarkerState::Complete(RawMarker {
            span: at..end,
            body: text[body_start..body_end].to_string(),
        }),
    }
}

/// Length of the longest proper prefix of the start sentinel that `text`
/// ends with.
fn partial_start_suffix(text: &str) -> usize {
    (1..START_SENTINEL.len())
        .rev()
        .find(|&len| text.ends_with(&START_SENTINEL[..len]))
        .unwrap_or(0)
}
