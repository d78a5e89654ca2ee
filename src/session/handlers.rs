//! The four lifecycle event handlers.
//!
//! Handler bodies are plain functions over an injected writer (and the
//! session control handle where needed) so the output contract is testable
//! without a live connection. Transcript output goes to stdout directly,
//! separate from diagnostic logging.

use std::io::Write;

use tracing::warn;

use crate::streaming::{BeginEvent, SessionControl, StreamingError, TerminationEvent, TurnEvent};

/// Output format: `Session started: <id>`
pub fn print_session_begin<W: Write>(out: &mut W, event: &BeginEvent) {
    writeln!(out, "Session started: {}", event.id).ok();
}

/// Output format: `<transcript> (True|False)` with the end-of-turn flag.
///
/// When a turn completes without formatting applied, sends a follow-up
/// request enabling formatted turns for the rest of the session. The service
/// may re-emit the unformatted condition, in which case the request is
/// re-sent; it is idempotent on the service side.
pub fn handle_turn<W: Write>(out: &mut W, control: &SessionControl, event: &TurnEvent) {
    writeln!(out, "{} ({})", event.transcript, flag_label(event.end_of_turn)).ok();

    if event.end_of_turn && !event.turn_is_formatted {
        if let Err(e) = control.set_turn_formatting(true) {
            warn!("Failed to request formatted turns: {}", e);
        }
    }
}

/// Output format: `Session terminated: <secs> seconds of audio processed`
pub fn print_session_termination<W: Write>(out: &mut W, event: &TerminationEvent) {
    writeln!(
        out,
        "Session terminated: {} seconds of audio processed",
        event.audio_duration_seconds
    )
    .ok();
}

/// Output format: `Error occurred: <message>`
///
/// Printing is the only local reaction; the service decides whether the
/// error ends the stream.
pub fn print_streaming_error<W: Write>(out: &mut W, error: &StreamingError) {
    writeln!(out, "Error occurred: {}", error).ok();
}

/// The end-of-turn flag prints capitalized; established output format of
/// this tool, kept for downstream consumers that match on it.
fn flag_label(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
