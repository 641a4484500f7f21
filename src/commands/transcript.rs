use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::transcript::service::TranscriptService;

/// Which view of a transcript to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptView {
    Events,
    Todos,
    Turns,
    Usage,
}

/// Print one view of a stored session as pretty JSON.
pub fn transcript<W: Write>(
    service: &TranscriptService,
    view: TranscriptView,
    provider: &str,
    session_id: &str,
    mut writer: W,
) -> Result<()> {
    let context = || format!("failed to read transcript for {provider}/{session_id}");
    match view {
        TranscriptView::Events => {
            let events = service
                .full_transcript(provider, session_id)
                .with_context(context)?;
            print_json(&mut writer, &events)
        }
        TranscriptView::Todos => {
            let todos = service
                .todo_list(provider, session_id)
                .with_context(context)?;
            print_json(&mut writer, &todos)
        }
        TranscriptView::Turns => {
            let turns = service.turns(provider, session_id).with_context(context)?;
            print_json(&mut writer, &turns)
        }
        TranscriptView::Usage => {
            let totals = service
                .usage_totals(provider, session_id)
                .with_context(context)?;
            print_json(&mut writer, &totals)
        }
    }
}

fn print_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    writeln!(writer, "{text}")?;
    writer.flush()?;
    Ok(())
}
