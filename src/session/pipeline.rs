use std::io::Write;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::enricher::Enricher;
use super::log::SessionLog;
use super::state::SessionIdentity;
use crate::display::renderer::Renderer;
use crate::error::SessionError;
use crate::protocol::parse::{Record, classify_line};
use crate::protocol::types::ThreadEvent;

/// Per-session stdout handling: enrich, log, then render.
///
/// Owns every piece of mutable session state, so nothing here needs locking.
pub struct Pipeline<W: Write> {
    enricher: Enricher,
    log: SessionLog,
    renderer: Renderer<W>,
    identity: SessionIdentity,
}

impl<W: Write> Pipeline<W> {
    pub fn new(
        enricher: Enricher,
        log: SessionLog,
        renderer: Renderer<W>,
        identity: SessionIdentity,
    ) -> Self {
        Self {
            enricher,
            log,
            renderer,
            identity,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Log and render the synthetic `thread.request`, if there is one.
    /// Must run before the first line from the agent.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        let Some(event) = self.enricher.request_event() else {
            return Ok(());
        };
        let line = encode(&event).unwrap_or_default();
        self.handle_record(Record::Event {
            line,
            object: event,
        })
    }

    /// Handle one complete stdout line.
    pub fn handle_line(&mut self, line: &str) -> Result<(), SessionError> {
        match classify_line(line) {
            Some(record) => self.handle_record(record),
            None => Ok(()),
        }
    }

    pub fn handle_record(&mut self, record: Record) -> Result<(), SessionError> {
        match record {
            Record::Raw(text) => {
                debug!(line = %text, "passing through non-JSON output");
                self.log.append(&text)?;
                self.renderer.render_raw(&text);
            }
            Record::Event { line, mut object } => {
                let line = if self.enricher.enrich(&mut object) {
                    encode(&object).unwrap_or(line)
                } else {
                    line
                };
                self.log.append(&line)?;

                let event = ThreadEvent::from_object(&object);
                if let ThreadEvent::ThreadStarted(started) | ThreadEvent::ThreadResumed(started) =
                    &event
                    && let Some(id) = started.thread_id.as_deref()
                    && self.identity.discover(id)
                {
                    info!(thread_id = id, "agent reported session id");
                }
                self.renderer.render_event(&event);
            }
        }
        Ok(())
    }

    /// Tear down into the pieces needed to finish the session.
    pub fn into_parts(self) -> (SessionIdentity, SessionLog, Renderer<W>) {
        (self.identity, self.log, self.renderer)
    }
}

fn encode(object: &Map<String, Value>) -> Option<String> {
    serde_json::to_string(object).ok()
}
