//! Collaborator sinks for engine intents. The engine only emits intents;
//! whatever plays sounds or writes interpretations lives behind this trait.

use anyhow::Result;
use log::{debug, error, info};
use std::io::Write;

use crate::deck;
use crate::machine::Intent;

pub trait IntentSink {
    fn deliver(&mut self, intent: &Intent) -> Result<()>;
}

/// Hands intents to the collaborator in emission order. A failing sink never
/// stalls the frame loop or a replay.
pub fn dispatch_intents(intents: &[Intent], sink: &mut dyn IntentSink) {
    for intent in intents {
        debug!("dispatch {intent:?}");
        if let Err(e) = sink.deliver(intent) {
            error!("intent delivery failed for {intent:?}: {e}");
        }
    }
}

/// Logs intents; the default when no collaborator is attached.
#[derive(Debug, Default)]
pub struct LogSink;

impl IntentSink for LogSink {
    fn deliver(&mut self, intent: &Intent) -> Result<()> {
        match intent {
            Intent::BeginInterpretation { card_id } => {
                let name = deck::card_at(*card_id).map_or("?", |c| c.name);
                info!("intent: begin interpretation of {name} (#{card_id})");
            }
            other => info!("intent: {other:?}"),
        }
        Ok(())
    }
}

/// Writes each intent as one JSON line, for piping into a sound or text
/// collaborator process.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> IntentSink for JsonLinesSink<W> {
    fn deliver(&mut self, intent: &Intent) -> Result<()> {
        let line = serde_json::to_string(intent)?;
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}
