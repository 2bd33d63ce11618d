// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Event observers and the line-delimited JSON trace sink.
use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ident::TermId;
use crate::runtime::Event;
use crate::term::Term;

/// Observer invoked once per applied rewrite, in emission order.
///
/// Closures taking `&Event` implement this trait.
pub trait EventHook {
    /// Called after the event is appended to the runtime log.
    fn on_event(&mut self, event: &Event);
}

impl<F> EventHook for F
where
    F: FnMut(&Event),
{
    fn on_event(&mut self, event: &Event) {
        self(event);
    }
}

/// Serializable form of an [`Event`]; one JSONL line per record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Id of the rewritten term.
    pub before: TermId,
    /// Id of the produced term.
    pub after: TermId,
    /// Rule that fired.
    pub rule: String,
    /// Scale of the rewritten term.
    pub scale: u32,
    /// Full rewritten term.
    pub before_term: Term,
    /// Full produced term.
    pub after_term: Term,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        Self {
            before: event.before,
            after: event.after,
            rule: event.rule.clone(),
            scale: event.scale,
            before_term: event.before_term.clone(),
            after_term: event.after_term.clone(),
        }
    }
}

/// Converts an event stream into serializable records.
pub fn dump_events<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<EventRecord> {
    events.into_iter().map(EventRecord::from).collect()
}

/// Parses a JSONL trace back into records; blank lines are skipped.
pub fn read_trace(reader: impl BufRead) -> io::Result<Vec<EventRecord>> {
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line).map_err(io::Error::other)?);
    }
    Ok(out)
}

/// Writes each event as one JSON line and flushes.
///
/// Sink failures never abort a step: they are logged and counted.
#[derive(Debug)]
pub struct JsonlTracer<W: Write> {
    sink: W,
    written: usize,
    errors: usize,
}

impl<W: Write> JsonlTracer<W> {
    /// Wraps `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            written: 0,
            errors: 0,
        }
    }

    /// Records written successfully.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Records that failed to write.
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Borrow of the sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Unwraps the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn write_record(&mut self, record: &EventRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.sink, record).map_err(io::Error::other)?;
        self.sink.write_all(b"\n")?;
        self.sink.flush()
    }
}

impl<W: Write> EventHook for JsonlTracer<W> {
    fn on_event(&mut self, event: &Event) {
        match self.write_record(&EventRecord::from(event)) {
            Ok(()) => self.written += 1,
            Err(err) => {
                self.errors += 1;
                warn!(rule = %event.rule, error = %err, "trace sink write failed");
            }
        }
    }
}
