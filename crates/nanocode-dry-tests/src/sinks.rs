// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Capturing event hooks and in-memory writers.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use nanocode_core::{Event, EventHook};

/// Event hook that records every event; clones share one log.
///
/// Register a clone with the runtime and keep the original to inspect.
#[derive(Clone, Default, Debug)]
pub struct EventLog {
    inner: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every captured event.
    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Rule names in capture order.
    pub fn rules(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.rule).collect()
    }

    /// Number of captured events.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventHook for EventLog {
    fn on_event(&mut self, event: &Event) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

/// `Write` sink whose clones share one byte buffer.
#[derive(Clone, Default, Debug)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer contents as UTF-8 (lossy).
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().unwrap_or_else(|e| e.into_inner())).into_owned()
    }

    /// Non-empty lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_owned)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
