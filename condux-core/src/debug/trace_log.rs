//! In-memory ring buffer of trace events

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// What a trace entry records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    /// A named action was invoked with these `Debug`-formatted arguments.
    Action { name: String, args: String },
    /// A snapshot was committed; JSON rendering of the state.
    State { json: String },
}

/// One recorded event.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    /// Monotonic sequence number, unique per log
    pub sequence: u64,
    /// When the event was recorded
    pub timestamp: Instant,
    pub kind: TraceKind,
}

impl TraceEntry {
    /// Action name, or `"state"` for state entries.
    pub fn label(&self) -> &str {
        match &self.kind {
            TraceKind::Action { name, .. } => name,
            TraceKind::State { .. } => "state",
        }
    }

    /// Time since the event was recorded.
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }

    /// Whether this is an action entry.
    pub fn is_action(&self) -> bool {
        matches!(self.kind, TraceKind::Action { .. })
    }
}

/// Bounded log of recent trace events; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct TraceLog {
    entries: VecDeque<TraceEntry>,
    capacity: usize,
    next_sequence: u64,
}

impl TraceLog {
    /// Create a log keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_sequence: 0,
        }
    }

    /// Record an event. Does nothing when capacity is zero.
    pub fn record(&mut self, kind: TraceKind) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(TraceEntry {
            sequence: self.next_sequence,
            timestamp: Instant::now(),
            kind,
        });
        self.next_sequence += 1;
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter()
    }

    /// The `count` most recent entries, newest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().rev().take(count)
    }

    /// Action entries only, oldest first.
    pub fn actions(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(|e| e.is_action())
    }

    /// State entries only, oldest first.
    pub fn states(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(|e| !e.is_action())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
