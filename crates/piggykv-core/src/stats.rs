//! Latency accounting for operations and raw command submissions.

use crate::frame::Opcode;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Client-level operations tracked separately from raw opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Value store.
    Put,
    /// Point lookup.
    Get,
    /// Point delete.
    Delete,
    /// Iterator creation.
    CreateIter,
    /// Iterator seek.
    Seek,
    /// Iterator advance.
    Next,
    /// Iterator destruction.
    DestroyIter,
}

impl OpKind {
    const ALL: [OpKind; 7] = [
        OpKind::Put,
        OpKind::Get,
        OpKind::Delete,
        OpKind::CreateIter,
        OpKind::Seek,
        OpKind::Next,
        OpKind::DestroyIter,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            OpKind::Put => "Put",
            OpKind::Get => "Get",
            OpKind::Delete => "Delete",
            OpKind::CreateIter => "CreateIter",
            OpKind::Seek => "Seek",
            OpKind::Next => "Next",
            OpKind::DestroyIter => "DestroyIter",
        }
    }
}

/// One latency accumulator slot.
#[derive(Default)]
struct Slot {
    count: AtomicU64,
    total_ns: AtomicU64,
}

impl Slot {
    fn record(&self, elapsed: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ns
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            count: self.count.load(Ordering::Relaxed),
            total_ns: self.total_ns.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of one accumulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencySnapshot {
    /// Number of recorded events.
    pub count: u64,
    /// Accumulated elapsed time in nanoseconds.
    pub total_ns: u64,
}

impl LatencySnapshot {
    /// Average latency in microseconds, 0.0 when nothing was recorded.
    #[must_use]
    pub fn avg_us(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_ns as f64 / 1000.0 / self.count as f64
    }
}

/// Cumulative latency counters for a client.
///
/// Operations and opcodes are tracked independently: one `Put` may fan
/// out into many frame submissions.
#[derive(Default)]
pub struct ClientStats {
    ops: [Slot; 7],
    opcodes: [Slot; 10],
    gets_for_seek: AtomicU64,
    gets_for_next: AtomicU64,
}

impl ClientStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed client-level operation.
    pub fn record_op(&self, op: OpKind, elapsed: Duration) {
        self.ops[op.index()].record(elapsed);
    }

    /// Record one completed frame submission.
    pub fn record_submit(&self, opcode: Opcode, elapsed: Duration) {
        self.opcodes[opcode.index()].record(elapsed);
    }

    /// Count a point lookup issued on behalf of `seek` probing.
    pub fn count_probe_for_seek(&self) {
        self.gets_for_seek.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a point lookup issued on behalf of `next` probing.
    pub fn count_probe_for_next(&self) {
        self.gets_for_next.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ops: OpKind::ALL
                .iter()
                .map(|op| (op.name(), self.ops[op.index()].snapshot()))
                .collect(),
            opcodes: Opcode::ALL
                .iter()
                .map(|op| (*op, self.opcodes[op.index()].snapshot()))
                .collect(),
            gets_for_seek: self.gets_for_seek.load(Ordering::Relaxed),
            gets_for_next: self.gets_for_next.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of all client counters.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Per-operation latency, by operation name.
    pub ops: Vec<(&'static str, LatencySnapshot)>,
    /// Per-opcode submission latency.
    pub opcodes: Vec<(Opcode, LatencySnapshot)>,
    /// Point lookups issued by seek probing.
    pub gets_for_seek: u64,
    /// Point lookups issued by next probing.
    pub gets_for_next: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, snap) in &self.ops {
            if snap.count == 0 {
                continue;
            }
            writeln!(
                f,
                "[{name}] {:.3} us / {} ops = avg {:.3} us",
                snap.total_ns as f64 / 1000.0,
                snap.count,
                snap.avg_us()
            )?;
        }
        for (opcode, snap) in &self.opcodes {
            if snap.count == 0 {
                continue;
            }
            writeln!(
                f,
                "[{opcode:?}] {:.3} us / {} frames = avg {:.3} us",
                snap.total_ns as f64 / 1000.0,
                snap.count,
                snap.avg_us()
            )?;
        }
        if self.gets_for_seek > 0 || self.gets_for_next > 0 {
            writeln!(
                f,
                "probing: {} gets for seek, {} gets for next",
                self.gets_for_seek, self.gets_for_next
            )?;
        }
        Ok(())
    }
}
