//! Run counters shared by all actors.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the actors while the simulation runs.
#[derive(Debug, Default)]
pub struct Statistics {
    requests_sent: AtomicU64,
    acks_received: AtomicU64,
    acks_sent: AtomicU64,
    hits: AtomicU64,
    write_hits: AtomicU64,
    misses: AtomicU64,
    page_ins: AtomicU64,
    sweeps: AtomicU64,
    frames_reclaimed: AtomicU64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::SeqCst);
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        bump(&self.requests_sent, 1);
    }

    pub fn record_ack_received(&self) {
        bump(&self.acks_received, 1);
    }

    pub fn record_ack_sent(&self) {
        bump(&self.acks_sent, 1);
    }

    pub fn record_hit(&self, write: bool) {
        bump(&self.hits, 1);
        if write {
            bump(&self.write_hits, 1);
        }
    }

    pub fn record_miss(&self) {
        bump(&self.misses, 1);
    }

    pub fn record_page_in(&self) {
        bump(&self.page_ins, 1);
    }

    pub fn record_sweep(&self, reclaimed: u64) {
        bump(&self.frames_reclaimed, reclaimed);
        bump(&self.sweeps, 1);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::SeqCst);
        StatisticsSnapshot {
            requests_sent: load(&self.requests_sent),
            acks_received: load(&self.acks_received),
            acks_sent: load(&self.acks_sent),
            hits: load(&self.hits),
            write_hits: load(&self.write_hits),
            misses: load(&self.misses),
            page_ins: load(&self.page_ins),
            sweeps: load(&self.sweeps),
            frames_reclaimed: load(&self.frames_reclaimed),
        }
    }
}

/// Plain copy of [`Statistics`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub requests_sent: u64,
    pub acks_received: u64,
    pub acks_sent: u64,
    pub hits: u64,
    pub write_hits: u64,
    pub misses: u64,
    pub page_ins: u64,
    pub sweeps: u64,
    pub frames_reclaimed: u64,
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "requests sent:    {}", self.requests_sent)?;
        writeln!(f, "acks received:    {}", self.acks_received)?;
        writeln!(
            f,
            "hits:             {} ({} writes)",
            self.hits, self.write_hits
        )?;
        writeln!(f, "misses:           {}", self.misses)?;
        writeln!(f, "page-ins:         {}", self.page_ins)?;
        write!(
            f,
            "eviction sweeps:  {} ({} frames reclaimed)",
            self.sweeps, self.frames_reclaimed
        )
    }
}
