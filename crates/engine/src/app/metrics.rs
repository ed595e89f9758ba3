use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static STATS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_stats_lock_poison_once(operation: &'static str) {
    if STATS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "stats lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopStats {
    pub fps: f32,
    pub tps: f32,
    pub iteration_time_ms: f32,
    pub max_ticks_per_iteration: u32,
}

/// Latest [`LoopStats`] published by the scheduling thread.
#[derive(Clone, Debug)]
pub struct StatsHandle {
    snapshot: Arc<RwLock<LoopStats>>,
}

impl Default for StatsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopStats::default())),
        }
    }
}

impl StatsHandle {
    pub fn snapshot(&self) -> LoopStats {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_stats_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, stats: LoopStats) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = stats,
            Err(poisoned) => {
                warn_stats_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = stats;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct StatsAccumulator {
    interval_start: Instant,
    interval: Duration,
    draws: u32,
    ticks: u32,
    iterations: u32,
    max_ticks_per_iteration: u32,
    iteration_time_sum: Duration,
}

impl StatsAccumulator {
    pub(crate) fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval_start: start,
            interval,
            draws: 0,
            ticks: 0,
            iterations: 0,
            max_ticks_per_iteration: 0,
            iteration_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_iteration(&mut self, ticks: u32, drew: bool, spent: Duration) {
        self.iterations = self.iterations.saturating_add(1);
        self.ticks = self.ticks.saturating_add(ticks);
        self.max_ticks_per_iteration = self.max_ticks_per_iteration.max(ticks);
        if drew {
            self.draws = self.draws.saturating_add(1);
        }
        self.iteration_time_sum = self.iteration_time_sum.saturating_add(spent);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopStats> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let iteration_time_ms = if self.iterations == 0 {
            0.0
        } else {
            (self.iteration_time_sum.as_secs_f32() / self.iterations as f32) * 1000.0
        };

        let stats = LoopStats {
            fps: self.draws as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            iteration_time_ms,
            max_ticks_per_iteration: self.max_ticks_per_iteration,
        };

        self.interval_start = now;
        self.draws = 0;
        self.ticks = 0;
        self.iterations = 0;
        self.max_ticks_per_iteration = 0;
        self.iteration_time_sum = Duration::ZERO;

        Some(stats)
    }
}
