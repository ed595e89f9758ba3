use std::time::{Duration, Instant};

use tracing::warn;

/// Work due for one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    pub ticks: u32,
    pub draw: bool,
}

/// Accumulator-based tick bookkeeping, free of threads and clocks.
///
/// Elapsed time since the previous plan is converted into fractional ticks;
/// whole ticks are handed out and the remainder carries over. Every plan
/// includes exactly one draw.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    tick_interval: Duration,
    last_tick_instant: Instant,
    accumulated_error: f64,
    wait_time: Duration,
    next_ready: Option<Instant>,
    max_catch_up_ticks: Option<u32>,
}

impl TickScheduler {
    /// `tick_rate_hz` must already be sanitised to a non-zero value.
    pub fn new(tick_rate_hz: u32, start: Instant) -> Self {
        Self {
            tick_interval: Duration::from_nanos(1_000_000_000 / u64::from(tick_rate_hz.max(1))),
            last_tick_instant: start,
            accumulated_error: 0.0,
            wait_time: Duration::ZERO,
            next_ready: None,
            max_catch_up_ticks: None,
        }
    }

    /// Caps the ticks a single plan may hand out; any extra backlog is
    /// dropped with a warning.
    pub fn with_max_catch_up(mut self, max_ticks: Option<u32>) -> Self {
        self.max_catch_up_ticks = max_ticks.filter(|max| *max > 0);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    /// The first iteration is always ready. Later ones become ready once the
    /// wait budget from the previous iteration has elapsed.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.next_ready.map_or(true, |ready_at| now >= ready_at)
    }

    pub fn ready_at(&self) -> Option<Instant> {
        self.next_ready
    }

    pub fn plan(&mut self, now: Instant) -> FramePlan {
        let elapsed = now.saturating_duration_since(self.last_tick_instant);
        self.last_tick_instant = now;

        let interval_nanos = self.tick_interval.as_nanos().max(1) as f64;
        self.accumulated_error += elapsed.as_nanos() as f64 / interval_nanos;

        let mut ticks = 0u32;
        while self.accumulated_error >= 1.0 {
            if self
                .max_catch_up_ticks
                .is_some_and(|max_ticks| ticks >= max_ticks)
            {
                warn!(
                    ticks_run = ticks,
                    dropped_ticks = self.accumulated_error.floor() as u64,
                    "tick_backlog_dropped"
                );
                self.accumulated_error = self.accumulated_error.fract();
                break;
            }
            ticks = ticks.saturating_add(1);
            self.accumulated_error -= 1.0;
        }

        FramePlan { ticks, draw: true }
    }

    /// Records how long the iteration took and returns the wait budget
    /// before the next one, clamped to `[0, tick_interval]`.
    pub fn finish_iteration(&mut self, started: Instant, finished: Instant) -> Duration {
        let spent = finished.saturating_duration_since(started);
        self.wait_time = self.tick_interval.saturating_sub(spent);
        self.next_ready = Some(finished + self.wait_time);
        self.wait_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifty_hz_over_hundred_ms_yields_five_ticks_and_one_draw() {
        let base = Instant::now();
        let mut scheduler = TickScheduler::new(50, base);

        let plan = scheduler.plan(base + Duration::from_millis(100));
        assert_eq!(plan, FramePlan { ticks: 5, draw: true });
    }

    #[test]
    fn fractional_ticks_carry_over() {
        let base = Instant::now();
        let mut scheduler = TickScheduler::new(50, base);

        assert_eq!(scheduler.plan(base + Duration::from_millis(30)).ticks, 1);
        assert_eq!(scheduler.plan(base + Duration::from_millis(40)).ticks, 1);
        assert_eq!(scheduler.plan(base + Duration::from_millis(45)).ticks, 0);
        assert_eq!(scheduler.plan(base + Duration::from_millis(60)).ticks, 1);
    }

    #[test]
    fn iteration_without_elapsed_time_still_draws() {
        let base = Instant::now();
        let mut scheduler = TickScheduler::new(60, base);
        let plan = scheduler.plan(base);
        assert_eq!(plan, FramePlan { ticks: 0, draw: true });
    }

    #[test]
    fn first_iteration_is_ready_then_waits_for_budget() {
        let base = Instant::now();
        let mut scheduler = TickScheduler::new(50, base);
        assert!(scheduler.is_ready(base));

        scheduler.plan(base);
        let wait = scheduler.finish_iteration(base, base + Duration::from_millis(5));
        assert_eq!(wait, Duration::from_millis(15));
        assert!(!scheduler.is_ready(base + Duration::from_millis(19)));
        assert!(scheduler.is_ready(base + Duration::from_millis(20)));
    }

    #[test]
    fn wait_budget_is_clamped_to_zero_for_slow_iterations() {
        let base = Instant::now();
        let mut scheduler = TickScheduler::new(100, base);
        let wait = scheduler.finish_iteration(base, base + Duration::from_millis(50));
        assert_eq!(wait, Duration::ZERO);
        assert_eq!(scheduler.wait_time(), Duration::ZERO);
        assert!(wait <= scheduler.tick_interval());
    }

    #[test]
    fn catch_up_cap_drops_backlog() {
        let base = Instant::now();
        let mut scheduler = TickScheduler::new(100, base).with_max_catch_up(Some(3));
        assert_eq!(scheduler.plan(base + Duration::from_millis(105)).ticks, 3);
        // The half tick left over survives the drop.
        assert_eq!(scheduler.plan(base + Duration::from_millis(110)).ticks, 1);
    }

    #[test]
    fn uncapped_scheduler_runs_whole_backlog() {
        let base = Instant::now();
        let mut scheduler = TickScheduler::new(100, base);
        assert_eq!(scheduler.plan(base + Duration::from_secs(1)).ticks, 100);
    }
}
