use std::env;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use super::metrics::StatsAccumulator;
use super::scheduler::TickScheduler;
use super::{DrawSurface, GameStateStack, RedrawRequester, StatsHandle, SurfaceError};

pub const TICK_RATE_ENV_VAR: &str = "TILESTEP_TICK_RATE";

const DEFAULT_TICK_RATE_HZ: u32 = 60;
const DEFAULT_STATS_INTERVAL_MS: u64 = 1000;
const DEFAULT_UPDATE_INTERVAL_MS: u64 = 500;

/// How the scheduling thread paces iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UpdateMode {
    /// Back to back, sleeping only for the wait budget.
    Constant,
    /// One iteration per [`EngineHandle::ready_for_update`] signal.
    Manual,
    /// A fixed pause between iterations.
    Interval { millis: u64 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub tick_rate_hz: u32,
    pub update_mode: UpdateMode,
    pub stats_interval_ms: u64,
    pub max_catch_up_ticks: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            update_mode: UpdateMode::Constant,
            stats_interval_ms: DEFAULT_STATS_INTERVAL_MS,
            max_catch_up_ticks: None,
        }
    }
}

impl LoopConfig {
    /// Replaces zero or invalid values with defaults, warning for each, and
    /// applies the tick-rate env override.
    pub fn sanitized(self) -> Self {
        let tick_rate_hz = normalize_tick_rate(resolve_tick_rate(self.tick_rate_hz));

        let update_mode = match self.update_mode {
            UpdateMode::Interval { millis: 0 } => {
                warn!(
                    fallback_ms = DEFAULT_UPDATE_INTERVAL_MS,
                    "zero update interval; falling back to default"
                );
                UpdateMode::Interval {
                    millis: DEFAULT_UPDATE_INTERVAL_MS,
                }
            }
            other => other,
        };

        let stats_interval_ms = if self.stats_interval_ms == 0 {
            warn!(
                fallback_ms = DEFAULT_STATS_INTERVAL_MS,
                "zero stats interval; falling back to default"
            );
            DEFAULT_STATS_INTERVAL_MS
        } else {
            self.stats_interval_ms
        };

        Self {
            tick_rate_hz,
            update_mode,
            stats_interval_ms,
            max_catch_up_ticks: self.max_catch_up_ticks.filter(|max| *max > 0),
        }
    }
}

/// Where the once-per-iteration draw happens.
pub enum DrawStrategy {
    /// The scheduling thread draws into a surface it owns.
    Direct(Box<dyn DrawSurface + Send>),
    /// The scheduling thread asks the host to call [`Engine::draw_frame`].
    HostRedraw(Box<dyn RedrawRequester>),
}

impl DrawStrategy {
    fn label(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::HostRedraw(_) => "host_redraw",
        }
    }
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("loop is already running")]
    AlreadyRunning,
    #[error("loop is not running")]
    NotRunning,
    #[error("failed to spawn scheduling thread: {0}")]
    SpawnScheduler(#[source] io::Error),
    #[error("scheduling thread panicked")]
    SchedulerPanicked,
}

#[derive(Debug, Default)]
struct SignalState {
    pending_updates: u64,
    stopping: bool,
}

/// Wakes the scheduling thread for manual updates and for shutdown.
#[derive(Debug, Default)]
struct LoopSignal {
    state: Mutex<SignalState>,
    wake: Condvar,
}

impl LoopSignal {
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn reset(&self) {
        *self.lock() = SignalState::default();
    }

    fn notify_update(&self) {
        self.lock().pending_updates += 1;
        self.wake.notify_all();
    }

    fn notify_stop(&self) {
        self.lock().stopping = true;
        self.wake.notify_all();
    }

    /// Consumes one update signal. Returns false once stopping.
    fn wait_for_update(&self) -> bool {
        let mut guard = self.lock();
        loop {
            if guard.stopping {
                return false;
            }
            if guard.pending_updates > 0 {
                guard.pending_updates -= 1;
                return true;
            }
            guard = match self.wake.wait(guard) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Sleeps for `duration` unless stop is requested first.
    fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let guard = self.lock();
        let _ = self
            .wake
            .wait_timeout_while(guard, duration, |state| !state.stopping);
    }
}

/// Cloneable control surface for code that does not own the [`Engine`].
#[derive(Clone, Debug)]
pub struct EngineHandle {
    running: Arc<AtomicBool>,
    signal: Arc<LoopSignal>,
    stats: StatsHandle,
}

impl EngineHandle {
    /// Allows one iteration in [`UpdateMode::Manual`]. Ignored by other modes.
    pub fn ready_for_update(&self) {
        self.signal.notify_update();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Asks the loop to stop at the next iteration boundary without joining.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.signal.notify_stop();
    }

    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }
}

/// Owns the scheduling thread that ticks and draws a [`GameStateStack`].
pub struct Engine {
    config: LoopConfig,
    states: Arc<Mutex<GameStateStack>>,
    running: Arc<AtomicBool>,
    signal: Arc<LoopSignal>,
    stats: StatsHandle,
    scheduler_thread: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new(config: LoopConfig, states: Arc<Mutex<GameStateStack>>) -> Self {
        Self {
            config,
            states,
            running: Arc::new(AtomicBool::new(false)),
            signal: Arc::new(LoopSignal::default()),
            stats: StatsHandle::default(),
            scheduler_thread: None,
        }
    }

    pub fn states(&self) -> &Arc<Mutex<GameStateStack>> {
        &self.states
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            running: Arc::clone(&self.running),
            signal: Arc::clone(&self.signal),
            stats: self.stats.clone(),
        }
    }

    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self
                .scheduler_thread
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(&mut self, strategy: DrawStrategy) -> Result<(), LoopError> {
        if self.scheduler_thread.is_some() {
            return Err(LoopError::AlreadyRunning);
        }

        let config = self.config.clone().sanitized();
        info!(
            tick_rate_hz = config.tick_rate_hz,
            update_mode = ?config.update_mode,
            draw_strategy = strategy.label(),
            stats_interval_ms = config.stats_interval_ms,
            max_catch_up_ticks = ?config.max_catch_up_ticks,
            "loop_config"
        );

        self.signal.reset();
        self.running.store(true, Ordering::Release);

        let worker = SchedulerWorker {
            config,
            strategy,
            states: Arc::clone(&self.states),
            running: Arc::clone(&self.running),
            signal: Arc::clone(&self.signal),
            stats: self.stats.clone(),
        };
        let spawned = thread::Builder::new()
            .name("tilestep-scheduler".to_string())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                self.scheduler_thread = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                Err(LoopError::SpawnScheduler(err))
            }
        }
    }

    /// Clears the running flag and joins the scheduling thread. An iteration
    /// in progress finishes first.
    pub fn stop(&mut self) -> Result<(), LoopError> {
        let handle = self.scheduler_thread.take().ok_or(LoopError::NotRunning)?;
        self.running.store(false, Ordering::Release);
        self.signal.notify_stop();
        match handle.join() {
            Ok(()) => {
                info!("loop_stopped");
                Ok(())
            }
            Err(_) => {
                error!("scheduler_thread_panicked");
                Err(LoopError::SchedulerPanicked)
            }
        }
    }

    /// One full frame on the caller's thread: clear, draw every state, present.
    pub fn draw_frame(&self, surface: &mut dyn DrawSurface) -> Result<(), SurfaceError> {
        let states = lock_stack(&self.states);
        draw_states(&states, surface)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.scheduler_thread.is_some() {
            if let Err(err) = self.stop() {
                warn!(error = %err, "loop_stop_on_drop_failed");
            }
        }
    }
}

struct SchedulerWorker {
    config: LoopConfig,
    strategy: DrawStrategy,
    states: Arc<Mutex<GameStateStack>>,
    running: Arc<AtomicBool>,
    signal: Arc<LoopSignal>,
    stats: StatsHandle,
}

impl SchedulerWorker {
    fn run(mut self) {
        let start = Instant::now();
        let mut scheduler = TickScheduler::new(self.config.tick_rate_hz, start)
            .with_max_catch_up(self.config.max_catch_up_ticks);
        let mut stats =
            StatsAccumulator::new(Duration::from_millis(self.config.stats_interval_ms), start);

        while self.running.load(Ordering::Acquire) {
            if self.config.update_mode == UpdateMode::Manual && !self.signal.wait_for_update() {
                break;
            }
            if let Some(ready_at) = scheduler.ready_at() {
                self.signal
                    .pause(ready_at.saturating_duration_since(Instant::now()));
            }
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            let iteration_start = Instant::now();
            let plan = scheduler.plan(iteration_start);
            {
                let states = lock_stack(&self.states);
                for _ in 0..plan.ticks {
                    states.tick();
                }
                if plan.draw {
                    match &mut self.strategy {
                        DrawStrategy::Direct(surface) => {
                            if let Err(err) = draw_states(&states, surface.as_mut()) {
                                warn!(error = %err, "surface_present_failed");
                            }
                        }
                        DrawStrategy::HostRedraw(requester) => requester.request_redraw(),
                    }
                }
            }
            let iteration_end = Instant::now();
            scheduler.finish_iteration(iteration_start, iteration_end);

            stats.record_iteration(
                plan.ticks,
                plan.draw,
                iteration_end.saturating_duration_since(iteration_start),
            );
            if let Some(snapshot) = stats.maybe_snapshot(iteration_end) {
                self.stats.publish(snapshot);
                info!(
                    fps = snapshot.fps,
                    tps = snapshot.tps,
                    iteration_time_ms = snapshot.iteration_time_ms,
                    max_ticks_per_iteration = snapshot.max_ticks_per_iteration,
                    "loop_stats"
                );
            }

            if let UpdateMode::Interval { millis } = self.config.update_mode {
                self.signal.pause(Duration::from_millis(millis));
            }
        }
    }
}

static STACK_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn lock_stack(states: &Mutex<GameStateStack>) -> MutexGuard<'_, GameStateStack> {
    match states.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            if STACK_LOCK_POISON_WARNED
                .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                warn!("state stack lock poisoned; recovered inner value");
            }
            poisoned.into_inner()
        }
    }
}

fn draw_states(
    states: &GameStateStack,
    surface: &mut dyn DrawSurface,
) -> Result<(), SurfaceError> {
    let region = surface.full_region();
    surface.clear(region);
    states.draw(surface);
    surface.present()
}

fn normalize_tick_rate(tick_rate_hz: u32) -> u32 {
    if tick_rate_hz == 0 {
        warn!(
            fallback_hz = DEFAULT_TICK_RATE_HZ,
            "zero tick rate; falling back to default"
        );
        DEFAULT_TICK_RATE_HZ
    } else {
        tick_rate_hz
    }
}

fn resolve_tick_rate(config_tick_rate_hz: u32) -> u32 {
    match env::var(TICK_RATE_ENV_VAR) {
        Ok(value) => parse_tick_rate(&value).unwrap_or_else(|| {
            warn!(
                env_var = TICK_RATE_ENV_VAR,
                value = value.as_str(),
                "invalid tick-rate env var value; falling back to config"
            );
            config_tick_rate_hz
        }),
        Err(env::VarError::NotPresent) => config_tick_rate_hz,
        Err(err) => {
            warn!(
                env_var = TICK_RATE_ENV_VAR,
                error = %err,
                "unable to read tick-rate env var; falling back to config"
            );
            config_tick_rate_hz
        }
    }
}

fn parse_tick_rate(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|rate| *rate > 0)
}
