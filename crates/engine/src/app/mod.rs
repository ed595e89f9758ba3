mod input;
mod loop_runner;
mod metrics;
mod scheduler;
mod state;
mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use input::{ClickPoint, InputAction, InputHandle, InputState, RegionId};
pub use loop_runner::{
    DrawStrategy, Engine, EngineHandle, LoopConfig, LoopError, UpdateMode, TICK_RATE_ENV_VAR,
};
pub use metrics::{LoopStats, StatsHandle};
pub use scheduler::{FramePlan, TickScheduler};
pub use state::{shared_state, GameState, GameStateStack, SharedState};
pub use surface::{DrawSurface, RedrawRequester, SurfaceError};
