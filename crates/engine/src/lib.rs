pub mod app;
pub mod sprites;
pub mod world;

pub use app::{
    shared_state, ClickPoint, DrawStrategy, DrawSurface, Engine, EngineHandle, FramePlan,
    GameState, GameStateStack, InputAction, InputHandle, InputState, LoopConfig, LoopError,
    LoopStats, RedrawRequester, RegionId, SharedState, StatsHandle, SurfaceError, TickScheduler,
    UpdateMode, TICK_RATE_ENV_VAR,
};
pub use sprites::{TextureAtlas, TextureHandle, TextureRegion};
pub use world::{
    BoundingBox, BoundingBox2D, Direction, Entity, EntityId, QueuedAction, SpatialLocation, Tile,
    TileMap, TileProperties, TileTask, TileTaskError, Vitals, World, WorldRenderer,
};
