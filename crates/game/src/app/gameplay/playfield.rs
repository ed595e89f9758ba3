use tilestep::{
    BoundingBox2D, Direction, DrawSurface, Entity, EntityId, GameState, InputAction, InputHandle,
    TileMap, TileTask, Vitals, World,
};
use tracing::{debug, info, warn};

use super::{lock_hud, SharedHud};
use crate::app::textures::{ActorTextures, TerrainTiles, TILE_PX};

pub(crate) const MAP_COLUMNS: u32 = 40;
pub(crate) const MAP_ROWS: u32 = 30;
pub(crate) const PLAYER_ID: EntityId = EntityId(1);
pub(crate) const PLAYER_SPAWN: (f64, f64) = (48.0, 48.0);
pub(crate) const PLAYER_MAX_HEALTH: f32 = 100.0;
pub(crate) const SLIME_HEALTH: f32 = 30.0;
pub(crate) const SLIME_CONTACT_DAMAGE: f32 = 10.0;
pub(crate) const ATTACK_DAMAGE: f32 = 15.0;
pub(crate) const MAX_SLIMES: usize = 6;
pub(crate) const SLIME_SPAWN_EVERY_TICKS: u64 = 180;

const ACTOR_SIZE_PX: f64 = 12.0;
const PLAYER_SPEED_PX_PER_TICK: f64 = 2.0;
const SLIME_SPEED_PX_PER_TICK: f64 = 0.75;
const CONTACT_COOLDOWN_TICKS: u32 = 30;
const ATTACK_COOLDOWN_TICKS: u32 = 20;
const ATTACK_REACH_PX: f64 = 8.0;
const WANDER_EVERY_TICKS: u64 = 60;
const POND_ORIGIN_TILE: (u32, u32) = (28, 20);
const POND_WIDTH_TILES: usize = 6;
const SLIME_SPAWN_POINTS: [(f64, f64); 4] = [
    (560.0, 64.0),
    (560.0, 400.0),
    (96.0, 400.0),
    (400.0, 208.0),
];

/// The playable map: terrain tiles, the player and wandering slimes.
pub(crate) struct PlayfieldState {
    world: World,
    input: InputHandle,
    hud: SharedHud,
    actors: ActorTextures,
    tick_count: u64,
    next_entity_id: i32,
    rng_state: u64,
    contact_cooldown: u32,
    attack_cooldown: u32,
    respawns: u32,
    pond_task: Option<TileTask>,
}

impl PlayfieldState {
    pub(crate) fn new(
        terrain: &TerrainTiles,
        actors: ActorTextures,
        input: InputHandle,
        hud: SharedHud,
    ) -> Self {
        let tile_px = TILE_PX as f64;
        let mut world = World::with_tile_size("playfield", MAP_COLUMNS, MAP_ROWS, tile_px, tile_px);
        world.renderer_mut().interpolate = false;
        build_terrain(world.tiles(), terrain);

        let pond_task = match world.tiles().set_tiles_async(
            terrain.water.clone(),
            POND_ORIGIN_TILE.0 as f64 * tile_px,
            POND_ORIGIN_TILE.1 as f64 * tile_px,
            Direction::Right,
            POND_WIDTH_TILES,
        ) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(error = %err, "pond_fill_not_started");
                None
            }
        };
        let visible = world.update_visible_tiles(&world.bounds());
        debug!(visible, "playfield_tiles_culled");

        let mut state = Self {
            world,
            input,
            hud,
            actors,
            tick_count: 0,
            next_entity_id: PLAYER_ID.0 + 1,
            rng_state: 0x2545_f491_4f6c_dd1d,
            contact_cooldown: 0,
            attack_cooldown: 0,
            respawns: 0,
            pond_task,
        };
        let player = state.spawn_player();
        state.world.queue_add(player);
        for (x, y) in SLIME_SPAWN_POINTS.iter().take(2) {
            let slime = state.spawn_slime(*x, *y);
            state.world.queue_add(slime);
        }
        state
    }

    #[cfg(test)]
    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub(crate) fn player(&self) -> Option<&Entity> {
        self.world.entity_by_id(PLAYER_ID)
    }

    pub(crate) fn slime_count(&self) -> usize {
        self.world
            .entities()
            .iter()
            .filter(|entity| entity.id() != PLAYER_ID)
            .count()
    }

    #[cfg(test)]
    pub(crate) fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Blocks until the background pond fill has landed.
    pub(crate) fn finish_pond(&mut self) {
        if let Some(task) = self.pond_task.take() {
            self.complete_pond(task);
        }
    }

    fn spawn_player(&self) -> Entity {
        Entity::new_living(
            PLAYER_ID,
            PLAYER_SPAWN.0,
            PLAYER_SPAWN.1,
            ACTOR_SIZE_PX,
            ACTOR_SIZE_PX,
            Vitals::new(PLAYER_MAX_HEALTH, PLAYER_SPEED_PX_PER_TICK),
        )
        .with_texture(self.actors.player)
    }

    pub(crate) fn spawn_slime(&mut self, x: f64, y: f64) -> Entity {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id = self.next_entity_id.saturating_add(1);
        Entity::new_living(
            id,
            x,
            y,
            ACTOR_SIZE_PX,
            ACTOR_SIZE_PX,
            Vitals::new(SLIME_HEALTH, SLIME_SPEED_PX_PER_TICK),
        )
        .with_texture(self.actors.slime)
    }

    fn next_random(&mut self) -> u64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        x
    }

    fn complete_pond(&mut self, task: TileTask) {
        match task.wait() {
            Ok(placed) => {
                let visible = self.world.update_visible_tiles(&self.world.bounds());
                info!(placed, visible, "pond_filled");
            }
            Err(err) => warn!(error = %err, "pond_fill_failed"),
        }
    }

    fn poll_pond(&mut self) {
        let finished = self
            .pond_task
            .as_ref()
            .is_some_and(|task| task.try_finished());
        if finished {
            self.finish_pond();
        }
    }

    fn steer_player(&mut self) {
        let input = self.input.snapshot();
        let Some(player) = self.world.entity_by_id_mut(PLAYER_ID) else {
            return;
        };
        let speed = player
            .vitals()
            .map_or(PLAYER_SPEED_PX_PER_TICK, |vitals| vitals.movement_speed());
        let axis = |negative: InputAction, positive: InputAction| -> f64 {
            f64::from(i8::from(input.is_down(positive)) - i8::from(input.is_down(negative)))
        };
        player.set_velocity(
            axis(InputAction::MoveLeft, InputAction::MoveRight) * speed,
            axis(InputAction::MoveUp, InputAction::MoveDown) * speed,
        );
    }

    fn wander_slimes(&mut self) {
        if self.tick_count % WANDER_EVERY_TICKS != 0 {
            return;
        }
        let ids: Vec<EntityId> = self
            .world
            .entities()
            .iter()
            .map(Entity::id)
            .filter(|id| *id != PLAYER_ID)
            .collect();
        for id in ids {
            let roll = self.next_random();
            let Some(slime) = self.world.entity_by_id_mut(id) else {
                continue;
            };
            let speed = slime
                .vitals()
                .map_or(SLIME_SPEED_PX_PER_TICK, |vitals| vitals.movement_speed());
            let (dx, dy) = match roll % 5 {
                0 => (speed, 0.0),
                1 => (-speed, 0.0),
                2 => (0.0, speed),
                3 => (0.0, -speed),
                _ => (0.0, 0.0),
            };
            slime.set_velocity(dx, dy);
        }
    }

    fn resolve_combat(&mut self) {
        let Some(player_box) = self.player().map(|player| *player.bounding_box()) else {
            return;
        };

        self.contact_cooldown = self.contact_cooldown.saturating_sub(1);
        self.attack_cooldown = self.attack_cooldown.saturating_sub(1);

        let touching = self
            .world
            .entities_intersecting(&player_box)
            .any(|entity| entity.id() != PLAYER_ID);
        if touching && self.contact_cooldown == 0 {
            if let Some(player) = self.world.entity_by_id_mut(PLAYER_ID) {
                player.damage(SLIME_CONTACT_DAMAGE);
            }
            self.contact_cooldown = CONTACT_COOLDOWN_TICKS;
        }

        if self.input.is_down(InputAction::Primary) && self.attack_cooldown == 0 {
            let reach = BoundingBox2D::new(
                player_box.x() - ATTACK_REACH_PX,
                player_box.y() - ATTACK_REACH_PX,
                player_box.width() + ATTACK_REACH_PX * 2.0,
                player_box.height() + ATTACK_REACH_PX * 2.0,
            );
            let targets: Vec<EntityId> = self
                .world
                .entities_intersecting(&reach)
                .map(Entity::id)
                .filter(|id| *id != PLAYER_ID)
                .collect();
            for id in targets {
                let Some(slime) = self.world.entity_by_id_mut(id) else {
                    continue;
                };
                slime.damage(ATTACK_DAMAGE);
                if slime.is_dead() {
                    debug!(entity_id = id.0, "slime_defeated");
                    self.world.queue_remove(id);
                }
            }
            self.attack_cooldown = ATTACK_COOLDOWN_TICKS;
        }

        if self.player().is_some_and(Entity::is_dead) {
            self.respawns = self.respawns.saturating_add(1);
            info!(respawns = self.respawns, "player_respawned");
            let fresh = self.spawn_player();
            self.world.queue_remove(PLAYER_ID);
            self.world.queue_add(fresh);
        }
    }

    fn spawn_waves(&mut self) {
        if self.tick_count == 0 || self.tick_count % SLIME_SPAWN_EVERY_TICKS != 0 {
            return;
        }
        if self.slime_count() >= MAX_SLIMES {
            return;
        }
        let start = (self.next_random() % SLIME_SPAWN_POINTS.len() as u64) as usize;
        let free = (0..SLIME_SPAWN_POINTS.len())
            .map(|offset| SLIME_SPAWN_POINTS[(start + offset) % SLIME_SPAWN_POINTS.len()])
            .find(|(x, y)| !self.world.any_entity_at(*x, *y));
        if let Some((x, y)) = free {
            let slime = self.spawn_slime(x, y);
            debug!(entity_id = slime.id().0, x, y, "slime_spawned");
            self.world.queue_add(slime);
        }
    }

    fn publish_hud(&self) {
        let mut hud = lock_hud(&self.hud);
        hud.health = self
            .player()
            .and_then(Entity::vitals)
            .map_or(0.0, |vitals| vitals.health());
        hud.max_health = PLAYER_MAX_HEALTH;
        hud.slimes = self.slime_count();
        hud.respawns = self.respawns;
    }
}

impl GameState for PlayfieldState {
    fn on_tick(&mut self) {
        if lock_hud(&self.hud).paused {
            return;
        }
        self.poll_pond();
        self.steer_player();
        self.wander_slimes();

        let bounds = self.world.bounds();
        self.world
            .tick_with(|entity, tiles| move_with_collision(entity, tiles, &bounds));

        self.resolve_combat();
        self.spawn_waves();
        self.publish_hud();
        self.tick_count = self.tick_count.saturating_add(1);
    }

    fn on_draw(&mut self, surface: &mut dyn DrawSurface) {
        self.world.draw(surface);
    }

    fn name(&self) -> &str {
        "playfield"
    }
}

fn build_terrain(tiles: &TileMap, terrain: &TerrainTiles) {
    let tile_px = TILE_PX as f64;
    let columns = MAP_COLUMNS as usize;
    let rows = MAP_ROWS as usize;
    for row in 0..rows {
        tiles.set_tiles(&terrain.grass, 0.0, row as f64 * tile_px, Direction::Right, columns);
    }
    tiles.set_tiles(&terrain.dirt, tile_px, 15.0 * tile_px, Direction::Right, columns - 2);

    let right_edge = (MAP_COLUMNS - 1) as f64 * tile_px;
    let bottom_edge = (MAP_ROWS - 1) as f64 * tile_px;
    tiles.set_tiles(&terrain.wall, 0.0, 0.0, Direction::Right, columns);
    tiles.set_tiles(&terrain.wall, right_edge, bottom_edge, Direction::Left, columns);
    tiles.set_tiles(&terrain.wall, 0.0, bottom_edge, Direction::Up, rows);
    tiles.set_tiles(&terrain.wall, right_edge, 0.0, Direction::Down, rows);
    tiles.set_tiles(&terrain.wall, 20.0 * tile_px, 4.0 * tile_px, Direction::Down, 8);
}

/// Moves one axis at a time so entities slide along walls. Slimes bounce off
/// whatever blocked them.
fn move_with_collision(entity: &mut Entity, tiles: &TileMap, bounds: &BoundingBox2D) {
    let (dx, dy) = entity.velocity();
    let blocked = |x: f64, y: f64, entity: &Entity| {
        let next = BoundingBox2D::new(x, y, entity.width(), entity.height());
        next.x() < bounds.x()
            || next.y() < bounds.y()
            || next.right() > bounds.right()
            || next.bottom() > bounds.bottom()
            || tiles.solid_tile_intersecting(&next).is_some()
    };

    let mut bounce = (1.0, 1.0);
    if dx != 0.0 {
        if blocked(entity.x() + dx, entity.y(), entity) {
            bounce.0 = -1.0;
        } else {
            entity.set_position(entity.x() + dx, entity.y());
        }
    }
    if dy != 0.0 {
        if blocked(entity.x(), entity.y() + dy, entity) {
            bounce.1 = -1.0;
        } else {
            entity.set_position(entity.x(), entity.y() + dy);
        }
    }
    if entity.id() != PLAYER_ID && bounce != (1.0, 1.0) {
        entity.set_velocity(dx * bounce.0, dy * bounce.1);
    }
}
