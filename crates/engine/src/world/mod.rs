mod entity;
mod geometry;
mod location;
mod renderer;
mod tile;
mod tilemap;

use tracing::debug;

use crate::app::DrawSurface;

pub use entity::{Entity, EntityId, Vitals};
pub use geometry::{BoundingBox, BoundingBox2D};
pub use location::SpatialLocation;
pub use renderer::WorldRenderer;
pub use tile::{Tile, TileProperties};
pub use tilemap::{TileMap, TileTask, TileTaskError};

/// Screen-space step direction: `Up` is -y, `Down` is +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn step(self, x: f64, y: f64, dx: f64, dy: f64) -> (f64, f64) {
        match self {
            Self::Up => (x, y - dy),
            Self::Down => (x, y + dy),
            Self::Left => (x - dx, y),
            Self::Right => (x + dx, y),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueuedAction {
    Add(Entity),
    Remove(EntityId),
}

/// Tiles plus a live entity set that only changes between ticks.
///
/// Queued adds and removes are applied in submission order by
/// [`World::apply_queued_actions`], which [`World::tick`] runs first.
#[derive(Debug)]
pub struct World {
    name: String,
    width: f64,
    height: f64,
    tiles: TileMap,
    entities: Vec<Entity>,
    pending_actions: Vec<QueuedAction>,
    renderer: WorldRenderer,
}

impl World {
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            tiles: TileMap::new(),
            entities: Vec::new(),
            pending_actions: Vec::new(),
            renderer: WorldRenderer::default(),
        }
    }

    /// A world sized to `columns` x `rows` tiles.
    pub fn with_tile_size(
        name: impl Into<String>,
        columns: u32,
        rows: u32,
        tile_width: f64,
        tile_height: f64,
    ) -> Self {
        Self::new(
            name,
            columns as f64 * tile_width,
            rows as f64 * tile_height,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn bounds(&self) -> BoundingBox2D {
        BoundingBox2D::new(0.0, 0.0, self.width, self.height)
    }

    pub fn tiles(&self) -> &TileMap {
        &self.tiles
    }

    pub fn set_tiles(&mut self, tiles: TileMap) {
        self.tiles = tiles;
    }

    pub fn renderer(&self) -> &WorldRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut WorldRenderer {
        &mut self.renderer
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_actions.len()
    }

    pub fn queue_add(&mut self, entity: Entity) {
        self.pending_actions.push(QueuedAction::Add(entity));
    }

    pub fn queue_remove(&mut self, id: EntityId) {
        self.pending_actions.push(QueuedAction::Remove(id));
    }

    /// Drains the queue in order. Returns how many actions changed the live
    /// set.
    pub fn apply_queued_actions(&mut self) -> usize {
        if self.pending_actions.is_empty() {
            return 0;
        }

        let mut applied = 0;
        for action in std::mem::take(&mut self.pending_actions) {
            match action {
                QueuedAction::Add(entity) => {
                    if self.add_entity(entity) {
                        applied += 1;
                    }
                }
                QueuedAction::Remove(id) => {
                    if self.remove_entity(id).is_some() {
                        applied += 1;
                    }
                }
            }
        }
        applied
    }

    /// Inserts immediately, bypassing the queue. Rejects duplicate ids.
    pub fn add_entity(&mut self, entity: Entity) -> bool {
        if self.entity_by_id(entity.id()).is_some() {
            debug!(
                world = self.name.as_str(),
                entity_id = entity.id().0,
                "entity_add_skipped_duplicate"
            );
            return false;
        }
        self.entities.push(entity);
        true
    }

    /// Removes immediately, bypassing the queue.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|entity| entity.id() == id)?;
        Some(self.entities.remove(index))
    }

    pub fn entity_by_id(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    pub fn entity_by_id_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id() == id)
    }

    /// Exact position match, not containment.
    pub fn entity_at(&self, x: f64, y: f64) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.is_at(x, y))
    }

    pub fn any_entity_at(&self, x: f64, y: f64) -> bool {
        self.entities.iter().any(|entity| entity.is_at(x, y))
    }

    pub fn entity_containing(&self, x: f64, y: f64) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|entity| entity.bounding_box().contains(x, y))
    }

    pub fn entities_intersecting<'a>(
        &'a self,
        bounds: &'a BoundingBox2D,
    ) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities
            .iter()
            .filter(move |entity| entity.bounding_box().does_intersect(bounds))
    }

    /// Applies queued actions, then moves every entity by its velocity.
    pub fn tick(&mut self) {
        self.tick_with(|entity, _| entity.advance());
    }

    /// Applies queued actions, then hands each entity to `advance` and
    /// refreshes its bounding box.
    pub fn tick_with(&mut self, mut advance: impl FnMut(&mut Entity, &TileMap)) {
        self.apply_queued_actions();
        for entity in &mut self.entities {
            advance(entity, &self.tiles);
            entity.update_bounding_box();
        }
    }

    /// Tiles first, then entities in insertion order.
    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        if self.renderer.draw_all_tiles {
            self.renderer.draw_all_tiles(&self.tiles, surface);
        } else {
            self.renderer.draw_visible_tiles(&self.tiles, surface);
        }
        self.renderer.draw_entities(&self.entities, surface);
    }

    pub fn update_visible_tiles(&self, view: &BoundingBox2D) -> usize {
        self.renderer.update_visible_tiles(&self.tiles, view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::RecordingSurface;
    use crate::sprites::TextureHandle;

    fn entity(id: i32, x: f64, y: f64) -> Entity {
        Entity::new(EntityId(id), x, y, 8.0, 8.0)
    }

    #[test]
    fn queued_actions_apply_in_order_on_drain() {
        let mut world = World::new("test", 100.0, 100.0);
        assert!(world.add_entity(entity(1, 0.0, 0.0)));

        world.queue_remove(EntityId(1));
        world.queue_add(entity(2, 10.0, 10.0));
        assert!(world.entity_by_id(EntityId(1)).is_some());
        assert!(world.entity_by_id(EntityId(2)).is_none());
        assert_eq!(world.pending_len(), 2);

        assert_eq!(world.apply_queued_actions(), 2);
        let ids: Vec<EntityId> = world.entities().iter().map(Entity::id).collect();
        assert_eq!(ids, vec![EntityId(2)]);
        assert_eq!(world.pending_len(), 0);
    }

    #[test]
    fn add_then_remove_in_same_drain_leaves_nothing() {
        let mut world = World::new("test", 10.0, 10.0);
        world.queue_add(entity(5, 1.0, 1.0));
        world.queue_remove(EntityId(5));
        world.apply_queued_actions();
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn duplicate_queued_add_is_skipped() {
        let mut world = World::new("test", 10.0, 10.0);
        world.queue_add(entity(3, 0.0, 0.0));
        world.queue_add(entity(3, 5.0, 5.0));
        assert_eq!(world.apply_queued_actions(), 1);
        assert_eq!(world.entity_count(), 1);
        assert!(world.entity_at(0.0, 0.0).is_some());
    }

    #[test]
    fn removing_absent_entity_is_a_no_op() {
        let mut world = World::new("test", 10.0, 10.0);
        world.queue_remove(EntityId(42));
        assert_eq!(world.apply_queued_actions(), 0);
        assert!(world.remove_entity(EntityId(42)).is_none());
    }

    #[test]
    fn position_queries_are_exact() {
        let mut world = World::new("test", 64.0, 64.0);
        world.add_entity(entity(1, 4.0, 4.0));
        assert!(world.any_entity_at(4.0, 4.0));
        assert!(!world.any_entity_at(4.5, 4.0));
        assert!(world.entity_at(4.5, 4.0).is_none());
        assert_eq!(
            world.entity_containing(6.0, 6.0).map(Entity::id),
            Some(EntityId(1))
        );
    }

    #[test]
    fn tick_applies_queue_then_moves_and_refreshes_bounds() {
        let mut world = World::new("test", 64.0, 64.0);
        let mut mover = entity(1, 0.0, 0.0);
        mover.set_velocity(2.0, 1.0);
        world.queue_add(mover);

        world.tick();
        let moved = world.entity_by_id(EntityId(1)).expect("added during tick");
        assert!(moved.is_at(2.0, 1.0));
        assert_eq!(
            *moved.bounding_box(),
            BoundingBox2D::new(2.0, 1.0, 8.0, 8.0)
        );
    }

    #[test]
    fn tick_with_sees_tile_map() {
        let mut world = World::with_tile_size("test", 4, 4, 16.0, 16.0);
        assert_eq!((world.width(), world.height()), (64.0, 64.0));
        world.tiles().set_tile(
            16.0,
            0.0,
            Tile::new(TextureHandle::new(1), 1, 16.0, 16.0)
                .with_properties(TileProperties::solid_wall()),
        );
        world.add_entity(entity(1, 6.0, 0.0));

        world.tick_with(|entity, tiles| {
            let mut next = *entity.bounding_box();
            next.set_origin(entity.x() + 4.0, entity.y());
            if tiles.solid_tile_intersecting(&next).is_none() {
                entity.set_position(entity.x() + 4.0, entity.y());
            }
        });
        assert!(world.any_entity_at(6.0, 0.0));
    }

    #[test]
    fn intersecting_query_uses_bounding_boxes() {
        let mut world = World::new("test", 64.0, 64.0);
        world.add_entity(entity(1, 0.0, 0.0));
        world.add_entity(entity(2, 20.0, 20.0));
        let view = BoundingBox2D::new(4.0, 4.0, 10.0, 10.0);
        let hits: Vec<EntityId> = world.entities_intersecting(&view).map(Entity::id).collect();
        assert_eq!(hits, vec![EntityId(1)]);
    }

    #[test]
    fn draw_emits_tiles_before_entities() {
        let mut world = World::new("test", 64.0, 64.0);
        world.tiles().set_tiles(
            &Tile::new(TextureHandle::new(1), 1, 16.0, 16.0),
            0.0,
            0.0,
            Direction::Right,
            2,
        );
        world.add_entity(entity(1, 3.0, 3.0).with_texture(TextureHandle::new(9)));
        world.renderer_mut().draw_all_tiles = true;

        let mut surface = RecordingSurface::new(64, 64);
        world.draw(&mut surface);
        let textures: Vec<u32> = surface.draws.iter().map(|draw| draw.texture.index()).collect();
        assert_eq!(textures, vec![1, 1, 9]);
    }

    #[test]
    fn direction_steps_in_screen_space() {
        assert_eq!(Direction::Up.step(0.0, 0.0, 2.0, 3.0), (0.0, -3.0));
        assert_eq!(Direction::Down.step(0.0, 0.0, 2.0, 3.0), (0.0, 3.0));
        assert_eq!(Direction::Left.step(0.0, 0.0, 2.0, 3.0), (-2.0, 0.0));
        assert_eq!(Direction::Right.step(0.0, 0.0, 2.0, 3.0), (2.0, 0.0));
    }
}
