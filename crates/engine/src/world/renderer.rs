use crate::app::DrawSurface;

use super::entity::Entity;
use super::geometry::BoundingBox2D;
use super::tilemap::TileMap;

/// Submits tiles and entities to a [`DrawSurface`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldRenderer {
    pub interpolate: bool,
    pub draw_all_tiles: bool,
}

impl WorldRenderer {
    pub fn new(interpolate: bool) -> Self {
        Self {
            interpolate,
            draw_all_tiles: false,
        }
    }

    /// Draws every tile in the map whose visible flag is set, ignoring the
    /// visible set.
    pub fn draw_all_tiles(&self, tiles: &TileMap, surface: &mut dyn DrawSurface) -> usize {
        let mut drawn = 0;
        tiles.for_each_tile(|tile| {
            if tile.is_visible() {
                surface.draw_image(
                    tile.texture(),
                    tile.x(),
                    tile.y(),
                    tile.width(),
                    tile.height(),
                    self.interpolate,
                );
                drawn += 1;
            }
        });
        drawn
    }

    pub fn draw_visible_tiles(&self, tiles: &TileMap, surface: &mut dyn DrawSurface) -> usize {
        let mut drawn = 0;
        tiles.for_each_visible_tile(|tile| {
            surface.draw_image(
                tile.texture(),
                tile.x(),
                tile.y(),
                tile.width(),
                tile.height(),
                self.interpolate,
            );
            drawn += 1;
        });
        drawn
    }

    /// Entities without a texture are skipped.
    pub fn draw_entities(&self, entities: &[Entity], surface: &mut dyn DrawSurface) -> usize {
        let mut drawn = 0;
        for entity in entities {
            let Some(texture) = entity.texture() else {
                continue;
            };
            surface.draw_image(
                texture,
                entity.x(),
                entity.y(),
                entity.width(),
                entity.height(),
                self.interpolate,
            );
            drawn += 1;
        }
        drawn
    }

    pub fn update_visible_tiles(&self, tiles: &TileMap, view: &BoundingBox2D) -> usize {
        tiles.cull_visible_tiles(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::RecordingSurface;
    use crate::sprites::TextureHandle;
    use crate::world::{Direction, EntityId, Tile};

    fn map_with_row() -> TileMap {
        let map = TileMap::new();
        let tile = Tile::new(TextureHandle::new(4), 1, 16.0, 16.0);
        map.set_tiles(&tile, 0.0, 0.0, Direction::Right, 6);
        map
    }

    #[test]
    fn visible_pass_only_draws_culled_tiles() {
        let map = map_with_row();
        let renderer = WorldRenderer::new(false);
        let mut surface = RecordingSurface::new(64, 64);

        assert_eq!(renderer.draw_visible_tiles(&map, &mut surface), 0);
        renderer.update_visible_tiles(&map, &BoundingBox2D::new(0.0, 0.0, 32.0, 16.0));
        assert_eq!(renderer.draw_visible_tiles(&map, &mut surface), 2);
        assert_eq!(renderer.draw_all_tiles(&map, &mut surface), 6);
        assert_eq!(surface.draws.len(), 8);
    }

    #[test]
    fn hidden_tiles_are_skipped_by_full_pass() {
        let map = map_with_row();
        let mut hidden = Tile::new(TextureHandle::new(5), 2, 16.0, 16.0);
        hidden.set_visible(false);
        map.set_tile(0.0, 16.0, hidden);

        let mut surface = RecordingSurface::new(64, 64);
        assert_eq!(WorldRenderer::new(true).draw_all_tiles(&map, &mut surface), 6);
        assert!(surface.draws.iter().all(|draw| draw.interpolate));
    }

    #[test]
    fn entities_without_texture_are_not_drawn() {
        let entities = vec![
            Entity::new(EntityId(1), 0.0, 0.0, 8.0, 8.0),
            Entity::new(EntityId(2), 4.0, 4.0, 8.0, 8.0).with_texture(TextureHandle::new(7)),
        ];
        let mut surface = RecordingSurface::new(32, 32);
        assert_eq!(WorldRenderer::default().draw_entities(&entities, &mut surface), 1);
        assert_eq!(surface.draws[0].texture, TextureHandle::new(7));
        assert_eq!((surface.draws[0].x, surface.draws[0].y), (4.0, 4.0));
    }
}
