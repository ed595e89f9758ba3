use std::collections::HashMap;

use tracing::{debug, warn};

use crate::world::{BoundingBox, Direction, Tile, TileProperties};

/// Opaque drawable handle handed out by a [`TextureAtlas`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(u32);

impl TextureHandle {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// What a handle points at: a rectangle inside a named source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRegion {
    pub image: String,
    pub rect: BoundingBox,
}

/// Name and sub-rectangle resolution for textures the host has loaded.
///
/// The atlas never touches pixel data. Hosts register image names with their
/// dimensions, then resolve handles back to regions when drawing.
#[derive(Debug, Default)]
pub struct TextureAtlas {
    by_name: HashMap<String, TextureHandle>,
    regions: Vec<Option<TextureRegion>>,
}

impl TextureAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&mut self, name: &str, width: u32, height: u32) -> TextureHandle {
        let handle = self.push_region(TextureRegion {
            image: name.to_string(),
            rect: BoundingBox::new(0, 0, clamp_dim(width), clamp_dim(height)),
        });
        if let Some(previous) = self.by_name.insert(name.to_string(), handle) {
            debug!(
                image = name,
                previous = previous.index(),
                handle = handle.index(),
                "texture_image_replaced"
            );
        }
        handle
    }

    pub fn remove_image(&mut self, name: &str) -> bool {
        if self.by_name.remove(name).is_none() {
            warn!(image = name, "texture_remove_miss");
            return false;
        }
        for slot in &mut self.regions {
            if slot.as_ref().is_some_and(|region| region.image == name) {
                *slot = None;
            }
        }
        true
    }

    pub fn image(&self, name: &str) -> Option<TextureHandle> {
        let handle = self.by_name.get(name).copied();
        if handle.is_none() {
            warn!(image = name, "texture_lookup_miss");
        }
        handle
    }

    pub fn region(&self, handle: TextureHandle) -> Option<&TextureRegion> {
        self.regions
            .get(handle.index() as usize)
            .and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.regions.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cuts a sub-rectangle out of `parent`, in `parent`'s local coordinates.
    pub fn section_at(
        &mut self,
        parent: TextureHandle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Option<TextureHandle> {
        let Some(parent_region) = self.region(parent).cloned() else {
            warn!(handle = parent.index(), "texture_section_parent_missing");
            return None;
        };

        let rect = parent_region.rect;
        let fits = width > 0
            && height > 0
            && x >= 0
            && y >= 0
            && x as i64 + width as i64 <= rect.width() as i64
            && y as i64 + height as i64 <= rect.height() as i64;
        if !fits {
            warn!(
                image = parent_region.image.as_str(),
                x,
                y,
                width,
                height,
                "texture_section_out_of_bounds"
            );
            return None;
        }

        Some(self.push_region(TextureRegion {
            image: parent_region.image,
            rect: BoundingBox::new(rect.x() + x, rect.y() + y, width, height),
        }))
    }

    /// Slices `count` equally sized sections stepping in `direction`.
    ///
    /// `x_spacing`/`y_spacing` are extra gaps between neighbouring frames.
    /// Returns `None` if any frame falls outside the parent.
    #[allow(clippy::too_many_arguments)]
    pub fn sections(
        &mut self,
        parent: TextureHandle,
        x: i32,
        y: i32,
        x_spacing: i32,
        y_spacing: i32,
        width: i32,
        height: i32,
        direction: Direction,
        count: usize,
    ) -> Option<Vec<TextureHandle>> {
        let step_x = (i64::from(width) + i64::from(x_spacing)) as f64;
        let step_y = (i64::from(height) + i64::from(y_spacing)) as f64;
        let mut frames = Vec::with_capacity(count);
        let (mut cursor_x, mut cursor_y) = (x as f64, y as f64);
        for _ in 0..count {
            let frame = self.section_at(
                parent,
                cursor_x as i32,
                cursor_y as i32,
                width,
                height,
            )?;
            frames.push(frame);
            (cursor_x, cursor_y) = direction.step(cursor_x, cursor_y, step_x, step_y);
        }
        Some(frames)
    }

    /// Tile factory: one tile per sliced frame.
    ///
    /// A single-entry `properties` slice applies to every tile. Missing ids
    /// default to 0.
    #[allow(clippy::too_many_arguments)]
    pub fn create_tiles_from_sections(
        &mut self,
        parent: TextureHandle,
        x: i32,
        y: i32,
        x_spacing: i32,
        y_spacing: i32,
        width: i32,
        height: i32,
        direction: Direction,
        count: usize,
        properties: &[TileProperties],
        tile_ids: Option<&[i32]>,
    ) -> Option<Vec<Tile>> {
        let frames = self.sections(
            parent, x, y, x_spacing, y_spacing, width, height, direction, count,
        )?;
        let tiles = frames
            .into_iter()
            .enumerate()
            .map(|(index, texture)| {
                let props = match properties {
                    [single] => *single,
                    many => many
                        .get(index)
                        .or_else(|| many.first())
                        .copied()
                        .unwrap_or_default(),
                };
                let id = tile_ids
                    .and_then(|ids| ids.get(index))
                    .copied()
                    .unwrap_or(0);
                Tile::new(texture, id, width as f64, height as f64).with_properties(props)
            })
            .collect();
        Some(tiles)
    }

    fn push_region(&mut self, region: TextureRegion) -> TextureHandle {
        let handle = TextureHandle::new(self.regions.len() as u32);
        self.regions.push(Some(region));
        handle
    }
}

fn clamp_dim(value: u32) -> i32 {
    value.min(i32::MAX as u32) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlas_with_sheet() -> (TextureAtlas, TextureHandle) {
        let mut atlas = TextureAtlas::new();
        let sheet = atlas.add_image("sheet", 64, 32);
        (atlas, sheet)
    }

    #[test]
    fn image_lookup_by_name_and_miss() {
        let (atlas, sheet) = atlas_with_sheet();
        assert_eq!(atlas.image("sheet"), Some(sheet));
        assert_eq!(atlas.image("missing"), None);
        let region = atlas.region(sheet).expect("region");
        assert_eq!(region.rect, BoundingBox::new(0, 0, 64, 32));
    }

    #[test]
    fn section_offsets_are_relative_to_parent() {
        let (mut atlas, sheet) = atlas_with_sheet();
        let half = atlas.section_at(sheet, 32, 0, 32, 32).expect("half");
        let quarter = atlas.section_at(half, 16, 16, 16, 16).expect("quarter");
        let region = atlas.region(quarter).expect("region");
        assert_eq!(region.image, "sheet");
        assert_eq!(region.rect, BoundingBox::new(48, 16, 16, 16));
    }

    #[test]
    fn section_outside_parent_is_rejected() {
        let (mut atlas, sheet) = atlas_with_sheet();
        assert!(atlas.section_at(sheet, 60, 0, 8, 8).is_none());
        assert!(atlas.section_at(sheet, -1, 0, 8, 8).is_none());
        assert!(atlas.section_at(sheet, 0, 0, 0, 8).is_none());
    }

    #[test]
    fn sections_step_with_spacing() {
        let (mut atlas, sheet) = atlas_with_sheet();
        let frames = atlas
            .sections(sheet, 0, 0, 4, 0, 12, 12, Direction::Right, 4)
            .expect("frames");
        let xs: Vec<i32> = frames
            .iter()
            .map(|frame| atlas.region(*frame).expect("region").rect.x())
            .collect();
        assert_eq!(xs, vec![0, 16, 32, 48]);
        assert!(atlas
            .sections(sheet, 0, 0, 4, 0, 12, 12, Direction::Right, 5)
            .is_none());
    }

    #[test]
    fn sections_with_extreme_spacing_fall_outside_parent() {
        let (mut atlas, sheet) = atlas_with_sheet();
        assert!(atlas
            .sections(sheet, 0, 0, i32::MAX, 0, 16, 16, Direction::Right, 2)
            .is_none());
        assert!(atlas
            .sections(sheet, 0, 0, 0, i32::MAX, 16, 16, Direction::Down, 2)
            .is_none());
        let single = atlas
            .sections(sheet, 0, 0, i32::MAX, i32::MAX, 16, 16, Direction::Right, 1)
            .expect("first frame needs no step");
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn remove_image_invalidates_its_sections() {
        let (mut atlas, sheet) = atlas_with_sheet();
        let section = atlas.section_at(sheet, 0, 0, 8, 8).expect("section");
        assert!(atlas.remove_image("sheet"));
        assert!(atlas.region(sheet).is_none());
        assert!(atlas.region(section).is_none());
        assert!(!atlas.remove_image("sheet"));
        assert!(atlas.is_empty());
    }

    #[test]
    fn tile_factory_applies_single_property_set_to_all_tiles() {
        let (mut atlas, sheet) = atlas_with_sheet();
        let tiles = atlas
            .create_tiles_from_sections(
                sheet,
                0,
                0,
                0,
                0,
                16,
                16,
                Direction::Right,
                3,
                &[TileProperties::solid_wall()],
                Some(&[7, 8]),
            )
            .expect("tiles");
        assert_eq!(tiles.len(), 3);
        assert!(tiles.iter().all(|tile| tile.is_solid() && !tile.is_passable()));
        let ids: Vec<i32> = tiles.iter().map(Tile::id).collect();
        assert_eq!(ids, vec![7, 8, 0]);
        assert_eq!(tiles[2].width(), 16.0);
    }

    #[test]
    fn tile_factory_uses_per_tile_properties_when_given() {
        let (mut atlas, sheet) = atlas_with_sheet();
        let floor = TileProperties::default();
        let wall = TileProperties::solid_wall();
        let tiles = atlas
            .create_tiles_from_sections(
                sheet,
                0,
                16,
                0,
                0,
                16,
                16,
                Direction::Right,
                2,
                &[floor, wall],
                None,
            )
            .expect("tiles");
        assert_eq!(tiles[0].properties(), floor);
        assert_eq!(tiles[1].properties(), wall);
    }
}
