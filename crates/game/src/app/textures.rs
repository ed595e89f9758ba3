use std::collections::HashMap;

use image::{Rgba, RgbaImage};
use tilestep::{Direction, TextureAtlas, TextureHandle, Tile, TileProperties};
use tracing::info;

pub(crate) const TILE_PX: u32 = 16;

const TERRAIN_SHEET: &str = "terrain";
const ACTOR_SHEET: &str = "actors";
const HUD_SHEET: &str = "hud";

const GRASS_COLOR: [u8; 4] = [74, 112, 56, 255];
const GRASS_SPECK_COLOR: [u8; 4] = [92, 134, 70, 255];
const DIRT_COLOR: [u8; 4] = [112, 83, 58, 255];
const WATER_COLOR: [u8; 4] = [46, 92, 150, 255];
const WATER_RIPPLE_COLOR: [u8; 4] = [80, 130, 190, 255];
const WALL_COLOR: [u8; 4] = [68, 70, 78, 255];
const WALL_MORTAR_COLOR: [u8; 4] = [44, 46, 52, 255];
const PLAYER_COLOR: [u8; 4] = [220, 220, 240, 255];
const SLIME_COLOR: [u8; 4] = [120, 210, 90, 255];
const HUD_BACK_COLOR: [u8; 4] = [24, 26, 33, 255];
const HUD_FILL_COLOR: [u8; 4] = [210, 60, 60, 255];
const HUD_HOVER_COLOR: [u8; 4] = [255, 210, 70, 255];
const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Terrain tile templates in sheet order.
#[derive(Debug, Clone)]
pub(crate) struct TerrainTiles {
    pub grass: Tile,
    pub dirt: Tile,
    pub water: Tile,
    pub wall: Tile,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ActorTextures {
    pub player: TextureHandle,
    pub slime: TextureHandle,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HudTextures {
    pub back: TextureHandle,
    pub fill: TextureHandle,
    pub hover: TextureHandle,
}

/// Generated images plus the atlas naming them.
pub(crate) struct DemoTextures {
    pub atlas: TextureAtlas,
    pub images: HashMap<String, RgbaImage>,
    pub terrain: TerrainTiles,
    pub actors: ActorTextures,
    pub hud: HudTextures,
}

pub(crate) fn build_demo_textures() -> DemoTextures {
    let mut atlas = TextureAtlas::new();
    let mut images = HashMap::new();

    let terrain_image = terrain_sheet();
    let terrain_sheet = register(&mut atlas, &mut images, TERRAIN_SHEET, terrain_image);
    let floor = TileProperties::default();
    let blocking = TileProperties::solid_wall();
    let tiles = atlas
        .create_tiles_from_sections(
            terrain_sheet,
            0,
            0,
            0,
            0,
            TILE_PX as i32,
            TILE_PX as i32,
            Direction::Right,
            4,
            &[floor, floor, blocking, blocking],
            Some(&[1, 2, 3, 4]),
        )
        .unwrap_or_default();
    let terrain = match <[Tile; 4]>::try_from(tiles) {
        Ok([grass, dirt, water, wall]) => TerrainTiles {
            grass,
            dirt,
            water,
            wall,
        },
        Err(_) => fallback_terrain(terrain_sheet),
    };

    let actor_sheet = register(&mut atlas, &mut images, ACTOR_SHEET, actor_sheet());
    let actor_frames = atlas
        .sections(
            actor_sheet,
            0,
            0,
            0,
            0,
            TILE_PX as i32,
            TILE_PX as i32,
            Direction::Right,
            2,
        )
        .unwrap_or_default();
    let actors = ActorTextures {
        player: actor_frames.first().copied().unwrap_or(actor_sheet),
        slime: actor_frames.get(1).copied().unwrap_or(actor_sheet),
    };

    let hud_sheet = register(&mut atlas, &mut images, HUD_SHEET, hud_sheet());
    let hud = HudTextures {
        back: atlas.section_at(hud_sheet, 0, 0, 4, 4).unwrap_or(hud_sheet),
        fill: atlas.section_at(hud_sheet, 4, 0, 4, 4).unwrap_or(hud_sheet),
        hover: atlas.section_at(hud_sheet, 8, 0, 4, 4).unwrap_or(hud_sheet),
    };

    info!(
        images = images.len(),
        regions = atlas.len(),
        "demo_textures_built"
    );

    DemoTextures {
        atlas,
        images,
        terrain,
        actors,
        hud,
    }
}

fn register(
    atlas: &mut TextureAtlas,
    images: &mut HashMap<String, RgbaImage>,
    name: &str,
    image: RgbaImage,
) -> TextureHandle {
    let handle = atlas.add_image(name, image.width(), image.height());
    images.insert(name.to_string(), image);
    handle
}

// Only reachable if the sheet layout and the slicing above disagree.
fn fallback_terrain(sheet: TextureHandle) -> TerrainTiles {
    let size = TILE_PX as f64;
    TerrainTiles {
        grass: Tile::new(sheet, 1, size, size),
        dirt: Tile::new(sheet, 2, size, size),
        water: Tile::new(sheet, 3, size, size).with_properties(TileProperties::solid_wall()),
        wall: Tile::new(sheet, 4, size, size).with_properties(TileProperties::solid_wall()),
    }
}

fn terrain_sheet() -> RgbaImage {
    RgbaImage::from_fn(TILE_PX * 4, TILE_PX, |x, y| {
        let (cell, lx, ly) = (x / TILE_PX, x % TILE_PX, y);
        let brick_offset = if ly < 8 { 0 } else { 8 };
        let color = match cell {
            0 if (lx * 7 + ly * 3) % 11 == 0 => GRASS_SPECK_COLOR,
            0 => GRASS_COLOR,
            1 => DIRT_COLOR,
            2 if (lx + ly * 2) % 8 == 0 => WATER_RIPPLE_COLOR,
            2 => WATER_COLOR,
            _ if ly % 8 == 7 || (lx + brick_offset) % 16 == 0 => WALL_MORTAR_COLOR,
            _ => WALL_COLOR,
        };
        Rgba(color)
    })
}

fn actor_sheet() -> RgbaImage {
    let center = TILE_PX as f32 / 2.0 - 0.5;
    RgbaImage::from_fn(TILE_PX * 2, TILE_PX, |x, y| {
        let (cell, lx, ly) = (x / TILE_PX, (x % TILE_PX) as f32, y as f32);
        let color = match cell {
            0 => {
                let inside = (lx - center).abs() <= 5.0 && (ly - center).abs() <= 6.0;
                if inside {
                    PLAYER_COLOR
                } else {
                    TRANSPARENT
                }
            }
            _ => {
                let dx = (lx - center) / 7.0;
                let dy = (ly - center - 2.0) / 5.5;
                if dx * dx + dy * dy <= 1.0 {
                    SLIME_COLOR
                } else {
                    TRANSPARENT
                }
            }
        };
        Rgba(color)
    })
}

fn hud_sheet() -> RgbaImage {
    RgbaImage::from_fn(12, 4, |x, _| {
        Rgba(match x / 4 {
            0 => HUD_BACK_COLOR,
            1 => HUD_FILL_COLOR,
            _ => HUD_HOVER_COLOR,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terrain_tiles_carry_expected_flags() {
        let textures = build_demo_textures();
        assert!(textures.terrain.grass.is_passable());
        assert!(!textures.terrain.dirt.is_solid());
        assert!(textures.terrain.water.is_solid());
        assert!(textures.terrain.wall.is_solid());
        assert_eq!(textures.terrain.wall.id(), 4);
        assert_eq!(textures.terrain.grass.width(), TILE_PX as f64);
    }

    #[test]
    fn every_handle_resolves_to_a_generated_image() {
        let textures = build_demo_textures();
        let handles = [
            textures.terrain.grass.texture(),
            textures.terrain.wall.texture(),
            textures.actors.player,
            textures.actors.slime,
            textures.hud.back,
            textures.hud.fill,
            textures.hud.hover,
        ];
        for handle in handles {
            let region = textures.atlas.region(handle).expect("region");
            let image = textures.images.get(&region.image).expect("image");
            assert!(region.rect.right() <= image.width() as i64);
            assert!(region.rect.bottom() <= image.height() as i64);
        }
    }

    #[test]
    fn actor_sprites_have_transparent_corners() {
        let textures = build_demo_textures();
        let actors = textures.images.get(ACTOR_SHEET).expect("actor sheet");
        assert_eq!(actors.get_pixel(0, 0).0[3], 0);
        assert_eq!(actors.get_pixel(TILE_PX + 8, 9).0, SLIME_COLOR);
    }
}
