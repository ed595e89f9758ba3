use crate::sprites::TextureHandle;

use super::geometry::BoundingBox2D;
use super::location::SpatialLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileProperties {
    pub visible: bool,
    pub solid: bool,
    pub passable: bool,
}

impl Default for TileProperties {
    fn default() -> Self {
        Self {
            visible: true,
            solid: false,
            passable: true,
        }
    }
}

impl TileProperties {
    pub fn new(visible: bool, solid: bool, passable: bool) -> Self {
        Self {
            visible,
            solid,
            passable,
        }
    }

    pub fn solid_wall() -> Self {
        Self::new(true, true, false)
    }
}

/// A fixed-size renderable cell.
///
/// `x`/`y` are stamped by the tile map on every placement. `location` is
/// rebound to the query coordinates on every lookup; neither is an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    texture: TextureHandle,
    id: i32,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    properties: TileProperties,
    location: Option<SpatialLocation>,
}

impl Tile {
    pub fn new(texture: TextureHandle, id: i32, width: f64, height: f64) -> Self {
        Self {
            texture,
            id,
            x: 0.0,
            y: 0.0,
            width,
            height,
            properties: TileProperties::default(),
            location: None,
        }
    }

    pub fn with_properties(mut self, properties: TileProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn properties(&self) -> TileProperties {
        self.properties
    }

    pub fn set_properties(&mut self, properties: TileProperties) {
        self.properties = properties;
    }

    pub fn is_visible(&self) -> bool {
        self.properties.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.properties.visible = visible;
    }

    pub fn is_solid(&self) -> bool {
        self.properties.solid
    }

    pub fn set_solid(&mut self, solid: bool) {
        self.properties.solid = solid;
    }

    pub fn is_passable(&self) -> bool {
        self.properties.passable
    }

    pub fn set_passable(&mut self, passable: bool) {
        self.properties.passable = passable;
    }

    pub fn location(&self) -> Option<&SpatialLocation> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Option<SpatialLocation>) {
        self.location = location;
    }

    pub fn bounds(&self) -> BoundingBox2D {
        BoundingBox2D::new(self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_properties_are_visible_passable_and_not_solid() {
        let tile = Tile::new(TextureHandle::new(0), 1, 16.0, 16.0);
        assert!(tile.is_visible());
        assert!(tile.is_passable());
        assert!(!tile.is_solid());
    }

    #[test]
    fn property_setters_only_touch_their_flag() {
        let mut tile = Tile::new(TextureHandle::new(0), 1, 16.0, 16.0);
        tile.set_solid(true);
        tile.set_passable(false);
        assert_eq!(tile.properties(), TileProperties::new(true, true, false));

        tile.set_visible(false);
        assert_eq!(tile.properties(), TileProperties::new(false, true, false));
    }

    #[test]
    fn bounds_follow_stamped_position() {
        let mut tile = Tile::new(TextureHandle::new(3), 9, 8.0, 4.0).with_position(1.0, 2.0);
        assert_eq!(tile.bounds(), BoundingBox2D::new(1.0, 2.0, 8.0, 4.0));

        tile.set_position(-8.0, 0.0);
        assert_eq!(tile.bounds(), BoundingBox2D::new(-8.0, 0.0, 8.0, 4.0));
    }
}
