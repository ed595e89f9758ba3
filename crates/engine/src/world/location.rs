use std::hash::{Hash, Hasher};

use super::geometry::BoundingBox2D;

/// A world coordinate used as a tile-map key.
///
/// Equality and hashing only look at `(x, y)`; the optional bounding box rides
/// along as data. Keys are plain values: the map copies them on insertion and
/// never hands out a mutable reference to a stored key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialLocation {
    x: f64,
    y: f64,
    bounding_box: Option<BoundingBox2D>,
}

impl SpatialLocation {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            bounding_box: None,
        }
    }

    pub fn with_bounds(x: f64, y: f64, bounding_box: BoundingBox2D) -> Self {
        Self {
            x,
            y,
            bounding_box: Some(bounding_box),
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn bounding_box(&self) -> Option<&BoundingBox2D> {
        self.bounding_box.as_ref()
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn set_bounding_box(&mut self, bounding_box: Option<BoundingBox2D>) {
        self.bounding_box = bounding_box;
    }

    /// Rebuilds the attached box at the current coordinates.
    pub fn update_bounding_box(&mut self, width: f64, height: f64) {
        match &mut self.bounding_box {
            Some(bounding_box) => bounding_box.set(self.x, self.y, width, height),
            None => self.bounding_box = Some(BoundingBox2D::new(self.x, self.y, width, height)),
        }
    }

    fn key_bits(&self) -> (u64, u64) {
        (normalized_bits(self.x), normalized_bits(self.y))
    }
}

// 0.0 and -0.0 compare equal, so they must hash the same.
fn normalized_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for SpatialLocation {
    fn eq(&self, other: &Self) -> bool {
        self.key_bits() == other.key_bits()
    }
}

impl Eq for SpatialLocation {}

impl Hash for SpatialLocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn equality_ignores_bounding_box() {
        let plain = SpatialLocation::new(32.0, 48.0);
        let boxed =
            SpatialLocation::with_bounds(32.0, 48.0, BoundingBox2D::new(32.0, 48.0, 16.0, 16.0));
        assert_eq!(plain, boxed);
        assert_ne!(plain, SpatialLocation::new(32.0, 48.5));
    }

    #[test]
    fn equal_coordinates_are_interchangeable_map_keys() {
        let mut map = HashMap::new();
        map.insert(
            SpatialLocation::with_bounds(1.0, 2.0, BoundingBox2D::new(1.0, 2.0, 4.0, 4.0)),
            "grass",
        );
        assert_eq!(map.get(&SpatialLocation::new(1.0, 2.0)), Some(&"grass"));

        map.insert(SpatialLocation::new(1.0, 2.0), "stone");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&SpatialLocation::new(1.0, 2.0)), Some(&"stone"));
    }

    #[test]
    fn negative_zero_is_same_key_as_zero() {
        let mut map = HashMap::new();
        map.insert(SpatialLocation::new(0.0, -0.0), 1);
        assert_eq!(map.get(&SpatialLocation::new(-0.0, 0.0)), Some(&1));
    }

    #[test]
    fn update_bounding_box_follows_coordinates() {
        let mut location = SpatialLocation::new(3.0, 4.0);
        location.update_bounding_box(8.0, 8.0);
        assert_eq!(
            location.bounding_box(),
            Some(&BoundingBox2D::new(3.0, 4.0, 8.0, 8.0))
        );

        location.set_position(10.0, 12.0);
        location.update_bounding_box(2.0, 2.0);
        assert_eq!(
            location.bounding_box(),
            Some(&BoundingBox2D::new(10.0, 12.0, 2.0, 2.0))
        );
    }
}
