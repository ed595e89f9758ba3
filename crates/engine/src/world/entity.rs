use crate::sprites::TextureHandle;

use super::geometry::BoundingBox2D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub i32);

/// Health and movement speed for entities that can take damage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    health: f32,
    movement_speed: f64,
}

impl Vitals {
    pub fn new(health: f32, movement_speed: f64) -> Self {
        Self {
            health: health.max(0.0),
            movement_speed,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn set_health(&mut self, health: f32) {
        self.health = health.max(0.0);
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Health never drops below zero.
    pub fn damage(&mut self, amount: f32) {
        self.health = (self.health - amount).max(0.0);
    }

    pub fn movement_speed(&self) -> f64 {
        self.movement_speed
    }

    pub fn set_movement_speed(&mut self, movement_speed: f64) {
        self.movement_speed = movement_speed;
    }

    pub fn scale_movement_speed(&mut self, factor: f64) {
        self.movement_speed *= factor;
    }
}

/// A movable, renderable object.
///
/// The bounding box is only re-derived by [`Entity::update_bounding_box`];
/// whoever moves or resizes the entity is expected to call it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    bounding_box: BoundingBox2D,
    texture: Option<TextureHandle>,
    velocity: (f64, f64),
    vitals: Option<Vitals>,
}

impl Entity {
    pub fn new(id: EntityId, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
            bounding_box: BoundingBox2D::new(x, y, width, height),
            texture: None,
            velocity: (0.0, 0.0),
            vitals: None,
        }
    }

    pub fn new_living(
        id: EntityId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        vitals: Vitals,
    ) -> Self {
        Self::new(id, x, y, width, height).with_vitals(vitals)
    }

    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_vitals(mut self, vitals: Vitals) -> Self {
        self.vitals = Some(vitals);
        self
    }

    /// Uses a custom collision box instead of the one derived from the size.
    pub fn with_bounding_box(mut self, bounding_box: BoundingBox2D) -> Self {
        self.bounding_box = bounding_box;
        self
    }

    pub fn id(&self) -> EntityId {
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

    pub fn bounding_box(&self) -> &BoundingBox2D {
        &self.bounding_box
    }

    pub fn update_bounding_box(&mut self) {
        self.bounding_box
            .set(self.x, self.y, self.width, self.height);
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn set_texture(&mut self, texture: Option<TextureHandle>) {
        self.texture = texture;
    }

    pub fn velocity(&self) -> (f64, f64) {
        self.velocity
    }

    /// Velocity is in world units per tick.
    pub fn set_velocity(&mut self, dx: f64, dy: f64) {
        self.velocity = (dx, dy);
    }

    pub fn advance(&mut self) {
        self.x += self.velocity.0;
        self.y += self.velocity.1;
    }

    pub fn is_at(&self, x: f64, y: f64) -> bool {
        self.x == x && self.y == y
    }

    pub fn vitals(&self) -> Option<&Vitals> {
        self.vitals.as_ref()
    }

    pub fn vitals_mut(&mut self) -> Option<&mut Vitals> {
        self.vitals.as_mut()
    }

    pub fn is_living(&self) -> bool {
        self.vitals.is_some()
    }

    /// Returns false when the entity has no vitals to damage.
    pub fn damage(&mut self, amount: f32) -> bool {
        match &mut self.vitals {
            Some(vitals) => {
                vitals.damage(amount);
                true
            }
            None => false,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.vitals.is_some_and(|vitals| vitals.is_dead())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_bounding_box_matches_position_and_size() {
        let mut entity = Entity::new(EntityId(1), 0.0, 0.0, 16.0, 16.0);
        entity.set_position(12.5, -3.0);
        entity.set_size(20.0, 10.0);
        assert_eq!(*entity.bounding_box(), BoundingBox2D::new(0.0, 0.0, 16.0, 16.0));

        entity.update_bounding_box();
        let bounds = entity.bounding_box();
        assert_eq!(
            (bounds.x(), bounds.y(), bounds.width(), bounds.height()),
            (entity.x(), entity.y(), entity.width(), entity.height())
        );
    }

    #[test]
    fn damage_clamps_health_at_zero() {
        let mut entity =
            Entity::new_living(EntityId(2), 0.0, 0.0, 8.0, 8.0, Vitals::new(10.0, 1.5));
        assert!(entity.damage(15.0));
        let vitals = entity.vitals().expect("vitals");
        assert_eq!(vitals.health(), 0.0);
        assert!(vitals.is_dead());
        assert!(entity.is_dead());
    }

    #[test]
    fn partial_damage_keeps_entity_alive() {
        let mut vitals = Vitals::new(10.0, 1.0);
        vitals.damage(4.0);
        assert_eq!(vitals.health(), 6.0);
        assert!(!vitals.is_dead());
    }

    #[test]
    fn non_living_entity_ignores_damage() {
        let mut entity = Entity::new(EntityId(3), 0.0, 0.0, 8.0, 8.0);
        assert!(!entity.damage(5.0));
        assert!(!entity.is_dead());
    }

    #[test]
    fn movement_speed_scales_multiplicatively() {
        let mut vitals = Vitals::new(5.0, 2.0);
        vitals.scale_movement_speed(0.5);
        vitals.scale_movement_speed(3.0);
        assert!((vitals.movement_speed() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn advance_moves_by_velocity_without_touching_bounds() {
        let mut entity = Entity::new(EntityId(4), 1.0, 1.0, 2.0, 2.0);
        entity.set_velocity(0.5, -1.0);
        entity.advance();
        assert!(entity.is_at(1.5, 0.0));
        assert_eq!(*entity.bounding_box(), BoundingBox2D::new(1.0, 1.0, 2.0, 2.0));
    }
}
