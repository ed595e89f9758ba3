/// Axis-aligned rectangle in world units.
///
/// Edges follow the half-open convention: the left/top edges belong to the
/// rectangle, the right/bottom edges do not. Rectangles with a non-positive
/// width or height are empty; they contain no point and intersect nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox2D {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl BoundingBox2D {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn set(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
    }

    /// Moves the rectangle, keeping its size.
    pub fn set_origin(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn does_intersect(&self, other: &BoundingBox2D) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.right() > self.x
            && other.bottom() > self.y
            && other.x < self.right()
            && other.y < self.bottom()
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }

    pub fn intersection(&self, other: &BoundingBox2D) -> Option<BoundingBox2D> {
        if !self.does_intersect(other) {
            return None;
        }
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Some(BoundingBox2D::new(left, top, right - left, bottom - top))
    }
}

/// Integer counterpart of [`BoundingBox2D`], used for screen-space regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn set(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn does_intersect(&self, other: &BoundingBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.right() > self.x as i64
            && other.bottom() > self.y as i64
            && (other.x as i64) < self.right()
            && (other.y as i64) < self.bottom()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && (x as i64) < self.right() && (y as i64) < self.bottom()
    }

    pub fn to_2d(&self) -> BoundingBox2D {
        BoundingBox2D::new(
            self.x as f64,
            self.y as f64,
            self.width as f64,
            self.height as f64,
        )
    }
}
