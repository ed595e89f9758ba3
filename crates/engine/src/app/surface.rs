use thiserror::Error;

use crate::sprites::TextureHandle;
use crate::world::BoundingBox;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("draw surface backend failed: {0}")]
    Backend(String),
}

/// Host-provided drawing target.
///
/// A frame is `clear`, any number of `draw_image` calls, then `present`.
pub trait DrawSurface {
    fn clear(&mut self, region: BoundingBox);

    fn draw_image(
        &mut self,
        texture: TextureHandle,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        interpolate: bool,
    );

    fn present(&mut self) -> Result<(), SurfaceError>;

    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    fn full_region(&self) -> BoundingBox {
        let (width, height) = self.size();
        BoundingBox::new(
            0,
            0,
            width.min(i32::MAX as u32) as i32,
            height.min(i32::MAX as u32) as i32,
        )
    }
}

/// Lets the scheduling thread ask the host to draw on the host's own thread.
pub trait RedrawRequester: Send {
    fn request_redraw(&self);
}
