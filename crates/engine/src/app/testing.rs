use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::sprites::TextureHandle;
use crate::world::BoundingBox;

use super::{DrawSurface, RedrawRequester, SurfaceError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RecordedDraw {
    pub texture: TextureHandle,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub interpolate: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingSurface {
    pub width: u32,
    pub height: u32,
    pub clears: Vec<BoundingBox>,
    pub draws: Vec<RecordedDraw>,
    pub presents: usize,
}

impl RecordingSurface {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

impl DrawSurface for RecordingSurface {
    fn clear(&mut self, region: BoundingBox) {
        self.clears.push(region);
    }

    fn draw_image(
        &mut self,
        texture: TextureHandle,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        interpolate: bool,
    ) {
        self.draws.push(RecordedDraw {
            texture,
            x,
            y,
            width,
            height,
            interpolate,
        });
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        self.presents += 1;
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CountingRequester {
    pub requests: Arc<AtomicUsize>,
}

impl CountingRequester {
    pub(crate) fn count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RedrawRequester for CountingRequester {
    fn request_redraw(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}
