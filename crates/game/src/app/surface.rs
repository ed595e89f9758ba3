use std::collections::HashMap;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use pixels::{Error, Pixels, SurfaceTexture};
use tilestep::{BoundingBox, DrawSurface, SurfaceError, TextureAtlas, TextureHandle};
use tracing::warn;
use winit::window::Window;

const CLEAR_COLOR: [u8; 4] = [20, 22, 28, 255];

type ScaledKey = (TextureHandle, u32, u32, bool);

/// Software-composited [`DrawSurface`] presented through `pixels`.
pub(crate) struct PixelsSurface {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
    sprites: SpriteCache,
}

impl PixelsSurface {
    pub(crate) fn new(
        window: Arc<Window>,
        atlas: TextureAtlas,
        images: HashMap<String, RgbaImage>,
    ) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
            sprites: SpriteCache::new(atlas, images),
        })
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width.max(1), height.max(1), surface)
    }
}

impl DrawSurface for PixelsSurface {
    fn clear(&mut self, region: BoundingBox) {
        fill_region(
            self.pixels.frame_mut(),
            self.width,
            self.height,
            region,
            CLEAR_COLOR,
        );
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
        let target_w = width.round().max(0.0) as u32;
        let target_h = height.round().max(0.0) as u32;
        let Some(sprite) = self.sprites.scaled(texture, target_w, target_h, interpolate) else {
            return;
        };
        blit_rgba(
            self.pixels.frame_mut(),
            self.width,
            self.height,
            sprite,
            x.round() as i32,
            y.round() as i32,
        );
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        self.pixels
            .render()
            .map_err(|err| SurfaceError::Backend(err.to_string()))
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Crops atlas regions out of their sheets and keeps one scaled copy per
/// requested size.
pub(crate) struct SpriteCache {
    atlas: TextureAtlas,
    images: HashMap<String, RgbaImage>,
    scaled: HashMap<ScaledKey, Option<RgbaImage>>,
}

impl SpriteCache {
    pub(crate) fn new(atlas: TextureAtlas, images: HashMap<String, RgbaImage>) -> Self {
        Self {
            atlas,
            images,
            scaled: HashMap::new(),
        }
    }

    pub(crate) fn scaled(
        &mut self,
        texture: TextureHandle,
        width: u32,
        height: u32,
        interpolate: bool,
    ) -> Option<&RgbaImage> {
        if width == 0 || height == 0 {
            return None;
        }
        let atlas = &self.atlas;
        let images = &self.images;
        self.scaled
            .entry((texture, width, height, interpolate))
            .or_insert_with(|| build_scaled(atlas, images, texture, width, height, interpolate))
            .as_ref()
    }
}

fn build_scaled(
    atlas: &TextureAtlas,
    images: &HashMap<String, RgbaImage>,
    texture: TextureHandle,
    width: u32,
    height: u32,
    interpolate: bool,
) -> Option<RgbaImage> {
    let Some(region) = atlas.region(texture) else {
        warn!(texture = texture.index(), "sprite_region_missing");
        return None;
    };
    let Some(sheet) = images.get(&region.image) else {
        warn!(image = region.image.as_str(), "sprite_image_missing");
        return None;
    };
    let rect = region.rect;
    let cropped = imageops::crop_imm(
        sheet,
        rect.x().max(0) as u32,
        rect.y().max(0) as u32,
        rect.width().max(0) as u32,
        rect.height().max(0) as u32,
    )
    .to_image();
    if cropped.width() == width && cropped.height() == height {
        return Some(cropped);
    }
    let filter = if interpolate {
        FilterType::Triangle
    } else {
        FilterType::Nearest
    };
    Some(imageops::resize(&cropped, width, height, filter))
}

pub(crate) fn fill_region(
    frame: &mut [u8],
    width: u32,
    height: u32,
    region: BoundingBox,
    color: [u8; 4],
) {
    let left = region.x().clamp(0, width as i32) as usize;
    let top = region.y().clamp(0, height as i32) as usize;
    let right = region.right().clamp(0, width as i64) as usize;
    let bottom = region.bottom().clamp(0, height as i64) as usize;
    for row in top..bottom {
        let row_offset = row * width as usize * 4;
        for col in left..right {
            let offset = row_offset + col * 4;
            if let Some(pixel) = frame.get_mut(offset..offset + 4) {
                pixel.copy_from_slice(&color);
            }
        }
    }
}

/// Copies `sprite` with its top-left corner at `(left, top)`, clipping to the
/// frame and skipping fully transparent pixels.
pub(crate) fn blit_rgba(
    frame: &mut [u8],
    width: u32,
    height: u32,
    sprite: &RgbaImage,
    left: i32,
    top: i32,
) {
    let right = left.saturating_add(sprite.width() as i32);
    let bottom = top.saturating_add(sprite.height() as i32);
    let draw_left = left.max(0);
    let draw_top = top.max(0);
    let draw_right = right.min(width as i32);
    let draw_bottom = bottom.min(height as i32);
    if draw_left >= draw_right || draw_top >= draw_bottom {
        return;
    }

    let frame_width = width as usize;
    for out_y in draw_top..draw_bottom {
        let src_y = (out_y - top) as u32;
        let dst_row_offset = out_y as usize * frame_width * 4;
        for out_x in draw_left..draw_right {
            let src = sprite.get_pixel((out_x - left) as u32, src_y).0;
            if src[3] == 0 {
                continue;
            }
            let dst_offset = dst_row_offset + out_x as usize * 4;
            if let Some(pixel) = frame.get_mut(dst_offset..dst_offset + 4) {
                pixel.copy_from_slice(&src);
            }
        }
    }
}
