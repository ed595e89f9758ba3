use tilestep::{BoundingBox2D, DrawSurface, GameState, InputHandle, RegionId, TextureHandle};
use tracing::info;

use super::{lock_hud, SharedHud};
use crate::app::textures::HudTextures;

pub(crate) const HUD_REGION: RegionId = RegionId(1);

const PANEL_X: f64 = 8.0;
const PANEL_Y: f64 = 8.0;
const PANEL_WIDTH: f64 = 132.0;
const PANEL_HEIGHT: f64 = 14.0;
const BAR_INSET: f64 = 2.0;
const HOVER_STRIP_HEIGHT: f64 = 2.0;
const SLIME_ICON_PX: f64 = 10.0;
const SLIME_ICON_GAP: f64 = 2.0;

pub(crate) fn hud_panel() -> BoundingBox2D {
    BoundingBox2D::new(PANEL_X, PANEL_Y, PANEL_WIDTH, PANEL_HEIGHT)
}

/// Maps a cursor position to the clickable region under it.
pub(crate) fn region_at(x: f64, y: f64) -> Option<RegionId> {
    hud_panel().contains(x, y).then_some(HUD_REGION)
}

/// Health bar and slime counter drawn over the playfield. Clicking the bar
/// toggles pause.
pub(crate) struct HudState {
    hud: SharedHud,
    input: InputHandle,
    textures: HudTextures,
    slime_icon: TextureHandle,
    was_mouse_down: bool,
}

impl HudState {
    pub(crate) fn new(
        textures: HudTextures,
        slime_icon: TextureHandle,
        input: InputHandle,
        hud: SharedHud,
    ) -> Self {
        Self {
            hud,
            input,
            textures,
            slime_icon,
            was_mouse_down: false,
        }
    }
}

impl GameState for HudState {
    fn on_tick(&mut self) {
        let input = self.input.snapshot();
        let pressed = input.is_mouse_down() && !self.was_mouse_down;
        self.was_mouse_down = input.is_mouse_down();
        if !pressed {
            return;
        }
        let on_panel = input
            .last_click()
            .is_some_and(|click| region_at(click.x, click.y) == Some(HUD_REGION));
        if on_panel {
            let mut hud = lock_hud(&self.hud);
            hud.paused = !hud.paused;
            info!(paused = hud.paused, "playfield_pause_toggled");
        }
    }

    fn on_draw(&mut self, surface: &mut dyn DrawSurface) {
        let model = *lock_hud(&self.hud);
        let panel = hud_panel();
        surface.draw_image(
            self.textures.back,
            panel.x(),
            panel.y(),
            panel.width(),
            panel.height(),
            false,
        );

        let ratio = if model.max_health > 0.0 {
            (model.health / model.max_health).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let bar_width = (panel.width() - BAR_INSET * 2.0) * f64::from(ratio);
        if bar_width >= 1.0 {
            surface.draw_image(
                self.textures.fill,
                panel.x() + BAR_INSET,
                panel.y() + BAR_INSET,
                bar_width,
                panel.height() - BAR_INSET * 2.0,
                false,
            );
        }

        if self.input.entered_region() == Some(HUD_REGION) || model.paused {
            surface.draw_image(
                self.textures.hover,
                panel.x(),
                panel.bottom(),
                panel.width(),
                HOVER_STRIP_HEIGHT,
                false,
            );
        }

        let icons_y = panel.bottom() + HOVER_STRIP_HEIGHT + SLIME_ICON_GAP;
        for index in 0..model.slimes {
            surface.draw_image(
                self.slime_icon,
                panel.x() + index as f64 * (SLIME_ICON_PX + SLIME_ICON_GAP),
                icons_y,
                SLIME_ICON_PX,
                SLIME_ICON_PX,
                false,
            );
        }
    }

    fn name(&self) -> &str {
        "hud"
    }
}
