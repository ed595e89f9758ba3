use std::sync::{Arc, Mutex, MutexGuard};

use tilestep::{shared_state, InputHandle, SharedState};

use super::textures::DemoTextures;

mod hud;
mod playfield;

pub(crate) use hud::region_at;
use hud::HudState;
use playfield::PlayfieldState;

/// What the playfield publishes for the overlay each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct HudModel {
    pub health: f32,
    pub max_health: f32,
    pub slimes: usize,
    pub respawns: u32,
    pub paused: bool,
}

pub(crate) type SharedHud = Arc<Mutex<HudModel>>;

pub(crate) fn lock_hud(hud: &SharedHud) -> MutexGuard<'_, HudModel> {
    match hud.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Builds the demo's states in draw order: playfield below, HUD on top.
pub(crate) fn build_states(
    textures: &DemoTextures,
    input: &InputHandle,
    interpolate: bool,
) -> Vec<SharedState> {
    let hud: SharedHud = Arc::new(Mutex::new(HudModel::default()));
    let mut playfield = PlayfieldState::new(
        &textures.terrain,
        textures.actors,
        input.clone(),
        Arc::clone(&hud),
    );
    playfield.world_mut().renderer_mut().interpolate = interpolate;
    let overlay = HudState::new(textures.hud, textures.actors.slime, input.clone(), hud);
    vec![shared_state(playfield), shared_state(overlay)]
}
