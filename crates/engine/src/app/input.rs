use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static INPUT_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_input_lock_poison_once(operation: &'static str) {
    if INPUT_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "input lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Primary,
    Quit,
}

const ACTION_COUNT: usize = 6;

impl InputAction {
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveUp,
        InputAction::MoveDown,
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::Primary,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Primary => 4,
            InputAction::Quit => 5,
        }
    }
}

/// Host-defined id for a hot region of the surface (a button, a panel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickPoint {
    pub x: f64,
    pub y: f64,
}

/// Polled input as last reported by the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pressed_at: [Option<Instant>; ACTION_COUNT],
    last_click: Option<ClickPoint>,
    mouse_down: bool,
    entered_region: Option<RegionId>,
}

impl InputState {
    pub fn is_down(&self, action: InputAction) -> bool {
        self.pressed_at[action.index()].is_some()
    }

    /// Zero while the action is up.
    pub fn down_duration_at(&self, action: InputAction, now: Instant) -> Duration {
        self.pressed_at[action.index()]
            .map_or(Duration::ZERO, |pressed| now.saturating_duration_since(pressed))
    }

    pub fn down_duration(&self, action: InputAction) -> Duration {
        self.down_duration_at(action, Instant::now())
    }

    pub fn last_click(&self) -> Option<ClickPoint> {
        self.last_click
    }

    pub fn is_mouse_down(&self) -> bool {
        self.mouse_down
    }

    pub fn entered_region(&self) -> Option<RegionId> {
        self.entered_region
    }

    /// Repeated presses keep the original press instant.
    pub fn set_down(&mut self, action: InputAction, is_down: bool, now: Instant) {
        let slot = &mut self.pressed_at[action.index()];
        match (is_down, slot.is_some()) {
            (true, false) => *slot = Some(now),
            (false, _) => *slot = None,
            (true, true) => {}
        }
    }

    pub fn record_click(&mut self, x: f64, y: f64) {
        self.last_click = Some(ClickPoint { x, y });
    }

    pub fn set_mouse_down(&mut self, mouse_down: bool) {
        self.mouse_down = mouse_down;
    }

    pub fn set_entered_region(&mut self, region: Option<RegionId>) {
        self.entered_region = region;
    }

    pub fn release_all(&mut self) {
        self.pressed_at = [None; ACTION_COUNT];
        self.mouse_down = false;
    }
}

/// Shared input written by the host thread and polled by game states.
#[derive(Clone, Debug, Default)]
pub struct InputHandle {
    state: Arc<RwLock<InputState>>,
}

impl InputHandle {
    pub fn snapshot(&self) -> InputState {
        match self.state.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_input_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub fn update(&self, apply: impl FnOnce(&mut InputState)) {
        match self.state.write() {
            Ok(mut guard) => apply(&mut *guard),
            Err(poisoned) => {
                warn_input_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                apply(&mut *guard);
            }
        }
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.snapshot().is_down(action)
    }

    pub fn down_duration(&self, action: InputAction) -> Duration {
        self.snapshot().down_duration(action)
    }

    pub fn last_click(&self) -> Option<ClickPoint> {
        self.snapshot().last_click()
    }

    pub fn is_mouse_down(&self) -> bool {
        self.snapshot().is_mouse_down()
    }

    pub fn entered_region(&self) -> Option<RegionId> {
        self.snapshot().entered_region()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn down_duration_is_zero_when_up() {
        let state = InputState::default();
        assert_eq!(
            state.down_duration_at(InputAction::MoveLeft, Instant::now()),
            Duration::ZERO
        );
        assert!(!state.is_down(InputAction::MoveLeft));
    }

    #[test]
    fn held_key_keeps_first_press_instant() {
        let base = Instant::now();
        let mut state = InputState::default();
        state.set_down(InputAction::MoveUp, true, base);
        state.set_down(InputAction::MoveUp, true, base + Duration::from_millis(40));

        assert!(state.is_down(InputAction::MoveUp));
        assert_eq!(
            state.down_duration_at(InputAction::MoveUp, base + Duration::from_millis(100)),
            Duration::from_millis(100)
        );

        state.set_down(InputAction::MoveUp, false, base + Duration::from_millis(120));
        assert_eq!(
            state.down_duration_at(InputAction::MoveUp, base + Duration::from_millis(200)),
            Duration::ZERO
        );
    }

    #[test]
    fn actions_are_tracked_independently() {
        let mut state = InputState::default();
        state.set_down(InputAction::MoveRight, true, Instant::now());
        for action in InputAction::ALL {
            assert_eq!(state.is_down(action), action == InputAction::MoveRight);
        }
        state.release_all();
        assert!(InputAction::ALL.iter().all(|action| !state.is_down(*action)));
    }

    #[test]
    fn handle_shares_mouse_state() {
        let handle = InputHandle::default();
        let writer = handle.clone();
        writer.update(|state| {
            state.record_click(12.0, 4.5);
            state.set_mouse_down(true);
            state.set_entered_region(Some(RegionId(3)));
        });

        assert_eq!(handle.last_click(), Some(ClickPoint { x: 12.0, y: 4.5 }));
        assert!(handle.is_mouse_down());
        assert_eq!(handle.entered_region(), Some(RegionId(3)));
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = InputHandle::default();
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = handle.state.write().expect("write guard");
                    panic!("poison input lock");
                })
                .join();
        });

        handle.update(|state| state.set_mouse_down(true));
        assert!(handle.is_mouse_down());
    }
}
