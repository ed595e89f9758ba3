use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use super::DrawSurface;

static STATE_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_state_lock_poison_once(state: &str) {
    if STATE_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(state, "game state lock poisoned; recovered inner value");
    }
}

/// One layer of game logic driven by the loop.
pub trait GameState {
    fn on_tick(&mut self);

    fn on_draw(&mut self, surface: &mut dyn DrawSurface);

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

pub type SharedState = Arc<Mutex<dyn GameState + Send>>;

pub fn shared_state<S>(state: S) -> SharedState
where
    S: GameState + Send + 'static,
{
    Arc::new(Mutex::new(state))
}

fn lock_state(state: &SharedState) -> MutexGuard<'_, dyn GameState + Send + 'static> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            let guard = poisoned.into_inner();
            warn_state_lock_poison_once(guard.name());
            guard
        }
    }
}

/// Ordered set of game states. Every state is ticked and drawn each frame,
/// in push order.
#[derive(Default)]
pub struct GameStateStack {
    states: Vec<SharedState>,
}

impl std::fmt::Debug for GameStateStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStateStack")
            .field("len", &self.states.len())
            .finish()
    }
}

impl GameStateStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a state that is already on the stack (same allocation).
    pub fn push(&mut self, state: SharedState) -> bool {
        if self.contains(&state) {
            let guard = lock_state(&state);
            warn!(state = guard.name(), "state_push_rejected");
            return false;
        }
        debug!(
            state = lock_state(&state).name(),
            depth = self.states.len() + 1,
            "state_pushed"
        );
        self.states.push(state);
        true
    }

    pub fn remove(&mut self, state: &SharedState) -> bool {
        let before = self.states.len();
        self.states.retain(|candidate| !Arc::ptr_eq(candidate, state));
        self.states.len() != before
    }

    pub fn contains(&self, state: &SharedState) -> bool {
        self.states
            .iter()
            .any(|candidate| Arc::ptr_eq(candidate, state))
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn tick(&self) {
        for state in &self.states {
            lock_state(state).on_tick();
        }
    }

    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        for state in &self.states {
            lock_state(state).on_draw(surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::RecordingSurface;
    use crate::sprites::TextureHandle;

    struct Probe {
        label: u32,
        log: Arc<Mutex<Vec<(u32, &'static str)>>>,
    }

    impl GameState for Probe {
        fn on_tick(&mut self) {
            self.log.lock().expect("log").push((self.label, "tick"));
        }

        fn on_draw(&mut self, surface: &mut dyn DrawSurface) {
            self.log.lock().expect("log").push((self.label, "draw"));
            surface.draw_image(TextureHandle::new(self.label), 0.0, 0.0, 1.0, 1.0, false);
        }

        fn name(&self) -> &str {
            "probe"
        }
    }

    fn probe(label: u32, log: &Arc<Mutex<Vec<(u32, &'static str)>>>) -> SharedState {
        shared_state(Probe {
            label,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn duplicate_push_leaves_length_unchanged() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = GameStateStack::new();
        let state = probe(1, &log);

        assert!(stack.push(Arc::clone(&state)));
        assert!(!stack.push(Arc::clone(&state)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn equal_but_distinct_states_are_both_accepted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = GameStateStack::new();
        assert!(stack.push(probe(1, &log)));
        assert!(stack.push(probe(1, &log)));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn tick_and_draw_run_in_push_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = GameStateStack::new();
        stack.push(probe(1, &log));
        stack.push(probe(2, &log));

        let mut surface = RecordingSurface::new(8, 8);
        stack.tick();
        stack.draw(&mut surface);

        let entries = log.lock().expect("log").clone();
        assert_eq!(entries, vec![(1, "tick"), (2, "tick"), (1, "draw"), (2, "draw")]);
        assert_eq!(surface.draws.len(), 2);
    }

    #[test]
    fn remove_and_clear() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = GameStateStack::new();
        let first = probe(1, &log);
        stack.push(Arc::clone(&first));
        stack.push(probe(2, &log));

        assert!(stack.remove(&first));
        assert!(!stack.remove(&first));
        assert_eq!(stack.len(), 1);

        stack.clear();
        assert!(stack.is_empty());
    }

    #[test]
    fn default_name_is_type_name() {
        struct Quiet;
        impl GameState for Quiet {
            fn on_tick(&mut self) {}
            fn on_draw(&mut self, _surface: &mut dyn DrawSurface) {}
        }
        assert!(Quiet.name().ends_with("Quiet"));
    }
}
