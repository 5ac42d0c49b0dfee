//! Currently displayed hint
//!
//! A hint clears itself after its duration; showing a new hint replaces the
//! old one immediately and disarms the old hint's clear timer.

use crate::timing::Clock;
use crate::types::Hint;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveHint {
    pub hint: Hint,
    pub shown_at_ms: u64,
}

impl ActiveHint {
    fn expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.shown_at_ms) >= self.hint.duration_ms
    }
}

#[derive(Default)]
struct BoardState {
    current: Option<ActiveHint>,
    generation: u64,
    clear_task: Option<JoinHandle<()>>,
}

/// Holder for the single hint on screen
#[derive(Clone)]
pub struct HintBoard {
    state: Arc<Mutex<BoardState>>,
    clock: Arc<dyn Clock>,
}

impl HintBoard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState::default())),
            clock,
        }
    }

    /// Put `hint` on screen, pre-empting whatever is showing
    pub fn show(&self, hint: Hint) {
        let mut state = crate::lock(&self.state);
        state.generation = state.generation.wrapping_add(1);
        if let Some(task) = state.clear_task.take() {
            task.abort();
        }

        log::info!("Showing hint \"{}\" for {} ms", hint.message, hint.duration_ms);
        let duration = Duration::from_millis(hint.duration_ms);
        state.current = Some(ActiveHint {
            hint,
            shown_at_ms: self.clock.now_ms(),
        });

        // Without a runtime the hint still expires lazily in `current`.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let generation = state.generation;
            let board = Arc::clone(&self.state);
            state.clear_task = Some(runtime.spawn(async move {
                tokio::time::sleep(duration).await;
                let mut state = crate::lock(&board);
                if state.generation == generation {
                    state.current = None;
                    state.clear_task = None;
                }
            }));
        }
    }

    /// The hint on screen right now
    pub fn current(&self) -> Option<Hint> {
        self.active().map(|active| active.hint)
    }

    pub fn active(&self) -> Option<ActiveHint> {
        let mut state = crate::lock(&self.state);
        let now = self.clock.now_ms();
        if state.current.as_ref().is_some_and(|active| active.expired(now)) {
            state.current = None;
        }
        state.current.clone()
    }

    pub fn clear(&self) {
        let mut state = crate::lock(&self.state);
        state.generation = state.generation.wrapping_add(1);
        state.current = None;
        if let Some(task) = state.clear_task.take() {
            task.abort();
        }
    }
}
