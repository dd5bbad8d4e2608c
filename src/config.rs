//! Session configuration.
//!
//! `SessionConfig` bundles everything a `Session` needs to know up front: the
//! grid size, the animation pacing (`Timings`) and the two safety caps (initial
//! grid regeneration attempts and steps per `run_until_idle` call). The board
//! constants that rendering layers rely on live in `engine`.

use crate::engine::DEFAULT_GRID_SIZE;

/// Delays, in milliseconds, between the scheduled steps of a swap or cascade.
///
/// These exist purely to pace animation. The orchestrator never depends on a
/// particular value; `Timings::instant()` runs every continuation back to back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    /// From swap commit to the first match check.
    pub swap_ms: u64,
    /// From a failed match check to showing the reversed swap hint.
    pub revert_prep_ms: u64,
    /// How long the reversed hint is shown before the tokens swap back.
    pub hint_frame_ms: u64,
    /// From swapping back to unlocking input.
    pub revert_ms: u64,
    /// Clear -> gravity, gravity -> refill and refill -> next pass.
    pub cascade_step_ms: u64,
}

impl Timings {
    /// Zero delays everywhere. Used by simulations and tests that only care
    /// about the resulting board.
    pub const fn instant() -> Self {
        Timings {
            swap_ms: 0,
            revert_prep_ms: 0,
            hint_frame_ms: 0,
            revert_ms: 0,
            cascade_step_ms: 0,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            swap_ms: 300,
            revert_prep_ms: 10,
            hint_frame_ms: 32, // two frames at 60Hz
            revert_ms: 200,
            cascade_step_ms: 300,
        }
    }
}

/// Configuration for a single game session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Width and height of the square grid.
    pub grid_size: usize,
    pub timings: Timings,
    /// Full-grid rerolls tried before `build_initial_grid` switches to the
    /// constructive fill.
    pub max_generation_attempts: usize,
    /// Upper bound on continuations executed by one `Session::run_until_idle`.
    pub max_steps_per_run: usize,
}

impl SessionConfig {
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            grid_size: DEFAULT_GRID_SIZE,
            timings: Timings::default(),
            max_generation_attempts: 1000,
            max_steps_per_run: 10_000,
        }
    }
}
