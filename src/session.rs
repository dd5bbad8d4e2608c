//! Game session: the stateful cascade orchestrator.
//!
//! A `Session` owns the live grid, the selection, score, move count and the
//! animation state a renderer needs. It reacts to two commands, `select` and
//! `reset`, and otherwise moves forward only through its own scheduled
//! `Step`s. Steps are plain data queued on a `Scheduler`; the session runs them
//! when the clock is advanced, one at a time, on the caller's thread.
//!
//! A swap plays out like this:
//!
//! 1. Two adjacent positions are selected: the tokens swap, input locks and a
//!    `ResolveSwap` step is queued.
//! 2. `ResolveSwap` looks for matches. If there are none the swap is animated
//!    back (`PrepareRevert` -> `ApplyRevert` -> `FinishRevert`).
//! 3. Otherwise each cascade pass clears the matches, then `Gravity`, `Refill`
//!    and `NextPass` follow one another until a pass finds nothing to clear.
use crate::config::SessionConfig;
use crate::engine::{
    are_positions_adjacent, build_initial_grid, Grid, Position, TokenSource, SCORE_PER_TOKEN,
};
use crate::error::SessionError;
use crate::scheduler::{Scheduler, VirtualScheduler};
use log::{debug, info};

/// Where a session is in its input/animation cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for a first selection.
    Idle,
    /// One position chosen, waiting for a second.
    AwaitingSelection,
    /// A user swap is animating.
    Swapping,
    /// Cascade loop in progress.
    Resolving,
    /// A swap without matches is being undone.
    Reverting,
}

impl Phase {
    /// Returns true if `select` is honoured in this phase.
    pub fn accepts_input(self) -> bool {
        matches!(self, Phase::Idle | Phase::AwaitingSelection)
    }
}

/// What a call to `Session::select` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Input is locked by an animation; nothing changed.
    Ignored,
    /// The position is now the current selection.
    Selected,
    /// The current selection was clicked again and cleared.
    Deselected,
    /// The position was adjacent to the selection and a swap began.
    SwapStarted,
}

/// Which side a token slides in from during a swap animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwapDirection {
    FromLeft,
    FromRight,
    FromTop,
    FromBottom,
}

/// The two positions involved in the swap currently being animated.
///
/// Carries no gameplay meaning; it only tells a renderer which way to slide
/// each token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SwapHint {
    pub first: Position,
    pub second: Position,
}

impl SwapHint {
    /// The direction hint for the token at `position`, which is the side the
    /// other half of the swap lies on. `None` for cells outside the swap or
    /// for pairs that are not adjacent.
    pub fn direction_at(&self, position: Position) -> Option<SwapDirection> {
        let other = if position == self.first {
            self.second
        } else if position == self.second {
            self.first
        } else {
            return None;
        };
        if !are_positions_adjacent(position, other) {
            return None;
        }
        if other.row == position.row {
            if other.col > position.col {
                Some(SwapDirection::FromRight)
            } else {
                Some(SwapDirection::FromLeft)
            }
        } else if other.row > position.row {
            Some(SwapDirection::FromBottom)
        } else {
            Some(SwapDirection::FromTop)
        }
    }

    fn reversed(self) -> SwapHint {
        SwapHint {
            first: self.second,
            second: self.first,
        }
    }
}

/// How the most recent committed swap played out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CascadeStats {
    /// Cascade passes that cleared something. 0 for a reverted swap.
    pub passes: u32,
    /// Tokens cleared over all passes.
    pub cleared: usize,
}

/// A scheduled continuation of the session.
///
/// Cascade steps carry the grid they operate on, so a step always works on
/// the board produced by the step before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    ResolveSwap { first: Position, second: Position },
    PrepareRevert { first: Position, second: Position },
    ApplyRevert { first: Position, second: Position },
    FinishRevert,
    /// Matches have been removed from this grid; let the rest fall.
    Gravity(Grid),
    /// Tokens have settled in this grid; fill the holes.
    Refill(Grid),
    /// This grid is full again; look for new matches.
    NextPass(Grid),
}

/// Read-only view of everything a renderer needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub grid: Grid,
    pub selection: Option<Position>,
    pub score: u32,
    pub moves: u32,
    pub phase: Phase,
    /// Positions playing the clear ("pop") animation.
    pub clearing: Vec<Position>,
    /// Positions playing the fall or fill animation.
    pub falling: Vec<Position>,
    pub swap_hint: Option<SwapHint>,
    pub last_cascade: CascadeStats,
}

impl Snapshot {
    /// Returns true if input was locked when the snapshot was taken.
    pub fn is_animating(&self) -> bool {
        !self.phase.accepts_input()
    }

    /// Swap direction hint for one cell, see `SwapHint::direction_at`.
    pub fn swap_direction_at(&self, position: Position) -> Option<SwapDirection> {
        self.swap_hint.and_then(|hint| hint.direction_at(position))
    }
}

/// A single game of match-3.
///
/// # Examples
/// ```
/// use match3_engine::config::SessionConfig;
/// use match3_engine::engine::Position;
/// use match3_engine::session::{Phase, SelectOutcome, Session};
///
/// let mut session = Session::with_seed(SessionConfig::default(), 7);
/// assert!(!session.grid().has_any_match());
///
/// let outcome = session.select(Position::new(0, 0)).unwrap();
/// assert_eq!(outcome, SelectOutcome::Selected);
/// session.select(Position::new(0, 1)).unwrap();
/// assert_eq!(session.moves(), 1);
///
/// session.run_until_idle().unwrap();
/// assert_eq!(session.phase(), Phase::Idle);
/// assert!(!session.grid().has_any_match());
/// ```
pub struct Session<S: Scheduler<Step> = VirtualScheduler<Step>> {
    config: SessionConfig,
    source: TokenSource,
    scheduler: S,
    grid: Grid,
    selection: Option<Position>,
    score: u32,
    moves: u32,
    phase: Phase,
    clearing: Vec<Position>,
    falling: Vec<Position>,
    swap_hint: Option<SwapHint>,
    last_cascade: CascadeStats,
}

impl Session<VirtualScheduler<Step>> {
    /// Creates a session with an entropy-seeded board.
    pub fn new(config: SessionConfig) -> Self {
        Session::with_scheduler(config, TokenSource::from_entropy(), VirtualScheduler::new())
    }

    /// Creates a reproducible session: the same seed gives the same boards
    /// and refills for the same sequence of commands.
    pub fn with_seed(config: SessionConfig, seed: u64) -> Self {
        Session::with_scheduler(config, TokenSource::with_seed(seed), VirtualScheduler::new())
    }

    /// Starts a session on a prepared grid instead of a generated one.
    ///
    /// The grid is used as given, matches included; `config.grid_size` is
    /// replaced by the grid's own size. Refills draw from `seed`.
    pub fn with_grid(config: SessionConfig, grid: Grid, seed: u64) -> Self {
        let mut source = TokenSource::with_seed(seed);
        source.reserve_ids_past(&grid);
        Session::from_parts(
            config.with_grid_size(grid.size()),
            source,
            VirtualScheduler::new(),
            grid,
        )
    }
}

impl<S: Scheduler<Step>> Session<S> {
    /// Creates a session driven by a caller-supplied scheduler.
    pub fn with_scheduler(config: SessionConfig, mut source: TokenSource, scheduler: S) -> Self {
        let grid = build_initial_grid(
            config.grid_size,
            &mut source,
            config.max_generation_attempts,
        );
        Session::from_parts(config, source, scheduler, grid)
    }

    fn from_parts(config: SessionConfig, source: TokenSource, scheduler: S, grid: Grid) -> Self {
        Session {
            config,
            source,
            scheduler,
            grid,
            selection: None,
            score: 0,
            moves: 0,
            phase: Phase::Idle,
            clearing: Vec::new(),
            falling: Vec::new(),
            swap_hint: None,
            last_cascade: CascadeStats::default(),
        }
    }

    /// The configuration this session runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The currently published grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The position waiting for a swap partner, if any.
    pub fn selection(&self) -> Option<Position> {
        self.selection
    }

    /// Returns the current score.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Returns the number of swaps committed since the last reset.
    pub fn moves(&self) -> u32 {
        self.moves
    }

    /// Returns the current input/animation phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true while input is locked.
    pub fn is_animating(&self) -> bool {
        !self.phase.accepts_input()
    }

    /// Positions currently playing the clear animation.
    pub fn clearing(&self) -> &[Position] {
        &self.clearing
    }

    /// Positions currently playing the fall or fill animation.
    pub fn falling(&self) -> &[Position] {
        &self.falling
    }

    /// The swap being animated, for directional hints.
    pub fn swap_hint(&self) -> Option<SwapHint> {
        self.swap_hint
    }

    /// How the most recent swap played out.
    pub fn last_cascade(&self) -> CascadeStats {
        self.last_cascade
    }

    /// Continuations waiting to run.
    pub fn pending_steps(&self) -> usize {
        self.scheduler.pending()
    }

    /// Milliseconds until the next continuation is due, if any is pending.
    pub fn next_due_in(&self) -> Option<u64> {
        self.scheduler.next_due_in()
    }

    /// Current value of the session clock.
    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    /// Copies out everything a renderer needs for one frame.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: self.grid.clone(),
            selection: self.selection,
            score: self.score,
            moves: self.moves,
            phase: self.phase,
            clearing: self.clearing.clone(),
            falling: self.falling.clone(),
            swap_hint: self.swap_hint,
            last_cascade: self.last_cascade,
        }
    }

    /// Handles the user picking the cell at `position`.
    ///
    /// - Positions off the grid are rejected with `SessionError::OutOfBounds`.
    /// - While an animation holds the input lock the call is ignored.
    /// - With no selection, `position` becomes the selection.
    /// - Picking the selected cell again clears the selection.
    /// - A non-adjacent cell replaces the selection.
    /// - An adjacent cell commits a swap: the move counter goes up, the tokens
    ///   swap, input locks, and the match check is scheduled.
    pub fn select(&mut self, position: Position) -> Result<SelectOutcome, SessionError> {
        if !self.grid.contains(position) {
            return Err(SessionError::OutOfBounds {
                row: position.row,
                col: position.col,
                size: self.grid.size(),
            });
        }

        if !self.phase.accepts_input() {
            debug!("Ignoring selection {} while {:?}", position, self.phase);
            return Ok(SelectOutcome::Ignored);
        }

        let Some(selected) = self.selection else {
            self.selection = Some(position);
            self.phase = Phase::AwaitingSelection;
            return Ok(SelectOutcome::Selected);
        };

        if selected == position {
            self.selection = None;
            self.phase = Phase::Idle;
            return Ok(SelectOutcome::Deselected);
        }

        if !are_positions_adjacent(selected, position) {
            self.selection = Some(position);
            return Ok(SelectOutcome::Selected);
        }

        self.moves += 1;
        self.swap_hint = Some(SwapHint {
            first: selected,
            second: position,
        });
        self.grid = self.grid.swap_tokens(selected, position);
        self.selection = None;
        self.phase = Phase::Swapping;
        self.last_cascade = CascadeStats::default();
        info!("Move {}: swapping {} and {}", self.moves, selected, position);

        self.schedule(
            self.config.timings.swap_ms,
            Step::ResolveSwap {
                first: selected,
                second: position,
            },
        );
        Ok(SelectOutcome::SwapStarted)
    }

    /// `select` by row and column.
    pub fn select_cell(&mut self, row: usize, col: usize) -> Result<SelectOutcome, SessionError> {
        self.select(Position::new(row, col))
    }

    /// Starts a new game from any phase.
    ///
    /// Every pending continuation is cancelled first, so nothing from the old
    /// game can touch the new one. Points earned by an unfinished cascade are
    /// discarded along with everything else.
    pub fn reset(&mut self) {
        self.scheduler.cancel_all();
        self.grid = build_initial_grid(
            self.config.grid_size,
            &mut self.source,
            self.config.max_generation_attempts,
        );
        self.selection = None;
        self.score = 0;
        self.moves = 0;
        self.phase = Phase::Idle;
        self.clearing.clear();
        self.falling.clear();
        self.swap_hint = None;
        self.last_cascade = CascadeStats::default();
        info!("Session reset");
    }

    /// Moves the clock forward by `elapsed_ms`, running every continuation
    /// that falls due on the way, in due order. Continuations scheduled along
    /// the way also run if they fall inside the window.
    ///
    /// # Returns
    /// The number of continuations executed.
    pub fn advance(&mut self, elapsed_ms: u64) -> usize {
        let until = self.scheduler.now_ms().saturating_add(elapsed_ms);
        let mut executed = 0;
        while let Some(step) = self.scheduler.pop_due(until) {
            self.run_step(step);
            executed += 1;
        }
        self.scheduler.advance_to(until);
        executed
    }

    /// Runs continuations until none are left, jumping the clock from one
    /// due time to the next.
    ///
    /// # Returns
    /// * `Ok(n)` with the number of continuations executed.
    /// * `Err(SessionError::CascadeLimit)` if `max_steps_per_run` continuations
    ///   ran and more are still pending.
    pub fn run_until_idle(&mut self) -> Result<usize, SessionError> {
        let limit = self.config.max_steps_per_run;
        let mut executed = 0;
        while let Some(due_in) = self.scheduler.next_due_in() {
            if executed >= limit {
                return Err(SessionError::CascadeLimit { steps: executed });
            }
            let until = self.scheduler.now_ms().saturating_add(due_in);
            if let Some(step) = self.scheduler.pop_due(until) {
                self.run_step(step);
                executed += 1;
            }
        }
        Ok(executed)
    }

    fn schedule(&mut self, delay_ms: u64, step: Step) {
        debug!("Scheduling {} in {}ms", step_name(&step), delay_ms);
        self.scheduler.schedule_after(delay_ms, step);
    }

    fn run_step(&mut self, step: Step) {
        debug!("Running {} at {}ms", step_name(&step), self.scheduler.now_ms());
        match step {
            Step::ResolveSwap { first, second } => self.check_swap(first, second),
            Step::PrepareRevert { first, second } => {
                self.swap_hint = Some(SwapHint { first, second }.reversed());
                self.schedule(
                    self.config.timings.hint_frame_ms,
                    Step::ApplyRevert { first, second },
                );
            }
            Step::ApplyRevert { first, second } => {
                self.grid = self.grid.swap_tokens(first, second);
                self.schedule(self.config.timings.revert_ms, Step::FinishRevert);
            }
            Step::FinishRevert => {
                self.swap_hint = None;
                self.phase = Phase::Idle;
                debug!("Swap reverted");
            }
            Step::Gravity(cleared) => self.settle(cleared),
            Step::Refill(settled) => self.refill(settled),
            Step::NextPass(filled) => {
                self.falling.clear();
                self.resolve(filled);
            }
        }
    }

    /// First match check after a user swap. Without a match the swap is
    /// scheduled to be undone and input stays locked until it is.
    fn check_swap(&mut self, first: Position, second: Position) {
        let swapped = self.grid.clone();
        let matched = self.resolve(swapped);
        self.swap_hint = None;
        if !matched {
            self.phase = Phase::Reverting;
            debug!("Swap of {} and {} made no match, reverting", first, second);
            self.schedule(
                self.config.timings.revert_prep_ms,
                Step::PrepareRevert { first, second },
            );
        }
    }

    /// One cascade pass over `grid`.
    ///
    /// # Returns
    /// `true` if matches were found and clearing has started, `false` if the
    /// grid is stable (the session is then back to `Idle`).
    fn resolve(&mut self, grid: Grid) -> bool {
        let matches = grid.find_all_matched_positions();
        if matches.is_empty() {
            self.phase = Phase::Idle;
            if self.last_cascade.passes > 0 {
                info!(
                    "Cascade settled after {} pass(es), {} token(s) cleared, score {}",
                    self.last_cascade.passes, self.last_cascade.cleared, self.score
                );
            }
            return false;
        }

        self.phase = Phase::Resolving;
        let gained = matches.len() as u32 * SCORE_PER_TOKEN;
        self.score += gained;
        self.last_cascade.passes += 1;
        self.last_cascade.cleared += matches.len();
        debug!(
            "Pass {}: clearing {} token(s) for {} points",
            self.last_cascade.passes,
            matches.len(),
            gained
        );

        let cleared = grid.clear_positions(&matches);
        self.clearing = matches;
        self.schedule(self.config.timings.cascade_step_ms, Step::Gravity(cleared));
        true
    }

    fn settle(&mut self, cleared: Grid) {
        self.clearing.clear();
        let settled = cleared.apply_gravity();
        self.falling = Grid::changed_occupants(&cleared, &settled);
        self.grid = settled.clone();
        self.schedule(self.config.timings.cascade_step_ms, Step::Refill(settled));
    }

    fn refill(&mut self, settled: Grid) {
        let filled = settled.refill_empty_cells(&mut self.source);
        self.falling.extend(Grid::newly_filled(&settled, &filled));
        self.grid = filled.clone();
        self.schedule(self.config.timings.cascade_step_ms, Step::NextPass(filled));
    }
}

impl<S: Scheduler<Step>> Drop for Session<S> {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
    }
}

fn step_name(step: &Step) -> &'static str {
    match step {
        Step::ResolveSwap { .. } => "ResolveSwap",
        Step::PrepareRevert { .. } => "PrepareRevert",
        Step::ApplyRevert { .. } => "ApplyRevert",
        Step::FinishRevert => "FinishRevert",
        Step::Gravity(_) => "Gravity",
        Step::Refill(_) => "Refill",
        Step::NextPass(_) => "NextPass",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timings;
    use crate::utils::{grid_from_str_array, grid_to_strings};

    // Six-color diagonal pattern: no runs anywhere, and swapping (0,0) with
    // (0,1) creates none either.
    const STABLE: [&str; 8] = [
        "RBGYPORB", "GYPORBGY", "PORBGYPO", "RBGYPORB", "GYPORBGY", "PORBGYPO", "RBGYPORB",
        "GYPORBGY",
    ];

    // Swapping (0,1) with (1,1) lines up R R R across the top row.
    const THREE_AFTER_SWAP: [&str; 8] = [
        "RBRYPORB", "GRPORBGY", "PORBGYPO", "RBGYPORB", "GYPORBGY", "PORBGYPO", "RBGYPORB",
        "GYPORBGY",
    ];

    // Swapping (0,2) with (1,2) lines up five reds across the top row.
    const FIVE_AFTER_SWAP: [&str; 8] = [
        "RRBRRYPO", "GYROPBGY", "PORBGYPO", "RBGYPORB", "GYPORBGY", "PORBGYPO", "RBGYPORB",
        "GYPORBGY",
    ];

    // Swapping (3,3) with (4,3) lines up B B B in row 3, below three rows of
    // tokens that then have to fall.
    const FALL_AFTER_SWAP: [&str; 8] = [
        "RBGYPORB", "GYPORBGY", "PORBGYPO", "RBBYPORB", "GYPBRBGY", "PORBGYPO", "RBGYPORB",
        "GYPORBGY",
    ];

    // Swapping (5,2) with (6,2) lines up R R R in row 5. Once it clears, the
    // B B from row 4 drops next to the B at (5,3) and clears in a second pass.
    const CHAIN_AFTER_SWAP: [&str; 8] = [
        "RBGYPORB", "GYPORBGY", "PORBGYPO", "RBGYPORB", "GBBORBGY", "RRYBGYPO", "RORYPORB",
        "GYPORBGY",
    ];

    fn session_on(rows: &[&str]) -> Session {
        let grid = grid_from_str_array(rows).unwrap();
        assert!(!grid.has_any_match(), "fixture must start stable");
        Session::with_grid(SessionConfig::default(), grid, 11)
    }

    fn p(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    #[test]
    fn test_new_session_is_idle_and_stable() {
        let session = Session::with_seed(SessionConfig::default(), 1);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.score(), 0);
        assert_eq!(session.moves(), 0);
        assert_eq!(session.grid().size(), 8);
        assert!(!session.grid().has_any_match());
        assert_eq!(session.pending_steps(), 0);
    }

    #[test]
    fn test_selection_rules() {
        let mut session = session_on(&STABLE);

        assert_eq!(session.select(p(3, 3)).unwrap(), SelectOutcome::Selected);
        assert_eq!(session.phase(), Phase::AwaitingSelection);
        assert_eq!(session.selection(), Some(p(3, 3)));

        assert_eq!(session.select(p(3, 3)).unwrap(), SelectOutcome::Deselected);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.selection(), None);

        session.select(p(3, 3)).unwrap();
        assert_eq!(session.select(p(5, 5)).unwrap(), SelectOutcome::Selected);
        assert_eq!(session.selection(), Some(p(5, 5)));
        assert_eq!(session.select(p(4, 4)).unwrap(), SelectOutcome::Selected);
        assert_eq!(session.selection(), Some(p(4, 4)));
        assert_eq!(session.moves(), 0);
        assert_eq!(session.pending_steps(), 0);
    }

    #[test]
    fn test_out_of_bounds_selection_is_rejected() {
        let mut session = session_on(&STABLE);
        let err = session.select(p(8, 0)).unwrap_err();
        assert_eq!(
            err,
            SessionError::OutOfBounds {
                row: 8,
                col: 0,
                size: 8
            }
        );
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn test_swap_commits_and_locks_input() {
        let mut session = session_on(&STABLE);
        let before = session.grid().clone();

        session.select(p(0, 0)).unwrap();
        assert_eq!(session.select(p(0, 1)).unwrap(), SelectOutcome::SwapStarted);

        assert_eq!(session.moves(), 1);
        assert_eq!(session.phase(), Phase::Swapping);
        assert!(session.is_animating());
        assert_eq!(session.selection(), None);
        assert_eq!(
            session.grid().token_at(p(0, 0)).unwrap().id,
            before.token_at(p(0, 1)).unwrap().id
        );
        assert_eq!(
            session.swap_hint(),
            Some(SwapHint {
                first: p(0, 0),
                second: p(0, 1)
            })
        );

        assert_eq!(session.select(p(4, 4)).unwrap(), SelectOutcome::Ignored);
        assert_eq!(session.selection(), None);
        assert_eq!(session.moves(), 1);
    }

    #[test]
    fn test_swap_without_match_is_reverted() {
        let mut session = session_on(&STABLE);
        let before = session.grid().clone();

        session.select(p(0, 0)).unwrap();
        session.select(p(0, 1)).unwrap();

        // Nothing happens before the swap animation ends.
        assert_eq!(session.advance(299), 0);
        assert_eq!(session.phase(), Phase::Swapping);

        assert_eq!(session.advance(1), 1);
        assert_eq!(session.phase(), Phase::Reverting);
        assert!(session.is_animating());
        assert_eq!(session.swap_hint(), None);

        session.advance(10);
        assert_eq!(
            session.swap_hint(),
            Some(SwapHint {
                first: p(0, 1),
                second: p(0, 0)
            })
        );
        assert!(!session.grid().same_layout(&before));

        session.advance(32);
        assert!(session.grid().same_layout(&before));
        assert_eq!(session.grid(), &before);
        assert_eq!(session.phase(), Phase::Reverting);

        session.advance(200);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.swap_hint(), None);
        assert_eq!(session.moves(), 1);
        assert_eq!(session.score(), 0);
        assert_eq!(session.last_cascade(), CascadeStats::default());
        assert_eq!(session.pending_steps(), 0);
    }

    #[test]
    fn test_matching_swap_runs_cascade_steps() {
        let mut session = session_on(&THREE_AFTER_SWAP);
        session.select(p(0, 1)).unwrap();
        session.select(p(1, 1)).unwrap();

        session.advance(300);
        assert_eq!(session.phase(), Phase::Resolving);
        assert_eq!(session.clearing(), &[p(0, 0), p(0, 1), p(0, 2)]);
        assert_eq!(session.score(), 30);
        assert_eq!(session.swap_hint(), None);
        // The clear animation plays on the swapped grid.
        assert!(session.grid().token_at(p(0, 0)).is_some());

        session.advance(300);
        assert!(session.clearing().is_empty());
        // Nothing sits above row 0, so nothing falls; the holes stay on top.
        assert!(session.falling().is_empty());
        assert!(session.grid().token_at(p(0, 1)).is_none());

        session.advance(300);
        assert_eq!(session.falling(), &[p(0, 0), p(0, 1), p(0, 2)]);
        assert_eq!(session.grid().occupied_count(), 64);

        session.run_until_idle().unwrap();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.falling().is_empty());
        assert!(!session.grid().has_any_match());
        assert!(session.score() >= 30);
        assert_eq!(session.score() % 10, 0);
        assert_eq!(session.moves(), 1);
        assert!(session.last_cascade().passes >= 1);
    }

    #[test]
    fn test_gravity_marks_moved_tokens_as_falling() {
        let mut session = session_on(&FALL_AFTER_SWAP);
        session.select(p(3, 3)).unwrap();
        session.select(p(4, 3)).unwrap();

        session.advance(300);
        assert_eq!(session.clearing(), &[p(3, 1), p(3, 2), p(3, 3)]);
        let above = session.grid().token_at(p(0, 2)).unwrap();

        session.advance(300);
        let expected: Vec<Position> = (1..=3)
            .flat_map(|r| (1..=3).map(move |c| p(r, c)))
            .collect();
        assert_eq!(session.falling(), expected.as_slice());
        let fallen = session.grid().token_at(p(1, 2)).unwrap();
        assert_eq!(fallen.id, above.id);
        assert_eq!(fallen.row, 1);
        assert!(session.grid().token_at(p(0, 2)).is_none());

        // Refilled cells join the falling set rather than replacing it.
        session.advance(300);
        assert_eq!(session.falling().len(), 12);
        assert!(session.falling().contains(&p(0, 1)));
        assert!(session.falling().contains(&p(2, 2)));
    }

    #[test]
    fn test_falling_tokens_trigger_second_pass() {
        let mut session = session_on(&CHAIN_AFTER_SWAP);
        session.select(p(5, 2)).unwrap();
        session.select(p(6, 2)).unwrap();

        session.advance(300);
        assert_eq!(session.clearing(), &[p(5, 0), p(5, 1), p(5, 2)]);
        assert_eq!(session.score(), 30);

        session.advance(300);
        assert_eq!(
            grid_to_strings(session.grid()),
            vec![
                "...YPORB", "RBGORBGY", "GYPBGYPO", "PORYPORB", "RBGORBGY", "GBBBGYPO",
                "ROYYPORB", "GYPORBGY",
            ]
        );

        session.advance(300);
        assert_eq!(session.grid().occupied_count(), 64);
        assert_eq!(session.last_cascade().passes, 1);
        assert_eq!(session.phase(), Phase::Resolving);

        session.advance(300);
        assert_eq!(session.clearing(), &[p(5, 1), p(5, 2), p(5, 3)]);
        assert_eq!(session.score(), 60);
        assert_eq!(
            session.last_cascade(),
            CascadeStats {
                passes: 2,
                cleared: 6
            }
        );

        session.run_until_idle().unwrap();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.score(), 60);
        assert_eq!(session.last_cascade().passes, 2);
        assert_eq!(session.moves(), 1);
        assert!(!session.grid().has_any_match());
    }

    #[test]
    fn test_score_accounting_for_five() {
        let mut session = session_on(&FIVE_AFTER_SWAP);
        session.select(p(0, 2)).unwrap();
        session.select(p(1, 2)).unwrap();
        session.advance(300);
        assert_eq!(session.clearing().len(), 5);
        assert_eq!(session.score(), 50);
        assert_eq!(session.last_cascade().cleared, 5);
    }

    #[test]
    fn test_reset_cancels_pending_steps() {
        let mut session = session_on(&THREE_AFTER_SWAP);
        session.select(p(0, 1)).unwrap();
        session.select(p(1, 1)).unwrap();
        session.advance(300);
        assert_eq!(session.score(), 30);
        assert!(session.pending_steps() > 0);

        session.reset();
        assert_eq!(session.pending_steps(), 0);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.score(), 0);
        assert_eq!(session.moves(), 0);
        assert!(session.clearing().is_empty());
        assert!(session.falling().is_empty());
        assert_eq!(session.swap_hint(), None);
        assert!(!session.grid().has_any_match());

        let fresh = session.grid().clone();
        assert_eq!(session.advance(10_000), 0);
        assert_eq!(session.grid(), &fresh);
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn test_reset_clears_selection() {
        let mut session = session_on(&STABLE);
        session.select(p(2, 2)).unwrap();
        session.reset();
        assert_eq!(session.selection(), None);
        assert_eq!(session.select(p(2, 2)).unwrap(), SelectOutcome::Selected);
    }

    #[test]
    fn test_instant_timings_settle_in_one_run() {
        let config = SessionConfig::default().with_timings(Timings::instant());
        let mut session = Session::with_seed(config, 99);
        session.select(p(4, 4)).unwrap();
        session.select(p(4, 5)).unwrap();
        let steps = session.run_until_idle().unwrap();
        assert!(steps >= 1);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.now_ms(), 0);
        assert!(!session.grid().has_any_match());
    }

    #[test]
    fn test_run_until_idle_step_limit() {
        let config = SessionConfig {
            max_steps_per_run: 2,
            ..SessionConfig::default()
        };
        let grid = grid_from_str_array(&STABLE).unwrap();
        let mut session = Session::with_grid(config, grid, 3);
        session.select(p(0, 0)).unwrap();
        session.select(p(0, 1)).unwrap();
        // A revert takes four steps.
        assert_eq!(
            session.run_until_idle(),
            Err(SessionError::CascadeLimit { steps: 2 })
        );
        assert!(session.is_animating());
        assert_eq!(session.run_until_idle(), Ok(2));
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn test_swap_hint_directions() {
        let hint = SwapHint {
            first: p(2, 2),
            second: p(2, 3),
        };
        assert_eq!(hint.direction_at(p(2, 2)), Some(SwapDirection::FromRight));
        assert_eq!(hint.direction_at(p(2, 3)), Some(SwapDirection::FromLeft));
        assert_eq!(hint.direction_at(p(0, 0)), None);

        let vertical = SwapHint {
            first: p(4, 1),
            second: p(3, 1),
        };
        assert_eq!(vertical.direction_at(p(4, 1)), Some(SwapDirection::FromTop));
        assert_eq!(vertical.direction_at(p(3, 1)), Some(SwapDirection::FromBottom));

        let far = SwapHint {
            first: p(0, 0),
            second: p(5, 5),
        };
        assert_eq!(far.direction_at(p(0, 0)), None);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut session = session_on(&STABLE);
        session.select(p(0, 0)).unwrap();
        session.select(p(1, 0)).unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.moves, 1);
        assert_eq!(snapshot.phase, Phase::Swapping);
        assert!(snapshot.is_animating());
        assert_eq!(&snapshot.grid, session.grid());
        assert_eq!(
            snapshot.swap_direction_at(p(0, 0)),
            Some(SwapDirection::FromBottom)
        );
        assert_eq!(
            snapshot.swap_direction_at(p(1, 0)),
            Some(SwapDirection::FromTop)
        );
    }
}
