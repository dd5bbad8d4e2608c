//! Core board engine for the match-3 puzzle.
//!
//! This module defines the game's fundamental components:
//! - `Color` and `Token`: what occupies a cell.
//! - `Position`: a plain (row, col) coordinate.
//! - `TokenSource`: the seedable source of new tokens (colors and ids).
//! - `Grid`: the board itself, with match detection, clearing, gravity,
//!   refill and swapping.
//!
//! Every `Grid` transformation takes `&self` and returns a new `Grid`. Nothing
//! here mutates a grid it was given, so callers can diff the before and after
//! values to work out what moved.
use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::fmt;

/// Default width and height of the board.
pub const DEFAULT_GRID_SIZE: usize = 8;

/// Shortest run of same-colored tokens that counts as a match.
pub const MIN_MATCH_LENGTH: usize = 3;

/// Points awarded for every cleared token.
pub const SCORE_PER_TOKEN: u32 = 10;

/// Number of colors in the palette.
pub const PALETTE_SIZE: usize = Color::PALETTE.len();

/// The color of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl Color {
    /// Every color a token can have, in a fixed order.
    pub const PALETTE: [Color; 6] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Yellow,
        Color::Purple,
        Color::Orange,
    ];

    /// Converts the color to its character representation.
    ///
    /// # Examples
    ///
    /// ```
    /// use match3_engine::engine::Color;
    /// assert_eq!(Color::Red.to_char(), 'R');
    /// assert_eq!(Color::Orange.to_char(), 'O');
    /// ```
    pub fn to_char(self) -> char {
        match self {
            Color::Red => 'R',
            Color::Blue => 'B',
            Color::Green => 'G',
            Color::Yellow => 'Y',
            Color::Purple => 'P',
            Color::Orange => 'O',
        }
    }

    /// Inverse of `to_char`. Returns `None` for anything outside the palette.
    pub fn from_char(ch: char) -> Option<Color> {
        Color::PALETTE.iter().copied().find(|color| color.to_char() == ch)
    }

    /// Returns the ANSI background color code for terminal output.
    fn to_ansi_color_code(self) -> &'static str {
        match self {
            Color::Red => "41",
            Color::Green => "42",
            Color::Yellow => "43",
            Color::Blue => "44",
            Color::Purple => "45",
            Color::Orange => "48;5;208",
        }
    }
}

/// Opaque identity of a physical token.
///
/// A token keeps its id while it slides around the board; a refilled cell
/// always receives a token with a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

impl TokenId {
    /// The raw id number.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A zero-based (row, col) board coordinate. Row 0 is the top of the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    /// Creates a position at `(row, col)`.
    pub const fn new(row: usize, col: usize) -> Self {
        Position { row, col }
    }

    /// See `are_positions_adjacent`.
    pub fn is_adjacent_to(self, other: Position) -> bool {
        are_positions_adjacent(self, other)
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, col): (usize, usize)) -> Self {
        Position { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A single colored token ("candy") on the board.
///
/// `row` and `col` always mirror the cell the token occupies. Functions that
/// move a token hand back a new value with updated coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub id: TokenId,
    pub color: Color,
    pub row: usize,
    pub col: usize,
}

impl Token {
    /// The cell this token occupies.
    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }

    /// Same token (id and color) relocated to `(row, col)`.
    fn moved_to(self, row: usize, col: usize) -> Token {
        Token { row, col, ..self }
    }
}

/// Returns true if `a` and `b` are one step apart horizontally or vertically.
///
/// Diagonal neighbours are not adjacent, and a position is not adjacent to
/// itself.
///
/// # Examples
/// ```
/// use match3_engine::engine::{are_positions_adjacent, Position};
/// assert!(are_positions_adjacent(Position::new(2, 3), Position::new(2, 4)));
/// assert!(!are_positions_adjacent(Position::new(2, 3), Position::new(3, 4)));
/// ```
pub fn are_positions_adjacent(a: Position, b: Position) -> bool {
    a.row.abs_diff(b.row) + a.col.abs_diff(b.col) == 1
}

/// Source of new tokens: a seedable RNG for colors plus an id counter.
///
/// Ids are handed out monotonically, so every token produced by one source is
/// distinct from every other one it produced.
#[derive(Clone, Debug)]
pub struct TokenSource {
    rng: SmallRng,
    next_id: u64,
}

impl TokenSource {
    /// Creates a source seeded from system entropy.
    pub fn from_entropy() -> Self {
        TokenSource {
            rng: SmallRng::from_entropy(),
            next_id: 0,
        }
    }

    /// Creates a reproducible source. The same seed yields the same sequence
    /// of colors and ids.
    pub fn with_seed(seed: u64) -> Self {
        TokenSource {
            rng: SmallRng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    /// Makes sure future ids never collide with any token already on `grid`.
    pub fn reserve_ids_past(&mut self, grid: &Grid) {
        if let Some(max_id) = grid.tokens().map(|token| token.id.0).max() {
            self.next_id = self.next_id.max(max_id + 1);
        }
    }

    /// Produces a token with a uniformly random color and a fresh id at
    /// `(row, col)`.
    pub fn generate_token(&mut self, row: usize, col: usize) -> Token {
        let color = Color::PALETTE[self.rng.gen_range(0..PALETTE_SIZE)];
        self.token_with_color(color, row, col)
    }

    /// Like `generate_token` but never picks a color listed in `excluded`.
    /// Falls back to the whole palette if everything is excluded.
    fn generate_token_avoiding(&mut self, excluded: &[Color], row: usize, col: usize) -> Token {
        let allowed: Vec<Color> = Color::PALETTE
            .iter()
            .copied()
            .filter(|color| !excluded.contains(color))
            .collect();
        if allowed.is_empty() {
            return self.generate_token(row, col);
        }
        let color = allowed[self.rng.gen_range(0..allowed.len())];
        self.token_with_color(color, row, col)
    }

    fn token_with_color(&mut self, color: Color, row: usize, col: usize) -> Token {
        let id = TokenId(self.next_id);
        self.next_id += 1;
        Token { id, color, row, col }
    }
}

/// The game board: a square matrix of optional tokens stored row-major.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grid {
    size: usize,
    cells: Vec<Option<Token>>,
}

impl Grid {
    /// Creates a `size` x `size` grid with every cell empty.
    ///
    /// # Examples
    /// ```
    /// use match3_engine::engine::Grid;
    /// let grid = Grid::empty(8);
    /// assert_eq!(grid.occupied_count(), 0);
    /// assert!(grid.get(0, 0).is_none());
    /// ```
    pub fn empty(size: usize) -> Self {
        Grid {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Builds a grid from rows of optional colors, padding short input with
    /// empty cells. Tokens get ids `0, 1, 2, ...` in row-major order.
    ///
    /// Rows or columns beyond `size` are ignored.
    pub fn from_color_rows(size: usize, rows: &[Vec<Option<Color>>]) -> Self {
        let mut grid = Grid::empty(size);
        let mut next_id = 0;
        for (r, row) in rows.iter().enumerate().take(size) {
            for (c, color) in row.iter().enumerate().take(size) {
                if let Some(color) = *color {
                    let idx = grid.idx(r, c);
                    grid.cells[idx] = Some(Token {
                        id: TokenId(next_id),
                        color,
                        row: r,
                        col: c,
                    });
                    next_id += 1;
                }
            }
        }
        grid
    }

    /// Fills every cell with a freshly generated token, matches and all.
    fn random_fill(size: usize, source: &mut TokenSource) -> Self {
        let mut grid = Grid::empty(size);
        for r in 0..size {
            for c in 0..size {
                let idx = grid.idx(r, c);
                grid.cells[idx] = Some(source.generate_token(r, c));
            }
        }
        grid
    }

    /// Fills the grid cell by cell in row-major order, never choosing a color
    /// that would complete a run of three with the two cells to the left or
    /// the two cells above. The result never contains a match.
    fn constructive_fill(size: usize, source: &mut TokenSource) -> Self {
        let mut grid = Grid::empty(size);
        for r in 0..size {
            for c in 0..size {
                let mut excluded = Vec::with_capacity(2);
                if c >= 2 {
                    if let (Some(a), Some(b)) = (grid.get(r, c - 1), grid.get(r, c - 2)) {
                        if a.color == b.color {
                            excluded.push(a.color);
                        }
                    }
                }
                if r >= 2 {
                    if let (Some(a), Some(b)) = (grid.get(r - 1, c), grid.get(r - 2, c)) {
                        if a.color == b.color {
                            excluded.push(a.color);
                        }
                    }
                }
                let idx = grid.idx(r, c);
                grid.cells[idx] = Some(source.generate_token_avoiding(&excluded, r, c));
            }
        }
        grid
    }

    fn idx(&self, row: usize, col: usize) -> usize {
        row * self.size + col
    }

    /// Width and height of the grid.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true if `position` lies on the grid.
    pub fn contains(&self, position: Position) -> bool {
        position.row < self.size && position.col < self.size
    }

    /// Returns the token at `(row, col)`, or `None` if the cell is empty or
    /// outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<Token> {
        if row < self.size && col < self.size {
            self.cells[self.idx(row, col)]
        } else {
            None
        }
    }

    /// `get` for a `Position`.
    pub fn token_at(&self, position: Position) -> Option<Token> {
        self.get(position.row, position.col)
    }

    /// Every position of the grid, row-major.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.size).flat_map(move |r| (0..self.size).map(move |c| Position::new(r, c)))
    }

    /// Every token on the grid, row-major.
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.cells.iter().flatten().copied()
    }

    /// Number of non-empty cells.
    pub fn occupied_count(&self) -> usize {
        self.tokens().count()
    }

    /// Ids of the tokens in `col`, top to bottom, skipping empty cells.
    pub fn column_ids(&self, col: usize) -> Vec<TokenId> {
        (0..self.size)
            .filter_map(|r| self.get(r, col))
            .map(|token| token.id)
            .collect()
    }

    /// Compares two grids cell by cell on token id and color only.
    pub fn same_layout(&self, other: &Grid) -> bool {
        self.size == other.size
            && self
                .cells
                .iter()
                .zip(&other.cells)
                .all(|(a, b)| a.map(|t| (t.id, t.color)) == b.map(|t| (t.id, t.color)))
    }

    /// Counts consecutive same-color tokens starting at `(row, col)` and
    /// walking in direction `(d_row, d_col)`, including the start cell.
    ///
    /// The walk stops at the grid edge, an empty cell or a color change. An
    /// empty (or off-grid) start cell yields 0. A `(0, 0)` direction never
    /// leaves the start cell, so it yields 1 for an occupied one.
    ///
    /// # Arguments
    /// * `row`, `col`: The starting cell.
    /// * `d_row`, `d_col`: The step direction, e.g. `(0, 1)` walks right.
    pub fn run_length(&self, row: usize, col: usize, d_row: isize, d_col: isize) -> usize {
        let Some(start) = self.get(row, col) else {
            return 0;
        };
        if d_row == 0 && d_col == 0 {
            return 1;
        }
        let mut count = 0;
        let mut r = row as isize;
        let mut c = col as isize;
        while r >= 0 && c >= 0 {
            match self.get(r as usize, c as usize) {
                Some(token) if token.color == start.color => count += 1,
                _ => break,
            }
            r += d_row;
            c += d_col;
        }
        count
    }

    /// Returns true if the cell at `(row, col)` is part of a horizontal or
    /// vertical run of at least `MIN_MATCH_LENGTH` same-colored tokens.
    pub fn cell_participates_in_match(&self, row: usize, col: usize) -> bool {
        if self.get(row, col).is_none() {
            return false;
        }
        // The start cell is counted by both walks.
        let horizontal = self.run_length(row, col, 0, -1) + self.run_length(row, col, 0, 1) - 1;
        let vertical = self.run_length(row, col, -1, 0) + self.run_length(row, col, 1, 0) - 1;
        horizontal >= MIN_MATCH_LENGTH || vertical >= MIN_MATCH_LENGTH
    }

    /// Returns true if the board contains at least one match.
    pub fn has_any_match(&self) -> bool {
        self.positions()
            .any(|p| self.cell_participates_in_match(p.row, p.col))
    }

    /// Finds every position that belongs to a match.
    ///
    /// For each occupied cell the maximal horizontal and vertical runs through
    /// it are measured; runs of at least `MIN_MATCH_LENGTH` contribute all their
    /// positions. A token that sits in both a horizontal and a vertical run is
    /// reported once.
    ///
    /// This is a single pass. It does not look for matches that would appear
    /// after clearing and gravity.
    ///
    /// # Returns
    /// The deduplicated positions, sorted row-major. Callers should treat the
    /// result as a set.
    pub fn find_all_matched_positions(&self) -> Vec<Position> {
        let mut matched = BTreeSet::new();

        for p in self.positions() {
            if self.get(p.row, p.col).is_none() {
                continue;
            }

            let left = p.col + 1 - self.run_length(p.row, p.col, 0, -1);
            let right = p.col + self.run_length(p.row, p.col, 0, 1) - 1;
            if right - left + 1 >= MIN_MATCH_LENGTH {
                matched.extend((left..=right).map(|c| Position::new(p.row, c)));
            }

            let up = p.row + 1 - self.run_length(p.row, p.col, -1, 0);
            let down = p.row + self.run_length(p.row, p.col, 1, 0) - 1;
            if down - up + 1 >= MIN_MATCH_LENGTH {
                matched.extend((up..=down).map(|r| Position::new(r, p.col)));
            }
        }

        matched.into_iter().collect()
    }

    /// Returns a copy of the grid with every listed position emptied.
    ///
    /// Positions that are already empty or lie outside the grid are skipped.
    pub fn clear_positions(&self, positions: &[Position]) -> Grid {
        let mut cleared = self.clone();
        for &p in positions {
            if self.contains(p) {
                let idx = cleared.idx(p.row, p.col);
                cleared.cells[idx] = None;
            }
        }
        cleared
    }

    /// Applies gravity to the board column by column.
    ///
    /// Within each column the tokens are compacted towards the bottom (highest
    /// row index) keeping their top-to-bottom order, and the empty cells end
    /// up at the top. A token that changes row comes back with its new row and
    /// the same id; tokens that stay put are copied unchanged.
    pub fn apply_gravity(&self) -> Grid {
        let mut settled = Grid::empty(self.size);
        for c in 0..self.size {
            let mut write_row = self.size;
            for read_row in (0..self.size).rev() {
                if let Some(token) = self.get(read_row, c) {
                    write_row -= 1;
                    let idx = settled.idx(write_row, c);
                    settled.cells[idx] = Some(if read_row == write_row {
                        token
                    } else {
                        token.moved_to(write_row, c)
                    });
                }
            }
        }
        settled
    }

    /// Returns a copy of the grid with every empty cell holding a new token
    /// from `source`. Occupied cells pass through unchanged.
    pub fn refill_empty_cells(&self, source: &mut TokenSource) -> Grid {
        let mut filled = self.clone();
        for r in 0..self.size {
            for c in 0..self.size {
                let idx = filled.idx(r, c);
                if filled.cells[idx].is_none() {
                    filled.cells[idx] = Some(source.generate_token(r, c));
                }
            }
        }
        filled
    }

    /// Returns a copy of the grid with the contents of `a` and `b` exchanged.
    ///
    /// Moved tokens get the coordinates of their new cell. An empty cell
    /// swaps like any other. No adjacency check is made here; if either
    /// position is off the grid the copy is returned unchanged.
    pub fn swap_tokens(&self, a: Position, b: Position) -> Grid {
        let mut swapped = self.clone();
        if !self.contains(a) || !self.contains(b) {
            return swapped;
        }
        let at_a = self.token_at(a);
        let at_b = self.token_at(b);
        let idx_a = swapped.idx(a.row, a.col);
        let idx_b = swapped.idx(b.row, b.col);
        swapped.cells[idx_a] = at_b.map(|token| token.moved_to(a.row, a.col));
        swapped.cells[idx_b] = at_a.map(|token| token.moved_to(b.row, b.col));
        swapped
    }

    /// Positions that hold a token in `after` whose id differs from whatever
    /// occupied the same cell in `before` (a different token, or nothing).
    pub fn changed_occupants(before: &Grid, after: &Grid) -> Vec<Position> {
        after
            .positions()
            .filter(|p| match after.token_at(*p) {
                Some(now) => before.token_at(*p).map(|then| then.id) != Some(now.id),
                None => false,
            })
            .collect()
    }

    /// Positions that were empty in `before` and are occupied in `after`.
    pub fn newly_filled(before: &Grid, after: &Grid) -> Vec<Position> {
        after
            .positions()
            .filter(|p| before.token_at(*p).is_none() && after.token_at(*p).is_some())
            .collect()
    }

    /// Generates a string representation of the board with an optional
    /// highlighted position.
    ///
    /// Column indices are printed across the top and row indices down the
    /// left; each cell is rendered as a two-character ANSI colored block.
    pub fn to_string_with_highlight(&self, highlight: Option<Position>) -> String {
        let mut output = String::from("  ");
        for c in 0..self.size {
            output.push_str(&format!("{:<2}", c));
        }
        output.push('\n');

        for r in 0..self.size {
            output.push_str(&format!("{:<2}", r));
            for c in 0..self.size {
                let is_highlight = highlight == Some(Position::new(r, c));
                match self.get(r, c) {
                    Some(token) => {
                        let content = if is_highlight { ".." } else { "  " };
                        output.push_str(&format!(
                            "\x1b[1;{}m{}\x1b[m",
                            token.color.to_ansi_color_code(),
                            content
                        ));
                    }
                    None => output.push_str(if is_highlight { ".." } else { "  " }),
                }
            }
            if r + 1 < self.size {
                output.push('\n');
            }
        }

        output
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_highlight(None))
    }
}

/// Builds a full grid that contains no matches.
///
/// Every cell is filled from `source`; while the result contains any match,
/// the whole grid is rerolled. After `max_attempts` rerolls without success
/// the grid is built constructively instead (see `Grid::constructive_fill`),
/// so this always terminates.
///
/// With six colors on an 8x8 board a clean grid usually turns up within a
/// few dozen rolls.
pub fn build_initial_grid(size: usize, source: &mut TokenSource, max_attempts: usize) -> Grid {
    let mut grid = Grid::random_fill(size, source);
    let mut attempts = 1;
    while grid.has_any_match() {
        if attempts >= max_attempts {
            warn!(
                "No match-free {}x{} grid after {} attempts, using constructive fill",
                size, size, attempts
            );
            return Grid::constructive_fill(size, source);
        }
        grid = Grid::random_fill(size, source);
        attempts += 1;
    }
    debug!("Generated {}x{} grid after {} attempt(s)", size, size, attempts);
    grid
}
