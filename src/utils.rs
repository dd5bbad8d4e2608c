use crate::engine::{Color, Grid, DEFAULT_GRID_SIZE};
use crate::error::ParseError;

/// Parses an array of string slices into a `DEFAULT_GRID_SIZE` square `Grid`.
///
/// Each string slice represents a row, starting from row 0 (the top).
/// Missing rows, and the missing tail of short rows, are left empty.
///
/// Valid characters:
/// - 'R', 'B', 'G', 'Y', 'P', 'O': a token of that color (see `Color::to_char`)
/// - '.': an empty cell
///
/// Tokens receive ids `0, 1, 2, ...` in row-major order.
///
/// # Examples
/// ```
/// use match3_engine::utils::grid_from_str_array;
/// use match3_engine::engine::Color;
///
/// let grid = grid_from_str_array(&["RGY", "B.P"]).unwrap();
/// assert_eq!(grid.get(0, 0).map(|t| t.color), Some(Color::Red));
/// assert!(grid.get(1, 1).is_none());
/// assert!(grid.get(2, 0).is_none());
///
/// assert!(grid_from_str_array(&["RXB"]).is_err());
/// ```
pub fn grid_from_str_array(s: &[&str]) -> Result<Grid, ParseError> {
    grid_from_str_array_sized(s, DEFAULT_GRID_SIZE)
}

/// Same as `grid_from_str_array` for a grid of the given size.
pub fn grid_from_str_array_sized(s: &[&str], size: usize) -> Result<Grid, ParseError> {
    if s.len() > size {
        return Err(ParseError::TooManyRows {
            expected: size,
            found: s.len(),
        });
    }

    let mut rows = Vec::with_capacity(s.len());
    for (r, row_str) in s.iter().enumerate() {
        let found = row_str.chars().count();
        if found > size {
            return Err(ParseError::RowTooLong {
                row: r,
                expected: size,
                found,
            });
        }

        let mut row = Vec::with_capacity(found);
        for (c, ch) in row_str.chars().enumerate() {
            let cell = match ch {
                '.' => None,
                _ => Some(Color::from_char(ch).ok_or(ParseError::UnrecognizedChar {
                    ch,
                    row: r,
                    col: c,
                })?),
            };
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(Grid::from_color_rows(size, &rows))
}

/// Renders a grid back into the text form accepted by `grid_from_str_array`.
pub fn grid_to_strings(grid: &Grid) -> Vec<String> {
    (0..grid.size())
        .map(|r| {
            (0..grid.size())
                .map(|c| grid.get(r, c).map_or('.', |token| token.color.to_char()))
                .collect()
        })
        .collect()
}
