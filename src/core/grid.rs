//! Screen Grid
//!
//! A 2D grid of cells representing the driver's logical screen, together
//! with the damage region bounding every cell touched since the last render.

use unicode_width::UnicodeWidthChar;

use super::cell::{Attribute, Cell};

/// Inclusive bounds of the cells modified since the last render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageRegion {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl DamageRegion {
    fn single(col: usize, row: usize) -> Self {
        Self {
            left: col,
            top: row,
            right: col,
            bottom: row,
        }
    }

    /// Grow the region so it also covers the given cell
    pub fn include(&mut self, col: usize, row: usize) {
        self.left = self.left.min(col);
        self.top = self.top.min(row);
        self.right = self.right.max(col);
        self.bottom = self.bottom.max(row);
    }

    pub fn contains(&self, col: usize, row: usize) -> bool {
        (self.left..=self.right).contains(&col) && (self.top..=self.bottom).contains(&row)
    }
}

/// A row of cells in the grid
#[derive(Debug, Clone)]
pub struct Row {
    /// The cells in this row
    pub cells: Vec<Cell>,
    /// Whether any cell in this row is dirty
    pub dirty: bool,
}

impl Row {
    pub fn new(cols: usize) -> Self {
        Self {
            cells: vec![Cell::default(); cols],
            dirty: false,
        }
    }

    /// Text of the row's base runes
    pub fn text(&self) -> String {
        self.cells.iter().map(|c| c.rune).collect()
    }
}

/// The screen grid - a 2D array of cells
#[derive(Debug, Clone)]
pub struct Grid {
    rows: Vec<Row>,
    cols: usize,
    num_rows: usize,
    damage: Option<DamageRegion>,
}

impl Grid {
    /// Create a grid whose cells are all blank and dirty
    pub fn new(cols: usize, rows: usize) -> Self {
        let mut grid = Self {
            rows: (0..rows).map(|_| Row::new(cols)).collect(),
            cols,
            num_rows: rows,
            damage: None,
        };
        grid.clear_contents();
        grid
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.num_rows
    }

    /// Get a reference to a cell
    pub fn cell(&self, col: usize, row: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }

    /// Get a mutable reference to a cell, marking it dirty
    pub fn cell_mut(&mut self, col: usize, row: usize) -> Option<&mut Cell> {
        if col >= self.cols || row >= self.num_rows {
            return None;
        }
        self.touch(col, row);
        let cell = &mut self.rows[row].cells[col];
        cell.mark_dirty();
        Some(cell)
    }

    /// Get a reference to a row
    pub fn row(&self, row: usize) -> Option<&Row> {
        self.rows.get(row)
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> Option<&mut Row> {
        self.rows.get_mut(row)
    }

    /// Current damage region, `None` when nothing was touched
    pub fn damage(&self) -> Option<DamageRegion> {
        self.damage
    }

    pub(crate) fn reset_damage(&mut self) {
        self.damage = None;
    }

    fn touch(&mut self, col: usize, row: usize) {
        match &mut self.damage {
            Some(region) => region.include(col, row),
            None => self.damage = Some(DamageRegion::single(col, row)),
        }
        self.rows[row].dirty = true;
    }

    /// Put a rune at a position and return the number of columns consumed.
    ///
    /// Combining marks attach to the cell on their left and consume nothing.
    /// A wide rune also claims the cell to its right, which is blanked.
    pub fn add_rune(&mut self, col: usize, row: usize, rune: char, attribute: Attribute) -> usize {
        if row >= self.num_rows {
            return 0;
        }

        if rune.width() == Some(0) {
            if col > 0 && col <= self.cols {
                if let Some(base) = self.cell_mut(col - 1, row) {
                    base.combining_marks.push(rune);
                }
            }
            return 0;
        }

        let Some(cell) = self.cell_mut(col, row) else {
            return 0;
        };
        cell.rune = rune;
        cell.attribute = attribute;
        cell.combining_marks.clear();

        if cell.is_wide() {
            if let Some(next) = self.cell_mut(col + 1, row) {
                next.erase(attribute);
            }
            2
        } else {
            1
        }
    }

    /// Put a string starting at a position, clipped at the end of the row.
    /// Returns the column after the last rune written.
    pub fn add_str(&mut self, col: usize, row: usize, text: &str, attribute: Attribute) -> usize {
        let mut col = col;
        for rune in text.chars() {
            if col >= self.cols {
                break;
            }
            col += self.add_rune(col, row, rune, attribute);
        }
        col
    }

    /// Fill a rectangle with one rune, clipped to the grid
    pub fn fill(&mut self, left: usize, top: usize, width: usize, height: usize, rune: char, attribute: Attribute) {
        let right = left.saturating_add(width).min(self.cols);
        let bottom = top.saturating_add(height).min(self.num_rows);
        for row in top..bottom {
            let mut col = left;
            while col < right {
                col += self.add_rune(col, row, rune, attribute).max(1);
            }
        }
    }

    /// Blank every cell, mark all of them dirty and damage the whole grid
    pub fn clear_contents(&mut self) {
        let attribute = Attribute::default();
        for row in &mut self.rows {
            for cell in &mut row.cells {
                cell.erase(attribute);
            }
        }
        self.mark_all_dirty();
    }

    /// Mark every cell dirty so the next render repaints the whole screen
    pub fn mark_all_dirty(&mut self) {
        for row in &mut self.rows {
            for cell in &mut row.cells {
                cell.mark_dirty();
            }
            row.dirty = self.cols > 0;
        }
        self.damage = if self.cols > 0 && self.num_rows > 0 {
            Some(DamageRegion {
                left: 0,
                top: 0,
                right: self.cols - 1,
                bottom: self.num_rows - 1,
            })
        } else {
            None
        };
    }

    /// Recreate the grid at a new size; all content is discarded
    pub fn resize(&mut self, cols: usize, rows: usize) {
        *self = Grid::new(cols, rows);
    }

    /// Whether any cell still awaits rendering
    pub fn has_dirty_cells(&self) -> bool {
        self.rows
            .iter()
            .any(|r| r.cells.iter().any(|c| c.is_dirty()))
    }
}
