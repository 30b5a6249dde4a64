//! Screen Differ
//!
//! Writes the dirty cells of a grid to the terminal with as few cursor
//! moves and color changes as possible.
//!
//! Each run of adjacent dirty cells gets one absolute cursor move; runs of a
//! row are collected and written together. A color change is emitted only
//! when a cell's attribute differs from the last one emitted in this pass.
//! Cells that terminals measure inconsistently (wide, astral or combined)
//! end the current write, so a width disagreement cannot shift the rest of
//! the row.

use tracing::{trace, warn};

use super::ansi;
use crate::core::{Attribute, Grid};

/// Counters for one render pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rows_written: usize,
    pub cells_written: usize,
    pub color_changes: usize,
    pub writes: usize,
    pub failed_writes: usize,
}

/// Renders grid damage as escape sequences
#[derive(Debug, Default)]
pub struct ScreenRenderer {
    buffer: String,
}

impl ScreenRenderer {
    pub fn new() -> Self {
        Self {
            buffer: String::with_capacity(4096),
        }
    }

    /// Render every dirty cell and leave the cursor at `cursor` (col, row).
    ///
    /// `write` receives each chunk of output and reports whether it reached
    /// the terminal. Failed writes are not retried; the pass continues and
    /// the cells still count as rendered.
    pub fn render<W>(
        &mut self,
        grid: &mut Grid,
        force_16_colors: bool,
        cursor: (usize, usize),
        mut write: W,
    ) -> RenderStats
    where
        W: FnMut(&str) -> bool,
    {
        let mut stats = RenderStats::default();
        let mut last_attribute: Option<Attribute> = None;
        self.buffer.clear();

        if let Some(damage) = grid.damage() {
            let cols = grid.cols();
            for row_index in damage.top..=damage.bottom {
                let Some(row) = grid.row_mut(row_index) else {
                    break;
                };
                if !row.dirty {
                    continue;
                }
                row.dirty = false;

                let mut run_open = false;
                let mut row_written = false;
                let mut col = damage.left;
                while col <= damage.right && col < cols {
                    let cell = &mut row.cells[col];
                    if !cell.is_dirty() {
                        run_open = false;
                        col += 1;
                        continue;
                    }

                    if !run_open {
                        ansi::cursor_position(&mut self.buffer, row_index + 1, col + 1);
                        run_open = true;
                    }
                    if last_attribute != Some(cell.attribute) {
                        ansi::set_attribute(&mut self.buffer, cell.attribute, force_16_colors);
                        last_attribute = Some(cell.attribute);
                        stats.color_changes += 1;
                    }

                    self.buffer
                        .push(if cell.rune.is_control() { ' ' } else { cell.rune });
                    for &mark in &cell.combining_marks {
                        self.buffer.push(mark);
                    }
                    cell.clear_dirty();
                    stats.cells_written += 1;

                    let wide = cell.is_wide();
                    let flush_now = cell.forces_flush();
                    if wide {
                        // The continuation column is covered by the wide rune
                        if let Some(next) = row.cells.get_mut(col + 1) {
                            next.clear_dirty();
                        }
                    }
                    if flush_now {
                        flush(&mut self.buffer, &mut write, &mut stats);
                        run_open = false;
                        row_written = true;
                    }
                    col += if wide { 2 } else { 1 };
                }

                if !self.buffer.is_empty() {
                    flush(&mut self.buffer, &mut write, &mut stats);
                    row_written = true;
                }
                if row_written {
                    stats.rows_written += 1;
                }
            }
        }
        grid.reset_damage();

        ansi::cursor_position(&mut self.buffer, cursor.1 + 1, cursor.0 + 1);
        flush(&mut self.buffer, &mut write, &mut stats);

        trace!(
            rows = stats.rows_written,
            cells = stats.cells_written,
            colors = stats.color_changes,
            writes = stats.writes,
            "render pass complete"
        );
        stats
    }

    /// Render and return everything that would have been written
    pub fn render_to_string(&mut self, grid: &mut Grid, force_16_colors: bool, cursor: (usize, usize)) -> String {
        let mut output = String::new();
        self.render(grid, force_16_colors, cursor, |chunk| {
            output.push_str(chunk);
            true
        });
        output
    }
}

fn flush<W>(buffer: &mut String, write: &mut W, stats: &mut RenderStats)
where
    W: FnMut(&str) -> bool,
{
    if buffer.is_empty() {
        return;
    }
    stats.writes += 1;
    if !write(buffer.as_str()) {
        stats.failed_writes += 1;
        warn!(bytes = buffer.len(), "console write failed, continuing frame");
    }
    buffer.clear();
}
