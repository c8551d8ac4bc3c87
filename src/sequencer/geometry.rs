//! Grid geometry - pixel <-> cell conversion and grid extent
//!
//! Cells are square. Rows are pitches (row 0 at the top), columns are time.

pub const DEFAULT_CELL_SIZE: f32 = 24.0;
pub const DEFAULT_COLUMNS: u32 = 64;
pub const DEFAULT_COLUMN_GROWTH: u32 = 50;
/// A sixteenth note at the fixed implicit tempo.
pub const DEFAULT_SECONDS_PER_CELL: f64 = 0.25;

/// Start time of a column on the transport timeline.
pub fn cell_to_time_seconds(col: u32, seconds_per_cell: f64) -> f64 {
    col as f64 * seconds_per_cell
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    cell_size: f32,
    rows: usize,
    columns: u32,
    growth: u32,
}

impl GridGeometry {
    pub fn new(cell_size: f32, rows: usize, columns: u32, growth: u32) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { DEFAULT_CELL_SIZE },
            rows,
            columns: columns.max(1),
            growth: growth.max(1),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn growth(&self) -> u32 {
        self.growth
    }

    pub fn width(&self) -> f32 {
        self.columns as f32 * self.cell_size
    }

    pub fn height(&self) -> f32 {
        self.rows as f32 * self.cell_size
    }

    /// Cell under a pixel. Unclamped: may be negative or past the grid.
    pub fn pixel_to_cell(&self, x: f32, y: f32) -> (i64, i64) {
        let row = (y / self.cell_size).floor() as i64;
        let col = (x / self.cell_size).floor() as i64;
        (row, col)
    }

    /// Top-left pixel of a cell.
    pub fn cell_to_pixel(&self, row: usize, col: u32) -> (f32, f32) {
        (col as f32 * self.cell_size, row as f32 * self.cell_size)
    }

    pub fn contains(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && col < self.columns as i64
    }

    /// Validated cell under a pixel.
    pub fn cell_at(&self, x: f32, y: f32) -> Option<(usize, u32)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (row, col) = self.pixel_to_cell(x, y);
        self.contains(row, col).then(|| (row as usize, col as u32))
    }

    /// Nearest cell inside the grid.
    pub fn clamp_cell(&self, row: i64, col: i64) -> (usize, u32) {
        let max_row = self.rows.saturating_sub(1) as i64;
        let max_col = self.columns.saturating_sub(1) as i64;
        (row.clamp(0, max_row) as usize, col.clamp(0, max_col) as u32)
    }

    /// Adds one growth increment when `col` is at or past the last column.
    pub fn grow_for(&mut self, col: u32) -> bool {
        if col >= self.columns.saturating_sub(1) {
            self.columns = self.columns.saturating_add(self.growth);
            true
        } else {
            false
        }
    }
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE, 36, DEFAULT_COLUMNS, DEFAULT_COLUMN_GROWTH)
    }
}
