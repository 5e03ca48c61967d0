//! Decaying spatial attention grid.
//!
//! The grid is a fixed-size scalar field over a rectangle of world space.
//! Motion detections deposit energy along world-space rays; a periodic decay
//! sweep bleeds energy back out. The cell holding the most energy is the
//! installation's current *focus*, the point heads are told to look at.
//!
//! Invariants:
//! - every cell is ≥ 0 at all times
//! - decay never increases a cell, and with no deposits drives all cells to 0

use crate::geom::Vec2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Grid geometry: world-space extents and cell dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// World X of the grid's left edge
    pub min_x: f32,
    /// World Y of the grid's bottom edge
    pub min_y: f32,
    /// World X of the grid's right edge
    pub max_x: f32,
    /// World Y of the grid's top edge
    pub max_y: f32,
    /// Number of cells along X
    pub width: usize,
    /// Number of cells along Y
    pub height: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            min_x: -8.0,
            min_y: -8.0,
            max_x: 8.0,
            max_y: 8.0,
            width: 128,
            height: 128,
        }
    }
}

impl GridConfig {
    /// Check extents and dimensions are usable.
    pub fn validate(&self) -> crate::Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(crate::Error::Config(
                "grid dimensions must be nonzero".to_string(),
            ));
        }
        if self.max_x <= self.min_x || self.max_y <= self.min_y {
            return Err(crate::Error::Config(format!(
                "grid extents are empty: [{}, {}] x [{}, {}]",
                self.min_x, self.max_x, self.min_y, self.max_y
            )));
        }
        Ok(())
    }
}

/// Decay function applied by the periodic sweep.
///
/// Both modes preserve non-negativity and are monotone non-increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DecayMode {
    /// Multiply every cell by a factor in (0, 1)
    Multiply { factor: f32 },
    /// Subtract a fixed amount from every cell, floored at 0
    Subtract { amount: f32 },
}

impl Default for DecayMode {
    fn default() -> Self {
        DecayMode::Multiply { factor: 0.75 }
    }
}

impl DecayMode {
    /// Check the mode actually decays.
    pub fn validate(&self) -> crate::Result<()> {
        match *self {
            DecayMode::Multiply { factor } => {
                if !(0.0..1.0).contains(&factor) {
                    return Err(crate::Error::Config(format!(
                        "decay factor must be in [0, 1): {}",
                        factor
                    )));
                }
            }
            DecayMode::Subtract { amount } => {
                if amount <= 0.0 || !amount.is_finite() {
                    return Err(crate::Error::Config(format!(
                        "decay amount must be positive: {}",
                        amount
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The grid's highest-energy cell, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Focus {
    /// World center of the cell
    pub point: Vec2,
    /// Energy held by the cell
    pub value: f32,
}

/// 2D attention grid.
///
/// Row-major storage: index = y * width + x.
#[derive(Debug)]
pub struct AttentionGrid {
    cells: Vec<f32>,
    width: usize,
    height: usize,
    min_x: f32,
    min_y: f32,
    cell_w: f32,
    cell_h: f32,
}

impl AttentionGrid {
    /// Allocate a zeroed grid. Lives for the whole process.
    pub fn new(config: &GridConfig) -> Self {
        let cell_w = (config.max_x - config.min_x) / config.width as f32;
        let cell_h = (config.max_y - config.min_y) / config.height as f32;

        Self {
            cells: vec![0.0; config.width * config.height],
            width: config.width,
            height: config.height,
            min_x: config.min_x,
            min_y: config.min_y,
            cell_w,
            cell_h,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Size of one cell in world units.
    pub fn cell_size(&self) -> (f32, f32) {
        (self.cell_w, self.cell_h)
    }

    /// Convert world coordinates to cell indices.
    ///
    /// Returns `None` if outside grid bounds.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let cx = ((x - self.min_x) / self.cell_w).floor();
        let cy = ((y - self.min_y) / self.cell_h).floor();

        if cx >= 0.0 && cy >= 0.0 {
            let cx = cx as usize;
            let cy = cy as usize;
            if cx < self.width && cy < self.height {
                return Some((cx, cy));
            }
        }
        None
    }

    /// Convert cell indices to world coordinates (center of cell).
    #[inline]
    pub fn cell_to_world(&self, cx: usize, cy: usize) -> Vec2 {
        Vec2::new(
            self.min_x + (cx as f32 + 0.5) * self.cell_w,
            self.min_y + (cy as f32 + 0.5) * self.cell_h,
        )
    }

    #[inline]
    fn cell_index(&self, cx: usize, cy: usize) -> usize {
        cy * self.width + cx
    }

    /// Energy at a cell, 0 for out-of-bounds indices.
    #[inline]
    pub fn value_at(&self, cx: usize, cy: usize) -> f32 {
        if cx < self.width && cy < self.height {
            self.cells[self.cell_index(cx, cy)]
        } else {
            0.0
        }
    }

    /// Deposit energy along a world-space ray.
    ///
    /// The ray is sampled every `min(cell_w, cell_h) / 4` world units so no
    /// covered cell is skipped; `amount` is added to the cell under each
    /// sample. The first sample sits half a step in from `p0` so the ray
    /// endpoint is not double-weighted by adjacent deposits. The walk stops
    /// at the first sample that falls outside the grid; a ray that starts
    /// outside deposits nothing. Neither case is an error; both model a
    /// detection projected beyond the tracked area.
    pub fn deposit(&mut self, p0: Vec2, p1: Vec2, amount: f32) {
        let step = self.cell_w.min(self.cell_h) / 4.0;

        let to = p1 - p0;
        let length = to.length();
        if length < step {
            return;
        }

        let direction = to.scale(1.0 / length);
        let steps = (length / step) as usize;

        let dx = direction.x * step;
        let dy = direction.y * step;

        let mut pos = p0 + direction.scale(step * 0.5);

        for _ in 0..steps {
            match self.world_to_cell(pos.x, pos.y) {
                Some((cx, cy)) => {
                    let idx = self.cell_index(cx, cy);
                    self.cells[idx] += amount;
                }
                None => break,
            }
            pos.x += dx;
            pos.y += dy;
        }
    }

    /// Apply one decay sweep to every cell.
    pub fn decay(&mut self, mode: &DecayMode) {
        match *mode {
            DecayMode::Multiply { factor } => {
                for cell in &mut self.cells {
                    *cell *= factor;
                }
            }
            DecayMode::Subtract { amount } => {
                for cell in &mut self.cells {
                    *cell = (*cell - amount).max(0.0);
                }
            }
        }
    }

    /// The highest-energy cell, ties broken by first occurrence in row-major
    /// scan order. `None` when the grid holds no energy at all.
    pub fn focus(&self) -> Option<Focus> {
        let mut best_idx = 0usize;
        let mut best_value = 0.0f32;
        let mut found = false;

        for (idx, &value) in self.cells.iter().enumerate() {
            if value > best_value {
                best_idx = idx;
                best_value = value;
                found = true;
            }
        }

        if !found {
            return None;
        }

        let cx = best_idx % self.width;
        let cy = best_idx / self.width;
        Some(Focus {
            point: self.cell_to_world(cx, cy),
            value: best_value,
        })
    }

    /// Total energy across all cells.
    pub fn total_energy(&self) -> f32 {
        self.cells.iter().sum()
    }

    /// Export as grayscale image data for diagnostics.
    ///
    /// Returns (width, height, pixels) where each pixel maps the cell's
    /// energy clamped to [0, 1] onto 0-255. Lossy by design; not on the
    /// hot path.
    pub fn to_grayscale(&self) -> (usize, usize, Vec<u8>) {
        let pixels = self
            .cells
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0) as u8)
            .collect();
        (self.width, self.height, pixels)
    }
}

/// Thread-safe grid handle shared between the deposit path and the decay
/// task. Lock is held for a whole grid operation, never mid-walk.
pub type SharedGrid = Arc<parking_lot::Mutex<AttentionGrid>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid(width: usize, height: usize) -> AttentionGrid {
        // 1x1 world units per cell, origin at (0, 0)
        AttentionGrid::new(&GridConfig {
            min_x: 0.0,
            min_y: 0.0,
            max_x: width as f32,
            max_y: height as f32,
            width,
            height,
        })
    }

    #[test]
    fn deposit_adds_floor_of_length_over_step_samples() {
        let mut grid = unit_grid(8, 8);
        // step = 0.25; ray of length 2.0 along +x => 8 samples
        grid.deposit(Vec2::new(0.0, 4.5), Vec2::new(2.0, 4.5), 1.0);
        let total: f32 = grid.total_energy();
        assert!((total - 8.0).abs() < 1e-4, "total = {}", total);
    }

    #[test]
    fn deposit_stops_at_grid_edge() {
        let mut grid = unit_grid(4, 4);
        // Ray runs off the right edge; samples past x = 4 are discarded.
        grid.deposit(Vec2::new(3.0, 2.5), Vec2::new(6.0, 2.5), 1.0);
        // step = 0.25, first sample at 3.125, in-bounds samples < 4.0: 4 of them
        let total = grid.total_energy();
        assert!((total - 4.0).abs() < 1e-4, "total = {}", total);
        // all of it landed in the edge cell; nothing wrapped around
        assert_eq!(grid.value_at(3, 2), 4.0);
        assert_eq!(grid.value_at(0, 2), 0.0);
    }

    #[test]
    fn deposit_outside_grid_is_ignored() {
        let mut grid = unit_grid(4, 4);
        grid.deposit(Vec2::new(10.0, 10.0), Vec2::new(14.0, 10.0), 1.0);
        assert_eq!(grid.total_energy(), 0.0);
    }

    #[test]
    fn short_ray_deposits_nothing() {
        let mut grid = unit_grid(4, 4);
        grid.deposit(Vec2::new(1.0, 1.0), Vec2::new(1.1, 1.0), 1.0);
        assert_eq!(grid.total_energy(), 0.0);
    }

    #[test]
    fn cells_stay_non_negative_under_decay() {
        let mut grid = unit_grid(4, 4);
        grid.deposit(Vec2::new(0.0, 1.5), Vec2::new(3.5, 1.5), 0.025);

        for _ in 0..100 {
            grid.decay(&DecayMode::Subtract { amount: 0.01 });
        }
        assert!(grid.cells.iter().all(|&v| v >= 0.0));
        assert_eq!(grid.total_energy(), 0.0);
    }

    #[test]
    fn decay_is_monotone_non_increasing() {
        let mut grid = unit_grid(4, 4);
        grid.deposit(Vec2::new(0.0, 2.5), Vec2::new(3.0, 2.5), 0.5);

        let mode = DecayMode::default();
        let mut previous = grid.cells.clone();
        for _ in 0..10 {
            grid.decay(&mode);
            for (before, after) in previous.iter().zip(grid.cells.iter()) {
                assert!(after <= before);
                assert!(*after >= 0.0);
            }
            previous = grid.cells.clone();
        }
    }

    #[test]
    fn focus_returns_row_major_first_maximum() {
        let mut grid = unit_grid(4, 4);
        assert!(grid.focus().is_none());

        let idx = grid.cell_index(2, 1);
        grid.cells[idx] = 1.0;

        let focus = grid.focus().unwrap();
        assert_eq!(focus.point, Vec2::new(2.5, 1.5));
        assert_eq!(focus.value, 1.0);

        // Equal value later in scan order must not steal the focus.
        let idx2 = grid.cell_index(3, 3);
        grid.cells[idx2] = 1.0;
        let focus = grid.focus().unwrap();
        assert_eq!(focus.point, Vec2::new(2.5, 1.5));
    }

    #[test]
    fn focus_survives_uniform_decay() {
        let mut grid = unit_grid(4, 4);
        let idx = grid.cell_index(1, 2);
        grid.cells[idx] = 1.0;
        let before = grid.focus().unwrap();

        grid.decay(&DecayMode::Multiply { factor: 0.75 });
        let after = grid.focus().unwrap();

        assert_eq!(before.point, after.point);
        assert!(after.value < before.value);
    }

    #[test]
    fn grayscale_export_matches_dimensions() {
        let mut grid = unit_grid(4, 8);
        let idx = grid.cell_index(0, 0);
        grid.cells[idx] = 2.0; // clamps to 255

        let (w, h, pixels) = grid.to_grayscale();
        assert_eq!((w, h), (4, 8));
        assert_eq!(pixels.len(), 32);
        assert_eq!(pixels[0], 255);
        assert_eq!(pixels[1], 0);
    }

    #[test]
    fn config_validation_rejects_empty_extents() {
        let config = GridConfig {
            min_x: 1.0,
            max_x: 1.0,
            ..GridConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(GridConfig::default().validate().is_ok());
    }
}
