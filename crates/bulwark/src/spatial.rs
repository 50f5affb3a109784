//! # Broad-Phase Spatial Index
//!
//! A uniform grid over the arena. Every cell stores a bitset of live
//! entity slot indices currently overlapping it; a query unions the
//! bitsets of the intersected cells and hands the caller the raw words,
//! which [`QueryHits::iter`] walks by lowest-set-bit extraction - so
//! candidates come out in ascending index order, once each.
//!
//! Membership is recomputed every tick. [`SpatialGrid::update`] removes
//! the entity from the cells it occupied last tick before inserting it
//! into its current ones; a destroyed entity must be [`SpatialGrid::remove`]d
//! in the tick it dies, or its stale bit produces ghost collisions.

use bulwark_shared::math::Rect;

/// Inclusive cell-coordinate rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CellSpan {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

/// Grid-of-bitsets broad phase over the arena.
pub struct SpatialGrid {
    /// Cell size is `1 << cell_shift` world units.
    cell_shift: u32,
    /// Cells per axis.
    cells_per_axis: u32,
    /// u64 words per cell bitset.
    words_per_cell: usize,
    /// World coordinate of the grid's low edge.
    origin: f32,
    /// All cell bitsets, row-major.
    bits: Vec<u64>,
    /// Last inserted span per entity slot index.
    placed: Vec<Option<CellSpan>>,
}

impl SpatialGrid {
    /// Creates a grid covering a square arena of `±arena_half_extent`,
    /// with one margin cell on each side for entities allowed to escape
    /// the bounds.
    #[must_use]
    pub fn new(arena_half_extent: f32, cell_shift: u32, capacity: usize) -> Self {
        let cell_size = (1u32 << cell_shift) as f32;
        let span = arena_half_extent * 2.0;
        let cells_per_axis = (span / cell_size).ceil() as u32 + 2;
        let words_per_cell = capacity.div_ceil(64);

        Self {
            cell_shift,
            cells_per_axis,
            words_per_cell,
            origin: -arena_half_extent - cell_size,
            bits: vec![0; cells_per_axis as usize * cells_per_axis as usize * words_per_cell],
            placed: vec![None; capacity],
        }
    }

    /// Cells per axis, for diagnostics.
    #[must_use]
    pub const fn cells_per_axis(&self) -> u32 {
        self.cells_per_axis
    }

    #[inline]
    fn axis_cell(&self, v: f32) -> u32 {
        let cell = ((v - self.origin) as i64) >> self.cell_shift;
        cell.clamp(0, i64::from(self.cells_per_axis) - 1) as u32
    }

    fn span_of(&self, rect: Rect) -> CellSpan {
        CellSpan {
            x0: self.axis_cell(rect.center.x - rect.half_w),
            y0: self.axis_cell(rect.center.y - rect.half_h),
            x1: self.axis_cell(rect.center.x + rect.half_w),
            y1: self.axis_cell(rect.center.y + rect.half_h),
        }
    }

    #[inline]
    fn cell_words(&mut self, cx: u32, cy: u32) -> &mut [u64] {
        let base = (cy as usize * self.cells_per_axis as usize + cx as usize) * self.words_per_cell;
        &mut self.bits[base..base + self.words_per_cell]
    }

    /// Inserts an entity into every cell its bounds overlap.
    ///
    /// The index must not currently be placed; use [`Self::update`] for
    /// the per-tick refresh.
    pub fn insert(&mut self, index: u32, bounds: Rect) {
        debug_assert!(
            self.placed
                .get(index as usize)
                .is_some_and(Option::is_none),
            "insert over a placed index leaks bits"
        );
        let span = self.span_of(bounds);
        let word = index as usize / 64;
        let bit = 1u64 << (index % 64);
        for cy in span.y0..=span.y1 {
            for cx in span.x0..=span.x1 {
                self.cell_words(cx, cy)[word] |= bit;
            }
        }
        if let Some(slot) = self.placed.get_mut(index as usize) {
            *slot = Some(span);
        }
    }

    /// Clears the entity's bit from every cell it occupied.
    ///
    /// Called on destruction in the same tick, and internally by
    /// [`Self::update`] before re-insertion. No-op if the index was never
    /// placed.
    pub fn remove(&mut self, index: u32) {
        let Some(span) = self.placed.get_mut(index as usize).and_then(Option::take) else {
            return;
        };
        let word = index as usize / 64;
        let bit = 1u64 << (index % 64);
        for cy in span.y0..=span.y1 {
            for cx in span.x0..=span.x1 {
                self.cell_words(cx, cy)[word] &= !bit;
            }
        }
    }

    /// Per-tick membership refresh: remove from last tick's cells, insert
    /// into this tick's.
    pub fn update(&mut self, index: u32, bounds: Rect) {
        self.remove(index);
        self.insert(index, bounds);
    }

    /// Unions the bitsets of every cell intersecting `rect` into `hits`.
    pub fn query(&self, rect: Rect, hits: &mut QueryHits) {
        hits.words.clear();
        hits.words.resize(self.words_per_cell, 0);

        let span = self.span_of(rect);
        for cy in span.y0..=span.y1 {
            for cx in span.x0..=span.x1 {
                let base =
                    (cy as usize * self.cells_per_axis as usize + cx as usize) * self.words_per_cell;
                for (word, cell_word) in hits
                    .words
                    .iter_mut()
                    .zip(&self.bits[base..base + self.words_per_cell])
                {
                    *word |= cell_word;
                }
            }
        }
    }
}

/// Result buffer of a broad-phase query: the unioned bitset words.
///
/// Reusable across queries to avoid per-query allocation.
#[derive(Clone, Debug, Default)]
pub struct QueryHits {
    words: Vec<u64>,
}

impl QueryHits {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Enumerates candidate slot indices in ascending order, once each.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros();
                remaining &= remaining - 1;
                Some(word_idx as u32 * 64 + bit)
            })
        })
    }

    /// True if no candidate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_shared::Vec2;

    fn grid() -> SpatialGrid {
        SpatialGrid::new(1000.0, 7, 256)
    }

    fn collect(grid: &SpatialGrid, rect: Rect) -> Vec<u32> {
        let mut hits = QueryHits::new();
        grid.query(rect, &mut hits);
        hits.iter().collect()
    }

    #[test]
    fn test_insert_and_query() {
        let mut grid = grid();
        grid.insert(3, Rect::square(Vec2::new(0.0, 0.0), 25.0));
        grid.insert(7, Rect::square(Vec2::new(500.0, 500.0), 25.0));

        assert_eq!(collect(&grid, Rect::square(Vec2::ZERO, 50.0)), vec![3]);
        assert_eq!(
            collect(&grid, Rect::square(Vec2::ZERO, 800.0)),
            vec![3, 7],
            "candidates come out ascending"
        );
    }

    #[test]
    fn test_update_leaves_no_stale_bits() {
        let mut grid = grid();
        grid.insert(5, Rect::square(Vec2::new(-600.0, -600.0), 30.0));

        // Move across the arena; the old cells must be clean.
        grid.update(5, Rect::square(Vec2::new(600.0, 600.0), 30.0));

        assert!(collect(&grid, Rect::square(Vec2::new(-600.0, -600.0), 100.0)).is_empty());
        assert_eq!(
            collect(&grid, Rect::square(Vec2::new(600.0, 600.0), 100.0)),
            vec![5]
        );
    }

    #[test]
    fn test_remove_clears_every_cell() {
        let mut grid = grid();
        // Large entity spanning many cells.
        grid.insert(9, Rect::square(Vec2::ZERO, 400.0));
        grid.remove(9);

        assert!(collect(&grid, Rect::square(Vec2::ZERO, 900.0)).is_empty());
        // Removing again is a no-op, not a corruption.
        grid.remove(9);
    }

    #[test]
    fn test_entity_on_cell_boundary_found_once() {
        let mut grid = grid();
        // Straddles several cells; the union must still yield it once.
        grid.insert(12, Rect::square(Vec2::new(128.0, 128.0), 64.0));

        let found = collect(&grid, Rect::square(Vec2::new(128.0, 128.0), 10.0));
        assert_eq!(found, vec![12]);
    }

    #[test]
    fn test_out_of_bounds_positions_clamp() {
        let mut grid = grid();
        // Far outside the arena: clamped into the margin cells, not a panic.
        grid.insert(1, Rect::square(Vec2::new(50_000.0, -50_000.0), 10.0));
        let found = collect(&grid, Rect::square(Vec2::new(50_000.0, -50_000.0), 10.0));
        assert_eq!(found, vec![1]);
    }
}
