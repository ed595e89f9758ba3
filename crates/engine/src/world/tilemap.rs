use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::geometry::BoundingBox2D;
use super::location::SpatialLocation;
use super::tile::Tile;
use super::Direction;

static TILE_STORE_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_tile_store_poison_once(operation: &'static str) {
    if TILE_STORE_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "tile store lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Error)]
pub enum TileTaskError {
    #[error("failed to spawn tile worker: {0}")]
    Spawn(#[source] io::Error),
    #[error("tile worker panicked")]
    WorkerPanicked,
}

/// Completion handle for a background bulk placement or removal.
#[derive(Debug)]
pub struct TileTask {
    handle: JoinHandle<usize>,
}

impl TileTask {
    /// Blocks until the worker is done; yields the number of tiles touched.
    pub fn wait(self) -> Result<usize, TileTaskError> {
        self.handle.join().map_err(|_| TileTaskError::WorkerPanicked)
    }

    pub fn try_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

type GridCell = (i64, i64);

/// Tiles covering more grid cells than this are kept in the overflow list
/// and scanned linearly instead of being spread across the grid.
const MAX_CELLS_PER_TILE: i128 = 16;

/// Inclusive rectangle of grid cells.
#[derive(Debug, Clone, Copy)]
struct CellSpan {
    first_col: i64,
    first_row: i64,
    last_col: i64,
    last_row: i64,
}

impl CellSpan {
    fn cell_count(&self) -> i128 {
        let cols = i128::from(self.last_col) - i128::from(self.first_col) + 1;
        let rows = i128::from(self.last_row) - i128::from(self.first_row) + 1;
        cols.saturating_mul(rows)
    }

    fn contains(&self, (col, row): GridCell) -> bool {
        (self.first_col..=self.last_col).contains(&col)
            && (self.first_row..=self.last_row).contains(&row)
    }

    fn cells(self) -> impl Iterator<Item = GridCell> {
        (self.first_col..=self.last_col)
            .flat_map(move |col| (self.first_row..=self.last_row).map(move |row| (col, row)))
    }
}

#[derive(Debug, Default)]
struct TileStore {
    tiles: HashMap<SpatialLocation, Tile>,
    visible: HashMap<SpatialLocation, Tile>,
    tile_width: f64,
    tile_height: f64,
    grid: HashMap<GridCell, Vec<SpatialLocation>>,
    overflow: Vec<SpatialLocation>,
}

impl TileStore {
    fn place(&mut self, x: f64, y: f64, mut tile: Tile) {
        let size_changed = tile.width() != self.tile_width || tile.height() != self.tile_height;
        if size_changed && !self.tiles.is_empty() {
            warn!(
                old_width = self.tile_width,
                old_height = self.tile_height,
                new_width = tile.width(),
                new_height = tile.height(),
                "tile_size_changed"
            );
        }
        self.tile_width = tile.width();
        self.tile_height = tile.height();

        tile.set_position(x, y);
        let bounds = tile.bounds();
        let key = SpatialLocation::with_bounds(x, y, bounds);

        if let Some(previous) = self.tiles.remove(&key) {
            let previous_bounds = previous.bounds();
            self.unindex(&key, &previous_bounds);
        }
        // A replaced tile must not linger in the visible set.
        if self.visible.remove(&key).is_some() && tile.is_visible() {
            self.visible.insert(key, tile.clone());
        }
        self.tiles.insert(key, tile);

        if size_changed {
            self.rebuild_index();
        } else {
            self.index(key, &bounds);
        }
    }

    fn remove(&mut self, key: &SpatialLocation) -> Option<Tile> {
        let removed = self.tiles.remove(key)?;
        self.unindex(key, &removed.bounds());
        self.visible.remove(key);
        Some(removed)
    }

    fn cell_of(&self, x: f64, y: f64) -> GridCell {
        if self.tile_width <= 0.0 || self.tile_height <= 0.0 {
            return (0, 0);
        }
        (
            (x / self.tile_width).floor() as i64,
            (y / self.tile_height).floor() as i64,
        )
    }

    fn span_of(&self, bounds: &BoundingBox2D) -> Option<CellSpan> {
        if bounds.is_empty() {
            return None;
        }
        if self.tile_width <= 0.0 || self.tile_height <= 0.0 {
            return Some(CellSpan {
                first_col: 0,
                first_row: 0,
                last_col: 0,
                last_row: 0,
            });
        }
        let first_col = (bounds.x() / self.tile_width).floor() as i64;
        let first_row = (bounds.y() / self.tile_height).floor() as i64;
        let last_col = ((bounds.right() / self.tile_width).ceil() as i64)
            .saturating_sub(1)
            .max(first_col);
        let last_row = ((bounds.bottom() / self.tile_height).ceil() as i64)
            .saturating_sub(1)
            .max(first_row);
        Some(CellSpan {
            first_col,
            first_row,
            last_col,
            last_row,
        })
    }

    fn index(&mut self, key: SpatialLocation, bounds: &BoundingBox2D) {
        let Some(span) = self.span_of(bounds) else {
            return;
        };
        if span.cell_count() > MAX_CELLS_PER_TILE {
            self.overflow.push(key);
            return;
        }
        for cell in span.cells() {
            self.grid.entry(cell).or_default().push(key);
        }
    }

    fn unindex(&mut self, key: &SpatialLocation, bounds: &BoundingBox2D) {
        let Some(span) = self.span_of(bounds) else {
            return;
        };
        if span.cell_count() > MAX_CELLS_PER_TILE {
            self.overflow.retain(|candidate| candidate != key);
            return;
        }
        for cell in span.cells() {
            if let Some(bucket) = self.grid.get_mut(&cell) {
                bucket.retain(|candidate| candidate != key);
                if bucket.is_empty() {
                    self.grid.remove(&cell);
                }
            }
        }
    }

    fn rebuild_index(&mut self) {
        self.grid.clear();
        self.overflow.clear();
        let entries: Vec<(SpatialLocation, BoundingBox2D)> = self
            .tiles
            .iter()
            .map(|(key, tile)| (*key, tile.bounds()))
            .collect();
        for (key, bounds) in entries {
            self.index(key, &bounds);
        }
        debug!(
            tiles = self.tiles.len(),
            cells = self.grid.len(),
            overflow = self.overflow.len(),
            "tile_index_rebuilt"
        );
    }

    fn resolve(&self, x: f64, y: f64) -> Option<SpatialLocation> {
        self.grid
            .get(&self.cell_of(x, y))
            .into_iter()
            .flatten()
            .chain(&self.overflow)
            .find(|key| {
                self.tiles
                    .get(*key)
                    .is_some_and(|tile| tile.bounds().contains(x, y))
            })
            .copied()
    }

    /// Keys of every tile that may overlap `bounds`, in coordinate order.
    ///
    /// Walks whichever is smaller: the cells under `bounds` or the occupied
    /// cells of the grid.
    fn candidates(&self, bounds: &BoundingBox2D) -> Vec<SpatialLocation> {
        let Some(span) = self.span_of(bounds) else {
            return Vec::new();
        };
        let mut keys: Vec<SpatialLocation> = if span.cell_count() <= self.grid.len() as i128 {
            span.cells()
                .filter_map(|cell| self.grid.get(&cell))
                .flatten()
                .copied()
                .collect()
        } else {
            self.grid
                .iter()
                .filter(|(cell, _)| span.contains(**cell))
                .flat_map(|(_, bucket)| bucket.iter().copied())
                .collect()
        };
        keys.extend(self.overflow.iter().copied());
        keys.sort_by(|a, b| a.x().total_cmp(&b.x()).then(a.y().total_cmp(&b.y())));
        keys.dedup();
        keys
    }

    fn rounded_grid_point(&self, x: f64, y: f64) -> (f64, f64) {
        let (tw, th) = (self.tile_width, self.tile_height);
        if tw <= 0.0 || th <= 0.0 {
            return (x, y);
        }
        if x % tw == 0.0 && y % th == 0.0 {
            (tw * (x / tw).abs().ceil(), th * (y / th).abs().ceil())
        } else {
            (tw * (x / tw).abs().floor(), th * (y / th).abs().floor())
        }
    }

    fn place_run(
        &mut self,
        tile: &Tile,
        start_x: f64,
        start_y: f64,
        direction: Direction,
        count: usize,
    ) -> usize {
        let (mut x, mut y) = (start_x, start_y);
        for _ in 0..count {
            self.place(x, y, tile.clone());
            (x, y) = direction.step(x, y, tile.width(), tile.height());
        }
        count
    }

    fn remove_run(
        &mut self,
        tile: &Tile,
        start_x: f64,
        start_y: f64,
        direction: Direction,
        count: usize,
    ) -> usize {
        let (mut x, mut y) = (start_x, start_y);
        let mut removed = 0;
        for _ in 0..count {
            if let Some(key) = self.resolve(x, y) {
                if self.remove(&key).is_some() {
                    removed += 1;
                }
            }
            (x, y) = direction.step(x, y, tile.width(), tile.height());
        }
        removed
    }
}

/// Location-keyed tile storage with point lookup.
///
/// Tile width/height are global to the map and follow the most recently
/// placed tile. Maps holding tiles of different sizes still resolve points
/// correctly, but [`TileMap::tile_size`] and the rounded grid point reported
/// on a miss only reflect the last size placed.
///
/// Cloning a `TileMap` shares the underlying store. Background placement
/// through [`TileMap::set_tiles_async`] writes the same store, so running it
/// while the owning world ticks interleaves edits in no particular order.
#[derive(Debug, Clone, Default)]
pub struct TileMap {
    store: Arc<RwLock<TileStore>>,
}

impl TileMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, TileStore> {
        match self.store.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_tile_store_poison_once("read");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, TileStore> {
        write_store(&self.store)
    }

    pub fn len(&self) -> usize {
        self.read().tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tiles.is_empty()
    }

    pub fn visible_len(&self) -> usize {
        self.read().visible.len()
    }

    pub fn tile_size(&self) -> (f64, f64) {
        let store = self.read();
        (store.tile_width, store.tile_height)
    }

    /// Places `tile` with its top-left corner at `(x, y)`, replacing any tile
    /// already stored under that key.
    pub fn set_tile(&self, x: f64, y: f64, tile: Tile) {
        self.write().place(x, y, tile);
    }

    pub fn set_tile_at_position(&self, tile: Tile) {
        let (x, y) = (tile.x(), tile.y());
        self.set_tile(x, y, tile);
    }

    /// Places `count` copies of `tile` in a run, stepping by the tile's size.
    pub fn set_tiles(
        &self,
        tile: &Tile,
        start_x: f64,
        start_y: f64,
        direction: Direction,
        count: usize,
    ) -> usize {
        let started = Instant::now();
        let placed = self
            .write()
            .place_run(tile, start_x, start_y, direction, count);
        info!(
            count = placed,
            ?direction,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "tiles_placed"
        );
        placed
    }

    pub fn set_tiles_async(
        &self,
        tile: Tile,
        start_x: f64,
        start_y: f64,
        direction: Direction,
        count: usize,
    ) -> Result<TileTask, TileTaskError> {
        let store = Arc::clone(&self.store);
        spawn_tile_worker(move || {
            let started = Instant::now();
            let placed = write_store(&store).place_run(&tile, start_x, start_y, direction, count);
            info!(
                count = placed,
                ?direction,
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "tiles_placed_async"
            );
            placed
        })
    }

    /// Removes whichever tile covers `(x, y)`, from both the full and the
    /// visible set.
    pub fn remove_tile(&self, x: f64, y: f64) -> Option<Tile> {
        let mut store = self.write();
        let Some(key) = store.resolve(x, y) else {
            debug!(x, y, "tile_remove_miss");
            return None;
        };
        store.remove(&key)
    }

    /// Removes the tiles a matching [`TileMap::set_tiles`] run would have
    /// placed. Returns how many were actually present.
    pub fn remove_tiles(
        &self,
        tile: &Tile,
        start_x: f64,
        start_y: f64,
        direction: Direction,
        count: usize,
    ) -> usize {
        let started = Instant::now();
        let removed = self
            .write()
            .remove_run(tile, start_x, start_y, direction, count);
        info!(
            count = removed,
            ?direction,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "tiles_removed"
        );
        removed
    }

    pub fn remove_tiles_async(
        &self,
        tile: Tile,
        start_x: f64,
        start_y: f64,
        direction: Direction,
        count: usize,
    ) -> Result<TileTask, TileTaskError> {
        let store = Arc::clone(&self.store);
        spawn_tile_worker(move || {
            let started = Instant::now();
            let removed = write_store(&store).remove_run(&tile, start_x, start_y, direction, count);
            info!(
                count = removed,
                ?direction,
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "tiles_removed_async"
            );
            removed
        })
    }

    /// Resolves a world point to the tile covering it.
    ///
    /// The returned copy has its location rebound to the query point; the
    /// stored tile is left untouched.
    pub fn get_tile_from_all_tiles(&self, x: f64, y: f64) -> Option<Tile> {
        let store = self.read();
        let Some(key) = store.resolve(x, y) else {
            let (grid_x, grid_y) = store.rounded_grid_point(x, y);
            warn!(x, y, grid_x, grid_y, "tile_lookup_miss");
            return None;
        };
        store.tiles.get(&key).map(|tile| located_copy(tile, x, y))
    }

    pub fn get_tile_from_visible_tiles(&self, x: f64, y: f64) -> Option<Tile> {
        let store = self.read();
        let hit = store
            .resolve(x, y)
            .and_then(|key| store.visible.get(&key));
        let Some(tile) = hit else {
            let (grid_x, grid_y) = store.rounded_grid_point(x, y);
            warn!(x, y, grid_x, grid_y, "visible_tile_lookup_miss");
            return None;
        };
        Some(located_copy(tile, x, y))
    }

    /// The point a miss is reported at: snapped to the tile grid.
    pub fn rounded_grid_point(&self, x: f64, y: f64) -> (f64, f64) {
        self.read().rounded_grid_point(x, y)
    }

    /// Replaces the visible set wholesale.
    pub fn update_visible_tiles(&self, visible: HashMap<SpatialLocation, Tile>) {
        self.write().visible = visible;
    }

    /// Marks a tile previously returned by a lookup as visible.
    pub fn add_visible_tile(&self, tile: &Tile) -> bool {
        let Some(location) = tile.location().copied() else {
            warn!(tile_id = tile.id(), "visible_tile_without_location");
            return false;
        };
        let mut store = self.write();
        let key = store
            .resolve(location.x(), location.y())
            .unwrap_or(location);
        store.visible.insert(key, tile.clone());
        true
    }

    pub fn remove_visible_tile(&self, tile: &Tile) -> bool {
        let (x, y) = tile
            .location()
            .map_or((tile.x(), tile.y()), |location| (location.x(), location.y()));
        let mut store = self.write();
        let key = store.resolve(x, y).unwrap_or(SpatialLocation::new(x, y));
        store.visible.remove(&key).is_some()
    }

    /// Rebuilds the visible set from tiles whose box intersects `view` and
    /// whose visible flag is set. Returns the new visible count.
    pub fn cull_visible_tiles(&self, view: &BoundingBox2D) -> usize {
        let mut store = self.write();
        let visible: HashMap<SpatialLocation, Tile> = store
            .candidates(view)
            .into_iter()
            .filter_map(|key| store.tiles.get(&key).map(|tile| (key, tile)))
            .filter(|(_, tile)| tile.is_visible() && tile.bounds().does_intersect(view))
            .map(|(key, tile)| (key, tile.clone()))
            .collect();
        let count = visible.len();
        store.visible = visible;
        count
    }

    /// First solid tile whose box overlaps `bounds`, if any.
    pub fn solid_tile_intersecting(&self, bounds: &BoundingBox2D) -> Option<Tile> {
        let store = self.read();
        store
            .candidates(bounds)
            .into_iter()
            .filter_map(|key| store.tiles.get(&key))
            .find(|tile| tile.is_solid() && tile.bounds().does_intersect(bounds))
            .cloned()
    }

    /// Visits a snapshot of every tile. The store is not locked while
    /// `visit` runs, so it may call back into the map.
    pub fn for_each_tile(&self, mut visit: impl FnMut(&Tile)) {
        let snapshot: Vec<Tile> = self.read().tiles.values().cloned().collect();
        for tile in &snapshot {
            visit(tile);
        }
    }

    pub fn for_each_visible_tile(&self, mut visit: impl FnMut(&Tile)) {
        let snapshot: Vec<Tile> = self.read().visible.values().cloned().collect();
        for tile in &snapshot {
            visit(tile);
        }
    }
}

fn located_copy(tile: &Tile, x: f64, y: f64) -> Tile {
    let mut copy = tile.clone();
    let bounds = copy.bounds();
    copy.set_location(Some(SpatialLocation::with_bounds(x, y, bounds)));
    copy
}

fn write_store(store: &RwLock<TileStore>) -> RwLockWriteGuard<'_, TileStore> {
    match store.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn_tile_store_poison_once("write");
            poisoned.into_inner()
        }
    }
}

fn spawn_tile_worker(
    work: impl FnOnce() -> usize + Send + 'static,
) -> Result<TileTask, TileTaskError> {
    let handle = thread::Builder::new()
        .name("tilestep-tiles".to_string())
        .spawn(work)
        .map_err(TileTaskError::Spawn)?;
    Ok(TileTask { handle })
}
