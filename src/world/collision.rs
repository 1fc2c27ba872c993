use crate::world::chunk::{ChunkCoords, CHUNK_SIZE};
use crate::world::tile::{Direction, Tile, TOTAL_HEIGHT_LEVELS};
use std::collections::HashMap;
use std::sync::Arc;

pub const WALL_NORTH: u16 = 0x1;
pub const WALL_EAST: u16 = 0x2;
pub const WALL_SOUTH: u16 = 0x4;
pub const WALL_WEST: u16 = 0x8;
pub const BLOCKED: u16 = 0x100;

const TILES_PER_CHUNK: usize = (CHUNK_SIZE * CHUNK_SIZE * TOTAL_HEIGHT_LEVELS) as usize;

/// Clip flags for one chunk, all heights. Shared between the live map and
/// snapshots; the live map copies on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCollision {
    walk: Vec<u16>,
    projectile: Vec<u16>,
}

impl Default for ChunkCollision {
    fn default() -> Self {
        Self {
            walk: vec![0; TILES_PER_CHUNK],
            projectile: vec![0; TILES_PER_CHUNK],
        }
    }
}

impl ChunkCollision {
    fn slot(tile: Tile) -> Option<usize> {
        if tile.height < 0 || tile.height >= TOTAL_HEIGHT_LEVELS {
            return None;
        }
        let lx = tile.x & (CHUNK_SIZE - 1);
        let lz = tile.z & (CHUNK_SIZE - 1);
        Some((tile.height * CHUNK_SIZE * CHUNK_SIZE + lx * CHUNK_SIZE + lz) as usize)
    }

    pub fn get(&self, tile: Tile, projectile: bool) -> u16 {
        let Some(slot) = Self::slot(tile) else {
            return 0;
        };
        if projectile {
            self.projectile[slot]
        } else {
            self.walk[slot]
        }
    }

    fn add(&mut self, tile: Tile, flags: u16, projectile: bool) {
        if let Some(slot) = Self::slot(tile) {
            self.walk[slot] |= flags;
            if projectile {
                self.projectile[slot] |= flags;
            }
        }
    }

    fn remove(&mut self, tile: Tile, flags: u16) {
        if let Some(slot) = Self::slot(tile) {
            self.walk[slot] &= !flags;
            self.projectile[slot] &= !flags;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SnapshotBounds {
    min: ChunkCoords,
    max: ChunkCoords,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionMap {
    chunks: HashMap<ChunkCoords, Arc<ChunkCollision>>,
    bounds: Option<SnapshotBounds>,
}

impl CollisionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable copy of every chunk within `radius` of `center`. Tiles outside
    /// the copied area read as blocked so a search cannot wander past it.
    pub fn snapshot(&self, center: ChunkCoords, radius: i32) -> CollisionMap {
        let mut chunks = HashMap::new();
        for coords in center.within_radius(radius) {
            if let Some(chunk) = self.chunks.get(&coords) {
                chunks.insert(coords, Arc::clone(chunk));
            }
        }
        CollisionMap {
            chunks,
            bounds: Some(SnapshotBounds {
                min: ChunkCoords::new(center.x - radius, center.z - radius),
                max: ChunkCoords::new(center.x + radius, center.z + radius),
            }),
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn in_bounds(&self, tile: Tile) -> bool {
        match self.bounds {
            Some(bounds) => {
                let coords = ChunkCoords::from_tile(tile);
                coords.x >= bounds.min.x
                    && coords.x <= bounds.max.x
                    && coords.z >= bounds.min.z
                    && coords.z <= bounds.max.z
            }
            None => true,
        }
    }

    pub fn flags(&self, tile: Tile, projectile: bool) -> u16 {
        if !self.in_bounds(tile) {
            return BLOCKED;
        }
        self.chunks
            .get(&ChunkCoords::from_tile(tile))
            .map(|chunk| chunk.get(tile, projectile))
            .unwrap_or(0)
    }

    pub fn is_full(&self, tile: Tile, projectile: bool) -> bool {
        self.flags(tile, projectile) & BLOCKED != 0
    }

    fn chunk_mut(&mut self, tile: Tile) -> &mut ChunkCollision {
        let entry = self
            .chunks
            .entry(ChunkCoords::from_tile(tile))
            .or_insert_with(|| Arc::new(ChunkCollision::default()));
        Arc::make_mut(entry)
    }

    pub fn add_blocked(&mut self, tile: Tile, projectile: bool) {
        self.chunk_mut(tile).add(tile, BLOCKED, projectile);
    }

    pub fn remove_blocked(&mut self, tile: Tile) {
        self.chunk_mut(tile).remove(tile, BLOCKED);
    }

    /// Places a wall on the `side` edge of `tile` and the mirrored edge of the
    /// neighbour. Only cardinal sides carry walls.
    pub fn add_wall(&mut self, tile: Tile, side: Direction, projectile: bool) {
        let Some(flag) = wall_flag(side) else {
            return;
        };
        let neighbour = tile.step(side);
        let mirrored = wall_flag(side.opposite()).unwrap_or(0);
        self.chunk_mut(tile).add(tile, flag, projectile);
        self.chunk_mut(neighbour).add(neighbour, mirrored, projectile);
    }

    pub fn remove_chunk(&mut self, coords: ChunkCoords) {
        self.chunks.remove(&coords);
    }

    /// Copies the flags of one source chunk height into a destination chunk
    /// height, rotating the 8x8 grid clockwise `rot` quarter turns.
    pub fn copy_rotated(
        &mut self,
        source: ChunkCoords,
        source_height: i32,
        dest: ChunkCoords,
        dest_height: i32,
        rot: i32,
    ) {
        let Some(chunk) = self.chunks.get(&source).cloned() else {
            return;
        };
        for lx in 0..CHUNK_SIZE {
            for lz in 0..CHUNK_SIZE {
                let from = source.bottom_left(source_height).transform(lx, lz);
                let (rx, rz) = rotate_local(lx, lz, rot, 1, 1);
                let to = dest.bottom_left(dest_height).transform(rx, rz);
                let walk = rotate_walls(chunk.get(from, false), rot);
                let projectile = rotate_walls(chunk.get(from, true), rot);
                let target = self.chunk_mut(to);
                target.add(to, walk & !projectile, false);
                target.add(to, projectile, true);
            }
        }
    }

    /// Whether a pawn of `size` standing on `from` may take one step towards
    /// `direction`.
    pub fn can_traverse(&self, from: Tile, direction: Direction, size: i32, projectile: bool) -> bool {
        let size = size.max(1);
        for dx in 0..size {
            for dz in 0..size {
                if !self.can_step(from.transform(dx, dz), direction, projectile) {
                    return false;
                }
            }
        }
        true
    }

    fn can_step(&self, from: Tile, direction: Direction, projectile: bool) -> bool {
        let (dx, dz) = direction.delta();
        if dx != 0 && dz != 0 {
            let horizontal = Direction::from_delta(dx, 0);
            let vertical = Direction::from_delta(0, dz);
            let (Some(horizontal), Some(vertical)) = (horizontal, vertical) else {
                return false;
            };
            return self.can_step(from, horizontal, projectile)
                && self.can_step(from, vertical, projectile)
                && self.can_step(from.step(horizontal), vertical, projectile)
                && self.can_step(from.step(vertical), horizontal, projectile);
        }
        let to = from.step(direction);
        if self.flags(to, projectile) & BLOCKED != 0 {
            return false;
        }
        let out_wall = wall_flag(direction).unwrap_or(0);
        let in_wall = wall_flag(direction.opposite()).unwrap_or(0);
        self.flags(from, projectile) & out_wall == 0 && self.flags(to, projectile) & in_wall == 0
    }

    /// Walks the straight line between two tiles, failing on the first step
    /// that is clipped.
    pub fn raycast(&self, start: Tile, target: Tile, projectile: bool) -> bool {
        if start.height != target.height {
            return false;
        }
        let dx = target.x - start.x;
        let dz = target.z - start.z;
        let steps = dx.abs().max(dz.abs());
        let mut current = start;
        for i in 1..=steps {
            let next = Tile::new(
                start.x + div_round(dx * i, steps),
                start.z + div_round(dz * i, steps),
                start.height,
            );
            let Some(direction) = Direction::between(current, next) else {
                continue;
            };
            if !self.can_step(current, direction, projectile) {
                return false;
            }
            current = next;
        }
        true
    }
}

fn div_round(numerator: i32, denominator: i32) -> i32 {
    let doubled = numerator * 2;
    let q = doubled / denominator;
    (q + q.signum()) / 2
}

fn wall_flag(side: Direction) -> Option<u16> {
    match side {
        Direction::North => Some(WALL_NORTH),
        Direction::East => Some(WALL_EAST),
        Direction::South => Some(WALL_SOUTH),
        Direction::West => Some(WALL_WEST),
        _ => None,
    }
}

fn rotate_walls(flags: u16, rot: i32) -> u16 {
    let mut walls = flags & 0xf;
    for _ in 0..(rot & 3) {
        // north -> east -> south -> west -> north
        walls = ((walls << 1) | (walls >> 3)) & 0xf;
    }
    (flags & !0xf) | walls
}

/// Rotates a local chunk offset clockwise for an object of the given footprint.
pub fn rotate_local(x: i32, z: i32, rot: i32, width: i32, length: i32) -> (i32, i32) {
    let max = CHUNK_SIZE - 1;
    match rot & 3 {
        0 => (x, z),
        1 => (z, max - x - (width - 1)),
        2 => (max - x - (width - 1), max - z - (length - 1)),
        _ => (max - z - (length - 1), x),
    }
}
