use crate::world::collision::CollisionMap;
use crate::world::tile::Tile;
use std::collections::HashMap;

pub const CHUNK_SIZE: i32 = 8;
pub const REGION_SIZE: i32 = 64;
/// Tiles the client keeps loaded along each axis.
pub const MAX_VIEWPORT: i32 = 104;
/// Chunks along each axis of the client viewport.
pub const CHUNKS_PER_VIEWPORT: i32 = MAX_VIEWPORT / CHUNK_SIZE;
/// Chunks copied around a pawn for off-thread path finding.
pub const CHUNK_VIEW_RADIUS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkCoords {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoords {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn from_tile(tile: Tile) -> Self {
        Self {
            x: tile.chunk_x(),
            z: tile.chunk_z(),
        }
    }

    pub fn bottom_left(self, height: i32) -> Tile {
        Tile::new(self.x * CHUNK_SIZE, self.z * CHUNK_SIZE, height)
    }

    pub fn region_id(self) -> i32 {
        ((self.x >> 3) << 8) | (self.z >> 3)
    }

    pub fn within_radius(self, radius: i32) -> impl Iterator<Item = ChunkCoords> {
        let (cx, cz) = (self.x, self.z);
        (cx - radius..=cx + radius)
            .flat_map(move |x| (cz - radius..=cz + radius).map(move |z| ChunkCoords { x, z }))
    }
}

/// An object baked into the static map. Solid objects clip every tile they cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticObject {
    pub id: i32,
    pub tile: Tile,
    pub width: i32,
    pub length: i32,
    pub rot: i32,
    pub solid: bool,
    pub blocks_projectiles: bool,
}

impl StaticObject {
    /// Footprint dimensions after rotation.
    pub fn dimensions(&self) -> (i32, i32) {
        if self.rot & 1 == 1 {
            (self.length, self.width)
        } else {
            (self.width, self.length)
        }
    }

    pub fn footprint(&self) -> impl Iterator<Item = Tile> + '_ {
        let (width, length) = self.dimensions();
        let origin = self.tile;
        (0..width).flat_map(move |dx| (0..length).map(move |dz| origin.transform(dx, dz)))
    }
}

#[derive(Debug, Default, Clone)]
pub struct ChunkSet {
    objects: HashMap<ChunkCoords, Vec<StaticObject>>,
}

impl ChunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, collision: &mut CollisionMap, object: StaticObject) {
        if object.solid {
            for tile in object.footprint() {
                collision.add_blocked(tile, object.blocks_projectiles);
            }
        }
        self.objects
            .entry(ChunkCoords::from_tile(object.tile))
            .or_default()
            .push(object);
    }

    pub fn objects_in(&self, coords: ChunkCoords) -> &[StaticObject] {
        self.objects.get(&coords).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn remove_chunk(&mut self, coords: ChunkCoords) -> Vec<StaticObject> {
        self.objects.remove(&coords).unwrap_or_default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }
}
