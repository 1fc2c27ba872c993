use crate::entities::attributes::PawnRef;
use crate::entities::npc::NpcData;
use crate::net::message::{pack_chunk_ref, REBUILD_CHUNK_SLOTS};
use crate::telemetry::logging;
use crate::world::chunk::{ChunkCoords, StaticObject, CHUNKS_PER_VIEWPORT, CHUNK_SIZE, REGION_SIZE};
use crate::world::collision::rotate_local;
use crate::world::state::World;
use crate::world::tile::{Tile, TOTAL_HEIGHT_LEVELS};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

/// Ticks between scans for instances that should be released.
pub const INSTANCE_SCAN_INTERVAL: u64 = 25;
const CHUNKS_PER_REGION: i32 = REGION_SIZE / CHUNK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstancedMapAttribute {
    /// Released when the owner logs out.
    DeallocateOnLogout,
    /// Released when the owner dies.
    DeallocateOnDeath,
    /// Released once no player is left inside.
    DeallocateWhenEmpty,
}

impl InstancedMapAttribute {
    pub fn requires_owner(self) -> bool {
        matches!(
            self,
            InstancedMapAttribute::DeallocateOnLogout | InstancedMapAttribute::DeallocateOnDeath
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceConfigError {
    MissingExitTile,
    OwnerRequired(InstancedMapAttribute),
}

impl std::fmt::Display for InstanceConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceConfigError::MissingExitTile => write!(f, "instance exit tile must be set"),
            InstanceConfigError::OwnerRequired(attribute) => {
                write!(f, "instance attribute {:?} requires an owner", attribute)
            }
        }
    }
}

impl std::error::Error for InstanceConfigError {}

/// Npc spawned with the instance, placed relative to its bottom-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceNpcSpawn {
    pub id: i32,
    pub x: i32,
    pub z: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancedMapConfiguration {
    pub exit_tile: Tile,
    /// Stable uid of the owning player.
    pub owner: Option<u64>,
    pub attributes: HashSet<InstancedMapAttribute>,
    /// Skip objects whose rotated footprint leaves their chunk instead of
    /// failing the allocation. Skipped objects are not placed at all.
    pub bypass_object_chunk_bounds: bool,
    pub npcs: Vec<InstanceNpcSpawn>,
}

impl InstancedMapConfiguration {
    pub fn builder() -> InstancedMapConfigurationBuilder {
        InstancedMapConfigurationBuilder::default()
    }

    pub fn has(&self, attribute: InstancedMapAttribute) -> bool {
        self.attributes.contains(&attribute)
    }
}

#[derive(Debug, Default)]
pub struct InstancedMapConfigurationBuilder {
    exit_tile: Option<Tile>,
    owner: Option<u64>,
    attributes: HashSet<InstancedMapAttribute>,
    bypass_object_chunk_bounds: bool,
    npcs: Vec<InstanceNpcSpawn>,
}

impl InstancedMapConfigurationBuilder {
    pub fn exit_tile(mut self, tile: Tile) -> Self {
        self.exit_tile = Some(tile);
        self
    }

    pub fn owner(mut self, uid: u64) -> Self {
        self.owner = Some(uid);
        self
    }

    pub fn attribute(mut self, attribute: InstancedMapAttribute) -> Self {
        self.attributes.insert(attribute);
        self
    }

    pub fn bypass_object_chunk_bounds(mut self, bypass: bool) -> Self {
        self.bypass_object_chunk_bounds = bypass;
        self
    }

    pub fn npc(mut self, id: i32, x: i32, z: i32, height: i32) -> Self {
        self.npcs.push(InstanceNpcSpawn { id, x, z, height });
        self
    }

    pub fn build(self) -> Result<InstancedMapConfiguration, InstanceConfigError> {
        let exit_tile = self.exit_tile.ok_or(InstanceConfigError::MissingExitTile)?;
        if self.owner.is_none() {
            let mut needs_owner: Vec<_> = self
                .attributes
                .iter()
                .copied()
                .filter(|attribute| attribute.requires_owner())
                .collect();
            needs_owner.sort();
            if let Some(attribute) = needs_owner.first() {
                return Err(InstanceConfigError::OwnerRequired(*attribute));
            }
        }
        Ok(InstancedMapConfiguration {
            exit_tile,
            owner: self.owner,
            attributes: self.attributes,
            bypass_object_chunk_bounds: self.bypass_object_chunk_bounds,
            npcs: self.npcs,
        })
    }
}

/// Source of one instance chunk: a chunk of the static map, one of its
/// heights, and how many clockwise quarter turns to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstancedChunk {
    pub source: ChunkCoords,
    pub source_height: i32,
    pub rot: i32,
}

impl InstancedChunk {
    pub fn new(source: ChunkCoords, source_height: i32, rot: i32) -> Self {
        Self {
            source,
            source_height,
            rot: rot & 3,
        }
    }

    /// Form used in region rebuild payloads.
    pub fn packed(&self) -> u32 {
        pack_chunk_ref(self.source.x, self.source.z, self.source_height, self.rot)
    }
}

/// Instance layout: `region_size` regions along each axis, keyed by chunk
/// offset from the instance origin and destination height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancedChunkSet {
    pub region_size: i32,
    chunks: BTreeMap<(i32, i32, i32), InstancedChunk>,
}

impl InstancedChunkSet {
    pub fn builder(region_size: i32) -> InstancedChunkSetBuilder {
        InstancedChunkSetBuilder {
            set: InstancedChunkSet {
                region_size: region_size.max(1),
                chunks: BTreeMap::new(),
            },
        }
    }

    pub fn get(&self, chunk_x: i32, chunk_z: i32, height: i32) -> Option<&InstancedChunk> {
        self.chunks.get(&(chunk_x, chunk_z, height))
    }

    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32, i32), &InstancedChunk)> {
        self.chunks.iter().map(|(key, chunk)| (*key, chunk))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

pub struct InstancedChunkSetBuilder {
    set: InstancedChunkSet,
}

impl InstancedChunkSetBuilder {
    /// Places `chunk` at the given chunk offset. Offsets outside the set's
    /// regions are ignored.
    pub fn set(mut self, chunk_x: i32, chunk_z: i32, height: i32, chunk: InstancedChunk) -> Self {
        let bound = self.set.region_size * CHUNKS_PER_REGION;
        let inside = (0..bound).contains(&chunk_x)
            && (0..bound).contains(&chunk_z)
            && (0..TOTAL_HEIGHT_LEVELS).contains(&height);
        if inside {
            self.set.chunks.insert((chunk_x, chunk_z, height), chunk);
        }
        self
    }

    pub fn build(self) -> InstancedChunkSet {
        self.set
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancedMap {
    pub id: u32,
    /// Bottom-left tile of the instance, height 0.
    pub area: Tile,
    pub chunks: InstancedChunkSet,
    pub configuration: InstancedMapConfiguration,
    pub npcs: Vec<PawnRef>,
}

impl InstancedMap {
    pub fn size_in_tiles(&self) -> i32 {
        self.chunks.region_size * REGION_SIZE
    }

    pub fn contains(&self, tile: Tile) -> bool {
        let size = self.size_in_tiles();
        (self.area.x..self.area.x + size).contains(&tile.x)
            && (self.area.z..self.area.z + size).contains(&tile.z)
    }

    /// Packed source references for every chunk of the viewport around
    /// `tile`, heights outermost, then x, then z.
    pub fn get_coordinates(&self, tile: Tile) -> Vec<Option<u32>> {
        let mut coordinates = Vec::with_capacity(REBUILD_CHUNK_SLOTS);
        let half = CHUNKS_PER_VIEWPORT / 2;
        let origin_x = self.area.chunk_x();
        let origin_z = self.area.chunk_z();
        for height in 0..TOTAL_HEIGHT_LEVELS {
            for x in tile.chunk_x() - half..=tile.chunk_x() + half {
                for z in tile.chunk_z() - half..=tile.chunk_z() + half {
                    let packed = self
                        .chunks
                        .get(x - origin_x, z - origin_z, height)
                        .map(InstancedChunk::packed);
                    coordinates.push(packed);
                }
            }
        }
        coordinates
    }
}

/// Coordinates reserved for instances, in regions from a region-aligned base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstanceArea {
    pub base_x: i32,
    pub base_z: i32,
    pub regions_x: i32,
    pub regions_z: i32,
}

impl Default for InstanceArea {
    fn default() -> Self {
        Self {
            base_x: 6400,
            base_z: 0,
            regions_x: 32,
            regions_z: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    EmptyChunkSet,
    AreaFull { region_size: i32 },
    ObjectOutOfBounds { object: i32, tile: Tile },
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::EmptyChunkSet => write!(f, "instance has no chunks"),
            AllocationError::AreaFull { region_size } => {
                write!(f, "no free {}x{} region slot for instance", region_size, region_size)
            }
            AllocationError::ObjectOutOfBounds { object, tile } => {
                write!(f, "object {} at {} leaves its chunk once rotated", object, tile)
            }
        }
    }
}

impl std::error::Error for AllocationError {}

/// Hands out region-aligned slots of the instance area and tracks the maps
/// living in them.
#[derive(Debug, Clone)]
pub struct InstancedMapAllocator {
    area: InstanceArea,
    maps: Vec<InstancedMap>,
    next_id: u32,
}

impl InstancedMapAllocator {
    pub fn new(area: InstanceArea) -> Self {
        let base_x = area.base_x - area.base_x.rem_euclid(REGION_SIZE);
        let base_z = area.base_z - area.base_z.rem_euclid(REGION_SIZE);
        Self {
            area: InstanceArea {
                base_x,
                base_z,
                ..area
            },
            maps: Vec::new(),
            next_id: 1,
        }
    }

    pub fn area(&self) -> InstanceArea {
        self.area
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn maps(&self) -> &[InstancedMap] {
        &self.maps
    }

    pub fn get_map(&self, tile: Tile) -> Option<&InstancedMap> {
        self.maps.iter().find(|map| map.contains(tile))
    }

    pub fn get(&self, id: u32) -> Option<&InstancedMap> {
        self.maps.iter().find(|map| map.id == id)
    }

    /// First free slot, scanning columns then rows.
    fn find_slot(&self, region_size: i32) -> Option<Tile> {
        let size = region_size * REGION_SIZE;
        for rx in 0..=self.area.regions_x - region_size {
            for rz in 0..=self.area.regions_z - region_size {
                let x = self.area.base_x + rx * REGION_SIZE;
                let z = self.area.base_z + rz * REGION_SIZE;
                let overlaps = self.maps.iter().any(|map| {
                    let other = map.size_in_tiles();
                    x < map.area.x + other && map.area.x < x + size && z < map.area.z + other && map.area.z < z + size
                });
                if !overlaps {
                    return Some(Tile::new(x, z, 0));
                }
            }
        }
        None
    }

    fn insert(&mut self, area: Tile, chunks: InstancedChunkSet, configuration: InstancedMapConfiguration) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.maps.push(InstancedMap {
            id,
            area,
            chunks,
            configuration,
            npcs: Vec::new(),
        });
        id
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut InstancedMap> {
        self.maps.iter_mut().find(|map| map.id == id)
    }

    fn remove(&mut self, id: u32) -> Option<InstancedMap> {
        let position = self.maps.iter().position(|map| map.id == id)?;
        Some(self.maps.remove(position))
    }
}

/// Rotated placement of `object` inside its destination chunk, or `None`
/// when the rotated footprint leaves the chunk.
fn place_object(object: &StaticObject, dest: ChunkCoords, dest_height: i32, rot: i32) -> Option<StaticObject> {
    let (width, length) = object.dimensions();
    let local_x = object.tile.x & (CHUNK_SIZE - 1);
    let local_z = object.tile.z & (CHUNK_SIZE - 1);
    let (x, z) = rotate_local(local_x, local_z, rot, width, length);
    let (rotated_width, rotated_length) = if rot & 1 == 1 { (length, width) } else { (width, length) };
    if x < 0 || z < 0 || x + rotated_width > CHUNK_SIZE || z + rotated_length > CHUNK_SIZE {
        return None;
    }
    Some(StaticObject {
        tile: dest.bottom_left(dest_height).transform(x, z),
        rot: (object.rot + rot) & 3,
        ..*object
    })
}

impl World {
    /// Builds an instance from `chunks`: copies collision and objects of the
    /// source chunks into a free slot and spawns the configured npcs.
    pub fn allocate_instance(
        &mut self,
        chunks: InstancedChunkSet,
        configuration: InstancedMapConfiguration,
    ) -> Result<u32, AllocationError> {
        if chunks.is_empty() {
            return Err(AllocationError::EmptyChunkSet);
        }
        let region_size = chunks.region_size;
        let area = self
            .instances
            .find_slot(region_size)
            .ok_or(AllocationError::AreaFull { region_size })?;

        let mut objects = Vec::new();
        for ((chunk_x, chunk_z, height), chunk) in chunks.iter() {
            let dest = ChunkCoords::new(area.chunk_x() + chunk_x, area.chunk_z() + chunk_z);
            for object in self.chunks.objects_in(chunk.source) {
                if object.tile.height != chunk.source_height {
                    continue;
                }
                match place_object(object, dest, height, chunk.rot) {
                    Some(placed) => objects.push(placed),
                    None if configuration.bypass_object_chunk_bounds => {}
                    None => {
                        return Err(AllocationError::ObjectOutOfBounds {
                            object: object.id,
                            tile: object.tile,
                        })
                    }
                }
            }
        }

        for ((chunk_x, chunk_z, height), chunk) in chunks.iter() {
            let dest = ChunkCoords::new(area.chunk_x() + chunk_x, area.chunk_z() + chunk_z);
            self.collision
                .copy_rotated(chunk.source, chunk.source_height, dest, height, chunk.rot);
        }
        for object in objects {
            self.chunks.add_object(&mut self.collision, object);
        }

        let spawns = configuration.npcs.clone();
        let id = self.instances.insert(area, chunks, configuration);
        let mut spawned = Vec::new();
        for spawn in spawns {
            let tile = Tile::new(area.x + spawn.x, area.z + spawn.z, spawn.height);
            let mut data = NpcData::new(spawn.id, tile);
            data.instance = Some(id);
            match self.spawn_npc(data) {
                Some(npc) => spawned.push(npc),
                None => logging::log_error(&format!("instance {}: npc list full, {} not spawned", id, spawn.id)),
            }
        }
        if let Some(map) = self.instances.get_mut(id) {
            map.npcs = spawned;
        }
        logging::log_instance(&format!("allocated instance {} at {} ({} regions)", id, area, region_size));
        Ok(id)
    }

    /// Releases an instance: players inside leave through the exit tile,
    /// its npcs are removed and its collision and objects are cleared.
    pub fn deallocate_instance(&mut self, id: u32) -> bool {
        let Some(map) = self.instances.remove(id) else {
            return false;
        };
        for player in self.players.refs() {
            let inside = self.pawn(player).map(|pawn| map.contains(pawn.tile)).unwrap_or(false);
            if inside {
                self.move_to(player, map.configuration.exit_tile);
            }
        }
        for npc in self.npcs.refs() {
            let spawned_here = self
                .pawn(npc)
                .and_then(|pawn| pawn.as_npc())
                .map(|data| data.instance == Some(id))
                .unwrap_or(false);
            if spawned_here {
                self.remove_pawn(npc);
            }
        }
        let chunk_count = map.size_in_tiles() / CHUNK_SIZE;
        let origin = ChunkCoords::from_tile(map.area);
        for x in 0..chunk_count {
            for z in 0..chunk_count {
                let coords = ChunkCoords::new(origin.x + x, origin.z + z);
                self.collision.remove_chunk(coords);
                self.chunks.remove_chunk(coords);
            }
        }
        logging::log_instance(&format!("deallocated instance {} at {}", id, map.area));
        true
    }

    pub fn get_map(&self, tile: Tile) -> Option<&InstancedMap> {
        self.instances.get_map(tile)
    }

    /// Instances owned by `uid` carrying `attribute`.
    pub(crate) fn owned_instances(&self, uid: u64, attribute: InstancedMapAttribute) -> Vec<u32> {
        self.instances
            .maps()
            .iter()
            .filter(|map| map.configuration.owner == Some(uid) && map.configuration.has(attribute))
            .map(|map| map.id)
            .collect()
    }

    /// Periodic release of instances left empty.
    pub(crate) fn cycle_instances(&mut self) {
        if self.clock.now().0 % INSTANCE_SCAN_INTERVAL != 0 {
            return;
        }
        let empty: Vec<u32> = self
            .instances
            .maps()
            .iter()
            .filter(|map| map.configuration.has(InstancedMapAttribute::DeallocateWhenEmpty))
            .filter(|map| !self.players.iter().any(|player| map.contains(player.tile)))
            .map(|map| map.id)
            .collect();
        for id in empty {
            self.deallocate_instance(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::entities::player::PlayerData;
    use crate::net::message::chunk_ref_region;

    fn world() -> World {
        World::new(WorldConfig::default()).expect("world")
    }

    fn exit() -> Tile {
        Tile::new(3222, 3218, 0)
    }

    fn single_chunk_set(rot: i32) -> InstancedChunkSet {
        InstancedChunkSet::builder(1)
            .set(0, 0, 0, InstancedChunk::new(ChunkCoords::new(402, 402), 0, rot))
            .build()
    }

    #[test]
    fn builder_requires_exit_tile() {
        assert_eq!(
            InstancedMapConfiguration::builder().build(),
            Err(InstanceConfigError::MissingExitTile)
        );
    }

    #[test]
    fn owner_required_attributes() {
        let err = InstancedMapConfiguration::builder()
            .exit_tile(exit())
            .attribute(InstancedMapAttribute::DeallocateOnLogout)
            .build()
            .expect_err("no owner");
        assert_eq!(err, InstanceConfigError::OwnerRequired(InstancedMapAttribute::DeallocateOnLogout));

        let config = InstancedMapConfiguration::builder()
            .exit_tile(exit())
            .owner(77)
            .attribute(InstancedMapAttribute::DeallocateOnLogout)
            .build()
            .expect("with owner");
        assert_eq!(config.owner, Some(77));

        let config = InstancedMapConfiguration::builder()
            .exit_tile(exit())
            .attribute(InstancedMapAttribute::DeallocateWhenEmpty)
            .build()
            .expect("no owner needed");
        assert!(config.has(InstancedMapAttribute::DeallocateWhenEmpty));
    }

    #[test]
    fn coordinates_cover_the_viewport() {
        let mut world = world();
        let config = InstancedMapConfiguration::builder().exit_tile(exit()).build().expect("config");
        let id = world.allocate_instance(single_chunk_set(1), config).expect("allocate");
        let map = world.instances.get(id).expect("map");
        let inside = map.area.transform(4, 4);
        let coordinates = map.get_coordinates(inside);
        assert_eq!(coordinates.len(), REBUILD_CHUNK_SLOTS);
        let present: Vec<u32> = coordinates.iter().flatten().copied().collect();
        assert_eq!(present.len(), 1);
        assert_eq!(chunk_ref_region(present[0]), exit().region_id());
        // centre chunk of height 0 sits at x = 6, z = 6
        assert!(coordinates[6 * 13 + 6].is_some());
    }

    #[test]
    fn rotated_collision_is_copied() {
        let mut world = world();
        world.collision.add_blocked(Tile::new(402 * 8, 402 * 8 + 7, 0), false);
        let config = InstancedMapConfiguration::builder().exit_tile(exit()).build().expect("config");
        let id = world.allocate_instance(single_chunk_set(1), config).expect("allocate");
        let area = world.instances.get(id).expect("map").area;
        // local (0, 7) turned once clockwise lands on (7, 7)
        assert!(world.collision.is_full(area.transform(7, 7), false));
        assert!(!world.collision.is_full(area.transform(0, 7), false));
        assert!(world.deallocate_instance(id));
        assert!(!world.collision.is_full(area.transform(7, 7), false));
    }

    #[test]
    fn oversized_objects_fail_unless_bypassed() {
        let mut world = world();
        world.chunks.add_object(
            &mut world.collision,
            StaticObject {
                id: 1276,
                tile: Tile::new(402 * 8 + 2, 402 * 8 + 7, 0),
                width: 2,
                length: 2,
                rot: 0,
                solid: true,
                blocks_projectiles: true,
            },
        );
        let strict = InstancedMapConfiguration::builder().exit_tile(exit()).build().expect("config");
        let err = world.allocate_instance(single_chunk_set(2), strict).expect_err("out of bounds");
        assert!(matches!(err, AllocationError::ObjectOutOfBounds { object: 1276, .. }));
        assert!(world.instances.is_empty());

        let lenient = InstancedMapConfiguration::builder()
            .exit_tile(exit())
            .bypass_object_chunk_bounds(true)
            .build()
            .expect("config");
        let id = world.allocate_instance(single_chunk_set(2), lenient).expect("allocate");
        let area = world.instances.get(id).expect("map").area;
        assert_eq!(world.chunks.objects_in(ChunkCoords::from_tile(area)).len(), 0);
    }

    #[test]
    fn slots_do_not_overlap() {
        let mut world = world();
        let config = InstancedMapConfiguration::builder().exit_tile(exit()).build().expect("config");
        let first = world.allocate_instance(single_chunk_set(0), config.clone()).expect("first");
        let second = world.allocate_instance(single_chunk_set(0), config).expect("second");
        let a = world.instances.get(first).expect("first").area;
        let b = world.instances.get(second).expect("second").area;
        assert_ne!(a, b);
        assert_eq!(a.x % REGION_SIZE, 0);
        assert!(world.get_map(b.transform(10, 10)).map(|map| map.id) == Some(second));
    }

    #[test]
    fn deallocation_evicts_players_and_npcs() {
        let mut world = world();
        let config = InstancedMapConfiguration::builder()
            .exit_tile(exit())
            .npc(100, 3, 3, 0)
            .build()
            .expect("config");
        let id = world.allocate_instance(single_chunk_set(0), config).expect("allocate");
        let map = world.instances.get(id).expect("map").clone();
        assert_eq!(map.npcs.len(), 1);
        assert_eq!(world.pawn(map.npcs[0]).expect("npc").tile, map.area.transform(3, 3));

        let player = world
            .register_player(PlayerData::new(5, "visitor"), map.area.transform(4, 4))
            .expect("player");
        assert!(world.deallocate_instance(id));
        assert_eq!(world.pawn(player).expect("player").tile, exit());
        assert!(world.pawn(map.npcs[0]).is_none());
        assert!(world.get_map(map.area).is_none());
    }

    #[test]
    fn empty_instances_are_released_on_scan() {
        let mut world = world();
        let config = InstancedMapConfiguration::builder()
            .exit_tile(exit())
            .attribute(InstancedMapAttribute::DeallocateWhenEmpty)
            .build()
            .expect("config");
        world.allocate_instance(single_chunk_set(0), config).expect("allocate");
        world.clock.advance(INSTANCE_SCAN_INTERVAL - 1);
        world.cycle_instances();
        assert_eq!(world.instances.len(), 1);
        world.clock.advance(1);
        world.cycle_instances();
        assert!(world.instances.is_empty());
    }
}
