use crate::entities::attributes::PawnRef;
use crate::entities::pawn::NORMAL_VIEW_DISTANCE;
use crate::entities::pawn_list::MAX_PLAYERS;
use crate::net::message::{referenced_regions, Message, RebuildNormalMessage, RebuildRegionMessage};
use crate::world::chunk::{CHUNK_SIZE, MAX_VIEWPORT};
use crate::world::state::World;
use crate::world::tile::Tile;

/// Chunks between the region base and the player's own chunk.
const BASE_CHUNK_OFFSET: i32 = 6;

/// Whether a player standing on `tile` is close enough to the edge of the
/// area loaded around `base` to need a new one.
pub fn should_rebuild(base: Tile, tile: Tile) -> bool {
    let dx = tile.x - base.x;
    let dz = tile.z - base.z;
    let far = MAX_VIEWPORT - NORMAL_VIEW_DISTANCE - 1;
    dx <= NORMAL_VIEW_DISTANCE || dx >= far || dz <= NORMAL_VIEW_DISTANCE || dz >= far
}

/// South-west corner of the area the client loads around `tile`.
pub fn region_base(tile: Tile) -> Tile {
    Tile::new(
        ((tile.x >> 3) - BASE_CHUNK_OFFSET) << 3,
        ((tile.z >> 3) - BASE_CHUNK_OFFSET) << 3,
        tile.height,
    )
}

impl World {
    pub(crate) fn check_region(&mut self, player: PawnRef) {
        let Some((tile, last, map_size, force_reload)) = self.pawn(player).and_then(|pawn| {
            pawn.as_player().map(|data| {
                (
                    pawn.tile,
                    data.last_known_region_base,
                    data.map_size,
                    data.force_map_refresh,
                )
            })
        }) else {
            return;
        };
        let rebuild = match last {
            Some(base) => should_rebuild(base, tile),
            None => true,
        };
        if !rebuild {
            return;
        }

        let coordinates = self.instances.get_map(tile).map(|map| map.get_coordinates(tile));
        let message = match coordinates {
            Some(coordinates) => Message::RebuildRegion(self.instanced_rebuild(player, tile, map_size, coordinates)),
            None => Message::RebuildNormal(self.normal_rebuild(tile, map_size, force_reload)),
        };
        if let Some(pawn) = self.pawn_mut(player) {
            pawn.write(message);
            if let Some(data) = pawn.as_player_mut() {
                data.last_known_region_base = Some(region_base(tile));
            }
        }
    }

    /// Keys of every region the viewport around `tile` touches.
    fn normal_rebuild(&mut self, tile: Tile, map_size: i32, force_reload: bool) -> RebuildNormalMessage {
        let chunk_x = tile.chunk_x();
        let chunk_z = tile.chunk_z();
        let mut xteas = Vec::new();
        for region_x in (chunk_x - BASE_CHUNK_OFFSET) / CHUNK_SIZE..=(chunk_x + BASE_CHUNK_OFFSET) / CHUNK_SIZE {
            for region_z in (chunk_z - BASE_CHUNK_OFFSET) / CHUNK_SIZE..=(chunk_z + BASE_CHUNK_OFFSET) / CHUNK_SIZE {
                xteas.push(self.xteas.get((region_x << 8) | region_z));
            }
        }
        RebuildNormalMessage {
            chunk_x,
            chunk_z,
            map_size,
            force_reload: i32::from(force_reload),
            xteas,
        }
    }

    fn instanced_rebuild(
        &mut self,
        player: PawnRef,
        tile: Tile,
        map_size: i32,
        coordinates: Vec<Option<u32>>,
    ) -> RebuildRegionMessage {
        let xteas = referenced_regions(&coordinates)
            .into_iter()
            .map(|region| self.xteas.get(region))
            .collect();
        let mut hints = vec![0u32; MAX_PLAYERS];
        for other in self.players.iter() {
            if let Some(slot) = other.index().and_then(|index| hints.get_mut(index)) {
                *slot = other.tile.as_region_hint();
            }
        }
        let player_regions = hints
            .into_iter()
            .enumerate()
            .filter(|(index, _)| *index != player.index)
            .map(|(_, hint)| hint)
            .collect();
        RebuildRegionMessage {
            chunk_x: tile.chunk_x(),
            chunk_z: tile.chunk_z(),
            force_reload: 1,
            map_size,
            coordinates,
            xteas,
            self_tile: tile,
            player_regions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::entities::movement::StepType;
    use crate::entities::player::PlayerData;
    use crate::net::message::chunk_ref_region;
    use crate::world::chunk::ChunkCoords;
    use crate::world::instance::{InstancedChunk, InstancedChunkSet, InstancedMapConfiguration};
    use crate::world::xtea::XteaKey;

    fn world() -> World {
        World::new(WorldConfig::default()).expect("world")
    }

    fn decoded_frames(world: &mut World, player: PawnRef) -> Vec<Message> {
        let frames = world
            .pawn_mut(player)
            .and_then(|pawn| pawn.as_player_mut())
            .expect("player data")
            .take_frames();
        frames
            .iter()
            .map(|frame| Message::decode(&world.layouts, frame).expect("decode"))
            .collect()
    }

    #[test]
    fn base_sits_six_chunks_behind() {
        assert_eq!(region_base(Tile::new(3222, 3218, 0)), Tile::new(3168, 3168, 0));
        assert_eq!(region_base(Tile::new(3256, 3218, 1)), Tile::new(3208, 3168, 1));
    }

    #[test]
    fn rebuild_threshold() {
        let base = Tile::new(3168, 3168, 0);
        assert!(!should_rebuild(base, Tile::new(3222, 3218, 0)));
        assert!(should_rebuild(base, Tile::new(3168 + 15, 3218, 0)));
        assert!(!should_rebuild(base, Tile::new(3168 + 87, 3218, 0)));
        assert!(should_rebuild(base, Tile::new(3168 + 88, 3218, 0)));
        assert!(should_rebuild(base, Tile::new(3222, 3168 + 88, 0)));
    }

    #[test]
    fn walking_east_rebuilds_once_at_the_edge() {
        let mut world = world();
        let player = world
            .register_player(PlayerData::new(1, "walker"), Tile::new(3222, 3218, 0))
            .expect("player");
        world.cycle().expect("tick");
        let initial: Vec<Message> = decoded_frames(&mut world, player)
            .into_iter()
            .filter(|message| matches!(message, Message::RebuildNormal(_)))
            .collect();
        assert_eq!(initial.len(), 1);

        let mut rebuilds = Vec::new();
        for _ in 0..45 {
            let tile = world.pawn(player).expect("pawn").tile;
            world.walk_path(player, [tile.transform(1, 0)], StepType::Normal, true);
            world.cycle().expect("tick");
            let tile = world.pawn(player).expect("pawn").tile;
            for message in decoded_frames(&mut world, player) {
                if let Message::RebuildNormal(rebuild) = message {
                    rebuilds.push((tile, rebuild));
                }
            }
        }
        assert_eq!(world.pawn(player).expect("pawn").tile, Tile::new(3267, 3218, 0));
        assert_eq!(rebuilds.len(), 1);
        let (tile, rebuild) = &rebuilds[0];
        assert_eq!(tile.x, 3256);
        assert_eq!(rebuild.chunk_x, 407);
        assert_eq!(
            world
                .pawn(player)
                .and_then(|pawn| pawn.as_player())
                .and_then(|data| data.last_known_region_base),
            Some(Tile::new(3208, 3168, 0))
        );
    }

    #[test]
    fn normal_rebuild_lists_viewport_region_keys() {
        let mut world = world();
        world.xteas.insert((50 << 8) | 50, XteaKey::new([1, 2, 3, 4]));
        let message = world.normal_rebuild(Tile::new(3222, 3218, 0), 0, false);
        assert_eq!((message.chunk_x, message.chunk_z), (402, 402));
        assert_eq!(message.xteas.len(), 9);
        assert_eq!(message.xteas[4], XteaKey::new([1, 2, 3, 4]));
        assert!(message.xteas[0].is_zero());
    }

    #[test]
    fn instanced_rebuild_references_source_chunks() {
        let mut world = world();
        let source = ChunkCoords::new(400, 400);
        world.xteas.insert((50 << 8) | 50, XteaKey::new([9, 8, 7, 6]));
        let chunks = InstancedChunkSet::builder(1)
            .set(0, 0, 0, InstancedChunk::new(source, 0, 1))
            .build();
        let config = InstancedMapConfiguration::builder()
            .exit_tile(Tile::new(3222, 3218, 0))
            .build()
            .expect("config");
        let id = world.allocate_instance(chunks, config).expect("allocate");
        let area = world.instances.get(id).expect("map").area;
        let inside = area.transform(3, 4);
        let player = world
            .register_player(PlayerData::new(1, "visitor"), inside)
            .expect("player");
        let other = world
            .register_player(PlayerData::new(2, "friend"), Tile::new(3222, 3218, 0))
            .expect("other");
        world.cycle().expect("tick");

        let rebuild = decoded_frames(&mut world, player)
            .into_iter()
            .find_map(|message| match message {
                Message::RebuildRegion(rebuild) => Some(rebuild),
                _ => None,
            })
            .expect("instanced rebuild");
        assert_eq!(rebuild.force_reload, 1);
        assert_eq!(rebuild.chunk_x, inside.chunk_x());
        assert_eq!(rebuild.self_tile, inside);
        assert_eq!(rebuild.xteas, vec![XteaKey::new([9, 8, 7, 6])]);
        let referenced: Vec<u32> = rebuild.coordinates.iter().flatten().copied().collect();
        assert_eq!(referenced.len(), 1);
        assert_eq!(chunk_ref_region(referenced[0]), (50 << 8) | 50);
        assert_eq!(rebuild.player_regions.len(), MAX_PLAYERS - 1);
        let hint_slot = if other.index > player.index { other.index - 1 } else { other.index };
        assert_eq!(
            rebuild.player_regions[hint_slot],
            Tile::new(3222, 3218, 0).as_region_hint()
        );
    }
}
