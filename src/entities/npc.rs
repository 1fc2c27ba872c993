use crate::world::tile::Tile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcData {
    /// Definition id; combat and death hooks are keyed by it.
    pub id: i32,
    pub size: i32,
    pub spawn_tile: Tile,
    /// Instance the npc was spawned into, if any.
    pub instance: Option<u32>,
}

impl NpcData {
    pub fn new(id: i32, spawn_tile: Tile) -> Self {
        Self {
            id,
            size: 1,
            spawn_tile,
            instance: None,
        }
    }
}
