use crate::combat::damage_map::DamageMap;
use crate::combat::hit::Hit;
use crate::entities::attributes::{AttributeMap, EntityKind, PawnRef, FACING_PAWN};
use crate::entities::movement::{MovementQueue, StepResult};
use crate::entities::npc::NpcData;
use crate::entities::player::PlayerData;
use crate::entities::timers::{TimerMap, FROZEN_TIMER, STUN_TIMER};
use crate::net::message::{Message, SetMapFlagMessage};
use crate::path::future::FutureRoute;
use crate::path::request::Route;
use crate::queue::QueueTaskSet;
use crate::sync::block::{
    UpdateBlockBuffer, UpdateBlockType, MOVEMENT_TYPE_RUN, MOVEMENT_TYPE_TELEPORT, MOVEMENT_TYPE_WALK,
};
use crate::world::collision::CollisionMap;
use crate::world::tile::{Direction, Tile};
use crate::world::time::GameTick;
use std::collections::HashMap;

/// Radius within which a move is shown as a step rather than a teleport.
pub const NORMAL_VIEW_DISTANCE: i32 = 15;
pub const EQUIPMENT_BONUS_COUNT: usize = 18;
/// Added to player indices in face-pawn updates so the client can tell them
/// from npc indices.
pub const PLAYER_FACE_OFFSET: i32 = 32768;

const FACE_ANGLE_SCALE: f64 = 2607.5945876176133;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockState {
    #[default]
    None,
    Full,
    DelayActions,
    DelayDamage,
    FullDelayDamage,
}

impl LockState {
    /// Pending hits are held while in one of these states.
    pub fn delays_damage(self) -> bool {
        matches!(self, LockState::DelayDamage | LockState::FullDelayDamage)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PawnKind {
    Player(PlayerData),
    Npc(NpcData),
}

/// A player or npc living in the world. Shared state sits here once; the
/// kind-specific parts live in [`PawnKind`].
#[derive(Debug)]
pub struct Pawn {
    pub kind: PawnKind,
    pub tile: Tile,
    pub(crate) index: Option<usize>,
    pub(crate) uid: u64,
    pub lock: LockState,
    pub movement_queue: MovementQueue,
    pub(crate) future_route: Option<FutureRoute>,
    pub damage_map: DamageMap,
    pub(crate) pending_hits: Vec<Hit>,
    pub blocks: UpdateBlockBuffer,
    pub timers: TimerMap,
    pub attributes: AttributeMap,
    pub invisible: bool,
    pub teleported: bool,
    pub moved: bool,
    pub equipment_bonuses: [i32; EQUIPMENT_BONUS_COUNT],
    pub infinite_health: bool,
    pub last_facing: Direction,
    pub queues: QueueTaskSet,
    lifepoints: i32,
    max_lifepoints: i32,
    pub(crate) route_seq: u64,
    pub(crate) route_results: HashMap<u64, Route>,
    animation_busy_until: GameTick,
}

impl Pawn {
    pub fn new(kind: PawnKind, tile: Tile, max_lifepoints: i32) -> Self {
        let max_lifepoints = max_lifepoints.max(1);
        Self {
            kind,
            tile,
            index: None,
            uid: 0,
            lock: LockState::None,
            movement_queue: MovementQueue::new(),
            future_route: None,
            damage_map: DamageMap::new(),
            pending_hits: Vec::new(),
            blocks: UpdateBlockBuffer::new(),
            timers: TimerMap::new(),
            attributes: AttributeMap::new(),
            invisible: false,
            teleported: false,
            moved: false,
            equipment_bonuses: [0; EQUIPMENT_BONUS_COUNT],
            infinite_health: false,
            last_facing: Direction::South,
            queues: QueueTaskSet::new(),
            lifepoints: max_lifepoints,
            max_lifepoints,
            route_seq: 0,
            route_results: HashMap::new(),
            animation_busy_until: GameTick(0),
        }
    }

    pub fn player(data: PlayerData, tile: Tile, max_lifepoints: i32) -> Self {
        Self::new(PawnKind::Player(data), tile, max_lifepoints)
    }

    pub fn npc(data: NpcData, tile: Tile, max_lifepoints: i32) -> Self {
        Self::new(PawnKind::Npc(data), tile, max_lifepoints)
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self.kind {
            PawnKind::Player(_) => EntityKind::Player,
            PawnKind::Npc(_) => EntityKind::Npc,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, PawnKind::Player(_))
    }

    pub fn is_npc(&self) -> bool {
        matches!(self.kind, PawnKind::Npc(_))
    }

    pub fn as_player(&self) -> Option<&PlayerData> {
        match &self.kind {
            PawnKind::Player(data) => Some(data),
            PawnKind::Npc(_) => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            PawnKind::Player(data) => Some(data),
            PawnKind::Npc(_) => None,
        }
    }

    pub fn as_npc(&self) -> Option<&NpcData> {
        match &self.kind {
            PawnKind::Npc(data) => Some(data),
            PawnKind::Player(_) => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Handle to this pawn, available once it is registered.
    pub fn pawn_ref(&self) -> Option<PawnRef> {
        self.index.map(|index| PawnRef {
            kind: self.entity_kind(),
            index,
            uid: self.uid,
        })
    }

    pub fn size(&self) -> i32 {
        match &self.kind {
            PawnKind::Npc(data) => data.size,
            PawnKind::Player(_) => 1,
        }
    }

    pub fn lifepoints(&self) -> i32 {
        self.lifepoints
    }

    pub fn max_lifepoints(&self) -> i32 {
        self.max_lifepoints
    }

    pub fn set_lifepoints(&mut self, value: i32) {
        self.lifepoints = value.clamp(0, self.max_lifepoints);
    }

    pub fn set_max_lifepoints(&mut self, value: i32) {
        self.max_lifepoints = value.max(1);
        self.lifepoints = self.lifepoints.min(self.max_lifepoints);
    }

    pub fn is_alive(&self) -> bool {
        self.lifepoints > 0
    }

    pub fn is_dead(&self) -> bool {
        !self.is_alive()
    }

    pub fn unlock(&mut self) {
        self.lock = LockState::None;
    }

    pub fn is_frozen(&self) -> bool {
        self.timers.has(FROZEN_TIMER)
    }

    pub fn is_stunned(&self) -> bool {
        self.timers.has(STUN_TIMER)
    }

    pub fn has_future_route(&self) -> bool {
        self.future_route.is_some()
    }

    pub fn pending_hit_count(&self) -> usize {
        self.pending_hits.len()
    }

    pub fn add_hit(&mut self, hit: Hit) {
        self.pending_hits.push(hit);
    }

    pub fn clear_hits(&mut self) {
        self.pending_hits.clear();
    }

    /// Writes a message to the player's outbox; npcs ignore it.
    pub fn write(&mut self, message: Message) {
        if let Some(player) = self.as_player_mut() {
            player.write(message);
        }
    }

    /// Plays `id` unless a previous non-interruptible animation is still
    /// running. `priority` animations always play.
    pub fn animate(&mut self, id: i32, delay: i32, duration_ticks: u64, priority: bool, now: GameTick) -> bool {
        if !priority && now < self.animation_busy_until {
            return false;
        }
        self.blocks.animation = id;
        self.blocks.animation_delay = delay.max(0);
        self.blocks.add(UpdateBlockType::Animation);
        self.animation_busy_until = GameTick(now.0.saturating_add(duration_ticks));
        true
    }

    pub fn reset_animation(&mut self) {
        self.blocks.animation = -1;
        self.blocks.animation_delay = 0;
        self.blocks.add(UpdateBlockType::Animation);
        self.animation_busy_until = GameTick(0);
    }

    pub fn graphic(&mut self, id: i32, height: i32, delay: i32) {
        self.blocks.graphic_id = id;
        self.blocks.graphic_height = height;
        self.blocks.graphic_delay = delay;
        self.blocks.add(UpdateBlockType::Graphic);
    }

    pub fn force_chat(&mut self, message: &str) {
        self.blocks.force_chat = message.to_string();
        self.blocks.add(UpdateBlockType::ForceChat);
    }

    pub fn set_transmog(&mut self, id: i32) {
        self.blocks.transmog = id;
        self.blocks.add(UpdateBlockType::Appearance);
    }

    pub fn face_tile(&mut self, target: Tile) {
        self.blocks.face_degrees = match self.kind {
            PawnKind::Player(_) => player_face_angle(self.tile, target),
            PawnKind::Npc(_) => npc_face_coords(target),
        };
        self.blocks.face_pawn_index = -1;
        self.attributes.remove(FACING_PAWN);
        if let Some(direction) = Direction::between(self.tile, target) {
            self.last_facing = direction;
        }
        self.blocks.add(UpdateBlockType::FaceTile);
    }

    /// Turns towards `target` and keeps following it client-side. Facing the
    /// pawn already faced does not produce a new update.
    pub fn face_pawn(&mut self, target: PawnRef, target_tile: Tile) {
        if self.attributes.get(FACING_PAWN) == Some(&target) {
            return;
        }
        self.blocks.face_pawn_index = face_index(target);
        self.blocks.add(UpdateBlockType::FacePawn);
        self.attributes.put(FACING_PAWN, target);
        if let Some(direction) = Direction::between(self.tile, target_tile) {
            self.last_facing = direction;
        }
    }

    pub fn reset_face_pawn(&mut self) {
        if self.attributes.remove(FACING_PAWN).is_none() {
            return;
        }
        self.blocks.face_pawn_index = -1;
        self.blocks.add(UpdateBlockType::FacePawn);
    }

    /// Clears pending steps and, for players, the destination marker.
    pub fn stop_movement(&mut self) {
        self.movement_queue.clear();
        self.write(Message::SetMapFlag(SetMapFlagMessage::clear()));
    }

    pub fn teleport_to(&mut self, tile: Tile) {
        self.place(tile, true);
    }

    /// Moves without walking. Short moves are shown as a step rather than a
    /// teleport.
    pub fn move_to(&mut self, tile: Tile) {
        let far = !self.tile.is_within_radius(tile, NORMAL_VIEW_DISTANCE);
        self.place(tile, far);
    }

    fn place(&mut self, tile: Tile, teleport: bool) {
        self.tile = tile;
        self.moved = true;
        self.teleported = teleport;
        self.movement_queue.clear();
        self.blocks.teleport = teleport;
        self.blocks.walk_direction = None;
        self.blocks.run_direction = None;
        self.blocks.movement_type = if teleport {
            MOVEMENT_TYPE_TELEPORT
        } else {
            MOVEMENT_TYPE_WALK
        };
        self.blocks.add(UpdateBlockType::MovementType);
        self.blocks.add(UpdateBlockType::Movement);
    }

    pub(crate) fn apply_step(&mut self, step: StepResult) {
        self.tile = step.tile;
        self.moved = true;
        self.blocks.walk_direction = Some(step.walk);
        self.blocks.run_direction = step.run;
        let movement_type = if step.run.is_some() {
            MOVEMENT_TYPE_RUN
        } else {
            MOVEMENT_TYPE_WALK
        };
        if self.blocks.movement_type != movement_type {
            self.blocks.movement_type = movement_type;
            self.blocks.add(UpdateBlockType::MovementType);
        }
        self.last_facing = step.run.unwrap_or(step.walk);
        self.blocks.add(UpdateBlockType::Movement);
    }

    /// Whether `other` lies in the half-plane this pawn is facing.
    pub fn faces(&self, other: Tile, max_distance: i32) -> bool {
        if other.height != self.tile.height {
            return false;
        }
        if self.tile.same_xz(other) {
            return true;
        }
        if self.tile.distance(other) > max_distance {
            return false;
        }
        let dx = other.x - self.tile.x;
        let dz = other.z - self.tile.z;
        match self.last_facing {
            Direction::NorthWest => dz >= dx,
            Direction::North => dz >= 0,
            Direction::NorthEast => dz >= -dx,
            Direction::West => dx <= 0,
            Direction::East => dx >= 0,
            Direction::SouthWest => dz <= -dx,
            Direction::South => dz <= 0,
            Direction::SouthEast => dx >= dz,
        }
    }

    pub fn has_line_of_sight_to(
        &self,
        collision: &CollisionMap,
        other: Tile,
        projectile: bool,
        max_distance: i32,
    ) -> bool {
        if self.tile.height != other.height {
            return false;
        }
        if self.tile.same_xz(other) {
            return true;
        }
        if self.tile.distance(other) > max_distance {
            return false;
        }
        collision.raycast(self.tile, other, projectile)
    }

    pub fn sees(&self, collision: &CollisionMap, other: Tile, max_distance: i32) -> bool {
        self.faces(other, max_distance) && self.has_line_of_sight_to(collision, other, true, max_distance)
    }

    pub fn bonus(&self, slot: usize) -> i32 {
        self.equipment_bonuses.get(slot).copied().unwrap_or(0)
    }

    /// Resets per-tick flags after synchronization.
    pub(crate) fn post_sync(&mut self) {
        self.blocks.clear();
        self.moved = false;
        self.teleported = false;
    }
}

pub fn face_index(target: PawnRef) -> i32 {
    match target.kind {
        EntityKind::Player => target.index as i32 + PLAYER_FACE_OFFSET,
        EntityKind::Npc => target.index as i32,
    }
}

pub fn player_face_angle(source: Tile, target: Tile) -> i32 {
    let dx = f64::from(source.x - target.x);
    let dz = f64::from(source.z - target.z);
    ((dx.atan2(dz) * FACE_ANGLE_SCALE) as i32) & 0x3fff
}

pub fn npc_face_coords(target: Tile) -> i32 {
    ((target.x * 2 + 1) << 16) | (target.z * 2 + 1)
}
