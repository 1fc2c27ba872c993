use crate::combat::hit::Hitmark;
use crate::net::packet::{PacketReader, PacketWriter};
use crate::world::tile::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateBlockType {
    Movement,
    MovementType,
    Animation,
    Graphic,
    FaceTile,
    FacePawn,
    ForceChat,
    Hitmark,
    Appearance,
}

/// Order in which flagged blocks are serialized.
pub const UPDATE_ORDER: [UpdateBlockType; 9] = [
    UpdateBlockType::Movement,
    UpdateBlockType::MovementType,
    UpdateBlockType::Appearance,
    UpdateBlockType::Animation,
    UpdateBlockType::Graphic,
    UpdateBlockType::FacePawn,
    UpdateBlockType::FaceTile,
    UpdateBlockType::ForceChat,
    UpdateBlockType::Hitmark,
];

impl UpdateBlockType {
    pub fn bit(self) -> u16 {
        match self {
            UpdateBlockType::Movement => 0x1,
            UpdateBlockType::MovementType => 0x2,
            UpdateBlockType::Animation => 0x4,
            UpdateBlockType::Graphic => 0x8,
            UpdateBlockType::FaceTile => 0x10,
            UpdateBlockType::FacePawn => 0x20,
            UpdateBlockType::ForceChat => 0x40,
            UpdateBlockType::Hitmark => 0x80,
            UpdateBlockType::Appearance => 0x100,
        }
    }
}

pub const MOVEMENT_TYPE_WALK: u8 = 1;
pub const MOVEMENT_TYPE_RUN: u8 = 2;
pub const MOVEMENT_TYPE_TELEPORT: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitUpdate {
    pub hitmark: Hitmark,
    pub lifepoints: i32,
    pub max_lifepoints: i32,
}

/// Everything about a pawn that changed during the current tick. Filled by
/// pawn operations, read by the synchronization pass, then cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBlockBuffer {
    flags: u16,
    pub teleport: bool,
    pub walk_direction: Option<Direction>,
    pub run_direction: Option<Direction>,
    pub movement_type: u8,
    pub animation: i32,
    pub animation_delay: i32,
    pub graphic_id: i32,
    pub graphic_height: i32,
    pub graphic_delay: i32,
    pub face_degrees: i32,
    pub face_pawn_index: i32,
    pub force_chat: String,
    pub hits: Vec<HitUpdate>,
    pub transmog: i32,
}

impl Default for UpdateBlockBuffer {
    fn default() -> Self {
        Self {
            flags: 0,
            teleport: false,
            walk_direction: None,
            run_direction: None,
            movement_type: 0,
            animation: -1,
            animation_delay: 0,
            graphic_id: -1,
            graphic_height: 0,
            graphic_delay: 0,
            face_degrees: 0,
            face_pawn_index: -1,
            force_chat: String::new(),
            hits: Vec::new(),
            transmog: -1,
        }
    }
}

impl UpdateBlockBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.flags != 0
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn add(&mut self, block: UpdateBlockType) {
        self.flags |= block.bit();
    }

    pub fn has(&self, block: UpdateBlockType) -> bool {
        self.flags & block.bit() != 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn write(&self, writer: &mut PacketWriter) {
        writer.write_u16(self.flags);
        for block in UPDATE_ORDER {
            if !self.has(block) {
                continue;
            }
            match block {
                UpdateBlockType::Movement => {
                    writer.write_u8(self.teleport as u8);
                    writer.write_u8(direction_byte(self.walk_direction));
                    writer.write_u8(direction_byte(self.run_direction));
                }
                UpdateBlockType::MovementType => writer.write_u8(self.movement_type),
                UpdateBlockType::Appearance => writer.write_i32(self.transmog),
                UpdateBlockType::Animation => {
                    writer.write_i32(self.animation);
                    writer.write_u8(self.animation_delay.clamp(0, 255) as u8);
                }
                UpdateBlockType::Graphic => {
                    writer.write_i32(self.graphic_id);
                    writer.write_u16(self.graphic_height.clamp(0, u16::MAX as i32) as u16);
                    writer.write_u16(self.graphic_delay.clamp(0, u16::MAX as i32) as u16);
                }
                UpdateBlockType::FacePawn => writer.write_i32(self.face_pawn_index),
                UpdateBlockType::FaceTile => writer.write_i32(self.face_degrees),
                UpdateBlockType::ForceChat => writer.write_string(&self.force_chat),
                UpdateBlockType::Hitmark => {
                    writer.write_u8(self.hits.len().min(u8::MAX as usize) as u8);
                    for hit in self.hits.iter().take(u8::MAX as usize) {
                        writer.write_u8(hit.hitmark.kind.id());
                        writer.write_i32(hit.hitmark.damage);
                        writer.write_i32(hit.lifepoints);
                        writer.write_i32(hit.max_lifepoints);
                    }
                }
            }
        }
    }

    /// Inverse of [`UpdateBlockBuffer::write`], used by tooling and tests.
    pub fn read(reader: &mut PacketReader<'_>) -> Option<Self> {
        let mut buffer = Self::new();
        buffer.flags = reader.read_u16()?;
        for block in UPDATE_ORDER {
            if !buffer.has(block) {
                continue;
            }
            match block {
                UpdateBlockType::Movement => {
                    buffer.teleport = reader.read_u8()? != 0;
                    buffer.walk_direction = direction_from_byte(reader.read_u8()?);
                    buffer.run_direction = direction_from_byte(reader.read_u8()?);
                }
                UpdateBlockType::MovementType => buffer.movement_type = reader.read_u8()?,
                UpdateBlockType::Appearance => buffer.transmog = reader.read_i32()?,
                UpdateBlockType::Animation => {
                    buffer.animation = reader.read_i32()?;
                    buffer.animation_delay = i32::from(reader.read_u8()?);
                }
                UpdateBlockType::Graphic => {
                    buffer.graphic_id = reader.read_i32()?;
                    buffer.graphic_height = i32::from(reader.read_u16()?);
                    buffer.graphic_delay = i32::from(reader.read_u16()?);
                }
                UpdateBlockType::FacePawn => buffer.face_pawn_index = reader.read_i32()?,
                UpdateBlockType::FaceTile => buffer.face_degrees = reader.read_i32()?,
                UpdateBlockType::ForceChat => buffer.force_chat = reader.read_string()?,
                UpdateBlockType::Hitmark => {
                    let count = reader.read_u8()?;
                    for _ in 0..count {
                        let kind = crate::combat::hit::HitmarkKind::from_id(reader.read_u8()?)?;
                        let damage = reader.read_i32()?;
                        buffer.hits.push(HitUpdate {
                            hitmark: Hitmark { damage, kind },
                            lifepoints: reader.read_i32()?,
                            max_lifepoints: reader.read_i32()?,
                        });
                    }
                }
            }
        }
        Some(buffer)
    }
}

fn direction_byte(direction: Option<Direction>) -> u8 {
    direction.map(Direction::player_walk_value).unwrap_or(0xff)
}

fn direction_from_byte(value: u8) -> Option<Direction> {
    crate::world::tile::ALL_DIRECTIONS
        .into_iter()
        .find(|direction| direction.player_walk_value() == value)
}
