use crate::entities::attributes::EntityKind;
use crate::entities::pawn_list::MAX_PLAYERS;
use crate::net::codec::{
    self, read_number, truncated, unhandled_decode_key, unhandled_key, DecodeError, EncodeError,
    FieldValue, MessageDecoder, MessageEncoder,
};
use crate::net::layout::{FieldType, PacketLayouts};
use crate::net::packet::{BitReader, BitWriter, PacketReader, PacketWriter};
use crate::sync::block::UpdateBlockBuffer;
use crate::world::chunk::CHUNKS_PER_VIEWPORT;
use crate::world::tile::{Tile, TOTAL_HEIGHT_LEVELS};
use crate::world::xtea::XteaKey;

/// Chunk slots in an instanced rebuild: every height of the 13x13 viewport.
pub const REBUILD_CHUNK_SLOTS: usize =
    (TOTAL_HEIGHT_LEVELS * CHUNKS_PER_VIEWPORT * CHUNKS_PER_VIEWPORT) as usize;
const CHUNK_REF_BITS: u32 = 26;
const SELF_TILE_BITS: u32 = 30;
const REGION_HINT_BITS: u32 = 18;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Game(GameMessage),
    SetMapFlag(SetMapFlagMessage),
    RebuildNormal(RebuildNormalMessage),
    RebuildRegion(RebuildRegionMessage),
    PlayerUpdate(PlayerUpdateMessage),
}

impl Message {
    pub fn encoder(&self) -> &dyn MessageEncoder {
        match self {
            Message::Game(message) => message,
            Message::SetMapFlag(message) => message,
            Message::RebuildNormal(message) => message,
            Message::RebuildRegion(message) => message,
            Message::PlayerUpdate(message) => message,
        }
    }

    pub fn encode(&self, layouts: &PacketLayouts) -> Result<Vec<u8>, EncodeError> {
        codec::encode(layouts, self.encoder())
    }

    /// Decodes any frame whose opcode the layouts know.
    pub fn decode(layouts: &PacketLayouts, frame: &[u8]) -> Result<Message, DecodeError> {
        let (opcode, _) = codec::split_frame(frame)?;
        let layout = layouts
            .by_opcode(opcode)
            .ok_or(DecodeError::UnknownOpcode(opcode))?;
        match layout.name.as_str() {
            GameMessage::NAME => GameMessage::decode(layouts, frame).map(Message::Game),
            SetMapFlagMessage::NAME => SetMapFlagMessage::decode(layouts, frame).map(Message::SetMapFlag),
            RebuildNormalMessage::NAME => {
                RebuildNormalMessage::decode(layouts, frame).map(Message::RebuildNormal)
            }
            RebuildRegionMessage::NAME => {
                RebuildRegionMessage::decode(layouts, frame).map(Message::RebuildRegion)
            }
            PlayerUpdateMessage::NAME => {
                PlayerUpdateMessage::decode(layouts, frame).map(Message::PlayerUpdate)
            }
            other => Err(DecodeError::UnknownLayout(other.to_string())),
        }
    }
}

fn number(value: i64) -> Result<FieldValue, EncodeError> {
    Ok(FieldValue::Number(value))
}

fn read_int(message: &str, key: &str, kind: FieldType, reader: &mut PacketReader<'_>) -> Result<i64, DecodeError> {
    read_number(kind, reader).ok_or_else(|| truncated(message, key))
}

fn write_keys(keys: &[XteaKey]) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(keys.len() * 16);
    for key in keys {
        for part in key.key {
            writer.write_i32(part);
        }
    }
    writer.into_vec()
}

fn read_keys(message: &str, key: &str, count: usize, reader: &mut PacketReader<'_>) -> Result<Vec<XteaKey>, DecodeError> {
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        let mut parts = [0i32; 4];
        for part in parts.iter_mut() {
            *part = reader.read_i32().ok_or_else(|| truncated(message, key))?;
        }
        keys.push(XteaKey::new(parts));
    }
    Ok(keys)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMessage {
    pub text: String,
}

impl GameMessage {
    pub const NAME: &'static str = "game_message";

    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn decode(layouts: &PacketLayouts, frame: &[u8]) -> Result<Self, DecodeError> {
        let mut message = GameMessage { text: String::new() };
        codec::decode(layouts, Self::NAME, frame, &mut message)?;
        Ok(message)
    }
}

impl MessageEncoder for GameMessage {
    fn layout_name(&self) -> &'static str {
        Self::NAME
    }

    fn extract(&self, key: &str) -> Result<FieldValue, EncodeError> {
        match key {
            "message" => Ok(FieldValue::Text(self.text.clone())),
            _ => Err(unhandled_key(Self::NAME, key)),
        }
    }
}

impl MessageDecoder for GameMessage {
    fn read_field(&mut self, key: &str, _kind: FieldType, reader: &mut PacketReader<'_>) -> Result<(), DecodeError> {
        match key {
            "message" => {
                self.text = reader.read_string().ok_or_else(|| truncated(Self::NAME, key))?;
                Ok(())
            }
            _ => Err(unhandled_decode_key(Self::NAME, key)),
        }
    }
}

/// Destination marker on the client minimap, relative to the loaded area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMapFlagMessage {
    pub x: i32,
    pub z: i32,
}

impl SetMapFlagMessage {
    pub const NAME: &'static str = "set_map_flag";

    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn clear() -> Self {
        Self { x: 255, z: 255 }
    }

    pub fn decode(layouts: &PacketLayouts, frame: &[u8]) -> Result<Self, DecodeError> {
        let mut message = Self::new(0, 0);
        codec::decode(layouts, Self::NAME, frame, &mut message)?;
        Ok(message)
    }
}

impl MessageEncoder for SetMapFlagMessage {
    fn layout_name(&self) -> &'static str {
        Self::NAME
    }

    fn extract(&self, key: &str) -> Result<FieldValue, EncodeError> {
        match key {
            "x" => number(i64::from(self.x)),
            "z" => number(i64::from(self.z)),
            _ => Err(unhandled_key(Self::NAME, key)),
        }
    }
}

impl MessageDecoder for SetMapFlagMessage {
    fn read_field(&mut self, key: &str, kind: FieldType, reader: &mut PacketReader<'_>) -> Result<(), DecodeError> {
        match key {
            "x" => self.x = read_int(Self::NAME, key, kind, reader)? as i32,
            "z" => self.z = read_int(Self::NAME, key, kind, reader)? as i32,
            _ => return Err(unhandled_decode_key(Self::NAME, key)),
        }
        Ok(())
    }
}

/// Region rebuild outside instances: the client loads the regions around
/// `chunk_x`/`chunk_z` from its own cache and needs only their keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RebuildNormalMessage {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub map_size: i32,
    pub force_reload: i32,
    pub xteas: Vec<XteaKey>,
}

impl RebuildNormalMessage {
    pub const NAME: &'static str = "rebuild_normal";

    pub fn decode(layouts: &PacketLayouts, frame: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = RebuildNormalDecoder::default();
        codec::decode(layouts, Self::NAME, frame, &mut decoder)?;
        Ok(decoder.message)
    }
}

impl MessageEncoder for RebuildNormalMessage {
    fn layout_name(&self) -> &'static str {
        Self::NAME
    }

    fn extract(&self, key: &str) -> Result<FieldValue, EncodeError> {
        match key {
            "chunk_x" => number(i64::from(self.chunk_x)),
            "chunk_z" => number(i64::from(self.chunk_z)),
            "map_size" => number(i64::from(self.map_size)),
            "force_reload" => number(i64::from(self.force_reload)),
            "key_count" => number(self.xteas.len() as i64),
            "xteas" => Ok(FieldValue::Bytes(write_keys(&self.xteas))),
            _ => Err(unhandled_key(Self::NAME, key)),
        }
    }
}

#[derive(Default)]
struct RebuildNormalDecoder {
    message: RebuildNormalMessage,
    key_count: Option<usize>,
}

impl MessageDecoder for RebuildNormalDecoder {
    fn read_field(&mut self, key: &str, kind: FieldType, reader: &mut PacketReader<'_>) -> Result<(), DecodeError> {
        let name = RebuildNormalMessage::NAME;
        match key {
            "chunk_x" => self.message.chunk_x = read_int(name, key, kind, reader)? as i32,
            "chunk_z" => self.message.chunk_z = read_int(name, key, kind, reader)? as i32,
            "map_size" => self.message.map_size = read_int(name, key, kind, reader)? as i32,
            "force_reload" => self.message.force_reload = read_int(name, key, kind, reader)? as i32,
            "key_count" => self.key_count = Some(read_int(name, key, kind, reader)? as usize),
            "xteas" => {
                let count = self.key_count.ok_or_else(|| DecodeError::Invalid {
                    message: name.to_string(),
                    reason: "xteas before key_count".to_string(),
                })?;
                self.message.xteas = read_keys(name, key, count, reader)?;
            }
            _ => return Err(unhandled_decode_key(name, key)),
        }
        Ok(())
    }
}

/// Region rebuild inside an instance. Every chunk of the viewport is spelled
/// out as a reference to the source chunk it copies, followed by the keys of
/// the distinct source regions and the coarse position of every other player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildRegionMessage {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub force_reload: i32,
    pub map_size: i32,
    /// Packed chunk references, one per slot; `None` for empty slots.
    pub coordinates: Vec<Option<u32>>,
    pub xteas: Vec<XteaKey>,
    pub self_tile: Tile,
    /// Region hints of every player slot other than the receiver's.
    pub player_regions: Vec<u32>,
}

impl RebuildRegionMessage {
    pub const NAME: &'static str = "rebuild_region";

    pub fn decode(layouts: &PacketLayouts, frame: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = RebuildRegionDecoder::default();
        codec::decode(layouts, Self::NAME, frame, &mut decoder)?;
        Ok(decoder.message)
    }

    fn chunk_bits(&self) -> Vec<u8> {
        let mut bits = BitWriter::new();
        for slot in 0..REBUILD_CHUNK_SLOTS {
            match self.coordinates.get(slot).copied().flatten() {
                Some(packed) => {
                    bits.put_bit(true);
                    bits.put_bits(CHUNK_REF_BITS, packed);
                }
                None => bits.put_bit(false),
            }
        }
        bits.finish()
    }

    fn player_region_bits(&self) -> Vec<u8> {
        let mut bits = BitWriter::new();
        bits.put_bits(SELF_TILE_BITS, self.self_tile.as_30bit());
        for slot in 0..MAX_PLAYERS - 1 {
            bits.put_bits(REGION_HINT_BITS, self.player_regions.get(slot).copied().unwrap_or(0));
        }
        bits.finish()
    }
}

/// Packs a source chunk reference: height, chunk x/z and rotation.
pub fn pack_chunk_ref(chunk_x: i32, chunk_z: i32, height: i32, rot: i32) -> u32 {
    (((height & 0x3) as u32) << 24)
        | (((chunk_x & 0x3ff) as u32) << 14)
        | (((chunk_z & 0x7ff) as u32) << 3)
        | (((rot & 0x3) as u32) << 1)
}

/// Region id of the source chunk a packed reference points at.
pub fn chunk_ref_region(packed: u32) -> i32 {
    let chunk_x = ((packed >> 14) & 0x3ff) as i32;
    let chunk_z = ((packed >> 3) & 0x7ff) as i32;
    ((chunk_x >> 3) << 8) | (chunk_z >> 3)
}

/// Distinct source regions referenced by `coordinates`, first-seen order.
pub fn referenced_regions(coordinates: &[Option<u32>]) -> Vec<i32> {
    let mut regions = Vec::new();
    for packed in coordinates.iter().flatten() {
        let region = chunk_ref_region(*packed);
        if !regions.contains(&region) {
            regions.push(region);
        }
    }
    regions
}

impl MessageEncoder for RebuildRegionMessage {
    fn layout_name(&self) -> &'static str {
        Self::NAME
    }

    fn extract(&self, key: &str) -> Result<FieldValue, EncodeError> {
        match key {
            "chunk_x" => number(i64::from(self.chunk_x)),
            "chunk_z" => number(i64::from(self.chunk_z)),
            "force_reload" => number(i64::from(self.force_reload)),
            "map_size" => number(i64::from(self.map_size)),
            "chunks" => Ok(FieldValue::Bytes(self.chunk_bits())),
            "xteas" => Ok(FieldValue::Bytes(write_keys(&self.xteas))),
            "player_regions" => Ok(FieldValue::Bytes(self.player_region_bits())),
            _ => Err(unhandled_key(Self::NAME, key)),
        }
    }
}

struct RebuildRegionDecoder {
    message: RebuildRegionMessage,
    chunks_read: bool,
}

impl Default for RebuildRegionDecoder {
    fn default() -> Self {
        Self {
            message: RebuildRegionMessage {
                chunk_x: 0,
                chunk_z: 0,
                force_reload: 0,
                map_size: 0,
                coordinates: Vec::new(),
                xteas: Vec::new(),
                self_tile: Tile::default(),
                player_regions: Vec::new(),
            },
            chunks_read: false,
        }
    }
}

impl RebuildRegionDecoder {
    fn read_chunks(&mut self, key: &str, reader: &mut PacketReader<'_>) -> Result<(), DecodeError> {
        let name = RebuildRegionMessage::NAME;
        let mut bits: BitReader<'_> = reader.bits();
        let mut coordinates = Vec::with_capacity(REBUILD_CHUNK_SLOTS);
        for _ in 0..REBUILD_CHUNK_SLOTS {
            let present = bits.get_bit().ok_or_else(|| truncated(name, key))?;
            if present {
                coordinates.push(Some(bits.get_bits(CHUNK_REF_BITS).ok_or_else(|| truncated(name, key))?));
            } else {
                coordinates.push(None);
            }
        }
        reader.skip(bits.bytes_consumed()).ok_or_else(|| truncated(name, key))?;
        self.message.coordinates = coordinates;
        self.chunks_read = true;
        Ok(())
    }

    fn read_player_regions(&mut self, key: &str, reader: &mut PacketReader<'_>) -> Result<(), DecodeError> {
        let name = RebuildRegionMessage::NAME;
        let mut bits = reader.bits();
        let packed = bits.get_bits(SELF_TILE_BITS).ok_or_else(|| truncated(name, key))?;
        self.message.self_tile = Tile::from_30bit(packed);
        let mut hints = Vec::with_capacity(MAX_PLAYERS - 1);
        for _ in 0..MAX_PLAYERS - 1 {
            hints.push(bits.get_bits(REGION_HINT_BITS).ok_or_else(|| truncated(name, key))?);
        }
        reader.skip(bits.bytes_consumed()).ok_or_else(|| truncated(name, key))?;
        self.message.player_regions = hints;
        Ok(())
    }
}

impl MessageDecoder for RebuildRegionDecoder {
    fn read_field(&mut self, key: &str, kind: FieldType, reader: &mut PacketReader<'_>) -> Result<(), DecodeError> {
        let name = RebuildRegionMessage::NAME;
        match key {
            "chunk_x" => self.message.chunk_x = read_int(name, key, kind, reader)? as i32,
            "chunk_z" => self.message.chunk_z = read_int(name, key, kind, reader)? as i32,
            "force_reload" => self.message.force_reload = read_int(name, key, kind, reader)? as i32,
            "map_size" => self.message.map_size = read_int(name, key, kind, reader)? as i32,
            "chunks" => self.read_chunks(key, reader)?,
            "xteas" => {
                if !self.chunks_read {
                    return Err(DecodeError::Invalid {
                        message: name.to_string(),
                        reason: "xteas before chunks".to_string(),
                    });
                }
                let count = referenced_regions(&self.message.coordinates).len();
                self.message.xteas = read_keys(name, key, count, reader)?;
            }
            "player_regions" => self.read_player_regions(key, reader)?,
            _ => return Err(unhandled_decode_key(name, key)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PawnUpdate {
    pub kind: EntityKind,
    pub index: u16,
    pub tile: Tile,
    pub blocks: UpdateBlockBuffer,
}

impl PawnUpdate {
    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(match self.kind {
            EntityKind::Player => 0,
            EntityKind::Npc => 1,
        });
        writer.write_u16(self.index);
        writer.write_i32(self.tile.as_30bit() as i32);
        self.blocks.write(writer);
    }

    pub fn encoded_len(&self) -> usize {
        let mut writer = PacketWriter::new();
        self.write(&mut writer);
        writer.len()
    }
}

/// Largest payload a frame's u16 length can describe.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Room left in a player update payload for its entry count.
const UPDATE_COUNT_ALLOWANCE: usize = 8;

/// Per-tick update blocks of every pawn a player can see.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerUpdateMessage {
    pub entries: Vec<PawnUpdate>,
}

impl PlayerUpdateMessage {
    pub const NAME: &'static str = "player_update";

    pub fn decode(layouts: &PacketLayouts, frame: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = PlayerUpdateDecoder::default();
        codec::decode(layouts, Self::NAME, frame, &mut decoder)?;
        Ok(decoder.message)
    }

    /// Splits `entries` into messages whose payloads each fit one frame.
    /// Entries too large for a frame of their own are handed back unsent.
    pub fn pack(entries: Vec<PawnUpdate>) -> (Vec<PlayerUpdateMessage>, Vec<PawnUpdate>) {
        let budget = MAX_FRAME_PAYLOAD - UPDATE_COUNT_ALLOWANCE;
        let mut messages = Vec::new();
        let mut oversized = Vec::new();
        let mut current = PlayerUpdateMessage::default();
        let mut used = 0;
        for entry in entries {
            let len = entry.encoded_len();
            if len > budget {
                oversized.push(entry);
                continue;
            }
            if used + len > budget {
                messages.push(std::mem::take(&mut current));
                used = 0;
            }
            used += len;
            current.entries.push(entry);
        }
        if !current.entries.is_empty() {
            messages.push(current);
        }
        (messages, oversized)
    }

    fn block_bytes(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        for entry in &self.entries {
            entry.write(&mut writer);
        }
        writer.into_vec()
    }
}

impl MessageEncoder for PlayerUpdateMessage {
    fn layout_name(&self) -> &'static str {
        Self::NAME
    }

    fn extract(&self, key: &str) -> Result<FieldValue, EncodeError> {
        match key {
            "count" => number(self.entries.len() as i64),
            "blocks" => Ok(FieldValue::Bytes(self.block_bytes())),
            _ => Err(unhandled_key(Self::NAME, key)),
        }
    }
}

#[derive(Default)]
struct PlayerUpdateDecoder {
    message: PlayerUpdateMessage,
    count: Option<usize>,
}

impl MessageDecoder for PlayerUpdateDecoder {
    fn read_field(&mut self, key: &str, kind: FieldType, reader: &mut PacketReader<'_>) -> Result<(), DecodeError> {
        let name = PlayerUpdateMessage::NAME;
        match key {
            "count" => self.count = Some(read_int(name, key, kind, reader)? as usize),
            "blocks" => {
                let count = self.count.ok_or_else(|| DecodeError::Invalid {
                    message: name.to_string(),
                    reason: "blocks before count".to_string(),
                })?;
                for _ in 0..count {
                    let kind = match reader.read_u8().ok_or_else(|| truncated(name, key))? {
                        0 => EntityKind::Player,
                        1 => EntityKind::Npc,
                        other => {
                            return Err(DecodeError::Invalid {
                                message: name.to_string(),
                                reason: format!("entity kind {}", other),
                            })
                        }
                    };
                    let index = reader.read_u16().ok_or_else(|| truncated(name, key))?;
                    let tile = Tile::from_30bit(reader.read_i32().ok_or_else(|| truncated(name, key))? as u32);
                    let blocks = UpdateBlockBuffer::read(reader).ok_or_else(|| truncated(name, key))?;
                    self.message.entries.push(PawnUpdate {
                        kind,
                        index,
                        tile,
                        blocks,
                    });
                }
            }
            _ => return Err(unhandled_decode_key(name, key)),
        }
        Ok(())
    }
}
