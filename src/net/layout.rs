use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const LAYOUT_FILE: &str = "packets.yml";

/// Layouts used when the asset root does not carry its own `packets.yml`.
pub const DEFAULT_LAYOUTS: &str = r#"
- name: game_message
  opcode: 65
  fields:
    - { key: message, type: string }
- name: set_map_flag
  opcode: 76
  fields:
    - { key: x, type: byte }
    - { key: z, type: byte }
- name: player_update
  opcode: 79
  fields:
    - { key: count, type: short }
    - { key: blocks, type: bytes }
- name: rebuild_normal
  opcode: 90
  fields:
    - { key: chunk_x, type: int }
    - { key: chunk_z, type: int }
    - { key: map_size, type: int }
    - { key: force_reload, type: int }
    - { key: key_count, type: short }
    - { key: xteas, type: bytes }
- name: rebuild_region
  opcode: 91
  fields:
    - { key: chunk_x, type: int }
    - { key: chunk_z, type: int }
    - { key: force_reload, type: int }
    - { key: map_size, type: int }
    - { key: chunks, type: bytes }
    - { key: xteas, type: bytes }
    - { key: player_regions, type: bytes }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Byte,
    Short,
    Int,
    String,
    /// Raw bytes produced by the message itself, such as bit-packed sections.
    Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldLayout {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PacketLayout {
    pub name: String,
    pub opcode: u8,
    pub fields: Vec<FieldLayout>,
}

#[derive(Debug, Clone, Default)]
pub struct PacketLayouts {
    by_name: HashMap<String, PacketLayout>,
    by_opcode: HashMap<u8, String>,
}

impl PacketLayouts {
    pub fn embedded() -> Result<Self, String> {
        Self::parse(DEFAULT_LAYOUTS)
    }

    /// `<root>/packets.yml` when present, the embedded layouts otherwise.
    pub fn load(root: &Path) -> Result<Self, String> {
        let path = root.join(LAYOUT_FILE);
        if !path.exists() {
            return Self::embedded();
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        Self::parse(&content).map_err(|err| format!("{}: {}", path.display(), err))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let layouts: Vec<PacketLayout> =
            serde_yaml::from_str(content).map_err(|err| format!("invalid packet layouts: {}", err))?;
        let mut parsed = Self::default();
        for layout in layouts {
            if let Some(existing) = parsed.by_opcode.get(&layout.opcode) {
                return Err(format!(
                    "opcode {} used by both {} and {}",
                    layout.opcode, existing, layout.name
                ));
            }
            if parsed.by_name.contains_key(&layout.name) {
                return Err(format!("duplicate packet layout {}", layout.name));
            }
            parsed.by_opcode.insert(layout.opcode, layout.name.clone());
            parsed.by_name.insert(layout.name.clone(), layout);
        }
        Ok(parsed)
    }

    pub fn get(&self, name: &str) -> Option<&PacketLayout> {
        self.by_name.get(name)
    }

    pub fn by_opcode(&self, opcode: u8) -> Option<&PacketLayout> {
        self.by_opcode
            .get(&opcode)
            .and_then(|name| self.by_name.get(name))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
