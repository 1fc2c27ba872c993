use serde::Deserialize;

pub const TOTAL_HEIGHT_LEVELS: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub z: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    NorthWest,
    North,
    NorthEast,
    West,
    East,
    SouthWest,
    South,
    SouthEast,
}

pub const ALL_DIRECTIONS: [Direction; 8] = [
    Direction::West,
    Direction::East,
    Direction::South,
    Direction::North,
    Direction::SouthWest,
    Direction::SouthEast,
    Direction::NorthWest,
    Direction::NorthEast,
];

impl Tile {
    pub const fn new(x: i32, z: i32, height: i32) -> Self {
        Self { x, z, height }
    }

    pub fn chunk_x(self) -> i32 {
        self.x >> 3
    }

    pub fn chunk_z(self) -> i32 {
        self.z >> 3
    }

    pub fn region_id(self) -> i32 {
        ((self.x >> 6) << 8) | (self.z >> 6)
    }

    /// Packed form used by the region rebuild payload for the local player.
    pub fn as_30bit(self) -> u32 {
        (((self.height & 0x3) as u32) << 28) | (((self.x & 0x3fff) as u32) << 14) | (self.z & 0x3fff) as u32
    }

    pub fn from_30bit(packed: u32) -> Self {
        Self {
            x: ((packed >> 14) & 0x3fff) as i32,
            z: (packed & 0x3fff) as i32,
            height: ((packed >> 28) & 0x3) as i32,
        }
    }

    /// Coarse position hint the client keeps for every other player slot.
    pub fn as_region_hint(self) -> u32 {
        ((self.z >> 13) as u32 & 0xff)
            | (((self.x >> 13) as u32 & 0xff) << 8)
            | (((self.height & 0x3) as u32) << 16)
    }

    pub fn transform(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
            height: self.height,
        }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dz) = direction.delta();
        self.transform(dx, dz)
    }

    /// Chebyshev distance on the x/z plane, ignoring height.
    pub fn distance(self, other: Tile) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    pub fn is_within_radius(self, other: Tile, radius: i32) -> bool {
        self.height == other.height && self.distance(other) <= radius
    }

    pub fn same_xz(self, other: Tile) -> bool {
        self.x == other.x && self.z == other.z
    }
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.z, self.height)
    }
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::NorthWest => (-1, 1),
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
            Direction::SouthWest => (-1, -1),
            Direction::South => (0, -1),
            Direction::SouthEast => (1, -1),
        }
    }

    pub fn between(from: Tile, to: Tile) -> Option<Direction> {
        let dx = (to.x - from.x).signum();
        let dz = (to.z - from.z).signum();
        Self::from_delta(dx, dz)
    }

    pub fn from_delta(dx: i32, dz: i32) -> Option<Direction> {
        match (dx, dz) {
            (-1, 1) => Some(Direction::NorthWest),
            (0, 1) => Some(Direction::North),
            (1, 1) => Some(Direction::NorthEast),
            (-1, 0) => Some(Direction::West),
            (1, 0) => Some(Direction::East),
            (-1, -1) => Some(Direction::SouthWest),
            (0, -1) => Some(Direction::South),
            (1, -1) => Some(Direction::SouthEast),
            _ => None,
        }
    }

    /// Client-side walking direction index.
    pub fn player_walk_value(self) -> u8 {
        match self {
            Direction::NorthWest => 0,
            Direction::North => 1,
            Direction::NorthEast => 2,
            Direction::West => 3,
            Direction::East => 4,
            Direction::SouthWest => 5,
            Direction::South => 6,
            Direction::SouthEast => 7,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::NorthWest => Direction::SouthEast,
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
            Direction::SouthWest => Direction::NorthEast,
            Direction::South => Direction::North,
            Direction::SouthEast => Direction::NorthWest,
        }
    }
}
