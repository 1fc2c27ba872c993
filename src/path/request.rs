use crate::world::tile::Tile;
use std::collections::VecDeque;

/// Frozen input to a path search. Built on the tick thread and handed to a
/// strategy, possibly on another thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRequest {
    pub start: Tile,
    pub end: Tile,
    pub source_width: i32,
    pub source_length: i32,
    pub target_width: i32,
    pub target_length: i32,
    pub projectile: bool,
    pub detect_collision: bool,
}

impl PathRequest {
    pub fn new(start: Tile, end: Tile) -> Self {
        Self {
            start,
            end,
            source_width: 1,
            source_length: 1,
            target_width: 1,
            target_length: 1,
            projectile: false,
            detect_collision: true,
        }
    }

    pub fn with_source_size(mut self, width: i32, length: i32) -> Self {
        self.source_width = width.max(1);
        self.source_length = length.max(1);
        self
    }

    pub fn with_target_size(mut self, width: i32, length: i32) -> Self {
        self.target_width = width.max(1);
        self.target_length = length.max(1);
        self
    }

    pub fn with_collision(mut self, detect_collision: bool) -> Self {
        self.detect_collision = detect_collision;
        self
    }

    pub fn source_size(&self) -> i32 {
        self.source_width.max(self.source_length)
    }

    /// Whether a pawn standing on `tile` has reached the target area. A 1x1
    /// target means standing on it; larger targets are reached from any tile
    /// bordering them.
    pub fn reached(&self, tile: Tile) -> bool {
        if tile.height != self.end.height {
            return false;
        }
        if self.target_width <= 1 && self.target_length <= 1 {
            return tile.same_xz(self.end);
        }
        let min_x = self.end.x;
        let min_z = self.end.z;
        let max_x = self.end.x + self.target_width - 1;
        let max_z = self.end.z + self.target_length - 1;
        let inside_x = tile.x >= min_x && tile.x <= max_x;
        let inside_z = tile.z >= min_z && tile.z <= max_z;
        (inside_x && (tile.z == min_z - 1 || tile.z == max_z + 1))
            || (inside_z && (tile.x == min_x - 1 || tile.x == max_x + 1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: VecDeque<Tile>,
    pub alternative: bool,
    pub success: bool,
    pub tail: Tile,
}

impl Route {
    pub fn new(path: VecDeque<Tile>, success: bool, alternative: bool, origin: Tile) -> Self {
        let tail = path.back().copied().unwrap_or(origin);
        Self {
            path,
            alternative,
            success,
            tail,
        }
    }

    pub fn failed(tail: Tile) -> Self {
        Self {
            path: VecDeque::new(),
            alternative: false,
            success: false,
            tail,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tile_target_needs_exact_tile() {
        let request = PathRequest::new(Tile::new(0, 0, 0), Tile::new(5, 5, 0));
        assert!(request.reached(Tile::new(5, 5, 0)));
        assert!(!request.reached(Tile::new(5, 6, 0)));
        assert!(!request.reached(Tile::new(5, 5, 1)));
    }

    #[test]
    fn large_target_is_reached_from_its_border() {
        let request =
            PathRequest::new(Tile::new(0, 0, 0), Tile::new(10, 10, 0)).with_target_size(2, 2);
        assert!(request.reached(Tile::new(9, 10, 0)));
        assert!(request.reached(Tile::new(11, 12, 0)));
        assert!(!request.reached(Tile::new(10, 10, 0)));
        assert!(!request.reached(Tile::new(9, 9, 0)));
    }

    #[test]
    fn route_tail_defaults_to_origin() {
        let origin = Tile::new(3, 3, 0);
        assert_eq!(Route::new(VecDeque::new(), false, false, origin).tail, origin);
        assert_eq!(Route::failed(origin).tail, origin);
    }
}
