use crate::path::request::{PathRequest, Route};
use crate::path::strategy::PathFindingStrategy;
use crate::world::collision::CollisionMap;
use crate::world::tile::{Tile, ALL_DIRECTIONS};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_SEARCH_RADIUS: i32 = 32;
pub const DEFAULT_ALTERNATIVE_RADIUS: i32 = 10;

/// Nodes expanded between two looks at the cancel flag.
const CANCEL_POLL_INTERVAL: usize = 64;

/// Breadth-first search bounded to a square around the start tile. When the
/// target cannot be reached the route leads to the closest visited tile
/// within the alternative radius instead.
#[derive(Debug)]
pub struct BfsPathFindingStrategy {
    cancel: Arc<AtomicBool>,
    search_radius: i32,
    alternative_radius: i32,
}

impl Default for BfsPathFindingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl BfsPathFindingStrategy {
    pub fn new() -> Self {
        Self::with_radius(DEFAULT_SEARCH_RADIUS, DEFAULT_ALTERNATIVE_RADIUS)
    }

    pub fn with_radius(search_radius: i32, alternative_radius: i32) -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            search_radius: search_radius.max(1),
            alternative_radius: alternative_radius.max(0),
        }
    }

    fn closest_alternative(
        &self,
        request: &PathRequest,
        parents: &HashMap<Tile, Option<Tile>>,
        depth: &HashMap<Tile, u32>,
    ) -> Option<Tile> {
        let end = request.end;
        parents
            .keys()
            .filter(|tile| tile.distance(end) <= self.alternative_radius)
            .min_by_key(|tile| {
                let dx = i64::from(tile.x - end.x);
                let dz = i64::from(tile.z - end.z);
                let steps = depth.get(*tile).copied().unwrap_or(u32::MAX);
                (dx * dx + dz * dz, steps, tile.x, tile.z)
            })
            .copied()
    }
}

impl PathFindingStrategy for BfsPathFindingStrategy {
    fn calculate_route(&self, collision: &CollisionMap, request: &PathRequest) -> Route {
        let start = request.start;
        if request.reached(start) {
            return Route::new(VecDeque::new(), true, false, start);
        }
        if start.height != request.end.height {
            return Route::failed(start);
        }
        let size = request.source_size();
        let mut parents: HashMap<Tile, Option<Tile>> = HashMap::new();
        let mut depth: HashMap<Tile, u32> = HashMap::new();
        let mut frontier = VecDeque::new();
        parents.insert(start, None);
        depth.insert(start, 0);
        frontier.push_back(start);

        let mut found = None;
        let mut expanded = 0usize;
        while let Some(current) = frontier.pop_front() {
            expanded += 1;
            if expanded % CANCEL_POLL_INTERVAL == 0 && self.cancel.load(Ordering::Relaxed) {
                return Route::failed(start);
            }
            if request.reached(current) {
                found = Some(current);
                break;
            }
            let steps = depth.get(&current).copied().unwrap_or(0);
            for direction in ALL_DIRECTIONS {
                let next = current.step(direction);
                if next.distance(start) > self.search_radius || parents.contains_key(&next) {
                    continue;
                }
                if request.detect_collision
                    && !collision.can_traverse(current, direction, size, request.projectile)
                {
                    continue;
                }
                parents.insert(next, Some(current));
                depth.insert(next, steps + 1);
                frontier.push_back(next);
            }
        }

        let (tail, success, alternative) = match found {
            Some(tile) => (tile, true, false),
            None => match self.closest_alternative(request, &parents, &depth) {
                Some(tile) => (tile, false, true),
                None => return Route::failed(start),
            },
        };
        let mut path = VecDeque::new();
        let mut cursor = tail;
        while let Some(Some(parent)) = parents.get(&cursor) {
            path.push_front(cursor);
            cursor = *parent;
        }
        Route::new(path, success, alternative, start)
    }

    fn cancel_flag(&self) -> &Arc<AtomicBool> {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tile::Direction;

    #[test]
    fn open_field_path_is_shortest() {
        let collision = CollisionMap::new();
        let request = PathRequest::new(Tile::new(10, 10, 0), Tile::new(15, 12, 0));
        let route = BfsPathFindingStrategy::new().calculate_route(&collision, &request);
        assert!(route.success);
        assert_eq!(route.path.len(), 5);
        assert_eq!(route.tail, Tile::new(15, 12, 0));
    }

    #[test]
    fn walks_around_a_wall() {
        let mut collision = CollisionMap::new();
        for z in 5..=15 {
            collision.add_blocked(Tile::new(12, z, 0), false);
        }
        let request = PathRequest::new(Tile::new(10, 10, 0), Tile::new(14, 10, 0));
        let route = BfsPathFindingStrategy::new().calculate_route(&collision, &request);
        assert!(route.success);
        assert!(route.path.iter().all(|tile| !collision.is_full(*tile, false)));
        let mut previous = request.start;
        for tile in &route.path {
            let direction = Direction::between(previous, *tile).expect("adjacent");
            assert!(collision.can_traverse(previous, direction, 1, false));
            previous = *tile;
        }
    }

    #[test]
    fn enclosed_target_gives_alternative() {
        let mut collision = CollisionMap::new();
        let target = Tile::new(20, 20, 0);
        for direction in ALL_DIRECTIONS {
            collision.add_blocked(target.step(direction), false);
        }
        let request = PathRequest::new(Tile::new(14, 20, 0), target);
        let route = BfsPathFindingStrategy::new().calculate_route(&collision, &request);
        assert!(!route.success);
        assert!(route.alternative);
        assert_eq!(route.tail.distance(target), 2);
    }

    #[test]
    fn cancelled_search_returns_failed_route() {
        let collision = CollisionMap::new();
        let strategy = BfsPathFindingStrategy::new();
        strategy.cancel();
        let request = PathRequest::new(Tile::new(0, 0, 0), Tile::new(30, 30, 0));
        let route = strategy.calculate_route(&collision, &request);
        assert!(!route.success);
        assert!(route.path.is_empty());
    }

    #[test]
    fn height_mismatch_fails() {
        let collision = CollisionMap::new();
        let request = PathRequest::new(Tile::new(0, 0, 0), Tile::new(3, 3, 1));
        let route = BfsPathFindingStrategy::new().calculate_route(&collision, &request);
        assert!(!route.success);
        assert_eq!(route.tail, Tile::new(0, 0, 0));
    }
}
