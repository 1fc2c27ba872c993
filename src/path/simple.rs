use crate::path::request::{PathRequest, Route};
use crate::path::strategy::PathFindingStrategy;
use crate::world::collision::CollisionMap;
use crate::world::tile::Direction;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Greedy stepping towards the target, sliding along one axis when the
/// diagonal is clipped. Used for npcs, which do not need to navigate mazes.
#[derive(Debug, Default)]
pub struct SimplePathFindingStrategy {
    cancel: Arc<AtomicBool>,
}

impl SimplePathFindingStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PathFindingStrategy for SimplePathFindingStrategy {
    fn calculate_route(&self, collision: &CollisionMap, request: &PathRequest) -> Route {
        let start = request.start;
        if start.height != request.end.height {
            return Route::failed(start);
        }
        let size = request.source_size();
        let max_steps = start.distance(request.end);
        let mut path = VecDeque::new();
        let mut current = start;
        for _ in 0..max_steps {
            if request.reached(current) || self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let dx = (request.end.x - current.x).signum();
            let dz = (request.end.z - current.z).signum();
            let candidates = [
                Direction::from_delta(dx, dz),
                Direction::from_delta(dx, 0),
                Direction::from_delta(0, dz),
            ];
            let next = candidates.into_iter().flatten().find(|direction| {
                !request.detect_collision
                    || collision.can_traverse(current, *direction, size, request.projectile)
            });
            let Some(direction) = next else {
                break;
            };
            current = current.step(direction);
            path.push_back(current);
        }
        if self.cancel.load(Ordering::Relaxed) {
            return Route::failed(start);
        }
        let success = request.reached(current);
        Route::new(path, success, false, start)
    }

    fn cancel_flag(&self) -> &Arc<AtomicBool> {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tile::Tile;

    #[test]
    fn diagonal_first_then_straight() {
        let collision = CollisionMap::new();
        let request = PathRequest::new(Tile::new(0, 0, 0), Tile::new(4, 2, 0));
        let route = SimplePathFindingStrategy::new().calculate_route(&collision, &request);
        assert!(route.success);
        assert_eq!(
            route.path.iter().copied().collect::<Vec<_>>(),
            vec![
                Tile::new(1, 1, 0),
                Tile::new(2, 2, 0),
                Tile::new(3, 2, 0),
                Tile::new(4, 2, 0),
            ]
        );
    }

    #[test]
    fn stops_in_front_of_obstacle() {
        let mut collision = CollisionMap::new();
        collision.add_blocked(Tile::new(3, 0, 0), false);
        let request = PathRequest::new(Tile::new(0, 0, 0), Tile::new(5, 0, 0));
        let route = SimplePathFindingStrategy::new().calculate_route(&collision, &request);
        assert!(!route.success);
        assert_eq!(route.tail, Tile::new(2, 0, 0));
    }
}
