use crate::world::collision::CollisionMap;
use crate::world::tile::{Direction, Tile};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StepType {
    #[default]
    Normal,
    ForcedWalk,
    ForcedRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    tile: Tile,
    kind: StepType,
    detect_collision: bool,
}

/// Directions taken during one movement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    pub tile: Tile,
    pub walk: Direction,
    pub run: Option<Direction>,
}

#[derive(Debug, Default, Clone)]
pub struct MovementQueue {
    steps: VecDeque<Step>,
}

impl MovementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn peek_last(&self) -> Option<Tile> {
        self.steps.back().map(|step| step.tile)
    }

    /// Queues every tile between the last queued tile (or `origin`) and
    /// `waypoint`, one unit step at a time.
    pub fn add_step(&mut self, origin: Tile, waypoint: Tile, kind: StepType, detect_collision: bool) {
        let mut current = self.peek_last().unwrap_or(origin);
        if waypoint.height != current.height {
            return;
        }
        while let Some(direction) = Direction::between(current, waypoint) {
            current = current.step(direction);
            self.steps.push_back(Step {
                tile: current,
                kind,
                detect_collision,
            });
        }
    }

    pub fn add_path<I>(&mut self, origin: Tile, path: I, kind: StepType, detect_collision: bool)
    where
        I: IntoIterator<Item = Tile>,
    {
        for waypoint in path {
            self.add_step(origin, waypoint, kind, detect_collision);
        }
    }

    /// Consumes up to two queued tiles. A blocked step with collision
    /// detection clears the queue.
    pub fn cycle(
        &mut self,
        origin: Tile,
        run_enabled: bool,
        collision: &CollisionMap,
        size: i32,
    ) -> Option<StepResult> {
        let first = self.steps.pop_front()?;
        let walk = match self.direction_for(origin, first, collision, size) {
            Some(direction) => direction,
            None => {
                self.steps.clear();
                return None;
            }
        };
        let mut result = StepResult {
            tile: first.tile,
            walk,
            run: None,
        };
        let running = match first.kind {
            StepType::ForcedRun => true,
            StepType::ForcedWalk => false,
            StepType::Normal => run_enabled,
        };
        if running {
            if let Some(second) = self.steps.pop_front() {
                match self.direction_for(result.tile, second, collision, size) {
                    Some(direction) => {
                        result.tile = second.tile;
                        result.run = Some(direction);
                    }
                    None => self.steps.clear(),
                }
            }
        }
        Some(result)
    }

    fn direction_for(
        &self,
        from: Tile,
        step: Step,
        collision: &CollisionMap,
        size: i32,
    ) -> Option<Direction> {
        if from.distance(step.tile) != 1 || from.height != step.tile.height {
            return None;
        }
        let direction = Direction::between(from, step.tile)?;
        if step.detect_collision && !collision.can_traverse(from, direction, size, false) {
            return None;
        }
        Some(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waypoints_expand_to_unit_steps() {
        let origin = Tile::new(10, 10, 0);
        let mut queue = MovementQueue::new();
        queue.add_path(origin, [Tile::new(13, 13, 0), Tile::new(13, 15, 0)], StepType::Normal, true);
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.peek_last(), Some(Tile::new(13, 15, 0)));
    }

    #[test]
    fn walking_takes_one_tile() {
        let collision = CollisionMap::new();
        let origin = Tile::new(10, 10, 0);
        let mut queue = MovementQueue::new();
        queue.add_step(origin, Tile::new(12, 10, 0), StepType::Normal, true);
        let step = queue.cycle(origin, false, &collision, 1).expect("step");
        assert_eq!(step.tile, Tile::new(11, 10, 0));
        assert_eq!(step.walk, Direction::East);
        assert_eq!(step.run, None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn running_takes_two_tiles() {
        let collision = CollisionMap::new();
        let origin = Tile::new(10, 10, 0);
        let mut queue = MovementQueue::new();
        queue.add_step(origin, Tile::new(10, 13, 0), StepType::ForcedRun, true);
        let step = queue.cycle(origin, false, &collision, 1).expect("step");
        assert_eq!(step.tile, Tile::new(10, 12, 0));
        assert_eq!(step.run, Some(Direction::North));
    }

    #[test]
    fn forced_walk_ignores_run_toggle() {
        let collision = CollisionMap::new();
        let origin = Tile::new(10, 10, 0);
        let mut queue = MovementQueue::new();
        queue.add_step(origin, Tile::new(10, 13, 0), StepType::ForcedWalk, true);
        let step = queue.cycle(origin, true, &collision, 1).expect("step");
        assert_eq!(step.run, None);
    }

    #[test]
    fn blocked_step_clears_queue() {
        let mut collision = CollisionMap::new();
        collision.add_blocked(Tile::new(11, 10, 0), false);
        let origin = Tile::new(10, 10, 0);
        let mut queue = MovementQueue::new();
        queue.add_step(origin, Tile::new(14, 10, 0), StepType::Normal, true);
        assert!(queue.cycle(origin, false, &collision, 1).is_none());
        assert!(queue.is_empty());

        queue.add_step(origin, Tile::new(14, 10, 0), StepType::Normal, false);
        assert!(queue.cycle(origin, false, &collision, 1).is_some());
    }
}
