use crate::path::bfs::BfsPathFindingStrategy;
use crate::path::request::{PathRequest, Route};
use crate::path::simple::SimplePathFindingStrategy;
use crate::world::collision::CollisionMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait PathFindingStrategy: Send {
    fn calculate_route(&self, collision: &CollisionMap, request: &PathRequest) -> Route;

    /// Shared flag the search polls. Setting it makes the search give up and
    /// tells whoever holds the result to discard it.
    fn cancel_flag(&self) -> &Arc<AtomicBool>;

    fn cancel(&self) {
        self.cancel_flag().store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag().load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Bfs,
    Simple,
}

pub fn create_strategy(kind: StrategyKind) -> Box<dyn PathFindingStrategy> {
    match kind {
        StrategyKind::Bfs => Box::new(BfsPathFindingStrategy::new()),
        StrategyKind::Simple => Box::new(SimplePathFindingStrategy::new()),
    }
}
