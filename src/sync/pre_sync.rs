use crate::entities::attributes::{EntityKind, PawnRef};
use crate::path::future::FutureRoute;
use crate::world::state::World;

impl World {
    /// Per-pawn work ahead of synchronization, in order: a finished route
    /// search is applied, the movement queue advances, and players get
    /// their map region rebuilt when they near its edge.
    pub(crate) fn pre_synchronize(&mut self, pawn: PawnRef) {
        self.handle_future_route(pawn);
        self.advance_movement(pawn);
        if pawn.is_player() {
            self.check_region(pawn);
        }
    }

    fn handle_future_route(&mut self, pawn: PawnRef) {
        let resolved = {
            let Some(mover) = self.pawn_mut(pawn) else {
                return;
            };
            let done = mover.future_route.as_mut().is_some_and(FutureRoute::poll);
            if !done {
                return;
            }
            let Some(mut future) = mover.future_route.take() else {
                return;
            };
            future.take_route().map(|route| {
                (
                    route,
                    future.step_type,
                    future.detect_collision,
                    future.seq,
                    future.awaited,
                )
            })
        };
        let Some((route, step_type, detect_collision, seq, awaited)) = resolved else {
            return;
        };
        self.walk_path(pawn, route.path.iter().copied(), step_type, detect_collision);
        if awaited {
            if let Some(mover) = self.pawn_mut(pawn) {
                mover.route_results.insert(seq, route);
            }
        }
    }

    fn advance_movement(&mut self, pawn: PawnRef) {
        let list = match pawn.kind {
            EntityKind::Player => &mut self.players,
            EntityKind::Npc => &mut self.npcs,
        };
        let Some(mover) = list.resolve_mut(pawn) else {
            return;
        };
        if mover.movement_queue.is_empty() {
            return;
        }
        let run_enabled = mover.as_player().map(|player| player.run_enabled).unwrap_or(false);
        let size = mover.size();
        let origin = mover.tile;
        if let Some(step) = mover
            .movement_queue
            .cycle(origin, run_enabled, &self.collision, size)
        {
            mover.apply_step(step);
        }
    }
}
