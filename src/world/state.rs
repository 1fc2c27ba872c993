use crate::combat::hit::Hit;
use crate::config::WorldConfig;
use crate::entities::attributes::{EntityKind, PawnRef, COMBAT_TARGET_FOCUS, INTERACTING_PAWN};
use crate::entities::movement::StepType;
use crate::entities::npc::NpcData;
use crate::entities::pawn::Pawn;
use crate::entities::pawn_list::{PawnList, MAX_NPCS, MAX_PLAYERS};
use crate::entities::player::PlayerData;
use crate::net::codec::EncodeError;
use crate::net::layout::PacketLayouts;
use crate::net::message::{GameMessage, Message, SetMapFlagMessage};
use crate::path::bfs::DEFAULT_SEARCH_RADIUS;
use crate::path::future::FutureRoute;
use crate::path::pool::PathWorkerPool;
use crate::path::request::{PathRequest, Route};
use crate::path::strategy::{create_strategy, StrategyKind};
use crate::telemetry::logging;
use crate::world::chunk::{ChunkCoords, ChunkSet, CHUNK_SIZE};
use crate::world::collision::CollisionMap;
use crate::world::hooks::{Event, Hooks};
use crate::world::instance::{InstancedMapAllocator, InstancedMapAttribute};
use crate::world::tile::Tile;
use crate::world::time::GameClock;
use crate::world::xtea::XteaKeyStore;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub const FROZEN_MESSAGE: &str = "A magical force stops you from moving.";

/// Chunks around the mover copied into a worker's collision snapshot; wide
/// enough to hold the whole search square.
const SNAPSHOT_CHUNK_RADIUS: i32 = DEFAULT_SEARCH_RADIUS / CHUNK_SIZE + 1;

/// Everything the tick thread owns. Content reaches the world through the
/// methods here and through the `impl World` blocks of the queue, combat,
/// sync and instance modules.
#[derive(Debug)]
pub struct World {
    pub config: WorldConfig,
    pub clock: GameClock,
    pub collision: CollisionMap,
    pub chunks: ChunkSet,
    pub xteas: XteaKeyStore,
    pub instances: InstancedMapAllocator,
    pub players: PawnList,
    pub npcs: PawnList,
    pub layouts: PacketLayouts,
    pub hooks: Hooks,
    path_pool: Option<PathWorkerPool>,
    next_uid: u64,
}

impl World {
    pub fn new(config: WorldConfig) -> Result<Self, String> {
        let path_pool = if config.multi_threaded_path_finding {
            Some(PathWorkerPool::new(config.path_workers)?)
        } else {
            None
        };
        Ok(Self {
            clock: GameClock::new(config.tick_length()),
            collision: CollisionMap::new(),
            chunks: ChunkSet::new(),
            xteas: XteaKeyStore::new(config.xtea_cache_capacity, None),
            instances: InstancedMapAllocator::new(config.instance_area),
            players: PawnList::new(EntityKind::Player, config.max_players.clamp(1, MAX_PLAYERS)),
            npcs: PawnList::new(EntityKind::Npc, config.max_npcs.clamp(1, MAX_NPCS)),
            layouts: PacketLayouts::embedded()?,
            hooks: Hooks::new(),
            path_pool,
            next_uid: 1,
            config,
        })
    }

    /// Builds a world over an asset root: packet layouts from `packets.yml`
    /// when present, region keys from the key file and key directory.
    pub fn load(root: &Path, config: WorldConfig) -> Result<Self, String> {
        let mut world = Self::new(config)?;
        world.layouts = PacketLayouts::load(root)?;
        world.xteas = XteaKeyStore::new(
            world.config.xtea_cache_capacity,
            Some(root.join(&world.config.xtea_dir)),
        );
        let key_file = root.join(&world.config.xtea_file);
        if key_file.exists() {
            let count = world.xteas.load_yaml(&key_file)?;
            logging::log_game(&format!("loaded {} region keys from {}", count, key_file.display()));
        }
        logging::log_game(&format!(
            "world ready: {} packet layouts, tick {}ms, path finding {}",
            world.layouts.len(),
            world.config.tick_length_ms,
            if world.path_pool.is_some() { "threaded" } else { "inline" }
        ));
        Ok(world)
    }

    pub fn is_multi_threaded(&self) -> bool {
        self.path_pool.is_some()
    }

    fn list(&self, kind: EntityKind) -> &PawnList {
        match kind {
            EntityKind::Player => &self.players,
            EntityKind::Npc => &self.npcs,
        }
    }

    fn list_mut(&mut self, kind: EntityKind) -> &mut PawnList {
        match kind {
            EntityKind::Player => &mut self.players,
            EntityKind::Npc => &mut self.npcs,
        }
    }

    pub fn pawn(&self, pawn: PawnRef) -> Option<&Pawn> {
        self.list(pawn.kind).resolve(pawn)
    }

    pub fn pawn_mut(&mut self, pawn: PawnRef) -> Option<&mut Pawn> {
        self.list_mut(pawn.kind).resolve_mut(pawn)
    }

    fn allocate_uid(&mut self) -> u64 {
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    /// Places a player at `tile`. `None` when every player slot is taken.
    pub fn register_player(&mut self, data: PlayerData, tile: Tile) -> Option<PawnRef> {
        let uid = self.allocate_uid();
        let username = data.username.clone();
        let pawn = Pawn::player(data, tile, self.config.player_lifepoints);
        match self.players.register(pawn, uid) {
            Ok(player) => {
                logging::log_game(&format!(
                    "player {} registered at index {} on {}",
                    username, player.index, tile
                ));
                Some(player)
            }
            Err(_) => {
                logging::log_error(&format!("player {} rejected: world is full", username));
                None
            }
        }
    }

    pub fn spawn_npc(&mut self, data: NpcData) -> Option<PawnRef> {
        let uid = self.allocate_uid();
        let tile = data.spawn_tile;
        let id = data.id;
        let pawn = Pawn::npc(data, tile, self.config.npc_lifepoints);
        match self.npcs.register(pawn, uid) {
            Ok(npc) => Some(npc),
            Err(_) => {
                logging::log_error(&format!("npc {} not spawned at {}: npc list full", id, tile));
                None
            }
        }
    }

    /// Takes a pawn out of the world. Pending searches are cancelled and
    /// every reference other pawns hold to it is dropped.
    pub fn remove_pawn(&mut self, pawn: PawnRef) -> Option<Pawn> {
        self.pawn(pawn)?;
        let mut removed = self.list_mut(pawn.kind).remove(pawn.index)?;
        if let Some(future) = removed.future_route.take() {
            future.cancel();
        }
        for other in self.players.iter_mut().chain(self.npcs.iter_mut()) {
            other.attributes.remove_refs_to(pawn);
        }
        Some(removed)
    }

    /// Removes a player, releasing the instances it owns that end on logout.
    pub fn logout_player(&mut self, player: PawnRef) -> Option<Pawn> {
        let data = self.pawn(player)?.as_player()?;
        let (uid, username) = (data.uid, data.username.clone());
        for id in self.owned_instances(uid, InstancedMapAttribute::DeallocateOnLogout) {
            self.deallocate_instance(id);
        }
        let removed = self.remove_pawn(player);
        logging::log_game(&format!("player {} logged out", username));
        removed
    }

    /// Walks towards `destination`. Players search breadth-first, npcs take
    /// the direct line.
    pub fn walk_to(&mut self, pawn: PawnRef, destination: Tile, step_type: StepType, detect_collision: bool) {
        self.request_route(pawn, destination, step_type, detect_collision, false);
    }

    /// Like [`World::walk_to`], but the resolved route is also stored under
    /// the returned sequence number for a suspended task to pick up.
    pub fn walk_to_await(
        &mut self,
        pawn: PawnRef,
        destination: Tile,
        step_type: StepType,
        detect_collision: bool,
    ) -> Option<u64> {
        self.request_route(pawn, destination, step_type, detect_collision, true)
    }

    fn request_route(
        &mut self,
        pawn: PawnRef,
        destination: Tile,
        step_type: StepType,
        detect_collision: bool,
        awaited: bool,
    ) -> Option<u64> {
        let multi_threaded = self.path_pool.is_some();
        let (request, kind, seq) = {
            let mover = self.pawn_mut(pawn)?;
            mover.route_seq += 1;
            let seq = mover.route_seq;
            let origin = mover.tile;

            if origin.same_xz(destination) {
                if !awaited {
                    return None;
                }
                mover.route_results.insert(seq, Route::new(VecDeque::new(), true, false, origin));
                return Some(seq);
            }
            if mover.is_frozen() || mover.is_stunned() {
                if mover.is_frozen() {
                    mover.write(Message::Game(GameMessage::new(FROZEN_MESSAGE)));
                }
                if !awaited {
                    return None;
                }
                mover.route_results.insert(seq, Route::failed(origin));
                return Some(seq);
            }

            if multi_threaded {
                mover.movement_queue.clear();
            }
            if let Some(previous) = mover.future_route.take() {
                previous.cancel();
                if previous.awaited {
                    mover.route_results.insert(previous.seq, Route::failed(origin));
                }
            }

            let size = mover.size();
            let request = PathRequest::new(origin, destination)
                .with_source_size(size, size)
                .with_collision(detect_collision);
            let kind = if mover.is_player() {
                StrategyKind::Bfs
            } else {
                StrategyKind::Simple
            };
            (request, kind, seq)
        };

        let strategy = create_strategy(kind);
        if let Some(pool) = self.path_pool.as_ref() {
            let cancel = Arc::clone(strategy.cancel_flag());
            let snapshot = self
                .collision
                .snapshot(ChunkCoords::from_tile(request.start), SNAPSHOT_CHUNK_RADIUS);
            let submitted = pool.submit(strategy, snapshot, request);
            let mover = self.pawn_mut(pawn)?;
            match submitted {
                Ok(receiver) => {
                    mover.future_route = Some(
                        FutureRoute::new(cancel, request, step_type, detect_collision, receiver)
                            .with_seq(seq, awaited),
                    );
                }
                Err(err) => {
                    logging::log_path(&format!(
                        "route {} -> {} dropped: {}",
                        request.start, request.end, err
                    ));
                    if awaited {
                        mover.route_results.insert(seq, Route::failed(request.start));
                    }
                }
            }
            return Some(seq);
        }

        let started = Instant::now();
        let route = strategy.calculate_route(&self.collision, &request);
        let elapsed = started.elapsed();
        if elapsed > self.clock.tick_length() / 4 {
            logging::log_path(&format!(
                "slow route {} -> {} took {}ms",
                request.start,
                request.end,
                elapsed.as_millis()
            ));
        }
        self.walk_path(pawn, route.path.iter().copied(), step_type, detect_collision);
        if awaited {
            if let Some(mover) = self.pawn_mut(pawn) {
                mover.route_results.insert(seq, route);
            }
        }
        Some(seq)
    }

    /// Replaces the pawn's queued steps with `path`. Players get the
    /// destination marker moved to the last tile.
    pub fn walk_path<I>(&mut self, pawn: PawnRef, path: I, step_type: StepType, detect_collision: bool)
    where
        I: IntoIterator<Item = Tile>,
    {
        let Some(mover) = self.pawn_mut(pawn) else {
            return;
        };
        let path: Vec<Tile> = path.into_iter().collect();
        let Some(tail) = path.last().copied() else {
            mover.write(Message::SetMapFlag(SetMapFlagMessage::clear()));
            return;
        };
        if mover.is_frozen() {
            mover.write(Message::Game(GameMessage::new(FROZEN_MESSAGE)));
            return;
        }
        if mover.is_stunned() {
            return;
        }

        let origin = mover.tile;
        mover.movement_queue.clear();
        mover
            .movement_queue
            .add_path(origin, path, step_type, detect_collision);

        if tail == origin {
            mover.write(Message::SetMapFlag(SetMapFlagMessage::clear()));
            mover.movement_queue.clear();
            return;
        }
        let base = mover
            .as_player()
            .and_then(|player| player.last_known_region_base);
        if let Some(base) = base {
            mover.write(Message::SetMapFlag(SetMapFlagMessage::new(
                tail.x - base.x,
                tail.z - base.z,
            )));
        }
    }

    pub fn teleport_to(&mut self, pawn: PawnRef, tile: Tile) {
        if let Some(target) = self.pawn_mut(pawn) {
            target.teleport_to(tile);
        }
    }

    pub fn move_to(&mut self, pawn: PawnRef, tile: Tile) {
        if let Some(target) = self.pawn_mut(pawn) {
            target.move_to(tile);
        }
    }

    pub fn face_tile(&mut self, pawn: PawnRef, tile: Tile) {
        if let Some(target) = self.pawn_mut(pawn) {
            target.face_tile(tile);
        }
    }

    pub fn face_pawn(&mut self, pawn: PawnRef, other: PawnRef) {
        let Some(other_tile) = self.pawn(other).map(|target| target.tile) else {
            return;
        };
        if let Some(source) = self.pawn_mut(pawn) {
            source.face_pawn(other, other_tile);
        }
    }

    pub fn animate(&mut self, pawn: PawnRef, id: i32, delay: i32, duration_ticks: u64, priority: bool) -> bool {
        let now = self.clock.now();
        self.pawn_mut(pawn)
            .map(|target| target.animate(id, delay, duration_ticks, priority, now))
            .unwrap_or(false)
    }

    pub fn graphic(&mut self, pawn: PawnRef, id: i32, height: i32, delay: i32) {
        if let Some(target) = self.pawn_mut(pawn) {
            target.graphic(id, height, delay);
        }
    }

    pub fn force_chat(&mut self, pawn: PawnRef, message: &str) {
        if let Some(target) = self.pawn_mut(pawn) {
            target.force_chat(message);
        }
    }

    pub fn add_hit(&mut self, pawn: PawnRef, hit: Hit) {
        if let Some(target) = self.pawn_mut(pawn) {
            target.add_hit(hit);
        }
    }

    /// Starts combat against `target`. Dead or invisible pawns cannot attack.
    pub fn attack(&mut self, pawn: PawnRef, target: PawnRef) {
        let npc_id = match self.pawn(pawn) {
            Some(attacker) if attacker.is_alive() && !attacker.invisible => {
                attacker.as_npc().map(|npc| npc.id)
            }
            _ => return,
        };
        self.reset_interactions(pawn);
        self.interrupt_queues(pawn);
        if let Some(attacker) = self.pawn_mut(pawn) {
            attacker.attributes.put(COMBAT_TARGET_FOCUS, target);
        }
        let hook = npc_id
            .and_then(|id| self.hooks.npc_combat(id))
            .or_else(|| self.hooks.combat());
        if let Some(hook) = hook {
            hook(self, pawn);
        }
    }

    pub fn reset_interactions(&mut self, pawn: PawnRef) {
        if let Some(target) = self.pawn_mut(pawn) {
            target.attributes.remove(COMBAT_TARGET_FOCUS);
            target.attributes.remove(INTERACTING_PAWN);
            target.reset_face_pawn();
        }
    }

    /// Hands `event` to every handler registered under its name.
    pub fn trigger_event(&mut self, pawn: PawnRef, event: &dyn Event) {
        if self.config.event_logging {
            logging::log_event(&event.describe());
        }
        for handler in self.hooks.events(event.name()) {
            handler(self, pawn, event);
        }
    }

    /// Runs one game tick: pawn queues, timers and hits, then movement and
    /// region checks, then client synchronization.
    pub fn cycle(&mut self) -> Result<(), EncodeError> {
        let started = Instant::now();
        for npc in self.npcs.refs() {
            self.pawn_cycle(npc);
        }
        for player in self.players.refs() {
            self.pawn_cycle(player);
        }

        for npc in self.npcs.refs() {
            self.pre_synchronize(npc);
        }
        for player in self.players.refs() {
            self.pre_synchronize(player);
        }
        self.synchronize()?;
        self.post_synchronize();

        self.cycle_instances();
        let elapsed = started.elapsed();
        if elapsed > self.clock.tick_length() {
            logging::log_lag(&format!(
                "tick {} took {}ms ({} players, {} npcs)",
                self.clock.now().0,
                elapsed.as_millis(),
                self.players.len(),
                self.npcs.len()
            ));
        }
        self.clock.advance(1);
        Ok(())
    }

    fn pawn_cycle(&mut self, pawn: PawnRef) {
        self.cycle_queues(pawn);
        self.timer_cycle(pawn);
        self.hits_cycle(pawn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::attributes::FACING_PAWN;
    use crate::entities::timers::{FROZEN_TIMER, STUN_TIMER};
    use crate::world::hooks::PawnDeathEvent;
    use crate::world::instance::{InstancedChunk, InstancedChunkSet, InstancedMapConfiguration};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn world() -> World {
        World::new(WorldConfig::default()).expect("world")
    }

    fn start() -> Tile {
        Tile::new(3222, 3218, 0)
    }

    fn player(world: &mut World) -> PawnRef {
        let player = world
            .register_player(PlayerData::new(1, "tester"), start())
            .expect("player");
        world
            .pawn_mut(player)
            .and_then(|pawn| pawn.as_player_mut())
            .expect("player data")
            .last_known_region_base = Some(Tile::new(3168, 3168, 0));
        player
    }

    fn messages(world: &World, player: PawnRef) -> Vec<Message> {
        world
            .pawn(player)
            .and_then(|pawn| pawn.as_player())
            .expect("player data")
            .pending_messages()
            .to_vec()
    }

    #[test]
    fn player_slots_are_limited() {
        let mut world = World::new(WorldConfig {
            max_players: 2,
            ..WorldConfig::default()
        })
        .expect("world");
        assert!(world.register_player(PlayerData::new(1, "a"), start()).is_some());
        assert!(world.register_player(PlayerData::new(2, "b"), start()).is_some());
        assert!(world.register_player(PlayerData::new(3, "c"), start()).is_none());
    }

    #[test]
    fn walk_to_queues_steps_and_moves_the_flag() {
        let mut world = world();
        let player = player(&mut world);
        world.walk_to(player, start().transform(3, 0), StepType::Normal, true);

        let pawn = world.pawn(player).expect("pawn");
        assert_eq!(pawn.movement_queue.len(), 3);
        assert_eq!(pawn.movement_queue.peek_last(), Some(start().transform(3, 0)));
        assert_eq!(
            messages(&world, player),
            vec![Message::SetMapFlag(SetMapFlagMessage::new(3225 - 3168, 3218 - 3168))]
        );
    }

    #[test]
    fn walk_to_own_tile_does_nothing() {
        let mut world = world();
        let player = player(&mut world);
        world.walk_to(player, start(), StepType::Normal, true);
        assert!(world.pawn(player).expect("pawn").movement_queue.is_empty());
        assert!(messages(&world, player).is_empty());
    }

    #[test]
    fn frozen_players_are_told() {
        let mut world = world();
        let player = player(&mut world);
        world.pawn_mut(player).expect("pawn").timers.set(FROZEN_TIMER, 2);
        world.walk_to(player, start().transform(2, 0), StepType::Normal, true);
        assert!(world.pawn(player).expect("pawn").movement_queue.is_empty());
        assert_eq!(
            messages(&world, player),
            vec![Message::Game(GameMessage::new(FROZEN_MESSAGE))]
        );
    }

    #[test]
    fn stunned_walks_are_dropped_silently() {
        let mut world = world();
        let player = player(&mut world);
        world.pawn_mut(player).expect("pawn").timers.set(STUN_TIMER, 2);
        world.walk_to(player, start().transform(2, 0), StepType::Normal, true);
        assert!(world.pawn(player).expect("pawn").movement_queue.is_empty());
        assert!(messages(&world, player).is_empty());
    }

    #[test]
    fn empty_path_clears_the_flag() {
        let mut world = world();
        let player = player(&mut world);
        world.walk_path(player, Vec::new(), StepType::Normal, true);
        assert_eq!(
            messages(&world, player),
            vec![Message::SetMapFlag(SetMapFlagMessage::clear())]
        );
    }

    #[test]
    fn awaited_route_is_stored_for_the_task() {
        let mut world = world();
        let player = player(&mut world);
        let seq = world
            .walk_to_await(player, start().transform(0, 4), StepType::Normal, true)
            .expect("seq");
        let pawn = world.pawn(player).expect("pawn");
        let route = pawn.route_results.get(&seq).expect("route");
        assert!(route.success);
        assert_eq!(route.tail, start().transform(0, 4));

        world.pawn_mut(player).expect("pawn").timers.set(FROZEN_TIMER, 1);
        let seq = world
            .walk_to_await(player, start().transform(0, -4), StepType::Normal, true)
            .expect("seq");
        assert!(!world.pawn(player).expect("pawn").route_results[&seq].success);
    }

    #[test]
    fn removal_drops_references_held_by_others() {
        let mut world = world();
        let player = player(&mut world);
        let npc = world.spawn_npc(NpcData::new(50, start().transform(1, 1))).expect("npc");
        world.attack(player, npc);
        world.face_pawn(player, npc);
        assert!(world.pawn(player).expect("pawn").attributes.has(COMBAT_TARGET_FOCUS));
        assert!(world.pawn(player).expect("pawn").attributes.has(FACING_PAWN));

        assert!(world.remove_pawn(npc).is_some());
        assert!(world.remove_pawn(npc).is_none());
        let pawn = world.pawn(player).expect("pawn");
        assert!(!pawn.attributes.has(COMBAT_TARGET_FOCUS));
        assert!(!pawn.attributes.has(FACING_PAWN));
    }

    #[test]
    fn npc_combat_hook_wins_over_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut world = world();
        let counter = Arc::clone(&calls);
        world.hooks.on_combat(move |_world, _pawn| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&calls);
        world.hooks.on_npc_combat(7, move |_world, _pawn| {
            counter.fetch_add(100, Ordering::SeqCst);
        });
        let player = player(&mut world);
        let guard = world.spawn_npc(NpcData::new(7, start().transform(2, 0))).expect("guard");
        let rat = world.spawn_npc(NpcData::new(8, start().transform(3, 0))).expect("rat");

        world.attack(guard, player);
        assert_eq!(calls.load(Ordering::SeqCst), 100);
        world.attack(rat, player);
        world.attack(player, rat);
        assert_eq!(calls.load(Ordering::SeqCst), 102);

        world.pawn_mut(rat).expect("rat").set_lifepoints(0);
        world.attack(rat, player);
        assert_eq!(calls.load(Ordering::SeqCst), 102);
    }

    #[test]
    fn events_reach_registered_handlers() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut world = world();
        let counter = Arc::clone(&calls);
        world.hooks.on_event(PawnDeathEvent::NAME, move |_world, _pawn, event| {
            if event.as_any().downcast_ref::<PawnDeathEvent>().is_some() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let player = player(&mut world);
        let event = PawnDeathEvent {
            pawn: player,
            killer: None,
            tile: start(),
        };
        world.trigger_event(player, &event);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn logout_releases_owned_instances() {
        let mut world = world();
        let player = player(&mut world);
        let chunks = InstancedChunkSet::builder(1)
            .set(0, 0, 0, InstancedChunk::new(ChunkCoords::new(400, 400), 0, 0))
            .build();
        let config = InstancedMapConfiguration::builder()
            .exit_tile(start())
            .owner(1)
            .attribute(InstancedMapAttribute::DeallocateOnLogout)
            .build()
            .expect("config");
        world.allocate_instance(chunks, config).expect("allocate");
        assert_eq!(world.instances.len(), 1);

        assert!(world.logout_player(player).is_some());
        assert!(world.instances.is_empty());
        assert!(world.players.is_empty());
    }
}
