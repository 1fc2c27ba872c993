use crate::combat::hit::{Hit, HitmarkKind};
use crate::entities::attributes::{PawnRef, KILLER, LAST_HIT_BY};
use crate::entities::pawn::LockState;
use crate::entities::timers::RESET_PAWN_FACING_TIMER;
use crate::sync::block::{HitUpdate, UpdateBlockType};
use crate::telemetry::logging;
use crate::world::hooks::PawnDeathEvent;
use crate::world::instance::InstancedMapAttribute;
use crate::world::state::World;

impl World {
    /// Advances the pawn's pending hits. Hits wait out their delay; while
    /// the pawn's lock delays damage the delay still counts down but
    /// nothing lands until the lock lifts.
    pub(crate) fn hits_cycle(&mut self, pawn: PawnRef) {
        let Some(target) = self.pawn_mut(pawn) else {
            return;
        };
        if target.is_dead() {
            target.clear_hits();
            return;
        }

        let mut index = 0;
        loop {
            let hit = {
                let Some(target) = self.pawn_mut(pawn) else {
                    return;
                };
                if index >= target.pending_hits.len() {
                    return;
                }
                let delayed = target.lock.delays_damage();
                let pending = &mut target.pending_hits[index];
                if delayed {
                    pending.damage_delay = (pending.damage_delay - 1).max(0);
                    index += 1;
                    continue;
                }
                if pending.damage_delay > 0 {
                    pending.damage_delay -= 1;
                    index += 1;
                    continue;
                }
                target.pending_hits.remove(index)
            };

            let cancelled = hit
                .cancel_condition
                .as_ref()
                .map(|condition| condition(self, pawn))
                .unwrap_or(false);
            if cancelled {
                continue;
            }

            let lethal = self.apply_hit(pawn, &hit);
            for action in hit.actions {
                action(self, pawn);
            }
            if lethal {
                if let Some(target) = self.pawn_mut(pawn) {
                    target.clear_hits();
                }
                self.begin_death(pawn);
                return;
            }
        }
    }

    /// Subtracts the hit's damage and records it for the hitmark block.
    /// Returns whether the pawn died from it.
    fn apply_hit(&mut self, pawn: PawnRef, hit: &Hit) -> bool {
        let now = self.clock.now();
        let Some(target) = self.pawn_mut(pawn) else {
            return false;
        };
        for hitmark in &hit.hitmarks {
            let mut shown = *hitmark;
            if hitmark.kind.is_damage() {
                let damage = hitmark.damage.min(target.lifepoints());
                shown.damage = damage;
                if !target.infinite_health {
                    target.set_lifepoints(target.lifepoints() - damage);
                }
                if let Some(attacker) = hit.attacker {
                    target.damage_map.add(attacker, damage, now);
                }
            } else if hitmark.kind == HitmarkKind::Heal {
                target.set_lifepoints(target.lifepoints().saturating_add(hitmark.damage));
            }
            target.blocks.hits.push(HitUpdate {
                hitmark: shown,
                lifepoints: target.lifepoints(),
                max_lifepoints: target.max_lifepoints(),
            });
        }
        if let Some(attacker) = hit.attacker {
            target.attributes.put(LAST_HIT_BY, attacker);
        }
        target.blocks.add(UpdateBlockType::Hitmark);
        target.lifepoints() == 0
    }

    pub(crate) fn begin_death(&mut self, pawn: PawnRef) {
        let (tile, killer, npc_id, owner) = {
            let Some(target) = self.pawn_mut(pawn) else {
                return;
            };
            target.stop_movement();
            (
                target.tile,
                target.damage_map.most_damage(),
                target.as_npc().map(|npc| npc.id),
                target.as_player().map(|player| player.uid),
            )
        };
        self.interrupt_queues(pawn);
        self.reset_interactions(pawn);
        if let Some(target) = self.pawn_mut(pawn) {
            target.lock = LockState::Full;
            if let Some(killer) = killer {
                target.attributes.put(KILLER, killer);
            }
        }

        self.trigger_event(pawn, &PawnDeathEvent { pawn, killer, tile });
        if let Some(uid) = owner {
            for id in self.owned_instances(uid, InstancedMapAttribute::DeallocateOnDeath) {
                self.deallocate_instance(id);
            }
        }

        let hook = match npc_id {
            Some(id) => self.hooks.npc_death(id),
            None => self.hooks.player_death(),
        };
        match hook {
            Some(hook) => hook(self, pawn),
            None => self.default_death(pawn),
        }
    }

    /// Npcs without a death hook despawn; players respawn at home.
    fn default_death(&mut self, pawn: PawnRef) {
        if pawn.is_npc() {
            self.remove_pawn(pawn);
            return;
        }
        let home = self.config.home_tile;
        if let Some(target) = self.pawn_mut(pawn) {
            target.teleport_to(home);
            let max = target.max_lifepoints();
            target.set_lifepoints(max);
            target.damage_map.clear();
            target.unlock();
            logging::log_game(&format!("player {} respawned at {}", pawn.index, home));
        }
    }

    /// Fires the pawn's expired count-down timers, then advances its timers.
    pub(crate) fn timer_cycle(&mut self, pawn: PawnRef) {
        let Some(expired) = self.pawn(pawn).map(|target| target.timers.expired()) else {
            return;
        };
        for key in &expired {
            if *key == RESET_PAWN_FACING_TIMER {
                if let Some(target) = self.pawn_mut(pawn) {
                    target.reset_face_pawn();
                }
            } else if let Some(hook) = self.hooks.timer(*key) {
                hook(self, pawn, *key);
            }
        }
        if let Some(target) = self.pawn_mut(pawn) {
            target.timers.finish_cycle(&expired);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::combat::hit::{Hit, HitmarkKind};
    use crate::config::WorldConfig;
    use crate::entities::attributes::{PawnRef, FACING_PAWN, KILLER, LAST_HIT_BY};
    use crate::entities::npc::NpcData;
    use crate::entities::pawn::LockState;
    use crate::entities::player::PlayerData;
    use crate::entities::timers::{TimerKey, RESET_PAWN_FACING_TIMER};
    use crate::sync::block::UpdateBlockType;
    use crate::world::hooks::PawnDeathEvent;
    use crate::world::state::World;
    use crate::world::tile::Tile;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const RAT: i32 = 2854;

    fn world() -> World {
        World::new(WorldConfig::default()).expect("world")
    }

    fn spawn(world: &mut World) -> (PawnRef, PawnRef) {
        let player = world
            .register_player(PlayerData::new(1, "fighter"), Tile::new(3200, 3200, 0))
            .expect("player");
        let rat = world
            .spawn_npc(NpcData::new(RAT, Tile::new(3201, 3200, 0)))
            .expect("rat");
        (player, rat)
    }

    #[test]
    fn lethal_hit_kills_once_and_discards_the_rest() {
        let mut world = world();
        let (player, rat) = spawn(&mut world);
        let deaths = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&deaths);
        world.hooks.on_npc_death(RAT, move |_world, _pawn| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let events = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&events);
        world.hooks.on_event(PawnDeathEvent::NAME, move |_world, _pawn, _event| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        world.add_hit(rat, Hit::new(0).with_hitmark(25, HitmarkKind::Regular).with_attacker(player));
        world.add_hit(rat, Hit::new(0).with_hitmark(3, HitmarkKind::Regular).with_attacker(player));
        world.add_hit(rat, Hit::new(4).with_hitmark(3, HitmarkKind::Poison));
        world.hits_cycle(rat);

        let target = world.pawn(rat).expect("rat");
        assert_eq!(target.lifepoints(), 0);
        assert_eq!(target.pending_hit_count(), 0);
        assert_eq!(target.lock, LockState::Full);
        assert_eq!(target.attributes.get(KILLER), Some(&player));
        assert_eq!(target.damage_map.damage_from(player), 10);
        assert_eq!(target.blocks.hits[0].hitmark.damage, 10);
        assert!(target.blocks.has(UpdateBlockType::Hitmark));

        world.add_hit(rat, Hit::new(0).with_hitmark(1, HitmarkKind::Regular));
        world.hits_cycle(rat);
        assert_eq!(world.pawn(rat).expect("rat").pending_hit_count(), 0);
        assert_eq!(deaths.load(Ordering::SeqCst), 1);
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn damage_delaying_lock_counts_down_without_landing() {
        let mut world = world();
        let (player, rat) = spawn(&mut world);
        world.pawn_mut(player).expect("player").lock = LockState::DelayDamage;
        world.add_hit(player, Hit::new(2).with_hitmark(3, HitmarkKind::Regular).with_attacker(rat));

        for _ in 0..3 {
            world.hits_cycle(player);
        }
        let target = world.pawn(player).expect("player");
        assert_eq!(target.lifepoints(), 10);
        assert_eq!(target.pending_hits[0].damage_delay, 0);
        assert!(!target.blocks.has(UpdateBlockType::Hitmark));

        world.pawn_mut(player).expect("player").unlock();
        world.hits_cycle(player);
        let target = world.pawn(player).expect("player");
        assert_eq!(target.lifepoints(), 7);
        assert_eq!(target.attributes.get(LAST_HIT_BY), Some(&rat));
        assert_eq!(target.pending_hit_count(), 0);
    }

    #[test]
    fn infinite_health_shows_the_hit_without_dying() {
        let mut world = world();
        let (player, rat) = spawn(&mut world);
        let deaths = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&deaths);
        world.hooks.on_npc_death(RAT, move |_world, _pawn| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        world.pawn_mut(rat).expect("rat").infinite_health = true;
        world.add_hit(rat, Hit::new(0).with_hitmark(50, HitmarkKind::Regular).with_attacker(player));
        world.hits_cycle(rat);

        let target = world.pawn(rat).expect("rat");
        assert_eq!(target.lifepoints(), 10);
        assert!(target.blocks.has(UpdateBlockType::Hitmark));
        assert_eq!(target.blocks.hits.len(), 1);
        assert_eq!(target.blocks.hits[0].hitmark.damage, 10);
        assert_eq!(target.blocks.hits[0].lifepoints, 10);
        assert_eq!(target.lock, LockState::None);
        assert_eq!(deaths.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_hits_skip_their_actions() {
        let mut world = world();
        let (player, rat) = spawn(&mut world);
        let applied = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&applied);
        world.add_hit(
            player,
            Hit::new(0)
                .with_hitmark(4, HitmarkKind::Regular)
                .cancel_if(move |world, _pawn| world.pawn(rat).is_none())
                .on_apply(move |_world, _pawn| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
        );
        world.remove_pawn(rat);
        world.hits_cycle(player);
        let target = world.pawn(player).expect("player");
        assert_eq!(target.lifepoints(), 10);
        assert_eq!(target.pending_hit_count(), 0);
        assert_eq!(applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn players_without_a_death_hook_respawn_at_home() {
        let mut world = world();
        let (player, rat) = spawn(&mut world);
        world.add_hit(player, Hit::new(0).with_hitmark(99, HitmarkKind::Regular).with_attacker(rat));
        world.hits_cycle(player);

        let target = world.pawn(player).expect("player");
        assert_eq!(target.tile, world.config.home_tile);
        assert_eq!(target.lifepoints(), target.max_lifepoints());
        assert!(target.damage_map.is_empty());
        assert_eq!(target.lock, LockState::None);
        assert!(target.teleported);
    }

    #[test]
    fn player_death_hook_replaces_the_respawn() {
        let mut world = world();
        let (player, rat) = spawn(&mut world);
        world.hooks.on_player_death(|world, pawn| {
            if let Some(dead) = world.pawn_mut(pawn) {
                dead.set_lifepoints(1);
            }
        });
        world.add_hit(player, Hit::new(0).with_hitmark(99, HitmarkKind::Regular).with_attacker(rat));
        world.hits_cycle(player);

        let target = world.pawn(player).expect("player");
        assert_eq!(target.tile, Tile::new(3200, 3200, 0));
        assert_eq!(target.lifepoints(), 1);
        assert_eq!(target.lock, LockState::Full);
    }

    #[test]
    fn npcs_without_a_death_hook_despawn() {
        let mut world = world();
        let (player, rat) = spawn(&mut world);
        world.add_hit(rat, Hit::new(0).with_hitmark(10, HitmarkKind::Regular).with_attacker(player));
        world.hits_cycle(rat);
        assert!(world.pawn(rat).is_none());
        assert!(world.npcs.is_empty());
    }

    #[test]
    fn expired_timers_fire_hooks_and_reset_facing() {
        const REGEN: TimerKey = TimerKey::new("regen");
        let mut world = world();
        let (player, rat) = spawn(&mut world);
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        world.hooks.on_timer(REGEN, move |world, pawn, key| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(target) = world.pawn_mut(pawn) {
                target.timers.set(key, 2);
            }
        });
        world.face_pawn(player, rat);
        {
            let target = world.pawn_mut(player).expect("player");
            target.timers.set(REGEN, 1);
            target.timers.set(RESET_PAWN_FACING_TIMER, 0);
        }

        world.timer_cycle(player);
        let target = world.pawn(player).expect("player");
        assert!(!target.attributes.has(FACING_PAWN));
        assert!(!target.timers.exists(RESET_PAWN_FACING_TIMER));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        world.timer_cycle(player);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(world.pawn(player).expect("player").timers.exists(REGEN));
        world.timer_cycle(player);
        world.timer_cycle(player);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
