use crate::entities::attributes::PawnRef;
use crate::entities::timers::TimerKey;
use crate::world::state::World;
use crate::world::tile::Tile;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Content callback taking the acting pawn.
pub type PawnHook = Arc<dyn Fn(&mut World, PawnRef) + Send + Sync>;
pub type TimerHook = Arc<dyn Fn(&mut World, PawnRef, TimerKey) + Send + Sync>;
pub type EventHook = Arc<dyn Fn(&mut World, PawnRef, &dyn Event) + Send + Sync>;

/// Something that happened to a pawn that content may react to.
pub trait Event: Send {
    fn name(&self) -> &'static str;

    /// One-line form written to the event log.
    fn describe(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PawnDeathEvent {
    pub pawn: PawnRef,
    pub killer: Option<PawnRef>,
    pub tile: Tile,
}

impl PawnDeathEvent {
    pub const NAME: &'static str = "pawn_death";
}

impl Event for PawnDeathEvent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn describe(&self) -> String {
        match self.killer {
            Some(killer) => format!(
                "{:?} {} died at {} (killer {:?} {})",
                self.pawn.kind, self.pawn.index, self.tile, killer.kind, killer.index
            ),
            None => format!("{:?} {} died at {}", self.pawn.kind, self.pawn.index, self.tile),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Callbacks registered by content. Lookups hand out clones of the shared
/// closures so they can be called with the world borrowed mutably.
#[derive(Default, Clone)]
pub struct Hooks {
    combat: Option<PawnHook>,
    npc_combat: HashMap<i32, PawnHook>,
    player_death: Option<PawnHook>,
    npc_death: HashMap<i32, PawnHook>,
    default_npc_death: Option<PawnHook>,
    timers: HashMap<&'static str, TimerHook>,
    events: HashMap<&'static str, Vec<EventHook>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("combat", &self.combat.is_some())
            .field("npc_combat", &self.npc_combat.len())
            .field("player_death", &self.player_death.is_some())
            .field("npc_death", &self.npc_death.len())
            .field("timers", &self.timers.len())
            .field("events", &self.events.len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combat every player uses, and npcs without their own.
    pub fn on_combat<F>(&mut self, hook: F)
    where
        F: Fn(&mut World, PawnRef) + Send + Sync + 'static,
    {
        self.combat = Some(Arc::new(hook));
    }

    pub fn on_npc_combat<F>(&mut self, npc_id: i32, hook: F)
    where
        F: Fn(&mut World, PawnRef) + Send + Sync + 'static,
    {
        self.npc_combat.insert(npc_id, Arc::new(hook));
    }

    pub fn on_player_death<F>(&mut self, hook: F)
    where
        F: Fn(&mut World, PawnRef) + Send + Sync + 'static,
    {
        self.player_death = Some(Arc::new(hook));
    }

    pub fn on_npc_death<F>(&mut self, npc_id: i32, hook: F)
    where
        F: Fn(&mut World, PawnRef) + Send + Sync + 'static,
    {
        self.npc_death.insert(npc_id, Arc::new(hook));
    }

    pub fn on_default_npc_death<F>(&mut self, hook: F)
    where
        F: Fn(&mut World, PawnRef) + Send + Sync + 'static,
    {
        self.default_npc_death = Some(Arc::new(hook));
    }

    pub fn on_timer<F>(&mut self, key: TimerKey, hook: F)
    where
        F: Fn(&mut World, PawnRef, TimerKey) + Send + Sync + 'static,
    {
        self.timers.insert(key.name, Arc::new(hook));
    }

    /// Event handlers stack; all of them run in registration order.
    pub fn on_event<F>(&mut self, name: &'static str, hook: F)
    where
        F: Fn(&mut World, PawnRef, &dyn Event) + Send + Sync + 'static,
    {
        self.events.entry(name).or_default().push(Arc::new(hook));
    }

    pub fn combat(&self) -> Option<PawnHook> {
        self.combat.clone()
    }

    pub fn npc_combat(&self, npc_id: i32) -> Option<PawnHook> {
        self.npc_combat.get(&npc_id).cloned()
    }

    pub fn player_death(&self) -> Option<PawnHook> {
        self.player_death.clone()
    }

    /// Death hook bound to `npc_id`, else the default npc death hook.
    pub fn npc_death(&self, npc_id: i32) -> Option<PawnHook> {
        self.npc_death
            .get(&npc_id)
            .cloned()
            .or_else(|| self.default_npc_death.clone())
    }

    pub fn timer(&self, key: TimerKey) -> Option<TimerHook> {
        self.timers.get(key.name).cloned()
    }

    pub fn events(&self, name: &str) -> Vec<EventHook> {
        self.events.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::attributes::EntityKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn pawn(index: usize) -> PawnRef {
        PawnRef {
            kind: EntityKind::Npc,
            index,
            uid: 9,
        }
    }

    #[test]
    fn npc_death_falls_back_to_default() {
        let mut hooks = Hooks::new();
        assert!(hooks.npc_death(7).is_none());
        hooks.on_default_npc_death(|_world, _pawn| {});
        assert!(hooks.npc_death(7).is_some());
        hooks.on_npc_death(3, |_world, _pawn| {});
        assert!(hooks.npc_death(3).is_some());
        assert!(hooks.npc_combat(3).is_none());
    }

    #[test]
    fn event_handlers_stack() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut hooks = Hooks::new();
        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            hooks.on_event(PawnDeathEvent::NAME, move |_world, _pawn, _event| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(hooks.events(PawnDeathEvent::NAME).len(), 2);
        assert!(hooks.events("logout").is_empty());
    }

    #[test]
    fn death_event_downcasts() {
        let event = PawnDeathEvent {
            pawn: pawn(4),
            killer: Some(pawn(1)),
            tile: Tile::new(3200, 3200, 0),
        };
        let boxed: Box<dyn Event> = Box::new(event);
        let found = boxed.as_any().downcast_ref::<PawnDeathEvent>().expect("death event");
        assert_eq!(found.pawn.index, 4);
        assert!(boxed.describe().contains("killer"));
    }
}
