use crate::entities::attributes::PawnRef;
use crate::world::time::GameTick;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEntry {
    pub total: i32,
    pub last_hit: GameTick,
}

/// Damage received per attacker since the pawn last spawned.
#[derive(Debug, Default, Clone)]
pub struct DamageMap {
    entries: HashMap<PawnRef, DamageEntry>,
}

impl DamageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attacker: PawnRef, damage: i32, now: GameTick) {
        if damage <= 0 {
            return;
        }
        let entry = self.entries.entry(attacker).or_insert(DamageEntry {
            total: 0,
            last_hit: now,
        });
        entry.total = entry.total.saturating_add(damage);
        entry.last_hit = now;
    }

    pub fn damage_from(&self, attacker: PawnRef) -> i32 {
        self.entries.get(&attacker).map(|entry| entry.total).unwrap_or(0)
    }

    pub fn total_damage(&self) -> i32 {
        self.entries.values().map(|entry| entry.total).sum()
    }

    /// Top contributor; ties go to whoever hit last.
    pub fn most_damage(&self) -> Option<PawnRef> {
        self.entries
            .iter()
            .max_by_key(|(_, entry)| (entry.total, entry.last_hit))
            .map(|(attacker, _)| *attacker)
    }

    pub fn remove(&mut self, attacker: PawnRef) {
        self.entries.remove(&attacker);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::attributes::EntityKind;

    fn player(index: usize) -> PawnRef {
        PawnRef {
            kind: EntityKind::Player,
            index,
            uid: index as u64 + 1,
        }
    }

    #[test]
    fn top_contributor_wins() {
        let mut map = DamageMap::new();
        map.add(player(0), 4, GameTick(1));
        map.add(player(1), 6, GameTick(2));
        map.add(player(0), 3, GameTick(3));
        assert_eq!(map.damage_from(player(0)), 7);
        assert_eq!(map.total_damage(), 13);
        assert_eq!(map.most_damage(), Some(player(0)));
    }

    #[test]
    fn tie_goes_to_latest_hit() {
        let mut map = DamageMap::new();
        map.add(player(0), 5, GameTick(1));
        map.add(player(1), 5, GameTick(2));
        assert_eq!(map.most_damage(), Some(player(1)));
    }

    #[test]
    fn zero_damage_is_not_recorded() {
        let mut map = DamageMap::new();
        map.add(player(0), 0, GameTick(1));
        assert!(map.is_empty());
        assert_eq!(map.most_damage(), None);
    }
}
