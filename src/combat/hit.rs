use crate::entities::attributes::PawnRef;
use crate::world::state::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitmarkKind {
    Block,
    Regular,
    Poison,
    Venom,
    Disease,
    Heal,
}

impl HitmarkKind {
    pub fn id(self) -> u8 {
        match self {
            HitmarkKind::Block => 0,
            HitmarkKind::Regular => 1,
            HitmarkKind::Poison => 2,
            HitmarkKind::Disease => 3,
            HitmarkKind::Venom => 5,
            HitmarkKind::Heal => 6,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(HitmarkKind::Block),
            1 => Some(HitmarkKind::Regular),
            2 => Some(HitmarkKind::Poison),
            3 => Some(HitmarkKind::Disease),
            5 => Some(HitmarkKind::Venom),
            6 => Some(HitmarkKind::Heal),
            _ => None,
        }
    }

    /// Heals are shown as hitmarks but never subtract lifepoints.
    pub fn is_damage(self) -> bool {
        !matches!(self, HitmarkKind::Heal | HitmarkKind::Block)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hitmark {
    pub damage: i32,
    pub kind: HitmarkKind,
}

impl Hitmark {
    pub fn new(damage: i32, kind: HitmarkKind) -> Self {
        Self {
            damage: damage.max(0),
            kind,
        }
    }
}

pub type HitCondition = Box<dyn Fn(&World, PawnRef) -> bool + Send>;
pub type HitAction = Box<dyn FnOnce(&mut World, PawnRef) + Send>;

/// A pending hit. It waits `damage_delay` ticks, then applies its hitmarks
/// unless `cancel_condition` holds at that moment.
pub struct Hit {
    pub hitmarks: Vec<Hitmark>,
    pub damage_delay: i32,
    pub attacker: Option<PawnRef>,
    pub(crate) cancel_condition: Option<HitCondition>,
    pub(crate) actions: Vec<HitAction>,
}

impl std::fmt::Debug for Hit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hit")
            .field("hitmarks", &self.hitmarks)
            .field("damage_delay", &self.damage_delay)
            .field("attacker", &self.attacker)
            .field("cancellable", &self.cancel_condition.is_some())
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Hit {
    pub fn new(damage_delay: i32) -> Self {
        Self {
            hitmarks: Vec::new(),
            damage_delay: damage_delay.max(0),
            attacker: None,
            cancel_condition: None,
            actions: Vec::new(),
        }
    }

    pub fn with_hitmark(mut self, damage: i32, kind: HitmarkKind) -> Self {
        self.hitmarks.push(Hitmark::new(damage, kind));
        self
    }

    pub fn with_attacker(mut self, attacker: PawnRef) -> Self {
        self.attacker = Some(attacker);
        self
    }

    pub fn cancel_if<F>(mut self, condition: F) -> Self
    where
        F: Fn(&World, PawnRef) -> bool + Send + 'static,
    {
        self.cancel_condition = Some(Box::new(condition));
        self
    }

    pub fn on_apply<F>(mut self, action: F) -> Self
    where
        F: FnOnce(&mut World, PawnRef) + Send + 'static,
    {
        self.actions.push(Box::new(action));
        self
    }

    pub fn total_damage(&self) -> i32 {
        self.hitmarks
            .iter()
            .filter(|hitmark| hitmark.kind.is_damage())
            .map(|hitmark| hitmark.damage)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hitmark_ids_roundtrip() {
        for kind in [
            HitmarkKind::Block,
            HitmarkKind::Regular,
            HitmarkKind::Poison,
            HitmarkKind::Venom,
            HitmarkKind::Disease,
            HitmarkKind::Heal,
        ] {
            assert_eq!(HitmarkKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(HitmarkKind::from_id(4), None);
    }

    #[test]
    fn total_damage_skips_heals_and_blocks() {
        let hit = Hit::new(1)
            .with_hitmark(5, HitmarkKind::Regular)
            .with_hitmark(3, HitmarkKind::Poison)
            .with_hitmark(9, HitmarkKind::Heal)
            .with_hitmark(0, HitmarkKind::Block);
        assert_eq!(hit.total_damage(), 8);
    }

    #[test]
    fn negative_values_are_floored() {
        let hit = Hit::new(-3).with_hitmark(-4, HitmarkKind::Regular);
        assert_eq!(hit.damage_delay, 0);
        assert_eq!(hit.hitmarks[0].damage, 0);
    }
}
