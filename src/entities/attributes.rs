use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Player,
    Npc,
}

/// Non-owning handle to a registered pawn. Resolving a handle whose slot was
/// released, or reused by a different pawn, yields nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PawnRef {
    pub kind: EntityKind,
    pub index: usize,
    pub uid: u64,
}

impl PawnRef {
    pub fn is_player(&self) -> bool {
        self.kind == EntityKind::Player
    }

    pub fn is_npc(&self) -> bool {
        self.kind == EntityKind::Npc
    }
}

/// Typed name for a slot in an [`AttributeMap`].
pub struct AttributeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> std::fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AttributeKey({})", self.name)
    }
}

pub const COMBAT_TARGET_FOCUS: AttributeKey<PawnRef> = AttributeKey::new("combat_target_focus");
pub const INTERACTING_PAWN: AttributeKey<PawnRef> = AttributeKey::new("interacting_pawn");
pub const FACING_PAWN: AttributeKey<PawnRef> = AttributeKey::new("facing_pawn");
pub const KILLER: AttributeKey<PawnRef> = AttributeKey::new("killer");
pub const LAST_HIT_BY: AttributeKey<PawnRef> = AttributeKey::new("last_hit_by");

#[derive(Default)]
pub struct AttributeMap {
    values: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl std::fmt::Debug for AttributeMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&&str> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("AttributeMap").field("keys", &keys).finish()
    }
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any>(&self, key: AttributeKey<T>) -> Option<&T> {
        self.values.get(key.name).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: AttributeKey<T>) -> Option<&mut T> {
        self.values
            .get_mut(key.name)
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn put<T: Any + Send>(&mut self, key: AttributeKey<T>, value: T) {
        self.values.insert(key.name, Box::new(value));
    }

    pub fn remove<T: Any>(&mut self, key: AttributeKey<T>) -> Option<T> {
        let value = self.values.remove(key.name)?;
        value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn has<T: Any>(&self, key: AttributeKey<T>) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Drops every attribute that points at `target`. Returns how many were
    /// removed.
    pub fn remove_refs_to(&mut self, target: PawnRef) -> usize {
        let before = self.values.len();
        self.values
            .retain(|_, value| value.downcast_ref::<PawnRef>() != Some(&target));
        before - self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: AttributeKey<u32> = AttributeKey::new("counter");

    fn npc_ref(index: usize) -> PawnRef {
        PawnRef {
            kind: EntityKind::Npc,
            index,
            uid: 100 + index as u64,
        }
    }

    #[test]
    fn typed_values_roundtrip() {
        let mut attrs = AttributeMap::new();
        attrs.put(COUNTER, 3);
        *attrs.get_mut(COUNTER).expect("counter") += 1;
        assert_eq!(attrs.get(COUNTER), Some(&4));
        assert_eq!(attrs.remove(COUNTER), Some(4));
        assert!(attrs.is_empty());
    }

    #[test]
    fn removing_refs_keeps_other_values() {
        let mut attrs = AttributeMap::new();
        attrs.put(COMBAT_TARGET_FOCUS, npc_ref(1));
        attrs.put(FACING_PAWN, npc_ref(2));
        attrs.put(COUNTER, 9);
        assert_eq!(attrs.remove_refs_to(npc_ref(1)), 1);
        assert!(!attrs.has(COMBAT_TARGET_FOCUS));
        assert_eq!(attrs.get(FACING_PAWN), Some(&npc_ref(2)));
        assert_eq!(attrs.get(COUNTER), Some(&9));
    }

    #[test]
    fn stale_uid_is_a_different_ref() {
        let mut attrs = AttributeMap::new();
        attrs.put(KILLER, npc_ref(4));
        let reused = PawnRef { uid: 999, ..npc_ref(4) };
        assert_eq!(attrs.remove_refs_to(reused), 0);
        assert!(attrs.has(KILLER));
    }
}
