use crate::entities::attributes::{EntityKind, PawnRef};
use crate::entities::pawn::Pawn;

/// Client limit on concurrently visible player slots.
pub const MAX_PLAYERS: usize = 2047;
pub const MAX_NPCS: usize = 32767;

/// Fixed-capacity registry. A pawn's slot is its index for as long as it is
/// registered; freed slots are reused lowest-first.
#[derive(Debug)]
pub struct PawnList {
    kind: EntityKind,
    slots: Vec<Option<Pawn>>,
    count: usize,
}

impl PawnList {
    pub fn new(kind: EntityKind, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            kind,
            slots,
            count: 0,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.slots.len()
    }

    /// Places the pawn in the first free slot and stamps it with its index
    /// and `uid`. Returns the pawn back when the list is full.
    pub fn register(&mut self, mut pawn: Pawn, uid: u64) -> Result<PawnRef, Pawn> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Err(pawn);
        };
        pawn.index = Some(index);
        pawn.uid = uid;
        self.slots[index] = Some(pawn);
        self.count += 1;
        Ok(PawnRef {
            kind: self.kind,
            index,
            uid,
        })
    }

    pub fn remove(&mut self, index: usize) -> Option<Pawn> {
        let mut pawn = self.slots.get_mut(index)?.take()?;
        pawn.index = None;
        self.count -= 1;
        Some(pawn)
    }

    pub fn get(&self, index: usize) -> Option<&Pawn> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Pawn> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Looks a handle up, rejecting it if the slot now holds someone else.
    pub fn resolve(&self, pawn: PawnRef) -> Option<&Pawn> {
        if pawn.kind != self.kind {
            return None;
        }
        self.get(pawn.index).filter(|found| found.uid == pawn.uid)
    }

    pub fn resolve_mut(&mut self, pawn: PawnRef) -> Option<&mut Pawn> {
        if pawn.kind != self.kind {
            return None;
        }
        self.get_mut(pawn.index).filter(|found| found.uid == pawn.uid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pawn> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pawn> {
        self.slots.iter_mut().flatten()
    }

    /// Handles of every registered pawn in index order, safe to hold while
    /// mutating the world.
    pub fn refs(&self) -> Vec<PawnRef> {
        self.iter().filter_map(Pawn::pawn_ref).collect()
    }
}
